use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Contract shared by every entity that participates in sync.
///
/// Invariant: a record with `needs_sync() == false` has `synced_at()` set,
/// and at the moment the flag was cleared `synced_at >= last_modified`.
/// The id never changes; `needs_sync` may flip false -> true any number of
/// times as the record is edited after a sync.
pub trait SyncableRecord {
    /// Stable, globally unique identifier assigned at creation.
    fn record_id(&self) -> Uuid;

    /// Timestamp of the most recent local mutation.
    fn last_modified(&self) -> DateTime<Utc>;

    /// True while the record has local changes the remote has not
    /// acknowledged.
    fn needs_sync(&self) -> bool;

    /// Time of the last successful remote acknowledgement, if any.
    fn synced_at(&self) -> Option<DateTime<Utc>>;

    /// Flags the record for upload and refreshes `last_modified`. Called
    /// by the application whenever the record is created or mutated.
    fn mark_for_sync(&mut self, now: DateTime<Utc>);

    /// Clears the pending flag after a remote acknowledgement.
    fn mark_synced(&mut self, synced_at: DateTime<Utc>);

    /// Key used to order a batch for upload. Oldest change first; the id
    /// breaks ties so the order is reproducible across retries.
    fn submission_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.last_modified(), self.record_id())
    }
}

/// Implements the four sync accessors plus `mark_for_sync`/`mark_synced`
/// for a struct carrying `id`, `last_modified`, `needs_sync` and
/// `synced_at` fields.
macro_rules! impl_syncable_record {
    ($ty:ty) => {
        impl crate::models::SyncableRecord for $ty {
            fn record_id(&self) -> uuid::Uuid {
                self.id
            }

            fn last_modified(&self) -> chrono::DateTime<chrono::Utc> {
                self.last_modified
            }

            fn needs_sync(&self) -> bool {
                self.needs_sync
            }

            fn synced_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
                self.synced_at
            }

            fn mark_for_sync(&mut self, now: chrono::DateTime<chrono::Utc>) {
                self.needs_sync = true;
                self.last_modified = now;
            }

            fn mark_synced(&mut self, synced_at: chrono::DateTime<chrono::Utc>) {
                self.needs_sync = false;
                self.synced_at = Some(synced_at);
            }
        }
    };
}

pub(crate) use impl_syncable_record;
