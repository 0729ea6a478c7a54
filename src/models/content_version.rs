use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The content snapshot currently held on the device.
///
/// Exactly one row exists locally at a time; it is written in the same
/// transaction that replaces the question set, so readers never observe a
/// version tag from one snapshot next to questions from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub version: String,
    pub fetched_at: DateTime<Utc>,
    pub total_questions: u32,
}

/// Compares two version tags field-wise and numerically.
///
/// "1.10.0" sorts after "1.9.0", which lexicographic comparison gets
/// wrong. Non-numeric fields fall back to string comparison; a tag that is
/// a strict prefix of another sorts first ("1.2" < "1.2.1").
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}
