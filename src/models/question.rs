use serde::{Deserialize, Serialize};

/// A single quiz question from the bulk reference dataset.
///
/// Questions are read-only on the device; the whole set is replaced
/// atomically when the remote content version changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Content-item id assigned by the remote dataset.
    pub id: String,
    pub category: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_index: u32,
    pub explanation: Option<String>,
}
