use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Fetch,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Fetch => "fetch",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// Row of the append-only `logs` table.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub action: Action,
    /// `Uuid::nil()` when the request failed before an id was known.
    pub todo_id: Uuid,
    pub message: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
