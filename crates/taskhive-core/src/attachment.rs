use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub task_id: String,
    pub file_name: String,
    pub file_url: String,
    pub file_key: String,
    pub file_size: i64,
    pub uploader_id: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Metadata for an accepted upload, ready to be attached to a task.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_url: String,
    pub file_key: String,
    pub file_size: i64,
    pub uploader_id: Option<String>,
}
