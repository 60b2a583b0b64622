use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverStatus {
    Queued,
    Generating,
    Completed,
    Failed,
}

/// In-memory record of a cover-generation job. Jobs live for the process
/// lifetime only; the status endpoint reads from the shared job map.
#[derive(Debug, Clone, Serialize)]
pub struct CoverJob {
    pub id: String,
    pub network: String,
    pub style: String,
    pub prompt: String,
    pub status: CoverStatus,
    /// Path under the covers dir once completed, e.g. "covers/abc123.png".
    pub image_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoverRequest {
    pub network: String,
    pub style: Option<String>,
}
