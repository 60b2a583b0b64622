use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Each preference list is FIFO-trimmed to this length.
pub const PREFERENCE_LIST_CAP: usize = 50;

/// A single cover rating as submitted by a user. Appended to the rating log;
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEvent {
    pub id: i64,
    pub job_id: Option<String>,
    pub network: String,
    pub style: Option<String>,
    /// 1-10 overall score.
    pub overall: u8,
    pub logo_integration: Option<u8>,
    pub background_quality: Option<u8>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRating {
    pub job_id: Option<String>,
    pub network: String,
    pub style: Option<String>,
    pub overall: u8,
    pub logo_integration: Option<u8>,
    pub background_quality: Option<u8>,
    pub feedback: Option<String>,
}

/// Prompt preferences derived by folding the rating log in order. Not stored
/// as a blob; recomputable from `rating_events` at any time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptPreferences {
    pub good_keywords: Vec<String>,
    pub bad_keywords: Vec<String>,
    pub preferred_materials: Vec<String>,
    pub preferred_scenes: Vec<String>,
    pub ratings_seen: u64,
    pub average_overall: f64,
}

impl PromptPreferences {
    /// Push onto a capped list, dropping the oldest entries first. Duplicate
    /// entries are moved to the back rather than repeated.
    pub fn push_capped(list: &mut Vec<String>, value: String) {
        list.retain(|v| v != &value);
        list.push(value);
        if list.len() > PREFERENCE_LIST_CAP {
            let excess = list.len() - PREFERENCE_LIST_CAP;
            list.drain(..excess);
        }
    }
}
