use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub network: Option<String>,
    pub tags: Vec<String>,
    pub sentiment: Option<String>,
    pub impact: Option<String>,
    pub is_breaking: bool,
    pub cover_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub fetched_at: DateTime<Utc>,
}

/// Article shape produced by feed ingestion, before it has a row id.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub source: String,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub network: Option<String>,
    pub tags: Vec<String>,
    pub is_breaking: bool,
    pub cover_image: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Filters accepted by the paginated article listing.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub category: Option<String>,
    pub network: Option<String>,
    pub breaking_only: bool,
    pub page: u32,
    pub limit: u32,
}
