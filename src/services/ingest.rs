use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::{FeedFetcher, FEED_SOURCES};

use super::notify::{Notifier, StatusEvent};

/// Minimum accepted cover image payload.
const MIN_IMAGE_BYTES: u64 = 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleStats {
    pub sources: usize,
    pub inserted: usize,
    pub updated: usize,
}

/// Polls the feed catalog and upserts articles. One cycle at a time; a tick
/// that fires while the previous cycle is still running is skipped instead
/// of overlapping it.
pub struct IngestService {
    repository: Arc<Repository>,
    fetcher: FeedFetcher,
    client: Client,
    notifier: Notifier,
    running: Mutex<()>,
}

impl IngestService {
    pub fn new(repository: Arc<Repository>, notifier: Notifier) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("chainwire/1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            repository,
            fetcher: FeedFetcher::new(),
            client,
            notifier,
            running: Mutex::new(()),
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleStats> {
        let _guard = self.running.try_lock().map_err(|_| {
            AppError::Conflict("a refresh cycle is already running".to_string())
        })?;

        let results = self.fetcher.refresh_all(FEED_SOURCES).await;
        let mut stats = CycleStats {
            sources: results.len(),
            ..Default::default()
        };

        for (source, articles) in results {
            for mut article in articles {
                // Candidate cover URLs only survive HEAD validation.
                if let Some(candidate) = article.cover_image.take() {
                    article.cover_image = self.validate_cover_url(&candidate).await;
                }

                let existing = self
                    .repository
                    .get_article_id_by_url(article.url.clone())
                    .await?;
                let title = article.title.clone();
                let is_breaking = article.is_breaking;
                let id = self.repository.upsert_article(article).await?;

                if existing.is_none() {
                    stats.inserted += 1;
                    self.notifier.send(StatusEvent::ArticleIngested {
                        id,
                        title,
                        source: source.name.to_string(),
                        is_breaking,
                    });
                } else {
                    stats.updated += 1;
                }
            }
        }

        tracing::info!(
            "refresh cycle done: {} sources, {} new, {} updated",
            stats.sources,
            stats.inserted,
            stats.updated
        );
        self.notifier.send(StatusEvent::RefreshCompleted {
            sources: stats.sources,
            inserted: stats.inserted,
        });
        Ok(stats)
    }

    /// HEAD the candidate URL and keep it only if it looks like a real image.
    async fn validate_cover_url(&self, url: &str) -> Option<String> {
        let response = match self.client.head(url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("cover HEAD failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        // HEAD responses have no body, so read the header rather than
        // the body size hint.
        let content_length = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if is_valid_image(content_type, content_length) {
            Some(url.to_string())
        } else {
            tracing::debug!("rejected cover candidate {}", url);
            None
        }
    }

    /// Poll on a fixed interval until the process exits.
    pub fn spawn_loop(self: Arc<Self>, interval_minutes: u32) {
        tokio::spawn(async move {
            let period = Duration::from_secs(interval_minutes as u64 * 60);
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match self.run_cycle().await {
                    Ok(_) => {}
                    Err(AppError::Conflict(_)) => {
                        tracing::debug!("skipping tick, previous cycle still running")
                    }
                    Err(e) => tracing::error!("refresh cycle failed: {}", e),
                }
            }
        });
    }
}

/// Accept only image content types with at least 1KiB of payload. Missing
/// headers are treated as a rejection.
pub fn is_valid_image(content_type: Option<&str>, content_length: Option<u64>) -> bool {
    let is_image = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false);
    let is_big_enough = content_length.map(|len| len >= MIN_IMAGE_BYTES).unwrap_or(false);
    is_image && is_big_enough
}
