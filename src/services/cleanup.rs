use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::db::Repository;
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStats {
    pub files_removed: usize,
    pub articles_pruned: usize,
}

/// Periodic disk and database reclamation: expired generated covers are
/// deleted, old unbookmarked articles are pruned.
pub struct CleanupService {
    repository: Arc<Repository>,
    covers_dir: PathBuf,
    cover_ttl: Duration,
    article_retention_days: u32,
}

impl CleanupService {
    pub fn new(
        repository: Arc<Repository>,
        covers_dir: impl Into<PathBuf>,
        cover_ttl_hours: u32,
        article_retention_days: u32,
    ) -> Self {
        Self {
            repository,
            covers_dir: covers_dir.into(),
            cover_ttl: Duration::from_secs(cover_ttl_hours as u64 * 3600),
            article_retention_days,
        }
    }

    pub async fn run_once(&self) -> Result<CleanupStats> {
        let mut stats = CleanupStats::default();

        stats.files_removed = self.remove_expired_covers()?;
        stats.articles_pruned = self
            .repository
            .prune_articles(self.article_retention_days)
            .await?;

        if stats.files_removed > 0 || stats.articles_pruned > 0 {
            tracing::info!(
                "cleanup: removed {} cover files, pruned {} articles",
                stats.files_removed,
                stats.articles_pruned
            );
        }
        Ok(stats)
    }

    fn remove_expired_covers(&self) -> Result<usize> {
        let entries = match std::fs::read_dir(&self.covers_dir) {
            Ok(entries) => entries,
            // Nothing generated yet.
            Err(_) => return Ok(0),
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            // The brand mark lives alongside generated output and is kept.
            if path.file_name().and_then(|n| n.to_str()) == Some("watermark.png") {
                continue;
            }
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age >= self.cover_ttl)
                .unwrap_or(false);
            if expired && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn spawn_loop(self: Arc<Self>, interval_minutes: u32) {
        tokio::spawn(async move {
            let period = Duration::from_secs(interval_minutes as u64 * 60);
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    tracing::error!("cleanup failed: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn removes_expired_files_but_keeps_watermark() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("old.png"), b"x").unwrap();
        std::fs::write(dir.path().join("watermark.png"), b"x").unwrap();

        let repository = Arc::new(Repository::in_memory().await.unwrap());
        // Zero TTL makes every generated file expired.
        let service = CleanupService::new(repository, dir.path(), 0, 30);
        let stats = service.run_once().await.unwrap();

        assert_eq!(stats.files_removed, 1);
        assert!(!dir.path().join("old.png").exists());
        assert!(dir.path().join("watermark.png").exists());
    }

    #[tokio::test]
    async fn missing_covers_dir_is_not_an_error() {
        let repository = Arc::new(Repository::in_memory().await.unwrap());
        let service = CleanupService::new(repository, "/nonexistent/covers", 1, 30);
        let stats = service.run_once().await.unwrap();
        assert_eq!(stats.files_removed, 0);
    }
}
