use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Article, ArticleFilter, NewArticle, NewRating, RatingEvent};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }

    // Article operations

    /// Insert or update keyed on url. A refetched article refreshes its
    /// content but keeps its row id, summary and cover.
    pub async fn upsert_article(&self, article: NewArticle) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let tags_json = serde_json::to_string(&article.tags).unwrap_or_else(|_| "[]".into());
                let metadata_json = article
                    .metadata
                    .as_ref()
                    .map(|m| m.to_string());
                conn.execute(
                    r#"INSERT INTO articles
                           (title, content, summary, url, source, published_at,
                            category, network, tags, is_breaking, cover_image, metadata)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                       ON CONFLICT(url) DO UPDATE SET
                           title = excluded.title,
                           content = excluded.content,
                           source = excluded.source,
                           published_at = excluded.published_at,
                           category = excluded.category,
                           network = excluded.network,
                           tags = excluded.tags,
                           is_breaking = excluded.is_breaking,
                           metadata = excluded.metadata"#,
                    params![
                        article.title,
                        article.content,
                        article.summary,
                        article.url,
                        article.source,
                        article.published_at.map(|dt| dt.to_rfc3339()),
                        article.category,
                        article.network,
                        tags_json,
                        article.is_breaking,
                        article.cover_image,
                        metadata_json,
                    ],
                )?;
                let id: i64 = conn.query_row(
                    "SELECT id FROM articles WHERE url = ?1",
                    params![article.url],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut sql = String::from(
                    r#"SELECT id, title, content, summary, url, source, published_at,
                              category, network, tags, sentiment, impact, is_breaking,
                              cover_image, metadata, fetched_at
                       FROM articles WHERE 1=1"#,
                );
                let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

                if let Some(category) = filter.category {
                    sql.push_str(" AND category = ?");
                    args.push(Box::new(category));
                }
                if let Some(network) = filter.network {
                    sql.push_str(" AND network = ?");
                    args.push(Box::new(network));
                }
                if filter.breaking_only {
                    sql.push_str(" AND is_breaking = 1");
                }

                sql.push_str(" ORDER BY published_at DESC NULLS LAST, fetched_at DESC");
                sql.push_str(" LIMIT ? OFFSET ?");
                let limit = filter.limit.max(1) as i64;
                args.push(Box::new(limit));
                args.push(Box::new(filter.page.saturating_sub(1) as i64 * limit));

                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, content, summary, url, source, published_at,
                              category, network, tags, sentiment, impact, is_breaking,
                              cover_image, metadata, fetched_at
                       FROM articles WHERE id = ?1"#,
                )?;
                let article = stmt
                    .query_row(params![id], |row| Ok(article_from_row(row)))
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    pub async fn get_article_id_by_url(&self, url: String) -> Result<Option<i64>> {
        let id = self
            .conn
            .call(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT id FROM articles WHERE url = ?1",
                        params![url],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    #[allow(dead_code)]
    pub async fn count_articles(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn set_article_summary(&self, id: i64, summary: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET summary = ?1 WHERE id = ?2",
                    params![summary, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_article_cover(&self, id: i64, cover_image: String) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET cover_image = ?1 WHERE id = ?2",
                    params![cover_image, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Prune unbookmarked articles fetched before the retention window.
    pub async fn prune_articles(&self, retention_days: u32) -> Result<usize> {
        let cutoff = (Utc::now() - Duration::days(retention_days as i64)).to_rfc3339();
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    r#"DELETE FROM articles
                       WHERE fetched_at < ?1
                         AND id NOT IN (SELECT article_id FROM bookmarks)"#,
                    params![cutoff],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted)
    }

    // Bookmark operations

    pub async fn insert_bookmark(&self, user_id: String, article_id: i64) -> Result<i64> {
        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO bookmarks (user_id, article_id) VALUES (?1, ?2)",
                    params![user_id, article_id],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_constraint_violation(&e) => Err(AppError::Conflict(
                "bookmark already exists for this article".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_bookmark(&self, user_id: String, article_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM bookmarks WHERE user_id = ?1 AND article_id = ?2",
                    params![user_id, article_id],
                )?;
                Ok(deleted)
            })
            .await?;
        Ok(deleted > 0)
    }

    /// Articles bookmarked by a user, newest bookmark first.
    pub async fn get_bookmarked_articles(&self, user_id: String) -> Result<Vec<Article>> {
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT a.id, a.title, a.content, a.summary, a.url, a.source,
                              a.published_at, a.category, a.network, a.tags, a.sentiment,
                              a.impact, a.is_breaking, a.cover_image, a.metadata, a.fetched_at
                       FROM articles a
                       JOIN bookmarks b ON b.article_id = a.id
                       WHERE b.user_id = ?1
                       ORDER BY b.created_at DESC"#,
                )?;
                let articles = stmt
                    .query_map(params![user_id], |row| Ok(article_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    // Rating operations

    pub async fn insert_rating(&self, rating: NewRating) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO rating_events
                           (job_id, network, style, overall, logo_integration,
                            background_quality, feedback)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                    params![
                        rating.job_id,
                        rating.network,
                        rating.style,
                        rating.overall,
                        rating.logo_integration,
                        rating.background_quality,
                        rating.feedback,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn get_rating_events(&self) -> Result<Vec<RatingEvent>> {
        let events = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, job_id, network, style, overall, logo_integration,
                              background_quality, feedback, created_at
                       FROM rating_events ORDER BY id"#,
                )?;
                let events = stmt
                    .query_map([], |row| Ok(rating_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await?;
        Ok(events)
    }
}

fn is_constraint_violation(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(err, _))
            if err.code == ErrorCode::ConstraintViolation
    )
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn article_from_row(row: &Row) -> Article {
    let tags: Vec<String> = row
        .get::<_, String>(9)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();
    let metadata: Option<serde_json::Value> = row
        .get::<_, Option<String>>(14)
        .unwrap()
        .and_then(|s| serde_json::from_str(&s).ok());

    Article {
        id: row.get(0).unwrap(),
        title: row.get(1).unwrap(),
        content: row.get(2).unwrap(),
        summary: row.get(3).unwrap(),
        url: row.get(4).unwrap(),
        source: row.get(5).unwrap(),
        published_at: row
            .get::<_, Option<String>>(6)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        category: row.get(7).unwrap(),
        network: row.get(8).unwrap(),
        tags,
        sentiment: row.get(10).unwrap(),
        impact: row.get(11).unwrap(),
        is_breaking: row.get::<_, i64>(12).unwrap() != 0,
        cover_image: row.get(13).unwrap(),
        metadata,
        fetched_at: row
            .get::<_, String>(15)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn rating_from_row(row: &Row) -> RatingEvent {
    RatingEvent {
        id: row.get(0).unwrap(),
        job_id: row.get(1).unwrap(),
        network: row.get(2).unwrap(),
        style: row.get(3).unwrap(),
        overall: row.get::<_, i64>(4).unwrap() as u8,
        logo_integration: row.get::<_, Option<i64>>(5).unwrap().map(|v| v as u8),
        background_quality: row.get::<_, Option<i64>>(6).unwrap().map(|v| v as u8),
        feedback: row.get(7).unwrap(),
        created_at: row
            .get::<_, String>(8)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_article(url: &str) -> NewArticle {
        NewArticle {
            title: "Hedera mainnet upgrade".to_string(),
            content: Some("<p>body</p>".to_string()),
            summary: None,
            url: url.to_string(),
            source: "Test Wire".to_string(),
            published_at: Some(Utc::now()),
            category: Some("networks".to_string()),
            network: Some("hedera".to_string()),
            tags: vec!["hedera".to_string(), "upgrade".to_string()],
            is_breaking: false,
            cover_image: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_on_url() {
        let repo = Repository::in_memory().await.unwrap();

        let first = repo.upsert_article(sample_article("https://example.com/a")).await.unwrap();
        let mut updated = sample_article("https://example.com/a");
        updated.title = "Hedera mainnet upgrade live".to_string();
        let second = repo.upsert_article(updated).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.count_articles().await.unwrap(), 1);
        let article = repo.get_article(first).await.unwrap().unwrap();
        assert_eq!(article.title, "Hedera mainnet upgrade live");
    }

    #[tokio::test]
    async fn upsert_preserves_summary_and_cover() {
        let repo = Repository::in_memory().await.unwrap();
        let id = repo.upsert_article(sample_article("https://example.com/b")).await.unwrap();
        repo.set_article_summary(id, "two paragraphs".to_string()).await.unwrap();
        repo.set_article_cover(id, "covers/x.png".to_string()).await.unwrap();

        repo.upsert_article(sample_article("https://example.com/b")).await.unwrap();

        let article = repo.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.summary.as_deref(), Some("two paragraphs"));
        assert_eq!(article.cover_image.as_deref(), Some("covers/x.png"));
    }

    #[tokio::test]
    async fn duplicate_bookmark_is_a_conflict() {
        let repo = Repository::in_memory().await.unwrap();
        let article_id = repo.upsert_article(sample_article("https://example.com/c")).await.unwrap();

        repo.insert_bookmark("user-1".to_string(), article_id).await.unwrap();
        let err = repo
            .insert_bookmark("user-1".to_string(), article_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // A different user can still bookmark the same article.
        repo.insert_bookmark("user-2".to_string(), article_id).await.unwrap();
    }

    #[tokio::test]
    async fn filter_by_network_and_pagination() {
        let repo = Repository::in_memory().await.unwrap();
        for i in 0..5 {
            let mut a = sample_article(&format!("https://example.com/n/{}", i));
            a.network = Some(if i % 2 == 0 { "hedera" } else { "algorand" }.to_string());
            repo.upsert_article(a).await.unwrap();
        }

        let hedera = repo
            .get_articles(ArticleFilter {
                network: Some("hedera".to_string()),
                page: 1,
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hedera.len(), 3);

        let page2 = repo
            .get_articles(ArticleFilter {
                page: 2,
                limit: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page2.len(), 2);
    }

    #[tokio::test]
    async fn rating_events_append_in_order() {
        let repo = Repository::in_memory().await.unwrap();
        for overall in [8u8, 3u8] {
            repo.insert_rating(NewRating {
                job_id: None,
                network: "hedera".to_string(),
                style: Some("dark_theme".to_string()),
                overall,
                logo_integration: None,
                background_quality: None,
                feedback: None,
            })
            .await
            .unwrap();
        }
        let events = repo.get_rating_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].overall, 8);
        assert_eq!(events[1].overall, 3);
    }

    #[tokio::test]
    async fn prune_spares_bookmarked_articles() {
        let repo = Repository::in_memory().await.unwrap();
        let keep = repo.upsert_article(sample_article("https://example.com/keep")).await.unwrap();
        repo.upsert_article(sample_article("https://example.com/drop")).await.unwrap();
        repo.insert_bookmark("user-1".to_string(), keep).await.unwrap();

        // Retention of 0 days makes everything eligible.
        let deleted = repo.prune_articles(0).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(repo.get_article(keep).await.unwrap().is_some());
    }
}
