//! HTTP API for the news backend.
//!
//! JSON endpoints under `/api/...` for news listing, bookmarks, cover
//! generation jobs and prompt-preference ratings, plus health checks and a
//! WebSocket status stream. Generated covers are served under `/covers/`.

mod handlers;
mod routes;
mod ws;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::ai::Summarizer;
use crate::config::Config;
use crate::db::Repository;
use crate::services::{CoverService, IngestService, Notifier, PreferenceService};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub ingest: Arc<IngestService>,
    pub covers: Arc<CoverService>,
    pub preferences: Arc<PreferenceService>,
    pub summarizer: Option<Arc<Summarizer>>,
    pub notifier: Notifier,
    pub covers_dir: String,
    pub max_page_size: u32,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        let notifier = Notifier::new();

        let summarizer = config
            .claude_api_key
            .as_ref()
            .map(|key| Arc::new(Summarizer::new(key.clone())));

        let preferences = Arc::new(
            PreferenceService::new(Arc::clone(&repository), summarizer.clone()).await?,
        );
        let covers = Arc::new(CoverService::new(
            config,
            Arc::clone(&preferences),
            notifier.clone(),
        ));
        let ingest = Arc::new(IngestService::new(
            Arc::clone(&repository),
            notifier.clone(),
        ));

        Ok(Self {
            repository,
            ingest,
            covers,
            preferences,
            summarizer,
            notifier,
            covers_dir: config.covers_dir.clone(),
            max_page_size: config.max_page_size,
        })
    }
}

/// Start the web server.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::models::NewArticle;

    pub(crate) async fn test_state() -> AppState {
        let repository = Arc::new(Repository::in_memory().await.unwrap());
        let notifier = Notifier::new();
        let preferences = Arc::new(
            PreferenceService::new(Arc::clone(&repository), None)
                .await
                .unwrap(),
        );
        let config = Config {
            covers_dir: std::env::temp_dir()
                .join("chainwire-test-covers")
                .to_string_lossy()
                .to_string(),
            ..Config::default()
        };
        let covers = Arc::new(CoverService::new(
            &config,
            Arc::clone(&preferences),
            notifier.clone(),
        ));
        let ingest = Arc::new(IngestService::new(
            Arc::clone(&repository),
            notifier.clone(),
        ));

        AppState {
            repository,
            ingest,
            covers,
            preferences,
            summarizer: None,
            notifier,
            covers_dir: config.covers_dir.clone(),
            max_page_size: config.max_page_size,
        }
    }

    pub(crate) fn sample_article(url: &str) -> NewArticle {
        NewArticle {
            title: "Algorand announces staking changes".to_string(),
            content: Some("Full text".to_string()),
            summary: None,
            url: url.to_string(),
            source: "Test Wire".to_string(),
            published_at: Some(chrono::Utc::now()),
            category: Some("networks".to_string()),
            network: Some("algorand".to_string()),
            tags: vec!["staking".to_string()],
            is_breaking: false,
            cover_image: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let app = create_router(test_state().await);

        for path in ["/health", "/healthz"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", path);
        }
    }
}
