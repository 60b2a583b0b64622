//! API endpoint handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{ArticleFilter, CoverRequest, NewRating};
use crate::services::CoverService;

use super::AppState;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
pub struct NewsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    pub network: Option<String>,
    pub breaking: Option<bool>,
}

pub async fn list_news(
    State(state): State<AppState>,
    Query(params): Query<NewsParams>,
) -> Result<impl IntoResponse> {
    let limit = params
        .limit
        .unwrap_or(20)
        .clamp(1, state.max_page_size);
    let page = params.page.unwrap_or(1).max(1);

    let filter = ArticleFilter {
        category: params.category,
        network: params.network,
        breaking_only: params.breaking.unwrap_or(false),
        page,
        limit,
    };
    let articles = state.repository.get_articles(filter).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "page": page,
        "limit": limit,
        "count": articles.len(),
        "articles": articles,
    })))
}

pub async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let article = state
        .repository
        .get_article(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {} not found", id)))?;

    Ok(Json(serde_json::json!({
        "success": true,
        "article": article,
    })))
}

/// Kick off an immediate poll cycle. 409 when one is already in flight.
pub async fn refresh_news(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.ingest.run_cycle().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "sources": stats.sources,
        "inserted": stats.inserted,
        "updated": stats.updated,
    })))
}

pub async fn summarize_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Claude API key not configured".to_string()))?;

    let article = state
        .repository
        .get_article(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {} not found", id)))?;

    let content = article
        .content
        .as_deref()
        .ok_or_else(|| AppError::InvalidRequest("article has no content".to_string()))?;

    let summary = summarizer.generate_summary(&article.title, content).await?;
    state
        .repository
        .set_article_summary(id, summary.clone())
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "summary": summary,
        "model": summarizer.model_version(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UserParams {
    pub user_id: String,
}

pub async fn list_bookmarks(
    State(state): State<AppState>,
    Query(params): Query<UserParams>,
) -> Result<impl IntoResponse> {
    let articles = state
        .repository
        .get_bookmarked_articles(params.user_id)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "count": articles.len(),
        "articles": articles,
    })))
}

#[derive(Debug, Deserialize)]
pub struct NewBookmark {
    pub user_id: String,
    pub article_id: i64,
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Json(bookmark): Json<NewBookmark>,
) -> Result<impl IntoResponse> {
    // 404 for unknown articles, 409 for duplicates.
    state
        .repository
        .get_article(bookmark.article_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("article {} not found", bookmark.article_id)))?;

    let id = state
        .repository
        .insert_bookmark(bookmark.user_id, bookmark.article_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "id": id })),
    ))
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    Query(params): Query<UserParams>,
) -> Result<impl IntoResponse> {
    let deleted = state
        .repository
        .delete_bookmark(params.user_id, article_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound("bookmark not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn create_cover(
    State(state): State<AppState>,
    Json(request): Json<CoverRequest>,
) -> Result<impl IntoResponse> {
    let job = state.covers.start_job(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "success": true,
            "job_id": job.id,
            "status": job.status,
            "style": job.style,
        })),
    ))
}

pub async fn get_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let job = state
        .covers
        .get_job(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("cover job {} not found", id)))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "job": job,
    })))
}

pub async fn list_styles() -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "styles": CoverService::style_names(),
    }))
}

pub async fn create_rating(
    State(state): State<AppState>,
    Json(rating): Json<NewRating>,
) -> Result<impl IntoResponse> {
    let preferences = state.preferences.record_rating(rating).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "preferences": preferences,
        })),
    ))
}

pub async fn get_preferences(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let preferences = state.preferences.current().await;
    Ok(Json(serde_json::json!({
        "success": true,
        "preferences": preferences,
    })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::server::create_router;
    use crate::server::tests::{sample_article, test_state};

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_news_returns_inserted_articles() {
        let state = test_state().await;
        state
            .repository
            .upsert_article(sample_article("https://example.com/1"))
            .await
            .unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/news?limit=10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["articles"][0]["network"], "algorand");
    }

    #[tokio::test]
    async fn unknown_article_is_404_with_envelope() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/news/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("999"));
    }

    #[tokio::test]
    async fn duplicate_bookmark_returns_conflict() {
        let state = test_state().await;
        let article_id = state
            .repository
            .upsert_article(sample_article("https://example.com/b"))
            .await
            .unwrap();
        let app = create_router(state);

        let make_request = || {
            Request::builder()
                .method("POST")
                .uri("/api/bookmarks")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "user_id": "u1", "article_id": article_id }).to_string(),
                ))
                .unwrap()
        };

        let first = app.clone().oneshot(make_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(make_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let json = body_json(second).await;
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn cover_without_api_key_is_unavailable() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/covers")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "network": "hedera" }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rating_updates_preferences() {
        let app = create_router(test_state().await);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ratings")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "network": "hedera",
                            "overall": 9,
                            "feedback": "love the glass look"
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/preferences")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["preferences"]["ratings_seen"], 1);
        let materials = json["preferences"]["preferred_materials"]
            .as_array()
            .unwrap();
        assert!(materials.iter().any(|m| m == "glass material"));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/ratings")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "network": "hedera", "overall": 11 }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn styles_catalog_is_exposed() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/covers/styles")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let styles = json["styles"].as_array().unwrap();
        assert!(styles.iter().any(|s| s == "dark_theme"));
    }

    #[tokio::test]
    async fn summarize_without_key_is_unavailable() {
        let state = test_state().await;
        let id = state
            .repository
            .upsert_article(sample_article("https://example.com/s"))
            .await
            .unwrap();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/news/{}/summarize", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
