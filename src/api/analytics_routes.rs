//! Analytics read endpoints, backed by [`crate::analytics::Analytics`] and
//! the store directly for single-record lookups.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::api::AppState;
use crate::error::EngineError;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TrendsQuery {
    days: Option<u32>,
}

/// Rejects out-of-range `limit`/`days` query parameters instead of silently
/// coercing them into range.
fn validated(value: Option<usize>, default: usize, max: usize, param: &str) -> Result<usize, EngineError> {
    let value = value.unwrap_or(default);
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(EngineError::Input(format!("{param} must be between 1 and {max}, got {value}")))
    }
}

pub async fn trending(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> actix_web::Result<HttpResponse> {
    let limit = validated(query.limit, 20, 100, "limit")?;
    let data = state.analytics.trending_posts_with_content(limit).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "count": data.len(), "data": data })))
}

pub async fn post_stats(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let post_id = path.into_inner();
    match state.store.get_post_stats(&post_id).await {
        Ok(stats) => Ok(HttpResponse::Ok().json(json!({ "status": "success", "data": stats }))),
        Err(EngineError::NotFound(_)) => Ok(HttpResponse::NotFound()
            .json(json!({ "error": format!("no trending stats for post {post_id}") }))),
        Err(e) => Err(e.into()),
    }
}

pub async fn recommendations(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> actix_web::Result<HttpResponse> {
    let user_id = path.into_inner();
    let limit = validated(query.limit, 20, 50, "limit")?;
    let data = state.store.get_user_recommendations(&user_id, limit).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "count": data.len(), "data": data })))
}

pub async fn dashboard_metrics(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let data = state.analytics.dashboard_metrics().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "data": data })))
}

pub async fn top_creators(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> actix_web::Result<HttpResponse> {
    let limit = validated(query.limit, 20, 50, "limit")?;
    let data = state.analytics.top_creators(limit).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "count": data.len(), "data": data })))
}

pub async fn content_types(state: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let data = state.analytics.content_type_breakdown().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "count": data.len(), "data": data })))
}

pub async fn trends(
    state: web::Data<AppState>,
    query: web::Query<TrendsQuery>,
) -> actix_web::Result<HttpResponse> {
    let days = query.days.unwrap_or(7);
    if !(1..=30).contains(&days) {
        return Err(EngineError::Input(format!("days must be between 1 and 30, got {days}")).into());
    }
    let data = state.analytics.engagement_trends(days).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "count": data.len(), "data": data })))
}
