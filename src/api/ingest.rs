//! Ingest endpoints: thin wrappers over [`crate::processor::Processor`].
//! The processor itself decides what to publish and what to write through.

use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::api::AppState;
use crate::models::{ContentCreated, InteractionEvent, RemixEvent, ViewEvent};

pub async fn interaction(
    state: web::Data<AppState>,
    body: web::Json<InteractionEvent>,
) -> actix_web::Result<HttpResponse> {
    state.processor.ingest_interaction(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

/// Accepts a `ContentCreated` event and echoes back the keywords/category/
/// style the processor computed for it (via a fallback or downstream call).
pub async fn content(
    state: web::Data<AppState>,
    body: web::Json<ContentCreated>,
) -> actix_web::Result<HttpResponse> {
    let post_id = body.post_id.clone();
    state.processor.ingest_content_created(body.into_inner()).await?;
    let content = state.store.get_content(&post_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": {
            "post_id": content.post_id,
            "keywords": content.keywords,
            "category": content.category,
            "style": content.style,
        }
    })))
}

pub async fn view(
    state: web::Data<AppState>,
    body: web::Json<ViewEvent>,
) -> actix_web::Result<HttpResponse> {
    state.processor.ingest_view(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

pub async fn remix(
    state: web::Data<AppState>,
    body: web::Json<RemixEvent>,
) -> actix_web::Result<HttpResponse> {
    state.processor.ingest_remix(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}
