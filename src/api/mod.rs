//! The HTTP/WebSocket surface (§6): ingest endpoints, analytics reads, the
//! live subscriber feed, and a small admin surface, all sharing one
//! [`AppState`] handle injected via `actix_web::web::Data`.

pub mod admin;
pub mod analytics_routes;
pub mod ingest;
pub mod ws;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::analytics::Analytics;
use crate::hub::Hub;
use crate::processor::Processor;
use crate::store::Store;

pub struct AppState {
    pub processor: Arc<Processor>,
    pub analytics: Arc<Analytics>,
    pub hub: Hub,
    pub store: Arc<dyn Store>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics))
        .route("/ws", web::get().to(ws::handle))
        .service(
            web::scope("/api/events")
                .route("/interaction", web::post().to(ingest::interaction))
                .route("/content", web::post().to(ingest::content))
                .route("/view", web::post().to(ingest::view))
                .route("/remix", web::post().to(ingest::remix)),
        )
        .service(
            web::scope("/api/analytics")
                .route("/trending", web::get().to(analytics_routes::trending))
                .route("/post/{id}/stats", web::get().to(analytics_routes::post_stats))
                .route(
                    "/user/{id}/recommendations",
                    web::get().to(analytics_routes::recommendations),
                )
                .route("/dashboard/metrics", web::get().to(analytics_routes::dashboard_metrics))
                .route("/dashboard/top-creators", web::get().to(analytics_routes::top_creators))
                .route("/dashboard/content-types", web::get().to(analytics_routes::content_types))
                .route("/dashboard/trends", web::get().to(analytics_routes::trends)),
        )
        .route("/api/admin/index-posts", web::post().to(admin::index_posts));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

async fn metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::monitoring::metrics::render())
}
