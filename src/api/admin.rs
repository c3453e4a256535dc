//! Admin surface: re-running the bulk indexer on demand.

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::api::AppState;
use crate::workers::Indexer;

/// Returns immediately; the indexing pass itself runs detached.
pub async fn index_posts(state: web::Data<AppState>) -> HttpResponse {
    let store = state.store.clone();
    tokio::spawn(async move {
        let report = Indexer::new(store).run().await;
        info!(
            indexed = report.indexed,
            updated = report.updated,
            errors = report.errors,
            "admin-triggered bulk index finished",
        );
    });
    HttpResponse::Ok().json(json!({ "status": "success", "message": "indexing started" }))
}
