pub mod form;
pub mod images;
pub mod records;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::Health;

use crate::openapi::ApiDoc;
use crate::state::ServerState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router: record and image endpoints, local upload files, docs.
pub fn build_router(state: ServerState, cors: CorsLayer) -> Router {
    let url_prefix = state.config.uploads.url_prefix.clone();
    let static_uploads = ServeDir::new(state.config.uploads.root.clone());
    let body_limit = state.config.server.max_request_bytes;

    let api = Router::new()
        .route("/service-histories", post(records::create_record))
        .route(
            "/service-histories/:id",
            get(records::get_record).put(records::update_record).delete(records::delete_record),
        )
        .route("/service-histories/:id/upload-images", post(images::upload_images))
        .route("/service-histories/:id/replace-image/:image_id", post(images::replace_image))
        .route("/service-histories/:id/images", get(images::list_images))
        .route("/service-histories/:id/images/:image_id", delete(images::delete_image))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest_service(&url_prefix, static_uploads)
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn router() -> anyhow::Result<(tempfile::TempDir, Router)> {
        let dir = tempfile::tempdir()?;
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("routes.db").display());
        let mut db_cfg = configs::DatabaseConfig::for_url(&url);
        db_cfg.min_connections = 1;
        let db = models::db::connect_with_config(&db_cfg).await?;
        <migration::Migrator as migration::MigratorTrait>::up(&db, None).await?;

        let mut cfg = configs::AppConfig::default();
        cfg.uploads.root = dir.path().join("uploads");
        let storage = service::runtime::build_storage(&cfg).await?;
        let images = std::sync::Arc::new(service::ImageAssetManager::new(
            db.clone(),
            storage,
            service::UploadPolicy::from_config(&cfg.uploads),
        ));
        let records = std::sync::Arc::new(service::ServiceRecordLifecycle::new(db, images.clone()));
        let state = ServerState::new(images, records, cfg);
        Ok((dir, build_router(state, CorsLayer::very_permissive())))
    }

    #[tokio::test]
    async fn health_and_docs_respond() -> anyhow::Result<()> {
        let (_dir, app) = router().await?;
        let res = app.clone().oneshot(Request::get("/health").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.oneshot(Request::get("/api-docs/openapi.json").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_record_is_json_404() -> anyhow::Result<()> {
        let (_dir, app) = router().await?;
        let res = app.oneshot(Request::get("/service-histories/42/images").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["success"], false);
        Ok(())
    }
}
