use axum::{
    routing::{get, post, put},
    Router,
};

use crate::api::handlers;

/// Конфигурация всех роутов приложения
pub fn configure_routes() -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        // Создание кампании: 202 и фоновая сага
        .route(
            "/api/v1/campaigns/full",
            post(handlers::campaigns::create_full),
        )
        .route(
            "/api/v1/campaigns/continue",
            put(handlers::campaigns::continue_create),
        )
        // Синхронное управление кампанией
        .route(
            "/api/v1/campaigns/:wb_campaign_id/deposit",
            post(handlers::campaigns::deposit),
        )
        .route(
            "/api/v1/campaigns/:wb_campaign_id/pause",
            post(handlers::campaigns::pause),
        )
        .route(
            "/api/v1/campaigns/:wb_campaign_id/resume",
            post(handlers::campaigns::resume),
        )
        .route(
            "/api/v1/campaigns/:wb_campaign_id/rate",
            put(handlers::campaigns::change_rate),
        )
        // Результаты фоновых задач
        .route("/api/v1/jobs/:job_id", get(handlers::jobs::get_by_id))
}
