pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::achievement::handlers as achievements;
use crate::reports::handlers as reports;
use crate::state::AppState;
use crate::upload::MAX_ATTACHMENT_BYTES;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Achievement workflow
        .route(
            "/api/v1/achievements",
            get(achievements::handle_list).post(achievements::handle_create),
        )
        .route(
            "/api/v1/achievements/:id",
            get(achievements::handle_get)
                .put(achievements::handle_update)
                .delete(achievements::handle_delete),
        )
        .route(
            "/api/v1/achievements/:id/submit",
            post(achievements::handle_submit),
        )
        .route(
            "/api/v1/achievements/:id/verify",
            post(achievements::handle_verify),
        )
        .route(
            "/api/v1/achievements/:id/reject",
            post(achievements::handle_reject),
        )
        .route(
            "/api/v1/achievements/:id/attachments",
            post(achievements::handle_upload_attachment),
        )
        .route(
            "/api/v1/achievements/:id/history",
            get(achievements::handle_history),
        )
        // Reports
        .route("/api/v1/reports/statistics", get(reports::handle_statistics))
        .route(
            "/api/v1/reports/students/:id",
            get(reports::handle_student_report),
        )
        // Multipart bodies carry up to one 5 MiB file plus field framing.
        .layer(DefaultBodyLimit::max(MAX_ATTACHMENT_BYTES + 64 * 1024))
        .with_state(state)
}
