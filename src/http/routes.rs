use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Positions
        .route(
            "/positions",
            get(handlers::list_positions).post(handlers::create_position),
        )
        .route(
            "/positions/:position_id",
            get(handlers::get_position)
                .patch(handlers::update_position)
                .delete(handlers::delete_position),
        )
        // Stored histories
        .route(
            "/positions/:position_id/research",
            post(handlers::append_research_message).delete(handlers::clear_research_history),
        )
        .route(
            "/positions/:position_id/analysis",
            post(handlers::append_analysis_record),
        )
        .route(
            "/positions/:position_id/analysis/:record_id",
            delete(handlers::delete_analysis_record),
        )
        // Live interview control
        .route(
            "/positions/:position_id/interview/start",
            post(handlers::start_interview),
        )
        .route("/interview/stop", post(handlers::stop_interview))
        .route("/interview/status", get(handlers::interview_status))
        .route("/interview/transcript", get(handlers::interview_transcript))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Local UIs call the API from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
