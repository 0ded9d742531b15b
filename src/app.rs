use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/record", get(handlers::get_record))
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/relapse", post(handlers::log_relapse))
        .route("/api/relapse/:timestamp", delete(handlers::delete_relapse))
        .route("/api/trigger", post(handlers::log_trigger))
        .route("/api/trigger/:timestamp", delete(handlers::delete_trigger))
        .route("/api/play-later", post(handlers::toggle_play_later))
        .route("/api/day-status", put(handlers::set_day_status))
        .route("/api/day-status/toggle", post(handlers::toggle_day_status))
        .route("/api/calendar", get(handlers::get_calendar))
        .route("/api/reflections", get(handlers::get_reflections))
        .with_state(state)
}
