// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use cache_cell::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppState>) -> Router {
    // Availability queries are open to any authenticated caller.
    let protected_routes = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}/availability", get(handlers::get_availability))
        .route("/{doctor_id}/attendance-days", get(handlers::get_attendance_days))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
