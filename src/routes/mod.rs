//! Library-owned routes.

use crate::handlers::{bridge_script, call_exposed_method};
use crate::state::AppState;
use axum::{
    routing::{any, get},
    Router,
};

pub const CALL_PATH: &str = "/byrdie/call/:app_label/:model_name/:pk/:method_name/";
pub const BRIDGE_PATH: &str = "/byrdie/static/byrdie.js";

/// Remote dispatch endpoint. Every method is accepted so non-POST gets a 400, not a 405.
pub fn call_routes(state: AppState) -> Router {
    Router::new()
        .route(CALL_PATH, any(call_exposed_method))
        .with_state(state)
}

/// Static assets served by the library.
pub fn static_routes() -> Router {
    Router::new().route(BRIDGE_PATH, get(bridge_script))
}
