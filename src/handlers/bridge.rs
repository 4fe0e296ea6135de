//! The client bridge script, compiled into the binary.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

pub const BRIDGE_JS: &str = include_str!("../../static/byrdie.js");

pub async fn bridge_script() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        BRIDGE_JS,
    )
        .into_response()
}
