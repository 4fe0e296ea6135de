//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;
use crate::templates::TemplateError;

/// Declaration-time errors. These surface while routes and models are being
/// registered and are never caught.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Route for path '{0}' is already registered.")]
    DuplicateRoute(String),
    #[error("missing path parameter: {0}")]
    MissingParameter(String),
    #[error("unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },
    #[error("duplicate field '{field}' on model '{model}'")]
    DuplicateField { model: String, field: String },
    #[error("model already registered: {0}")]
    DuplicateModel(String),
    #[error("schema '{0}' has no model binding; instance actions need one")]
    MissingModel(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("missing path parameter: {0}")]
    MissingParameter(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::MissingParameter(_)
            | AppError::Schema(_)
            | AppError::Template(_)
            | AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_errors_map_to_client_statuses() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::MissingParameter("pk".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn duplicate_route_message_names_the_path() {
        let err = ConfigError::DuplicateRoute("/duplicate".into());
        assert_eq!(err.to_string(), "Route for path '/duplicate' is already registered.");
    }
}
