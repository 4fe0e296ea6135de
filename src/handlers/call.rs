//! Remote method dispatch: `POST /byrdie/call/:app_label/:model_name/:pk/:method_name/`.
//!
//! Loads the record, checks the method is exposed, invokes it with the JSON body as keyword
//! arguments, saves the record and returns the method's mapping. Concurrent calls against the
//! same record are not coordinated; the last save wins.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::Method,
    Json,
};
use serde_json::{Map, Value};

fn parse_kwargs(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(m)) => Ok(m),
        Ok(_) => Err(AppError::BadRequest("Request body must be a JSON object.".into())),
        Err(_) => Err(AppError::BadRequest("Invalid JSON in request body.".into())),
    }
}

pub async fn call_exposed_method(
    State(state): State<AppState>,
    method: Method,
    Path((app_label, model_name, pk, method_name)): Path<(String, String, String, String)>,
    body: Bytes,
) -> Result<Json<Map<String, Value>>, AppError> {
    if method != Method::POST {
        return Err(AppError::BadRequest("Only POST requests are allowed.".into()));
    }

    let entry = state
        .models
        .lookup(&app_label, &model_name)
        .ok_or_else(|| AppError::NotFound(format!("Model {}.{} not found.", app_label, model_name)))?;

    let not_found = || AppError::NotFound(format!("Instance with pk {} not found.", pk));
    let pk_value: i64 = pk.parse().map_err(|_| not_found())?;
    let mut record = state.store.get(&entry.key, pk_value).await?.ok_or_else(not_found)?;

    let target = match entry.find_method(&method_name) {
        Some(m) => m,
        // A plain field exists on the instance but is not callable.
        None if entry.def.has_field(&method_name) => {
            return Err(AppError::Forbidden(format!("Method {} is not exposed.", method_name)));
        }
        None => {
            return Err(AppError::NotFound(format!(
                "Method {} not found on model {}.",
                method_name, model_name
            )));
        }
    };
    if !target.exposed {
        tracing::warn!(model = %entry.key, method = %method_name, "refused call to unexposed method");
        return Err(AppError::Forbidden(format!("Method {} is not exposed.", method_name)));
    }

    let kwargs = parse_kwargs(&body)?;
    let result = (target.handler)(&mut record, kwargs).map_err(|e| {
        tracing::warn!(model = %entry.key, pk = pk_value, method = %method_name, error = %e, "exposed method failed");
        AppError::BadRequest(format!("Error calling method {}: {}", method_name, e))
    })?;

    state.store.save(&record).await?;
    tracing::info!(model = %entry.key, pk = pk_value, method = %method_name, "dispatched exposed method");
    Ok(Json(result))
}
