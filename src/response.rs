//! Response processor: turns a view's output into an HTTP response.
//!
//! Order of decisions: a ready response passes through; an untyped mapping (a context or a JSON
//! object) with no schema is rendered through the view's template; otherwise a declared or inferred schema serializes the
//! output to JSON; anything left is returned as a raw body.

use crate::component::{expand_component_template_tags, expand_component_tags};
use crate::error::AppError;
use crate::schema::{json_type_name, SchemaDescriptor, SchemaError};
use crate::state::AppState;
use crate::templates::{extends_target, TemplateError};
use crate::view::{ResponseSchema, TemplateContext, ViewOutput};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

/// Context key under which the API route script is offered to templates.
pub const API_ROUTES_KEY: &str = "byrdie_api_routes";

pub fn shape(
    output: ViewOutput,
    declared: Option<&ResponseSchema>,
    view_name: &str,
    state: &AppState,
) -> Result<Response, AppError> {
    let output = match output {
        ViewOutput::Response(r) => return Ok(r),
        ViewOutput::Context(ctx) if declared.is_none() => return render_view_template(ctx, view_name, state),
        ViewOutput::Json(Value::Object(values)) if declared.is_none() => {
            return render_view_template(values.into(), view_name, state)
        }
        other => other,
    };

    match declared.cloned().or_else(|| infer_schema(&output, state)) {
        Some(ResponseSchema::Many(schema)) => {
            let items = into_items(output, &schema)?;
            let dumped = items
                .iter()
                .map(|item| schema.dump_value(item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Json(Value::Array(dumped)).into_response())
        }
        Some(ResponseSchema::One(schema)) => {
            let dumped = match output {
                ViewOutput::Schema(instance) if instance.schema() == &schema => Value::Object(instance.dump()),
                other => schema.dump_value(&into_value(other))?,
            };
            Ok(Json(dumped).into_response())
        }
        Some(ResponseSchema::Opaque(_)) | None => Ok(raw(output)),
    }
}

/// Attached default schema of a record, or of the first of several records.
fn infer_schema(output: &ViewOutput, state: &AppState) -> Option<ResponseSchema> {
    match output {
        ViewOutput::Record(r) => state.models.default_schema(&r.model).cloned().map(ResponseSchema::One),
        ViewOutput::Records(rs) => rs
            .first()
            .and_then(|r| state.models.default_schema(&r.model))
            .cloned()
            .map(ResponseSchema::Many),
        ViewOutput::Schema(instance) => Some(ResponseSchema::One(Arc::clone(instance.schema()))),
        _ => None,
    }
}

fn into_value(output: ViewOutput) -> Value {
    match output {
        ViewOutput::Context(ctx) => Value::Object(ctx.values),
        ViewOutput::Json(v) => v,
        ViewOutput::Record(r) => r.to_object(),
        ViewOutput::Records(rs) => Value::Array(rs.iter().map(|r| r.to_object()).collect()),
        ViewOutput::Schema(s) => Value::Object(s.dump()),
        ViewOutput::Text(t) => Value::String(t),
        ViewOutput::Response(_) => Value::Null,
    }
}

fn into_items(output: ViewOutput, schema: &SchemaDescriptor) -> Result<Vec<Value>, SchemaError> {
    match into_value(output) {
        Value::Array(items) => Ok(items),
        other => Err(SchemaError::NotAnObject {
            schema: format!("list[{}]", schema.name),
            got: json_type_name(&other),
        }),
    }
}

fn raw(output: ViewOutput) -> Response {
    let body = match output {
        ViewOutput::Text(t) => t,
        ViewOutput::Record(r) => r.to_string(),
        ViewOutput::Records(rs) => rs.iter().map(ToString::to_string).collect(),
        ViewOutput::Json(Value::String(s)) => s,
        other => into_value(other).to_string(),
    };
    Html(body).into_response()
}

fn render_view_template(ctx: TemplateContext, view_name: &str, state: &AppState) -> Result<Response, AppError> {
    let template_name = format!("{}.html", view_name);
    let source = match state.templates.source(&template_name) {
        Ok(s) => s,
        Err(TemplateError::NotFound(_)) => return Ok(template_not_found(&template_name, view_name)),
        Err(e) => return Err(e.into()),
    };
    let source = if extends_target(&source).is_some() {
        source
    } else {
        format!(
            "{{% extends \"{}\" %}}{{% block content %}}{}{{% endblock %}}",
            state.settings.base_template, source
        )
    };

    let TemplateContext { mut values, records } = ctx;
    values
        .entry(API_ROUTES_KEY)
        .or_insert_with(|| Value::String(state.api_routes().into_string()));

    let html = match state.templates.render_source(&source, &values) {
        Ok(html) => html,
        Err(TemplateError::NotFound(missing)) => return Ok(template_not_found(&missing, view_name)),
        Err(e) => return Err(e.into()),
    };
    let html = expand_component_template_tags(&html, &records, &state.models, state.templates.as_ref())?;
    let html = expand_component_tags(&html, &records, &state.models, state.templates.as_ref());
    Ok(Html(html).into_response())
}

fn template_not_found(template_name: &str, view_name: &str) -> Response {
    tracing::warn!(template = template_name, view = view_name, "view template not found");
    (
        StatusCode::NOT_FOUND,
        format!("Template '{}' not found for view '{}'.", template_name, view_name),
    )
        .into_response()
}
