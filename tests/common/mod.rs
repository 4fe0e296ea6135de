//! Shared fixtures for the integration suites.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use byrdie::{
    AppState, FieldDef, FieldKind, MemoryStore, ModelDef, ModelKey, ModelRegistry, Record, RecordStore, Settings,
    Templates,
};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

pub fn values(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap_or_default()
}

/// `name` and `value` exposed (one per declaration form), `secret` kept back.
pub fn exposed_model() -> ModelDef {
    ModelDef::new("tests", "ExposedModel")
        .field(FieldDef::new("name", FieldKind::CharField).exposed())
        .field(FieldDef::new("value", FieldKind::IntegerField))
        .field(FieldDef::new("secret", FieldKind::CharField))
        .expose(["value"])
}

pub fn note_model() -> ModelDef {
    ModelDef::new("tests", "Note")
        .field(FieldDef::new("content", FieldKind::TextField))
        .components(["card"])
}

pub fn exposed_key() -> ModelKey {
    ModelKey::new("tests", "ExposedModel")
}

pub fn note_key() -> ModelKey {
    ModelKey::new("tests", "Note")
}

pub fn registry() -> ModelRegistry {
    let mut models = ModelRegistry::new();
    models
        .register(exposed_model())
        .unwrap()
        .expose("double", |rec, _kwargs| {
            let doubled = rec.value_of("value").as_i64().unwrap_or(0) * 2;
            rec.set("value", doubled);
            Ok(values(json!({ "value": doubled })))
        })
        .expose("rename", |rec, kwargs| {
            let name = kwargs
                .get("name")
                .and_then(Value::as_str)
                .ok_or("name is required")?
                .to_string();
            rec.set("name", name.clone());
            Ok(values(json!({ "name": name })))
        })
        .expose("explode", |_rec, _kwargs| Err("boom".into()))
        .method("reveal_secret", |rec, _kwargs| Ok(values(json!({ "secret": rec.value_of("secret") }))));
    models.register(note_model()).unwrap();
    models
}

pub fn templates() -> Templates {
    Templates::new()
        .with("base.html", "<html><body>{% block content %}{% endblock %}</body></html>")
        .with("note.html", "<h1>{{ object.content }}</h1>")
        .with("note_card.html", "<h2>{{ note.content }}</h2>")
        .with("exposedmodel.html", "<div>{{ object.name }}</div>")
}

pub fn state_with(store: Arc<MemoryStore>, templates: Templates) -> AppState {
    AppState::new(store, registry(), templates, Settings::default())
}

pub fn state(store: Arc<MemoryStore>) -> AppState {
    state_with(store, templates())
}

pub async fn seed_exposed(store: &MemoryStore, name: &str, value: i64) -> Record {
    store
        .create(&exposed_key(), values(json!({ "name": name, "value": value, "secret": "hidden" })))
        .await
        .unwrap()
}

pub async fn seed_note(store: &MemoryStore, content: &str) -> Record {
    store
        .create(&note_key(), values(json!({ "content": content })))
        .await
        .unwrap()
}

/// Send one request through the app and return status and body text.
pub async fn send(app: axum::Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
