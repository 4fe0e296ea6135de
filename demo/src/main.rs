//! Demo app: one exposed `Note` model rendered as a component on the homepage.
//!
//! Run from repo root: `cargo run -p byrdie-demo`
//! Templates are read from `BYRDIE_TEMPLATE_DIR` (default `templates`, relative to the working
//! directory), so run it from `demo/` or point the variable at `demo/templates`.

use byrdie::{
    Api, AppError, AppState, FieldDef, FieldKind, MemoryStore, ModelDef, ModelKey, ModelRegistry, RecordStore,
    RouteOptions, Settings, TemplateContext, Templates, View, ViewRequest, ViewResult,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const APP_LABEL: &str = "demo";

fn note_model() -> ModelDef {
    ModelDef::new(APP_LABEL, "Note")
        .field(FieldDef::new("text", FieldKind::TextField).exposed())
        .field(FieldDef::new("created", FieldKind::DateTimeField))
        .components(["card"])
}

fn note_key() -> ModelKey {
    ModelKey::new(APP_LABEL, "Note")
}

fn models() -> Result<ModelRegistry, byrdie::ConfigError> {
    let mut models = ModelRegistry::new();
    models
        .register(note_model())?
        .expose("clear_text", |note, _kwargs| {
            note.set("text", "");
            let mut out = Map::new();
            out.insert("text".into(), Value::String(String::new()));
            Ok(out)
        })
        .expose("update_text", |note, kwargs| {
            let text = kwargs
                .get("text")
                .and_then(Value::as_str)
                .ok_or("text is required")?
                .to_string();
            note.set("text", text.clone());
            let mut out = Map::new();
            out.insert("text".into(), Value::String(text));
            Ok(out)
        });
    Ok(models)
}

async fn homepage(req: ViewRequest) -> ViewResult {
    let note = req
        .state
        .store
        .get(&note_key(), 1)
        .await?
        .ok_or_else(|| AppError::NotFound("No note yet.".into()))?;
    Ok(TemplateContext::new()
        .insert("title", "Notes")
        .insert_record("note", note)
        .into())
}

async fn notes_list(req: ViewRequest) -> ViewResult {
    Ok(req.state.store.all(&note_key()).await?.into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("byrdie=info,byrdie_demo=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let store = Arc::new(MemoryStore::new());
    let mut seed = Map::new();
    seed.insert("text".into(), json!("Hello from byrdie"));
    seed.insert("created".into(), json!("2024-01-01T00:00:00Z"));
    store.create(&note_key(), seed).await?;

    let mut api = Api::new();
    api.route_with("/", View::new("homepage", homepage))?;
    api.route_with(RouteOptions::new().api(true), View::new("notes__list", notes_list))?;

    let bind_addr = settings.bind_addr.clone();
    let templates = Templates::from_dir(settings.template_dir.clone());
    let state = AppState::new(store, models()?, templates, settings);
    let app = api.into_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("byrdie demo listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
