//! Byrdie: convention-driven routing, response shaping and model exposure on top of axum.

pub mod api;
pub mod component;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod response;
pub mod router;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;
pub mod templates;
pub mod view;

pub use api::{Action, Api, RouteOptions, SchemaActions};
pub use component::{
    api_routes_script, call_url, expand_component_tags, expand_component_template_tags, inject_data_attribute,
    render_component,
};
pub use config::{
    load_models_from_path, load_models_from_str, FieldDef, FieldKind, ModelDef, ScalarKind, Settings,
};
pub use error::{AppError, ConfigError};
pub use models::{BoxError, ModelEntry, ModelKey, ModelRegistry};
pub use response::shape;
pub use router::{derive_path, RouteEntry, Router};
pub use routes::{call_routes, static_routes, BRIDGE_PATH};
pub use schema::{derive_schema, SchemaDescriptor, SchemaError, SchemaInstance};
pub use state::AppState;
pub use store::{MemoryStore, Record, RecordStore, StoreError};
pub use templates::{Markup, TemplateEngine, TemplateError, Templates};
pub use view::{
    CurrentUser, Handler, InstanceHandler, ResponseSchema, TemplateContext, View, ViewOutput, ViewRequest,
    ViewResult,
};
