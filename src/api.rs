//! Route registration surface.
//!
//! `Api::route(view)` is the bare form: the path is derived from the view's name.
//! `Api::route_with(options, view)` is the configured form: an explicit path (or none, to
//! derive one), the `/api` prefix, and access metadata. Schema actions are registered in bulk
//! with [`Api::add_schema`].

use crate::component::api_routes_script;
use crate::error::{AppError, ConfigError};
use crate::models::ModelKey;
use crate::router::{derive_path, RouteEntry, Router};
use crate::routes::{call_routes, static_routes};
use crate::schema::SchemaDescriptor;
use crate::state::AppState;
use crate::view::{CurrentUser, Handler, InstanceHandler, PermissionFn, ResponseSchema, View, ViewRequest};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
    routing::any,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

pub const PK_PARAM: &str = "{pk}";
const LEGACY_PK_PARAM: &str = "<int:pk>";

lazy_static! {
    static ref PARAM_RE: Regex = Regex::new(r"\{(\w+)\}").unwrap();
}

/// Configuration for the factory form of route registration.
#[derive(Clone, Default)]
pub struct RouteOptions {
    pub path: Option<String>,
    pub api: bool,
    pub is_authenticated: bool,
    pub has_permissions: Option<PermissionFn>,
    /// Allow replacing an existing route at the same path.
    pub provisional: bool,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn api(mut self, api: bool) -> Self {
        self.api = api;
        self
    }

    pub fn is_authenticated(mut self, required: bool) -> Self {
        self.is_authenticated = required;
        self
    }

    pub fn has_permissions<F>(mut self, check: F) -> Self
    where
        F: Fn(&CurrentUser) -> bool + Send + Sync + 'static,
    {
        self.has_permissions = Some(Arc::new(check));
        self
    }

    pub fn provisional(mut self, provisional: bool) -> Self {
        self.provisional = provisional;
        self
    }
}

impl From<&str> for RouteOptions {
    fn from(path: &str) -> Self {
        RouteOptions::new().path(path)
    }
}

impl From<String> for RouteOptions {
    fn from(path: String) -> Self {
        RouteOptions::new().path(path)
    }
}

impl From<Option<&str>> for RouteOptions {
    fn from(path: Option<&str>) -> Self {
        match path {
            Some(p) => p.into(),
            None => RouteOptions::new(),
        }
    }
}

#[derive(Clone)]
enum ActionKind {
    Class(Arc<dyn Handler>),
    Instance(Arc<dyn InstanceHandler>),
}

/// A schema method published as a route.
#[derive(Clone)]
pub struct Action {
    name: String,
    path: Option<String>,
    kind: ActionKind,
    is_authenticated: bool,
    has_permissions: Option<PermissionFn>,
    response_schema: Option<ResponseSchema>,
}

impl Action {
    fn with_kind(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            path: None,
            kind,
            is_authenticated: false,
            has_permissions: None,
            response_schema: None,
        }
    }

    /// Action that needs no record, served at `/{schema}/{name}` by default.
    pub fn class_level(name: impl Into<String>, handler: impl Handler) -> Self {
        Self::with_kind(name, ActionKind::Class(Arc::new(handler)))
    }

    /// Action on one record, served at `/{schema}/{pk}/{name}` by default.
    pub fn instance(name: impl Into<String>, handler: impl InstanceHandler) -> Self {
        Self::with_kind(name, ActionKind::Instance(Arc::new(handler)))
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_authenticated(mut self, required: bool) -> Self {
        self.is_authenticated = required;
        self
    }

    pub fn has_permissions<F>(mut self, check: F) -> Self
    where
        F: Fn(&CurrentUser) -> bool + Send + Sync + 'static,
    {
        self.has_permissions = Some(Arc::new(check));
        self
    }

    pub fn returns(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    fn is_instance(&self) -> bool {
        matches!(self.kind, ActionKind::Instance(_))
    }

    /// Sub-path below the schema prefix.
    fn sub_path(&self) -> String {
        match (&self.kind, &self.path) {
            (ActionKind::Class(_), Some(p)) => p.clone(),
            (ActionKind::Class(_), None) => format!("/{}", self.name),
            (ActionKind::Instance(_), Some(p)) if p.contains(PK_PARAM) || p.contains(LEGACY_PK_PARAM) => {
                p.replace(LEGACY_PK_PARAM, PK_PARAM)
            }
            (ActionKind::Instance(_), Some(p)) => format!("/{}{}", PK_PARAM, p),
            (ActionKind::Instance(_), None) => format!("/{}/{}", PK_PARAM, self.name),
        }
    }
}

/// A schema and the actions it publishes.
#[derive(Clone)]
pub struct SchemaActions {
    schema: Arc<SchemaDescriptor>,
    actions: Vec<Action>,
}

impl SchemaActions {
    pub fn new(schema: impl Into<Arc<SchemaDescriptor>>) -> Self {
        Self {
            schema: schema.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Lowercased schema name without the word "schema": `NoteSchema` is `note`.
    pub fn route_name(&self) -> String {
        self.schema.name.to_lowercase().replace("schema", "")
    }
}

/// Load the record named by the `pk` parameter and run the action on its schema instance.
fn instance_view(name: &str, schema: Arc<SchemaDescriptor>, model: ModelKey, handler: Arc<dyn InstanceHandler>) -> View {
    View::new(name, move |req: ViewRequest| {
        let schema = Arc::clone(&schema);
        let model = model.clone();
        let handler = Arc::clone(&handler);
        async move {
            let raw = req
                .param("pk")
                .ok_or_else(|| AppError::MissingParameter("pk".into()))?
                .to_string();
            let not_found = || AppError::NotFound(format!("No {} matches the given query.", model));
            let pk: i64 = raw.parse().map_err(|_| not_found())?;
            let record = req.state.store.get(&model, pk).await?.ok_or_else(not_found)?;
            let instance = schema.validate(&record.to_object())?;
            handler.call(instance, req).await
        }
    })
}

#[derive(Debug, Default)]
pub struct Api {
    router: Router,
}

impl Api {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Bare registration: path derived from the view name, default metadata.
    pub fn route(&mut self, view: View) -> Result<String, ConfigError> {
        let path = derive_path(&view.name);
        self.router.register(&path, RouteEntry::new(path.clone(), view), false)?;
        Ok(path)
    }

    /// Configured registration. Accepts a path, `None`, or full [`RouteOptions`].
    pub fn route_with(&mut self, options: impl Into<RouteOptions>, view: View) -> Result<String, ConfigError> {
        let options = options.into();
        let mut path = options.path.clone().unwrap_or_else(|| derive_path(&view.name));
        if options.api {
            path = format!("/api{}", path);
        }
        let entry = RouteEntry {
            path: path.clone(),
            view,
            is_authenticated: options.is_authenticated,
            has_permissions: options.has_permissions,
        };
        self.router.register(&path, entry, options.provisional)?;
        Ok(path)
    }

    /// Register every action of a schema under `/{schema-name}`. Returns the registered paths.
    pub fn add_schema(&mut self, schema: SchemaActions) -> Result<Vec<String>, ConfigError> {
        let prefix = format!("/{}", schema.route_name());
        let mut paths = Vec::with_capacity(schema.actions.len());
        for action in schema.actions.iter().cloned() {
            let path = format!("{}{}", prefix, action.sub_path());
            if action.is_instance() && !path.contains(PK_PARAM) {
                return Err(ConfigError::MissingParameter("pk".into()));
            }
            let mut view = match action.kind {
                ActionKind::Class(handler) => View {
                    name: action.name.clone(),
                    handler,
                    response_schema: None,
                },
                ActionKind::Instance(handler) => {
                    let (app_label, model_name) = schema
                        .schema
                        .model
                        .clone()
                        .ok_or_else(|| ConfigError::MissingModel(schema.schema.name.clone()))?;
                    instance_view(
                        &action.name,
                        Arc::clone(&schema.schema),
                        ModelKey::new(app_label, model_name),
                        handler,
                    )
                }
            };
            view.response_schema = action.response_schema;
            let entry = RouteEntry {
                path: path.clone(),
                view,
                is_authenticated: action.is_authenticated,
                has_permissions: action.has_permissions,
            };
            self.router.register(&path, entry, false)?;
            paths.push(path);
        }
        tracing::debug!(schema = %schema.schema.name, routes = paths.len(), "registered schema actions");
        Ok(paths)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.router.iter().map(|e| e.path.as_str()).collect()
    }

    /// Mount every route plus the dispatch endpoint and the bridge script on an axum router.
    pub fn into_router(self, state: AppState) -> axum::Router {
        state.set_api_routes(api_routes_script(&self.router));
        let limit = state.settings.body_limit;

        let mut views: axum::Router<AppState> = axum::Router::new();
        for entry in self.router.iter() {
            let axum_path = to_axum_path(&entry.path);
            tracing::info!(path = %entry.path, view = %entry.view.name, "mounted route");
            let entry = Arc::new(entry.clone());
            let handler = move |State(state): State<AppState>,
                                method: Method,
                                params: Option<Path<HashMap<String, String>>>,
                                Query(query): Query<HashMap<String, String>>,
                                user: CurrentUser,
                                body: Bytes| {
                let entry = Arc::clone(&entry);
                async move {
                    let req = ViewRequest {
                        method,
                        params: params.map(|Path(p)| p).unwrap_or_default(),
                        query,
                        user,
                        body,
                        state,
                    };
                    entry.call(req).await
                }
            };
            views = views.route(&axum_path, any(handler));
        }

        axum::Router::new()
            .merge(views.with_state(state.clone()))
            .merge(call_routes(state))
            .merge(static_routes())
            .layer(RequestBodyLimitLayer::new(limit))
    }
}

/// `{pk}` placeholders become axum's `:pk`; a leading `/` is ensured.
fn to_axum_path(path: &str) -> String {
    let path = PARAM_RE.replace_all(path, ":$1");
    if path.starts_with('/') {
        path.into_owned()
    } else {
        format!("/{}", path)
    }
}
