//! View-facing types: what a view receives, what it may return, and the handler traits.

use crate::error::AppError;
use crate::schema::{SchemaDescriptor, SchemaInstance};
use crate::state::AppState;
use crate::store::Record;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::Method;
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The authenticated principal, supplied by an outer auth layer as a request extension.
#[derive(Clone, Debug, Default)]
pub struct CurrentUser {
    pub id: Option<String>,
    pub is_authenticated: bool,
    pub permissions: HashSet<String>,
}

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            is_authenticated: true,
            permissions: HashSet::new(),
        }
    }

    pub fn with_permission(mut self, perm: impl Into<String>) -> Self {
        self.permissions.insert(perm.into());
        self
    }

    pub fn has_perm(&self, perm: &str) -> bool {
        self.permissions.contains(perm)
    }
}

pub type PermissionFn = Arc<dyn Fn(&CurrentUser) -> bool + Send + Sync>;

/// Declared response type of a view, standing in for a return annotation.
#[derive(Clone, Debug)]
pub enum ResponseSchema {
    One(Arc<SchemaDescriptor>),
    Many(Arc<SchemaDescriptor>),
    /// A declared type that is not a schema; output passes through raw.
    Opaque(String),
}

impl ResponseSchema {
    pub fn one(schema: impl Into<Arc<SchemaDescriptor>>) -> Self {
        ResponseSchema::One(schema.into())
    }

    pub fn many(schema: impl Into<Arc<SchemaDescriptor>>) -> Self {
        ResponseSchema::Many(schema.into())
    }
}

/// Template context plus the records placed in it, kept whole for component expansion.
#[derive(Clone, Debug, Default)]
pub struct TemplateContext {
    pub values: Map<String, Value>,
    pub records: HashMap<String, Record>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert_record(mut self, key: impl Into<String>, record: Record) -> Self {
        let key = key.into();
        self.values.insert(key.clone(), record.to_object());
        self.records.insert(key, record);
        self
    }
}

impl From<Map<String, Value>> for TemplateContext {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            records: HashMap::new(),
        }
    }
}

/// What a view returns; the response processor decides how it reaches the client.
pub enum ViewOutput {
    /// Fully formed response, returned unchanged.
    Response(Response),
    /// Untyped mapping; rendered through the view's template unless a schema is declared.
    Context(TemplateContext),
    /// Plain data (object or array) to validate against a declared schema.
    Json(Value),
    Record(Record),
    Records(Vec<Record>),
    Schema(SchemaInstance),
    Text(String),
}

impl fmt::Debug for ViewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewOutput::Response(r) => f.debug_tuple("Response").field(&r.status()).finish(),
            ViewOutput::Context(c) => f.debug_tuple("Context").field(c).finish(),
            ViewOutput::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ViewOutput::Record(r) => f.debug_tuple("Record").field(r).finish(),
            ViewOutput::Records(r) => f.debug_tuple("Records").field(r).finish(),
            ViewOutput::Schema(s) => f.debug_tuple("Schema").field(s).finish(),
            ViewOutput::Text(t) => f.debug_tuple("Text").field(t).finish(),
        }
    }
}

impl From<Response> for ViewOutput {
    fn from(r: Response) -> Self {
        ViewOutput::Response(r)
    }
}

impl From<TemplateContext> for ViewOutput {
    fn from(c: TemplateContext) -> Self {
        ViewOutput::Context(c)
    }
}

impl From<Value> for ViewOutput {
    fn from(v: Value) -> Self {
        ViewOutput::Json(v)
    }
}

impl From<Record> for ViewOutput {
    fn from(r: Record) -> Self {
        ViewOutput::Record(r)
    }
}

impl From<Vec<Record>> for ViewOutput {
    fn from(r: Vec<Record>) -> Self {
        ViewOutput::Records(r)
    }
}

impl From<SchemaInstance> for ViewOutput {
    fn from(s: SchemaInstance) -> Self {
        ViewOutput::Schema(s)
    }
}

impl From<String> for ViewOutput {
    fn from(s: String) -> Self {
        ViewOutput::Text(s)
    }
}

impl From<&str> for ViewOutput {
    fn from(s: &str) -> Self {
        ViewOutput::Text(s.to_string())
    }
}

pub struct ViewRequest {
    pub method: Method,
    /// Path parameters captured by the route pattern.
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub user: CurrentUser,
    pub body: Bytes,
    pub state: AppState,
}

impl ViewRequest {
    pub fn new(state: AppState) -> Self {
        Self {
            method: Method::GET,
            params: HashMap::new(),
            query: HashMap::new(),
            user: CurrentUser::anonymous(),
            body: Bytes::new(),
            state,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.user = user;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_slice(&self.body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {}", e)))
    }
}

pub type ViewResult = Result<ViewOutput, AppError>;

#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: ViewRequest) -> ViewResult;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(ViewRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ViewResult> + Send + 'static,
{
    async fn call(&self, req: ViewRequest) -> ViewResult {
        (self)(req).await
    }
}

/// Handler for an action that runs against one loaded, validated record.
#[async_trait]
pub trait InstanceHandler: Send + Sync + 'static {
    async fn call(&self, instance: SchemaInstance, req: ViewRequest) -> ViewResult;
}

#[async_trait]
impl<F, Fut> InstanceHandler for F
where
    F: Fn(SchemaInstance, ViewRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ViewResult> + Send + 'static,
{
    async fn call(&self, instance: SchemaInstance, req: ViewRequest) -> ViewResult {
        (self)(instance, req).await
    }
}

/// A named view. The name drives path derivation and template lookup.
#[derive(Clone)]
pub struct View {
    pub name: String,
    pub handler: Arc<dyn Handler>,
    pub response_schema: Option<ResponseSchema>,
}

impl View {
    pub fn new(name: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            response_schema: None,
        }
    }

    pub fn returns(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name)
            .field("response_schema", &self.response_schema)
            .finish_non_exhaustive()
    }
}
