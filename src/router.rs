//! Route table: path pattern to wrapped view, in registration order, with collision detection.

use crate::error::{AppError, ConfigError};
use crate::response::shape;
use crate::view::{CurrentUser, PermissionFn, View, ViewRequest};
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::fmt;

/// Path from a view name: `a__b__c` becomes `/a/b/c`; edge separators are trimmed.
pub fn derive_path(view_name: &str) -> String {
    format!("/{}", view_name.replace("__", "/").trim_matches('/'))
}

/// A registered view with its access metadata.
#[derive(Clone)]
pub struct RouteEntry {
    pub path: String,
    pub view: View,
    pub is_authenticated: bool,
    pub has_permissions: Option<PermissionFn>,
}

impl RouteEntry {
    pub fn new(path: impl Into<String>, view: View) -> Self {
        Self {
            path: path.into(),
            view,
            is_authenticated: false,
            has_permissions: None,
        }
    }

    pub fn view_name(&self) -> &str {
        &self.view.name
    }

    fn authorize(&self, user: &CurrentUser) -> Result<(), AppError> {
        if self.is_authenticated && !user.is_authenticated {
            return Err(AppError::Unauthorized("Authentication required.".into()));
        }
        if let Some(check) = &self.has_permissions {
            if !check(user) {
                return Err(AppError::Forbidden("Permission denied.".into()));
            }
        }
        Ok(())
    }

    /// Run the view and shape its output. Errors become their HTTP responses.
    pub async fn call(&self, req: ViewRequest) -> Response {
        match self.invoke(req).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn invoke(&self, req: ViewRequest) -> Result<Response, AppError> {
        self.authorize(&req.user)?;
        let state = req.state.clone();
        let output = self.view.handler.call(req).await?;
        shape(output, self.view.response_schema.as_ref(), &self.view.name, &state)
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.path)
            .field("view", &self.view.name)
            .field("is_authenticated", &self.is_authenticated)
            .field("has_permissions", &self.has_permissions.is_some())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
    by_path: HashMap<String, usize>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry` under `path`. An existing path is an error unless `allow_overwrite`.
    pub fn register(&mut self, path: &str, mut entry: RouteEntry, allow_overwrite: bool) -> Result<(), ConfigError> {
        entry.path = path.to_string();
        match self.by_path.get(path) {
            Some(&idx) if allow_overwrite => {
                tracing::debug!(path, view = %entry.view.name, "overwrote provisional route");
                self.entries[idx] = entry;
            }
            Some(&idx) => {
                tracing::warn!(path, existing = %self.entries[idx].view.name, rejected = %entry.view.name, "duplicate route");
                return Err(ConfigError::DuplicateRoute(path.to_string()));
            }
            None => {
                tracing::debug!(path, view = %entry.view.name, "registered route");
                self.by_path.insert(path.to_string(), self.entries.len());
                self.entries.push(entry);
            }
        }
        Ok(())
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        self.by_path.get(path).map(|&idx| &self.entries[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
