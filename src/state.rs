//! Shared application state for all routes. Built once at startup and read-only afterwards.

use crate::config::Settings;
use crate::models::ModelRegistry;
use crate::store::RecordStore;
use crate::templates::{Markup, TemplateEngine};
use std::sync::{Arc, OnceLock};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub models: Arc<ModelRegistry>,
    pub templates: Arc<dyn TemplateEngine>,
    pub settings: Arc<Settings>,
    /// Filled in when the route table is mounted.
    api_routes: Arc<OnceLock<Markup>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        models: ModelRegistry,
        templates: impl TemplateEngine,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            models: Arc::new(models),
            templates: Arc::new(templates),
            settings: Arc::new(settings),
            api_routes: Arc::new(OnceLock::new()),
        }
    }

    /// Script tag listing the `/api` routes; empty until the routes are mounted.
    pub fn api_routes(&self) -> Markup {
        self.api_routes.get().cloned().unwrap_or_default()
    }

    pub(crate) fn set_api_routes(&self, script: Markup) {
        if self.api_routes.set(script).is_err() {
            tracing::debug!("api route script already set; keeping the first");
        }
    }
}
