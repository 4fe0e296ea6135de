//! Model registry: exposure side-tables built once, when a model is registered.
//!
//! Registration merges the two exposure declarations (per-field flags and the class-level
//! list) into one ordered field set, synthesizes the default schema from it, and records which
//! instance methods may be invoked remotely.

use crate::config::{validate_model, ModelDef, PK_FIELD};
use crate::error::ConfigError;
use crate::schema::{derive_schema, SchemaDescriptor};
use crate::store::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Keyword arguments in, result mapping out.
pub type MethodFn =
    Arc<dyn Fn(&mut Record, Map<String, Value>) -> Result<Map<String, Value>, BoxError> + Send + Sync>;

/// Model identity: app label plus lowercased model name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelKey {
    pub app_label: String,
    pub model_name: String,
}

impl ModelKey {
    pub fn new(app_label: impl Into<String>, model_name: impl AsRef<str>) -> Self {
        Self {
            app_label: app_label.into(),
            model_name: model_name.as_ref().to_lowercase(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app_label, self.model_name)
    }
}

#[derive(Clone)]
pub struct MethodEntry {
    pub name: String,
    pub exposed: bool,
    pub handler: MethodFn,
}

impl fmt::Debug for MethodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .field("exposed", &self.exposed)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ModelEntry {
    pub key: ModelKey,
    pub def: ModelDef,
    exposed_fields: Vec<String>,
    default_schema: Option<Arc<SchemaDescriptor>>,
    methods: Vec<MethodEntry>,
}

impl ModelEntry {
    pub fn exposed_fields(&self) -> &[String] {
        &self.exposed_fields
    }

    pub fn default_schema(&self) -> Option<&Arc<SchemaDescriptor>> {
        self.default_schema.as_ref()
    }

    pub fn allows_variant(&self, variant: &str) -> bool {
        self.def.components.iter().any(|v| v == variant)
    }

    /// Register a method callable through the dispatch endpoint.
    pub fn expose<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Record, Map<String, Value>) -> Result<Map<String, Value>, BoxError> + Send + Sync + 'static,
    {
        self.add_method(name.into(), true, Arc::new(f))
    }

    /// Register a method that exists on the model but is not remotely invocable.
    pub fn method<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Record, Map<String, Value>) -> Result<Map<String, Value>, BoxError> + Send + Sync + 'static,
    {
        self.add_method(name.into(), false, Arc::new(f))
    }

    fn add_method(&mut self, name: String, exposed: bool, handler: MethodFn) -> &mut Self {
        tracing::debug!(model = %self.key, method = %name, exposed, "registered model method");
        match self.methods.iter_mut().find(|m| m.name == name) {
            Some(existing) => {
                existing.exposed = exposed;
                existing.handler = handler;
            }
            None => self.methods.push(MethodEntry { name, exposed, handler }),
        }
        self
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn is_exposed(&self, method: &str) -> bool {
        self.find_method(method).is_some_and(|m| m.exposed)
    }

    /// Public exposed method names in registration order.
    pub fn exposed_methods(&self) -> impl Iterator<Item = &str> {
        self.methods
            .iter()
            .filter(|m| m.exposed && !m.name.starts_with('_'))
            .map(|m| m.name.as_str())
    }
}

/// Ordered exposed-field set: declared fields in declaration order, flagged either way,
/// then the primary key if only the class-level list names it.
pub fn collect_exposed_fields(def: &ModelDef) -> Vec<String> {
    let listed = |name: &str| def.exposed_fields.iter().any(|n| n == name);
    let mut out: Vec<String> = def
        .fields
        .iter()
        .filter(|f| f.expose || listed(&f.name))
        .map(|f| f.name.clone())
        .collect();
    for name in &def.exposed_fields {
        let is_pk = name == PK_FIELD || name == "pk";
        if is_pk && !out.iter().any(|n| n == PK_FIELD) {
            out.push(PK_FIELD.to_string());
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<ModelKey, ModelEntry>,
    order: Vec<ModelKey>,
    /// `<{model} instance=".." />` matcher, compiled on first use after the last registration.
    component_tag_re: OnceLock<Option<Regex>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a declaration, compute its exposure tables and default schema, and store it.
    pub fn register(&mut self, def: ModelDef) -> Result<&mut ModelEntry, ConfigError> {
        validate_model(&def)?;
        let key = ModelKey::new(def.app_label.clone(), &def.name);
        if self.models.contains_key(&key) {
            return Err(ConfigError::DuplicateModel(key.to_string()));
        }

        let exposed_fields = collect_exposed_fields(&def);
        let default_schema = derive_schema(&def, &exposed_fields).map(Arc::new);
        tracing::debug!(
            model = %key,
            exposed = ?exposed_fields,
            schema = default_schema.as_ref().map(|s| s.name.as_str()),
            "registered model"
        );

        self.order.push(key.clone());
        self.component_tag_re = OnceLock::new();
        let entry = self.models.entry(key.clone()).or_insert(ModelEntry {
            key,
            def,
            exposed_fields,
            default_schema,
            methods: Vec::new(),
        });
        Ok(entry)
    }

    /// Register every declaration loaded from config.
    pub fn register_all(&mut self, defs: impl IntoIterator<Item = ModelDef>) -> Result<(), ConfigError> {
        for def in defs {
            self.register(def)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &ModelKey) -> Option<&ModelEntry> {
        self.models.get(key)
    }

    pub fn get_mut(&mut self, key: &ModelKey) -> Option<&mut ModelEntry> {
        self.models.get_mut(key)
    }

    /// Case-insensitive lookup by app label and model name. Abstract models are not resolvable.
    pub fn lookup(&self, app_label: &str, model_name: &str) -> Option<&ModelEntry> {
        self.models
            .get(&ModelKey::new(app_label, model_name))
            .filter(|e| !e.def.is_abstract)
    }

    pub fn default_schema(&self, key: &ModelKey) -> Option<&Arc<SchemaDescriptor>> {
        self.get(key).and_then(ModelEntry::default_schema)
    }

    /// Lowercased names of all concrete models, in registration order.
    pub fn model_names(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter_map(|k| self.models.get(k))
            .filter(|e| !e.def.is_abstract)
            .map(|e| e.key.model_name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelEntry> {
        self.order.iter().filter_map(|k| self.models.get(k))
    }

    /// Self-closing component tags for every concrete model. `None` with no models registered.
    pub fn component_tag_re(&self) -> Option<&Regex> {
        self.component_tag_re
            .get_or_init(|| {
                let names = self.model_names();
                if names.is_empty() {
                    return None;
                }
                let alternatives = names.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
                let pattern = format!(
                    r#"<(?P<tag>{})\s+instance=["'](?P<instance>.*?)["'](?:\s+variant=["'](?P<variant>.*?)["'])?[^>]*?/>"#,
                    alternatives
                );
                match Regex::new(&pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(error = %e, "component tag pattern did not compile");
                        None
                    }
                }
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldDef, FieldKind, ScalarKind};
    use serde_json::json;

    fn exposed_model() -> ModelDef {
        ModelDef::new("tests", "ExposedModel")
            .field(FieldDef::new("name", FieldKind::CharField))
            .field(FieldDef::new("value", FieldKind::IntegerField).exposed())
            .field(FieldDef::new("secret", FieldKind::CharField))
            .expose(["name"])
    }

    #[test]
    fn both_exposure_forms_merge_in_declaration_order() {
        let mut registry = ModelRegistry::new();
        let entry = registry.register(exposed_model()).unwrap();
        assert_eq!(entry.exposed_fields(), ["name", "value"]);
        let schema = entry.default_schema().unwrap();
        assert_eq!(schema.field_names().collect::<Vec<_>>(), ["name", "value"]);
        assert_eq!(schema.fields[1].kind, ScalarKind::Int);
    }

    #[test]
    fn class_list_can_expose_the_primary_key() {
        let def = ModelDef::new("tests", "Keyed")
            .field(FieldDef::new("label", FieldKind::CharField).exposed())
            .expose(["id"]);
        assert_eq!(collect_exposed_fields(&def), ["label", "id"]);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ModelRegistry::new();
        registry.register(exposed_model()).unwrap();
        assert!(matches!(
            registry.register(exposed_model()),
            Err(ConfigError::DuplicateModel(_))
        ));
    }

    #[test]
    fn method_exposure_is_tracked_by_name() {
        let mut registry = ModelRegistry::new();
        registry
            .register(exposed_model())
            .unwrap()
            .expose("double", |rec, _| {
                let v = rec.value_of("value").as_i64().unwrap_or(0) * 2;
                Ok(json!({"value": v}).as_object().cloned().unwrap_or_default())
            })
            .method("rotate_secret", |_, _| Ok(Map::new()))
            .expose("_internal", |_, _| Ok(Map::new()));

        let entry = registry.lookup("tests", "ExposedModel").unwrap();
        assert!(entry.is_exposed("double"));
        assert!(!entry.is_exposed("rotate_secret"));
        assert!(!entry.is_exposed("missing"));
        assert_eq!(entry.exposed_methods().collect::<Vec<_>>(), ["double"]);
    }

    #[test]
    fn component_tag_pattern_follows_registrations() {
        let mut registry = ModelRegistry::new();
        assert!(registry.component_tag_re().is_none());

        registry.register(exposed_model()).unwrap();
        let re = registry.component_tag_re().unwrap();
        assert!(re.is_match(r#"<exposedmodel instance="x" />"#));
        assert!(!re.is_match(r#"<note instance="x" />"#));

        registry.register(ModelDef::new("tests", "Note")).unwrap();
        assert!(registry.component_tag_re().unwrap().is_match(r#"<note instance="x" />"#));
    }

    #[test]
    fn abstract_models_are_not_resolvable() {
        let mut registry = ModelRegistry::new();
        registry.register(ModelDef::new("tests", "Base").abstract_model()).unwrap();
        assert!(registry.lookup("tests", "base").is_none());
        assert!(registry.model_names().is_empty());
    }
}
