//! Model declaration checks run before a model is registered.

use crate::config::ModelDef;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate_model(model: &ModelDef) -> Result<(), ConfigError> {
    if model.name.trim().is_empty() || model.app_label.trim().is_empty() {
        return Err(ConfigError::Validation("model name and app_label are required".into()));
    }

    let mut seen = HashSet::new();
    for f in &model.fields {
        if !seen.insert(f.name.as_str()) {
            return Err(ConfigError::DuplicateField {
                model: model.name.clone(),
                field: f.name.clone(),
            });
        }
    }

    for name in &model.exposed_fields {
        if !model.has_field(name) {
            return Err(ConfigError::UnknownField {
                model: model.name.clone(),
                field: name.clone(),
            });
        }
    }

    if model.components.iter().any(|v| v.trim().is_empty()) {
        return Err(ConfigError::Validation(format!(
            "model '{}' declares an empty component variant",
            model.name
        )));
    }

    Ok(())
}
