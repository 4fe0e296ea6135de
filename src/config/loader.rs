//! Load model declarations from JSON.

use crate::config::{validate_model, ModelDef};
use crate::error::ConfigError;
use std::path::Path;

/// Parse a JSON array of model declarations and validate each one.
pub fn load_models_from_str(json: &str) -> Result<Vec<ModelDef>, ConfigError> {
    let models: Vec<ModelDef> =
        serde_json::from_str(json).map_err(|e| ConfigError::Load(format!("invalid models json: {}", e)))?;
    for model in &models {
        validate_model(model)?;
    }
    Ok(models)
}

pub fn load_models_from_path(path: impl AsRef<Path>) -> Result<Vec<ModelDef>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_models_from_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_validates() {
        let models = load_models_from_str(
            r#"[{"app_label": "app", "name": "Note",
                 "fields": [{"name": "text", "type": "CharField"}],
                 "exposed_fields": ["text"], "components": ["card"]}]"#,
        )
        .unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].components, vec!["card"]);
    }

    #[test]
    fn rejects_unknown_exposed_field() {
        let err = load_models_from_str(
            r#"[{"app_label": "app", "name": "Note", "fields": [], "exposed_fields": ["nope"]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField { .. }));
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(load_models_from_str("{"), Err(ConfigError::Load(_))));
    }
}
