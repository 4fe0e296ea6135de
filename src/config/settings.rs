//! Process settings read from the environment (`.env` is honoured by the binary via dotenvy).

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";
pub const DEFAULT_BASE_TEMPLATE: &str = "base.html";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub template_dir: PathBuf,
    /// Layout that non-extending view templates are wrapped in.
    pub base_template: String,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            base_template: DEFAULT_BASE_TEMPLATE.to_string(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// Read `BYRDIE_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let body_limit = match lookup("BYRDIE_BODY_LIMIT") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Load(format!("BYRDIE_BODY_LIMIT is not a byte count: {}", v)))?,
            None => defaults.body_limit,
        };
        Ok(Self {
            bind_addr: lookup("BYRDIE_BIND").unwrap_or(defaults.bind_addr),
            template_dir: lookup("BYRDIE_TEMPLATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_dir),
            base_template: lookup("BYRDIE_BASE_TEMPLATE").unwrap_or(defaults.base_template),
            body_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let s = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(s.bind_addr, DEFAULT_BIND);
        assert_eq!(s.base_template, "base.html");
        assert_eq!(s.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let env: HashMap<&str, &str> = [("BYRDIE_BIND", "0.0.0.0:9000"), ("BYRDIE_BODY_LIMIT", "2048")].into();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.bind_addr, "0.0.0.0:9000");
        assert_eq!(s.body_limit, 2048);

        let err = Settings::from_lookup(|k| (k == "BYRDIE_BODY_LIMIT").then(|| "lots".to_string()));
        assert!(matches!(err, Err(ConfigError::Load(_))));
    }
}
