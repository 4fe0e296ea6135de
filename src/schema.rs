//! Transfer schemas: typed field lists that validate objects and dump them as JSON maps.
//!
//! A model's default schema is synthesized once, when the model is registered
//! ([`derive_schema`]). Schemas bound to an explicit field list are built with
//! [`SchemaDescriptor::from_model`].

use crate::config::{ModelDef, ScalarKind, PK_FIELD};
use crate::error::ConfigError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("{schema}: expected an object, got {got}")]
    NotAnObject { schema: String, got: &'static str },
    #[error("{schema}.{field}: field required")]
    Missing { schema: String, field: String },
    #[error("{schema}.{field}: expected {expected:?}, got {got}")]
    Invalid {
        schema: String,
        field: String,
        expected: ScalarKind,
        got: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub kind: ScalarKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDescriptor {
    pub name: String,
    /// Model this schema is bound to, as `(app_label, model_name)`.
    pub model: Option<(String, String)>,
    pub fields: Vec<SchemaField>,
}

impl SchemaDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: None,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.fields.push(SchemaField {
            name: name.into(),
            kind,
        });
        self
    }

    /// Schema over an explicit list of a model's fields, bound to that model.
    pub fn from_model<I, S>(name: impl Into<String>, model: &ModelDef, fields: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = SchemaDescriptor::new(name);
        for field in fields {
            let field = field.as_ref();
            let kind = model.field_kind(field).ok_or_else(|| ConfigError::UnknownField {
                model: model.name.clone(),
                field: field.to_string(),
            })?;
            schema = schema.field(field, kind.scalar_kind());
        }
        schema.model = Some((model.app_label.clone(), model.model_name()));
        Ok(schema)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Build a validated instance from an object. Extra keys are ignored.
    pub fn validate(self: &Arc<Self>, value: &Value) -> Result<SchemaInstance, SchemaError> {
        let obj = value.as_object().ok_or_else(|| SchemaError::NotAnObject {
            schema: self.name.clone(),
            got: json_type_name(value),
        })?;
        let mut data = Map::with_capacity(self.fields.len());
        for field in &self.fields {
            let raw = match obj.get(&field.name) {
                None | Some(Value::Null) => {
                    return Err(SchemaError::Missing {
                        schema: self.name.clone(),
                        field: field.name.clone(),
                    })
                }
                Some(v) => v,
            };
            let coerced = coerce(field.kind, raw).ok_or_else(|| SchemaError::Invalid {
                schema: self.name.clone(),
                field: field.name.clone(),
                expected: field.kind,
                got: raw.to_string(),
            })?;
            data.insert(field.name.clone(), coerced);
        }
        Ok(SchemaInstance {
            schema: Arc::clone(self),
            data,
        })
    }

    /// Validate then dump in one step.
    pub fn dump_value(self: &Arc<Self>, value: &Value) -> Result<Value, SchemaError> {
        Ok(Value::Object(self.validate(value)?.dump()))
    }
}

/// A validated value object. Immutable once built.
#[derive(Clone, Debug)]
pub struct SchemaInstance {
    schema: Arc<SchemaDescriptor>,
    data: Map<String, Value>,
}

impl SchemaInstance {
    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Primary key, when the schema carries one.
    pub fn pk(&self) -> Option<i64> {
        self.data.get(PK_FIELD).and_then(Value::as_i64)
    }

    /// Mapping dump in schema field order.
    pub fn dump(&self) -> Map<String, Value> {
        self.data.clone()
    }
}

/// Synthesize the default schema for a model from its exposed fields.
///
/// Returns `None` for abstract and proxy models and for models with nothing exposed.
pub fn derive_schema(model: &ModelDef, exposed_fields: &[String]) -> Option<SchemaDescriptor> {
    if model.is_abstract || model.proxy || exposed_fields.is_empty() {
        return None;
    }
    let mut schema = SchemaDescriptor::new(format!("{}DefaultSchema", model.name));
    for name in exposed_fields {
        let kind = model.field_kind(name).map(|k| k.scalar_kind()).unwrap_or(ScalarKind::Str);
        schema = schema.field(name.clone(), kind);
    }
    schema.model = Some((model.app_label.clone(), model.model_name()));
    Some(schema)
}

fn coerce(kind: ScalarKind, v: &Value) -> Option<Value> {
    match kind {
        ScalarKind::Int => match v {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| is_integral_i64(*f)).map(|f| f as i64))
                .map(Value::from),
            Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
            _ => None,
        },
        ScalarKind::Float => match v {
            Value::Number(n) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        ScalarKind::Bool => match v {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Value::Bool(false)),
                Some(1) => Some(Value::Bool(true)),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ScalarKind::Str => v.as_str().map(|s| Value::String(s.to_string())),
        ScalarKind::Date => {
            let s = v.as_str()?;
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))?;
            Some(Value::String(date.format("%Y-%m-%d").to_string()))
        }
        ScalarKind::DateTime => {
            let dt = parse_datetime(v.as_str()?)?;
            Some(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        }
    }
}

/// Whole numbers inside the `i64` range; `i64::MAX as f64` rounds up to 2^63, hence `<`.
fn is_integral_i64(f: f64) -> bool {
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

pub(crate) fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
