//! Record persistence seam. The ORM is external; the core only loads, saves and creates records.

use crate::config::PK_FIELD;
use crate::models::ModelKey;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend: {0}")]
    Backend(String),
}

/// One persisted model instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub model: ModelKey,
    pub pk: i64,
    pub values: Map<String, Value>,
}

impl Record {
    pub fn new(model: ModelKey, pk: i64, values: Map<String, Value>) -> Self {
        Self { model, pk, values }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == PK_FIELD || field == "pk" {
            return None;
        }
        self.values.get(field)
    }

    /// Field value including the primary key, `Null` when unset.
    pub fn value_of(&self, field: &str) -> Value {
        if field == PK_FIELD || field == "pk" {
            return Value::from(self.pk);
        }
        self.values.get(field).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    /// `{"id": pk, ...values}` for schema validation and template contexts.
    pub fn to_object(&self) -> Value {
        let mut obj = Map::with_capacity(self.values.len() + 1);
        obj.insert(PK_FIELD.to_string(), Value::from(self.pk));
        for (k, v) in &self.values {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} object ({})", self.model.model_name, self.pk)
    }
}

/// Each call is atomic on its own; the core never spans a transaction across calls.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn get(&self, model: &ModelKey, pk: i64) -> Result<Option<Record>, StoreError>;

    /// Insert or replace by primary key.
    async fn save(&self, record: &Record) -> Result<(), StoreError>;

    /// Insert with the next free primary key.
    async fn create(&self, model: &ModelKey, values: Map<String, Value>) -> Result<Record, StoreError>;

    /// All records of a model in primary-key order.
    async fn all(&self, model: &ModelKey) -> Result<Vec<Record>, StoreError>;
}

/// In-memory store for tests and the demo app.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<ModelKey, BTreeMap<i64, Map<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("memory store lock poisoned".into())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    #[instrument(skip(self))]
    async fn get(&self, model: &ModelKey, pk: i64) -> Result<Option<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables
            .get(model)
            .and_then(|rows| rows.get(&pk))
            .map(|values| Record::new(model.clone(), pk, values.clone())))
    }

    #[instrument(skip(self, record), fields(model = %record.model, pk = record.pk))]
    async fn save(&self, record: &Record) -> Result<(), StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        tables
            .entry(record.model.clone())
            .or_default()
            .insert(record.pk, record.values.clone());
        Ok(())
    }

    #[instrument(skip(self, values))]
    async fn create(&self, model: &ModelKey, values: Map<String, Value>) -> Result<Record, StoreError> {
        let mut tables = self.tables.write().map_err(|_| Self::poisoned())?;
        let rows = tables.entry(model.clone()).or_default();
        let pk = rows.keys().next_back().map_or(1, |last| last + 1);
        rows.insert(pk, values.clone());
        Ok(Record::new(model.clone(), pk, values))
    }

    #[instrument(skip(self))]
    async fn all(&self, model: &ModelKey) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().map_err(|_| Self::poisoned())?;
        Ok(tables
            .get(model)
            .map(|rows| {
                rows.iter()
                    .map(|(pk, values)| Record::new(model.clone(), *pk, values.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
