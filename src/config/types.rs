//! Declarative model types: storage field kinds, the exposure map, and model definitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Name of the implicit auto-increment primary key every model carries.
pub const PK_FIELD: &str = "id";

/// Storage-side field kind, named after the ORM field classes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    AutoField,
    BigAutoField,
    CharField,
    IntegerField,
    PositiveIntegerField,
    FloatField,
    BooleanField,
    DateField,
    DateTimeField,
    EmailField,
    UrlField,
    TextField,
    ForeignKey,
    OneToOneField,
    Other(String),
}

/// Transfer-side scalar kind a schema field validates against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Int,
    Float,
    Bool,
    Str,
    Date,
    DateTime,
}

impl FieldKind {
    /// Field exposure map. Unknown kinds transfer as strings.
    pub fn scalar_kind(&self) -> ScalarKind {
        match self {
            FieldKind::AutoField
            | FieldKind::BigAutoField
            | FieldKind::IntegerField
            | FieldKind::PositiveIntegerField
            | FieldKind::ForeignKey
            | FieldKind::OneToOneField => ScalarKind::Int,
            FieldKind::FloatField => ScalarKind::Float,
            FieldKind::BooleanField => ScalarKind::Bool,
            FieldKind::DateField => ScalarKind::Date,
            FieldKind::DateTimeField => ScalarKind::DateTime,
            FieldKind::CharField
            | FieldKind::EmailField
            | FieldKind::UrlField
            | FieldKind::TextField
            | FieldKind::Other(_) => ScalarKind::Str,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::AutoField => "AutoField",
            FieldKind::BigAutoField => "BigAutoField",
            FieldKind::CharField => "CharField",
            FieldKind::IntegerField => "IntegerField",
            FieldKind::PositiveIntegerField => "PositiveIntegerField",
            FieldKind::FloatField => "FloatField",
            FieldKind::BooleanField => "BooleanField",
            FieldKind::DateField => "DateField",
            FieldKind::DateTimeField => "DateTimeField",
            FieldKind::EmailField => "EmailField",
            FieldKind::UrlField => "URLField",
            FieldKind::TextField => "TextField",
            FieldKind::ForeignKey => "ForeignKey",
            FieldKind::OneToOneField => "OneToOneField",
            FieldKind::Other(name) => name,
        }
    }
}

impl From<&str> for FieldKind {
    fn from(s: &str) -> Self {
        match s {
            "AutoField" => FieldKind::AutoField,
            "BigAutoField" => FieldKind::BigAutoField,
            "CharField" => FieldKind::CharField,
            "IntegerField" => FieldKind::IntegerField,
            "PositiveIntegerField" => FieldKind::PositiveIntegerField,
            "FloatField" => FieldKind::FloatField,
            "BooleanField" => FieldKind::BooleanField,
            "DateField" => FieldKind::DateField,
            "DateTimeField" => FieldKind::DateTimeField,
            "EmailField" => FieldKind::EmailField,
            "URLField" => FieldKind::UrlField,
            "TextField" => FieldKind::TextField,
            "ForeignKey" => FieldKind::ForeignKey,
            "OneToOneField" => FieldKind::OneToOneField,
            other => FieldKind::Other(other.to_string()),
        }
    }
}

impl Serialize for FieldKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(FieldKind::from(s.as_str()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Per-field exposure flag.
    #[serde(default)]
    pub expose: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            expose: false,
        }
    }

    pub fn exposed(mut self) -> Self {
        self.expose = true;
        self
    }
}

/// A model declaration as written by application code or loaded from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelDef {
    pub app_label: String,
    /// Class name, e.g. `"Note"`. Lookups use its lowercased form.
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Class-level exposure list; merged with per-field flags.
    #[serde(default)]
    pub exposed_fields: Vec<String>,
    /// Allowed component variants.
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub proxy: bool,
}

impl ModelDef {
    pub fn new(app_label: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            name: name.into(),
            fields: Vec::new(),
            exposed_fields: Vec::new(),
            components: Vec::new(),
            is_abstract: false,
            proxy: false,
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn expose<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_fields.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn components<I, S>(mut self, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components.extend(variants.into_iter().map(Into::into));
        self
    }

    pub fn abstract_model(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn proxy_model(mut self) -> Self {
        self.proxy = true;
        self
    }

    pub fn model_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Storage kind of a field, including the implicit primary key.
    pub fn field_kind(&self, name: &str) -> Option<&FieldKind> {
        static PK_KIND: FieldKind = FieldKind::AutoField;
        match self.fields.iter().find(|f| f.name == name) {
            Some(f) => Some(&f.kind),
            None if name == PK_FIELD || name == "pk" => Some(&PK_KIND),
            None => None,
        }
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field_kind(name).is_some()
    }
}
