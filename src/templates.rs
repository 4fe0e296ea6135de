//! Template collaborator: a narrow trait plus a small engine over a directory or in-memory sources.
//!
//! Supported syntax: `{{ dotted.path }}` (HTML-escaped), `{{ path|safe }}`,
//! `{% extends "name" %}` as the first tag, and `{% block name %}...{% endblock %}`.
//! `{% component '...' %}` passes through untouched for component expansion.

use axum::response::{Html, IntoResponse, Response};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAX_EXTENDS_DEPTH: usize = 16;

lazy_static! {
    static ref EXTENDS_RE: Regex = Regex::new(r#"^\{%\s*extends\s+["']([^"']+)["']\s*%\}"#).unwrap();
    static ref BLOCK_RE: Regex =
        Regex::new(r"(?s)\{%\s*block\s+(\w+)\s*%\}(.*?)\{%\s*endblock(?:\s+\w+)?\s*%\}").unwrap();
    static ref VAR_RE: Regex = Regex::new(r"\{\{\s*([\w.]+)\s*(\|\s*safe\s*)?\}\}").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"\{%\s*(\w+)[^%]*%\}").unwrap();
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    NotFound(String),
    #[error("template syntax: {0}")]
    Syntax(String),
    #[error("template io: {0}")]
    Io(String),
    #[error("Component instance '{0}' not found in context.")]
    UnknownInstance(String),
}

/// Markup already rendered and not to be escaped again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Markup(pub String);

impl Markup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Markup {
    fn from(s: String) -> Self {
        Markup(s)
    }
}

impl IntoResponse for Markup {
    fn into_response(self) -> Response {
        Html(self.0).into_response()
    }
}

pub trait TemplateEngine: Send + Sync + 'static {
    /// Raw source of a named template. Absent templates are `TemplateError::NotFound`.
    fn source(&self, name: &str) -> Result<String, TemplateError>;

    /// Render source text against a context.
    fn render_source(&self, source: &str, ctx: &Map<String, Value>) -> Result<String, TemplateError>;

    fn render(&self, name: &str, ctx: &Map<String, Value>) -> Result<String, TemplateError> {
        let source = self.source(name)?;
        self.render_source(&source, ctx)
    }
}

/// Directory-backed templates with optional in-memory sources taking precedence.
#[derive(Clone, Debug, Default)]
pub struct Templates {
    dir: Option<PathBuf>,
    inline: HashMap<String, String>,
}

impl Templates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            inline: HashMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.inline.insert(name.into(), source.into());
        self
    }

    fn read_file(dir: &Path, name: &str) -> Result<String, TemplateError> {
        if name.split('/').any(|seg| seg == "..") {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        let path = dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TemplateError::NotFound(name.to_string())),
            Err(e) => Err(TemplateError::Io(format!("{}: {}", path.display(), e))),
        }
    }

    /// Resolve `{% extends %}` chains into one flat source.
    fn compose(&self, source: &str, depth: usize) -> Result<String, TemplateError> {
        let trimmed = source.trim_start();
        let Some(caps) = EXTENDS_RE.captures(trimmed) else {
            return Ok(source.to_string());
        };
        if depth >= MAX_EXTENDS_DEPTH {
            return Err(TemplateError::Syntax("extends chain too deep".into()));
        }
        let parent_name = &caps[1];
        let child_blocks: HashMap<String, String> = BLOCK_RE
            .captures_iter(&trimmed[caps[0].len()..])
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();
        let parent = self.source(parent_name)?;
        // Overridden blocks keep their tags so a grandparent can still match them.
        let merged = BLOCK_RE.replace_all(&parent, |c: &Captures| match child_blocks.get(&c[1]) {
            Some(body) => format!("{{% block {} %}}{}{{% endblock %}}", &c[1], body),
            None => c[0].to_string(),
        });
        self.compose(&merged, depth + 1)
    }
}

impl TemplateEngine for Templates {
    fn source(&self, name: &str) -> Result<String, TemplateError> {
        if let Some(s) = self.inline.get(name) {
            return Ok(s.clone());
        }
        match &self.dir {
            Some(dir) => Self::read_file(dir, name),
            None => Err(TemplateError::NotFound(name.to_string())),
        }
    }

    fn render_source(&self, source: &str, ctx: &Map<String, Value>) -> Result<String, TemplateError> {
        let composed = self.compose(source, 0)?;
        let flat = BLOCK_RE.replace_all(&composed, "$2");
        // `component` tags are left in place for the caller, which owns the records.
        if let Some(tag) = TAG_RE.captures_iter(&flat).find(|t| &t[1] != "component") {
            return Err(TemplateError::Syntax(format!("unsupported tag '{}'", &tag[1])));
        }
        let out = VAR_RE.replace_all(&flat, |c: &Captures| {
            let value = lookup(ctx, &c[1]);
            let text = display_value(&value);
            if c.get(2).is_some() {
                text
            } else {
                escape_html(&text)
            }
        });
        Ok(out.into_owned())
    }
}

/// Parent template named by a leading `{% extends %}` tag.
pub fn extends_target(source: &str) -> Option<&str> {
    EXTENDS_RE
        .captures(source.trim_start())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn lookup(ctx: &Map<String, Value>, path: &str) -> Value {
    let mut parts = path.split('.');
    let Some(first) = parts.next() else {
        return Value::Null;
    };
    let mut current = match ctx.get(first) {
        Some(v) => v,
        None => return Value::Null,
    };
    for part in parts {
        current = match current {
            Value::Object(m) => match m.get(part) {
                Some(v) => v,
                None => return Value::Null,
            },
            Value::Array(items) => match part.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
