//! Component rendering and the client bridge markup.
//!
//! A component is a record rendered through `{model}.html` or `{model}_{variant}.html`. Its
//! exposed fields and exposed method names travel to the client as an `x-data` attribute on the
//! first tag of the rendered markup. Rendering never fails: missing templates and disallowed
//! variants degrade to HTML comments.

use crate::models::{ModelEntry, ModelRegistry};
use crate::router::Router;
use crate::store::Record;
use crate::templates::{Markup, TemplateEngine, TemplateError};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io;

lazy_static! {
    static ref FIRST_TAG_RE: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9:-]*)").unwrap();
    static ref COMPONENT_TAG_RE: Regex = Regex::new(r#"\{%\s*component\s+["']([^"']+)["']\s*%\}"#).unwrap();
}

/// JSON with `", "` and `": "` separators on one line.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn to_spaced_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('\'', "&#39;")
}

/// Add single-quoted attributes to the first opening tag only, in the given order.
fn inject_attributes(markup: &str, attributes: &[(&str, &str)]) -> String {
    let rendered: String = attributes
        .iter()
        .map(|(name, value)| format!(" {}='{}'", name, escape_attribute(value)))
        .collect();
    FIRST_TAG_RE
        .replacen(markup, 1, |c: &Captures| format!("<{}{}", &c[1], rendered))
        .into_owned()
}

/// Add `x-data='<json>'` to the first opening tag only. Markup without a tag is returned as is.
pub fn inject_data_attribute(markup: &str, json_payload: &str) -> String {
    inject_attributes(markup, &[("x-data", json_payload)])
}

/// Dispatch endpoint prefix for one record; the bridge appends `{method}/`.
pub fn call_url(record: &Record) -> String {
    format!(
        "/byrdie/call/{}/{}/{}/",
        record.model.app_label, record.model.model_name, record.pk
    )
}

/// Exposed fields with their current values, then exposed method names mapped to `true`.
pub fn exposed_data(record: &Record, entry: &ModelEntry) -> Map<String, Value> {
    let mut data = Map::new();
    for field in entry.exposed_fields() {
        data.insert(field.clone(), record.value_of(field));
    }
    for method in entry.exposed_methods() {
        data.insert(method.to_string(), Value::Bool(true));
    }
    data
}

pub fn render_component(
    record: &Record,
    variant: Option<&str>,
    models: &ModelRegistry,
    templates: &dyn TemplateEngine,
) -> Markup {
    let component_name = record.model.model_name.clone();
    let entry = models.get(&record.model);
    let variant = variant.filter(|v| !v.is_empty());

    let template_name = match variant {
        Some(v) => {
            if !entry.is_some_and(|e| e.allows_variant(v)) {
                return Markup(format!(
                    "<!-- Component variant '{}' not allowed for model '{}' -->",
                    v, component_name
                ));
            }
            format!("{}_{}.html", component_name, v)
        }
        None => format!("{}.html", component_name),
    };

    let object = record.to_object();
    let mut ctx = Map::new();
    ctx.insert(component_name.clone(), object.clone());
    ctx.insert("object".to_string(), object);
    ctx.insert("variant".to_string(), variant.map_or(Value::Null, Value::from));

    let html = match templates.render(&template_name, &ctx) {
        Ok(html) => html,
        Err(TemplateError::NotFound(_)) => {
            return Markup(format!("<!-- Component template not found: {} -->", template_name));
        }
        Err(e) => {
            tracing::warn!(template = %template_name, error = %e, "component render failed");
            return Markup(format!("<!-- Component render failed: {} -->", template_name));
        }
    };

    let Some(entry) = entry else {
        return Markup(html);
    };
    let data = exposed_data(record, entry);
    if data.is_empty() {
        return Markup(html);
    }
    let methods = entry.exposed_methods().collect::<Vec<_>>().join(" ");
    match to_spaced_json(&data) {
        Ok(json) if methods.is_empty() => Markup(inject_data_attribute(&html, &json)),
        Ok(json) => {
            let url = call_url(record);
            Markup(inject_attributes(
                &html,
                &[
                    ("x-data", json.as_str()),
                    ("data-byrdie-call", url.as_str()),
                    ("data-byrdie-methods", methods.as_str()),
                ],
            ))
        }
        Err(e) => {
            tracing::warn!(model = %record.model, error = %e, "could not encode exposed data");
            Markup(html)
        }
    }
}

/// Replace `<{model} instance="name" [variant="v"] />` tags with rendered components.
pub fn expand_component_tags(
    markup: &str,
    records: &HashMap<String, Record>,
    models: &ModelRegistry,
    templates: &dyn TemplateEngine,
) -> String {
    let Some(re) = models.component_tag_re() else {
        return markup.to_string();
    };
    re.replace_all(markup, |c: &Captures| {
        let instance = &c["instance"];
        match records.get(instance) {
            Some(record) => {
                let variant = c.name("variant").map(|m| m.as_str());
                render_component(record, variant, models, templates).into_string()
            }
            None => format!("<!-- Byrdie instance '{}' not found in context -->", instance),
        }
    })
    .into_owned()
}

/// Replace `{% component 'name' %}` and `{% component 'name:variant' %}` tags left in rendered
/// markup. Unlike the self-closing form, an unknown instance name is an error.
pub fn expand_component_template_tags(
    markup: &str,
    records: &HashMap<String, Record>,
    models: &ModelRegistry,
    templates: &dyn TemplateEngine,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(markup.len());
    let mut last = 0;
    for c in COMPONENT_TAG_RE.captures_iter(markup) {
        let (Some(whole), Some(target)) = (c.get(0), c.get(1)) else {
            continue;
        };
        let (instance, variant) = match target.as_str().split_once(':') {
            Some((instance, variant)) => (instance, Some(variant)),
            None => (target.as_str(), None),
        };
        let record = records
            .get(instance)
            .ok_or_else(|| TemplateError::UnknownInstance(instance.to_string()))?;
        out.push_str(&markup[last..whole.start()]);
        out.push_str(render_component(record, variant, models, templates).as_str());
        last = whole.end();
    }
    out.push_str(&markup[last..]);
    Ok(out)
}

/// `<script>` publishing every `/api` route to the client, keyed by dotted view name.
pub fn api_routes_script(router: &Router) -> Markup {
    let routes: Map<String, Value> = router
        .iter()
        .filter(|e| e.path.starts_with("/api"))
        .map(|e| (e.view_name().replace("__", "."), Value::String(e.path.clone())))
        .collect();
    let json = to_spaced_json(&routes).unwrap_or_else(|_| "{}".to_string());
    Markup(format!(
        "<script>window.byrdie_routes = {};</script>",
        json.replace("</", "<\\/")
    ))
}
