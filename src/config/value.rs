//! Loosely typed import configuration values.
//!
//! Config files accept several shorthands for "which importers handle this
//! file, and with which parameters". [`ImporterConfigs::from_value`] folds all
//! of them into one canonical map once at load time; everything downstream
//! only deals with that shape.
//!
//! Accepted shapes:
//!
//! ```json
//! "shader"                                   // one importer, no params
//! ["copy", {"name": "shader", "stage": "vertex"}]
//! {"shader": {"stage": "vertex"}, "copy": null, "font": false}
//! ```
//!
//! `null` and `true` mean "no params", `false` omits the importer.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameters for one importer.
pub type Params = Map<String, Value>;

/// Maximum number of substitution passes over a config value.
pub const MAX_INCLUDE_PASSES: usize = 16;

/// Error normalizing an importer config value.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ShapeError {
    /// Params for an importer were not an object
    #[error("parameters for importer '{0}' must be an object, null or a bool")]
    InvalidParams(String),
    /// An array entry was neither a name nor an object
    #[error("importer list entries must be names or objects, found {0}")]
    InvalidEntry(String),
    /// A `name` field was present but not a string
    #[error("importer 'name' must be a string")]
    InvalidName,
}

/// Error expanding `${key}` placeholders.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum IncludeError {
    /// Expansion kept changing after the pass limit (self-referential includes)
    #[error("include substitution did not settle after {0} passes")]
    TooDeep(usize),
}

/// Canonical per-importer configuration: importer name to parameter object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImporterConfigs(BTreeMap<String, Params>);

impl ImporterConfigs {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize any accepted shorthand into the canonical map.
    pub fn from_value(value: &Value) -> Result<Self, ShapeError> {
        let mut configs = Self::new();
        configs.absorb(value)?;
        Ok(configs)
    }

    fn absorb(&mut self, value: &Value) -> Result<(), ShapeError> {
        match value {
            Value::Null => {}
            Value::String(name) => self.merge_one(name, &Params::new()),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::String(name) => self.merge_one(name, &Params::new()),
                        Value::Object(obj) => match obj.get("name") {
                            Some(Value::String(name)) => {
                                let mut params = obj.clone();
                                params.remove("name");
                                self.merge_one(name, &params);
                            }
                            Some(_) => return Err(ShapeError::InvalidName),
                            None => self.absorb(item)?,
                        },
                        other => return Err(ShapeError::InvalidEntry(type_name(other).into())),
                    }
                }
            }
            Value::Object(obj) => {
                for (name, params) in obj {
                    match params {
                        Value::Object(params) => self.merge_one(name, params),
                        Value::Null | Value::Bool(true) => self.merge_one(name, &Params::new()),
                        Value::Bool(false) => {}
                        _ => return Err(ShapeError::InvalidParams(name.clone())),
                    }
                }
            }
            other => return Err(ShapeError::InvalidEntry(type_name(other).into())),
        }
        Ok(())
    }

    fn merge_one(&mut self, name: &str, params: &Params) {
        let entry = self.0.entry(name.to_string()).or_default();
        deep_merge(entry, params);
    }

    /// Deep-merge `other` on top of this map; `other` wins key by key.
    pub fn merge(&mut self, other: &ImporterConfigs) {
        for (name, params) in &other.0 {
            self.merge_one(name, params);
        }
    }

    /// Parameters for one importer.
    pub fn get(&self, name: &str) -> Option<&Params> {
        self.0.get(name)
    }

    /// Whether the importer is configured.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Insert parameters for an importer, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, params: Params) {
        self.0.insert(name.into(), params);
    }

    /// Importer names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over `(name, params)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Params)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Merge `overlay` into `base`. Nested objects merge recursively; any other
/// value in `overlay` replaces the one in `base`.
pub fn deep_merge(base: &mut Params, overlay: &Params) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Expand `${key}` placeholders from `includes` until nothing changes.
///
/// A string that is exactly `${key}` becomes the include value, whatever its
/// type. A placeholder inside a longer string is replaced textually when the
/// include is a string, number or bool. Unknown keys are left as written.
pub fn substitute_includes(value: &mut Value, includes: &Params) -> Result<(), IncludeError> {
    if includes.is_empty() {
        return Ok(());
    }
    for _ in 0..MAX_INCLUDE_PASSES {
        if !substitute_pass(value, includes) {
            return Ok(());
        }
    }
    Err(IncludeError::TooDeep(MAX_INCLUDE_PASSES))
}

/// One substitution pass. Returns whether anything changed.
fn substitute_pass(value: &mut Value, includes: &Params) -> bool {
    match value {
        Value::String(text) => {
            if let Some(replacement) = whole_placeholder(text).and_then(|key| includes.get(key)) {
                if let Value::String(s) = replacement {
                    if s == text {
                        return false;
                    }
                }
                *value = replacement.clone();
                return true;
            }
            match expand_inline(text, includes) {
                Some(expanded) if expanded != *text => {
                    *text = expanded;
                    true
                }
                _ => false,
            }
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                changed |= substitute_pass(item, includes);
            }
            changed
        }
        Value::Object(obj) => {
            let mut changed = false;
            for item in obj.values_mut() {
                changed |= substitute_pass(item, includes);
            }
            changed
        }
        _ => false,
    }
}

fn whole_placeholder(text: &str) -> Option<&str> {
    let key = text.strip_prefix("${")?.strip_suffix('}')?;
    if key.contains('}') {
        return None;
    }
    Some(key)
}

fn expand_inline(text: &str, includes: &Params) -> Option<String> {
    if !text.contains("${") {
        return None;
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Some(out);
        };
        let key = &after[..end];
        match includes.get(key).and_then(scalar_text) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
