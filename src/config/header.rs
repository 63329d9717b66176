//! Header generation settings.
//!
//! Directories opt into C header output with `headerVarPrefix`,
//! `headerIncludeDir` and `produceHeaders`. Settings are inherited from the
//! input root down; each key a closer directory sets overrides the farther one.

use super::value::Params;
use super::ConfigFileError;
use serde_json::Value;

/// Header keys as written in one directory config. `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSettings {
    pub var_prefix: Option<String>,
    pub include_dir: Option<String>,
    pub produce_headers: Option<bool>,
}

impl HeaderSettings {
    /// Read the header keys from a directory config object.
    ///
    /// Returns `Ok(None)` when none of the keys are present. Setting a prefix
    /// or include directory turns header output on at this level unless
    /// `produceHeaders` says otherwise.
    pub fn from_json(obj: &Params) -> Result<Option<Self>, ConfigFileError> {
        let var_prefix = string_key(obj, "headerVarPrefix")?;
        let include_dir = string_key(obj, "headerIncludeDir")?;
        let produce_headers = match obj.get("produceHeaders") {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                return Err(ConfigFileError::InvalidKey {
                    key: "produceHeaders".to_string(),
                    expected: "a bool",
                })
            }
        };

        if var_prefix.is_none() && include_dir.is_none() && produce_headers.is_none() {
            return Ok(None);
        }

        let produce_headers =
            produce_headers.or((var_prefix.is_some() || include_dir.is_some()).then_some(true));
        Ok(Some(Self { var_prefix, include_dir, produce_headers }))
    }

    /// Apply a closer directory's settings on top of these.
    pub fn overlay(&mut self, child: &HeaderSettings) {
        if child.var_prefix.is_some() {
            self.var_prefix = child.var_prefix.clone();
        }
        if child.include_dir.is_some() {
            self.include_dir = child.include_dir.clone();
        }
        if child.produce_headers.is_some() {
            self.produce_headers = child.produce_headers;
        }
    }

    /// Final settings for an operation.
    pub fn resolve(&self) -> HeaderConfig {
        HeaderConfig {
            var_prefix: self.var_prefix.clone().unwrap_or_default(),
            include_dir: self.include_dir.clone().unwrap_or_default(),
            produce_headers: self.produce_headers.unwrap_or(false),
        }
    }
}

/// Resolved header settings carried by an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderConfig {
    /// Prefix for generated array symbols
    pub var_prefix: String,
    /// Directory prepended to `#include` lines in combined headers
    pub include_dir: String,
    /// Whether outputs are wrapped as C headers
    pub produce_headers: bool,
}

fn string_key(obj: &Params, key: &str) -> Result<Option<String>, ConfigFileError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ConfigFileError::InvalidKey { key: key.to_string(), expected: "a string" }),
    }
}
