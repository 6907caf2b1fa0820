//! Module definitions: programmatic specs and on-disk manifests.
//!
//! A module binds export names to builtin functions and scalar constants.
//! Modules registered through
//! [`SessionOptions::modules`](crate::SessionOptions) are built from a
//! [`ModuleSpec`]; modules resolved from the search path are loaded from
//! declarative `<name>.toml` manifests:
//!
//! ```toml
//! [functions]
//! add = "add"
//! join = "concat"
//!
//! [constants]
//! answer = 42
//! greeting = "hello"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::builtins::Builtin;
use crate::types::Scalar;

/// Declarative description of a module's exports.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    pub(crate) name: String,
    pub(crate) functions: BTreeMap<String, Builtin>,
    pub(crate) constants: BTreeMap<String, Scalar>,
}

impl ModuleSpec {
    /// Start an empty module with the given import name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: BTreeMap::new(),
            constants: BTreeMap::new(),
        }
    }

    /// Export a builtin function under `export`.
    pub fn function(mut self, export: impl Into<String>, builtin: Builtin) -> Self {
        self.functions.insert(export.into(), builtin);
        self
    }

    /// Export a scalar constant under `export`.
    pub fn constant(mut self, export: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.constants.insert(export.into(), value.into());
        self
    }

    /// The module's import name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load a manifest file. The module name is the file stem.
    pub(crate) fn load(path: &Path) -> Result<Self, String> {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| format!("{} has no usable file stem", path.display()))?
            .to_string();
        let text = fs::read_to_string(path)
            .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
        Self::parse(name, &text).map_err(|err| format!("{}: {err}", path.display()))
    }

    fn parse(name: String, text: &str) -> Result<Self, String> {
        let doc: ManifestDoc = toml::from_str(text).map_err(|err| err.to_string())?;
        let mut spec = ModuleSpec::new(name);
        for (export, id) in doc.functions {
            let builtin =
                Builtin::from_id(&id).ok_or_else(|| format!("unknown builtin {id:?}"))?;
            spec.functions.insert(export, builtin);
        }
        for (export, value) in doc.constants {
            spec.constants.insert(export, value.into());
        }
        Ok(spec)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestDoc {
    #[serde(default)]
    functions: BTreeMap<String, String>,
    #[serde(default)]
    constants: BTreeMap<String, ConstValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConstValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<ConstValue> for Scalar {
    fn from(value: ConstValue) -> Scalar {
        match value {
            ConstValue::Bool(v) => Scalar::Bool(v),
            ConstValue::Int(v) => Scalar::Int(v),
            ConstValue::Float(v) => Scalar::Float(v),
            ConstValue::Str(v) => Scalar::Str(v),
        }
    }
}
