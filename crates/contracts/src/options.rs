//! Options - typed, named, defaulted configuration bag per component
//!
//! Every collaborator component exposes its tunables as named options with a
//! typed default and a description, so configuration files and the CLI can
//! discover and set them generically. The bag freezes when the component
//! enters its running state; later writes are rejected.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Value of a single option
///
/// Serialized untagged, so config files write plain scalars/arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

impl OptionValue {
    fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::IntList(_) => "int list",
            Self::TextList(_) => "text list",
        }
    }

    fn same_kind(&self, other: &OptionValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::IntList(v) => write!(f, "{v:?}"),
            Self::TextList(v) => write!(f, "{v:?}"),
        }
    }
}

/// One declared option: current value, default and description
#[derive(Debug, Clone)]
pub struct OptionEntry {
    pub value: OptionValue,
    pub default: OptionValue,
    pub description: &'static str,
}

/// Typed option bag
#[derive(Debug, Clone, Default)]
pub struct Options {
    owner: String,
    entries: BTreeMap<&'static str, OptionEntry>,
    frozen: bool,
}

impl Options {
    /// Create an empty bag owned by the named component
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: BTreeMap::new(),
            frozen: false,
        }
    }

    /// Declare an option with its default value (builder style)
    pub fn define(mut self, key: &'static str, default: OptionValue, description: &'static str) -> Self {
        self.entries.insert(
            key,
            OptionEntry {
                value: default.clone(),
                default,
                description,
            },
        );
        self
    }

    /// Set an option by name
    ///
    /// Unknown keys and value-kind mismatches are validation errors; writes
    /// after [`Options::freeze`] are lifecycle errors.
    pub fn set(&mut self, key: &str, value: OptionValue) -> Result<(), PipelineError> {
        if self.frozen {
            return Err(PipelineError::lifecycle(format!(
                "options of '{}' are frozen, cannot set '{key}'",
                self.owner
            )));
        }
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(PipelineError::validation(
                &self.owner,
                format!("unknown option '{key}'"),
            ));
        };
        if !entry.default.same_kind(&value) {
            // Int-to-float widening is the one conversion config files need
            if let (OptionValue::Float(_), OptionValue::Int(i)) = (&entry.default, &value) {
                entry.value = OptionValue::Float(*i as f64);
                return Ok(());
            }
            return Err(PipelineError::validation(
                &self.owner,
                format!(
                    "option '{key}' expects {}, got {}",
                    entry.default.kind_name(),
                    value.kind_name()
                ),
            ));
        }
        entry.value = value;
        Ok(())
    }

    /// Apply a whole map of values, e.g. from a parsed blueprint
    pub fn apply(&mut self, values: &BTreeMap<String, OptionValue>) -> Result<(), PipelineError> {
        for (key, value) in values {
            self.set(key, value.clone())?;
        }
        Ok(())
    }

    /// Reject further writes; called when the owning component starts running
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, PipelineError> {
        match self.get(key)? {
            OptionValue::Bool(v) => Ok(*v),
            other => Err(self.kind_error(key, "bool", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, PipelineError> {
        match self.get(key)? {
            OptionValue::Int(v) => Ok(*v),
            other => Err(self.kind_error(key, "int", other)),
        }
    }

    pub fn get_float(&self, key: &str) -> Result<f64, PipelineError> {
        match self.get(key)? {
            OptionValue::Float(v) => Ok(*v),
            OptionValue::Int(v) => Ok(*v as f64),
            other => Err(self.kind_error(key, "float", other)),
        }
    }

    pub fn get_text(&self, key: &str) -> Result<&str, PipelineError> {
        match self.get(key)? {
            OptionValue::Text(v) => Ok(v),
            other => Err(self.kind_error(key, "text", other)),
        }
    }

    pub fn get_int_list(&self, key: &str) -> Result<&[i64], PipelineError> {
        match self.get(key)? {
            OptionValue::IntList(v) => Ok(v),
            other => Err(self.kind_error(key, "int list", other)),
        }
    }

    /// Empty list reads as "not provided"
    pub fn get_text_list(&self, key: &str) -> Result<&[String], PipelineError> {
        match self.get(key)? {
            OptionValue::TextList(v) => Ok(v),
            other => Err(self.kind_error(key, "text list", other)),
        }
    }

    /// Iterate declared options for discovery (docs, `info` commands)
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &OptionEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    fn get(&self, key: &str) -> Result<&OptionValue, PipelineError> {
        self.entries.get(key).map(|e| &e.value).ok_or_else(|| {
            PipelineError::validation(&self.owner, format!("unknown option '{key}'"))
        })
    }

    fn kind_error(&self, key: &str, expected: &str, got: &OptionValue) -> PipelineError {
        PipelineError::validation(
            &self.owner,
            format!("option '{key}' expects {expected}, got {}", got.kind_name()),
        )
    }
}
