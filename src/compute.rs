//! Compute settings resolved for a run
//!
//! Compute variables are a flat key/value map merged from, lowest priority first: the active
//! compute package, a pipeline interface's compute hints, a YAML settings file and itemized CLI
//! overrides. Once resolved for a run they are never mutated.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;

/// Compute packages (submission template + submission command + default settings)
pub mod package;
/// CLI `key=value,...` compute specification
pub mod spec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ComputeVariables(BTreeMap<String, String>);

impl ComputeVariables {
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        ComputeVariables(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Layer higher priority settings on top of these
    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, String)>) {
        self.0.extend(other);
    }

    pub fn merged(&self, higher: &ComputeVariables) -> ComputeVariables {
        let mut merged = self.clone();
        merged.extend(higher.0.clone());
        merged
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read a flat YAML settings file into compute variables
pub fn read_settings(path: &Path) -> Result<ComputeVariables> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Can't read compute settings {}", path.display()))?;
    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&text)
        .with_context(|| format!("Compute settings {} isn't a flat mapping", path.display()))?;
    Ok(ComputeVariables(yaml_scalars(raw)))
}

/// Keep the scalar entries of a YAML mapping as strings
pub(crate) fn yaml_scalars(raw: BTreeMap<String, serde_yaml::Value>) -> BTreeMap<String, String> {
    raw.into_iter()
        .filter_map(|(key, value)| match value {
            serde_yaml::Value::String(s) => Some((key, s)),
            serde_yaml::Value::Number(n) => Some((key, n.to_string())),
            serde_yaml::Value::Bool(b) => Some((key, b.to_string())),
            other => {
                debug!("Ignoring non-scalar compute setting {key}: {other:?}");
                None
            }
        })
        .collect()
}
