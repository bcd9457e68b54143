use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::{Map, Value};

/// Attribute holding a sample's unique name
pub const SAMPLE_NAME_ATTR: &str = "sample_name";
/// Attribute switching a sample off when set to 0
pub const TOGGLE_ATTR: &str = "toggle";
/// Attribute appended to every command rendered for a sample
pub const COMMAND_EXTRA_ATTR: &str = "command_extra";
/// Attribute listing a sample's own pipeline interfaces
pub const PIPELINE_INTERFACES_ATTR: &str = "pipeline_interfaces";

/// One sample of a project
#[derive(Debug, Clone)]
pub struct Sample {
    pub name: String,
    pub attributes: BTreeMap<String, Value>,
    pub output_folder: PathBuf,
}

impl Sample {
    pub fn new(name: &str, attributes: BTreeMap<String, Value>, results_folder: &Path) -> Sample {
        Sample {
            name: name.to_string(),
            output_folder: results_folder.join(name),
            attributes,
        }
    }

    /// String form of an attribute; numbers and booleans are stringified
    pub fn attr(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn is_toggled_off(&self) -> bool {
        self.attr(TOGGLE_ATTR).map_or(false, |v| v.trim() == "0")
    }

    /// Attributes as a JSON object, including derived ones, for templates and schema validation
    pub fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        map.insert(SAMPLE_NAME_ATTR.to_string(), Value::String(self.name.clone()));
        map.insert(
            "output_folder".to_string(),
            Value::String(self.output_folder.display().to_string()),
        );
        Value::Object(map)
    }

    /// Total size in GB of the files named by `attributes`, relative paths resolved against `base_dir`
    ///
    /// Missing files contribute nothing; a sample that hasn't been produced yet is weightless.
    pub fn input_size_gb(&self, attributes: &[String], base_dir: &Path) -> f64 {
        let mut bytes: u64 = 0;
        for attribute in attributes {
            for file in self.paths_of(attribute) {
                let path = base_dir.join(&file);
                match fs::metadata(&path) {
                    Ok(meta) => bytes += meta.len(),
                    Err(_) => debug!("{}: input file {} not found", self.name, path.display()),
                }
            }
        }
        bytes as f64 / 1_000_000_000.0
    }

    fn paths_of(&self, attribute: &str) -> Vec<String> {
        match self.attributes.get(attribute) {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(attrs: Value) -> Sample {
        let attributes = attrs
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Sample::new("s1", attributes, Path::new("/out/results"))
    }

    #[test]
    fn derived_attributes() {
        let s = sample(json!({"protocol": "RNA", "toggle": 0}));
        assert_eq!(s.output_folder, PathBuf::from("/out/results/s1"));
        assert!(s.is_toggled_off());
        let json = s.to_json();
        assert_eq!(json["sample_name"], "s1");
        assert_eq!(json["protocol"], "RNA");
    }

    #[test]
    fn input_size_sums_existing_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.fq"), vec![0u8; 1000]).unwrap();
        fs::write(tmp.path().join("b.fq"), vec![0u8; 500]).unwrap();
        let s = sample(json!({"read1": "a.fq", "read2": ["b.fq", "missing.fq"]}));
        let size = s.input_size_gb(&["read1".to_string(), "read2".to_string()], tmp.path());
        assert!((size - 1.5e-6).abs() < 1e-12);
    }
}
