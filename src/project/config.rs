use std::collections::BTreeMap;

use serde::Deserialize;

/// Project configuration file as written by users
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub output_dir: Option<String>,
    pub results_subdir: Option<String>,
    pub submission_subdir: Option<String>,
    #[serde(default)]
    pub pipeline_interfaces: OneOrMany,
    #[serde(default)]
    pub project_pipeline_interfaces: OneOrMany,
    #[serde(default)]
    pub pipeloop: RunDefaults,
    #[serde(default)]
    pub samples: Vec<BTreeMap<String, serde_yaml::Value>>,
}

/// Run options a project may set; anything given on the CLI wins
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RunDefaults {
    pub compute_package: Option<String>,
    pub command_extra: Option<String>,
    /// Size threshold in GB
    pub lump: Option<f64>,
    /// Command count threshold
    pub lumpn: Option<usize>,
    pub selector_attribute: Option<String>,
}

/// YAML fields that accept either a single string or a list of strings
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}
