use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;
use serde_json::Value;

use crate::error::{LoopError, LoopResult};
use crate::pipeline::schema::read_json_from_path;
use crate::template;

/// Output paths a pipeline declares in its output schema
///
/// Every property carrying a `path` is an output. Properties under `properties.samples.items`
/// belong to each sample; the remaining top-level ones belong to the project.
#[derive(Debug, Default)]
pub struct OutputSchema {
    pub path: PathBuf,
    /// `(attribute, path template)` pairs rendered with project values
    pub project: Vec<(String, String)>,
    /// `(attribute, path template)` pairs rendered with sample attributes
    pub sample: Vec<(String, String)>,
}

pub fn load_output_schema(path: &Path) -> Result<OutputSchema> {
    info!("Loading output schema {}", path.display());
    let schema = read_json_from_path(path)?;
    Ok(OutputSchema {
        path: path.to_path_buf(),
        project: path_templates(schema.get("properties"), true),
        sample: path_templates(schema.pointer("/properties/samples/items/properties"), false),
    })
}

fn path_templates(properties: Option<&Value>, skip_samples: bool) -> Vec<(String, String)> {
    let Some(Value::Object(properties)) = properties else {
        return Vec::new();
    };
    properties
        .iter()
        .filter(|(key, _)| !(skip_samples && key.as_str() == "samples"))
        .filter_map(|(key, value)| {
            let path = value.get("path")?.as_str()?;
            Some((key.clone(), path.to_string()))
        })
        .collect()
}

/// Render one output path template; relative results land under `base`
pub fn render_output(owner: &str, attribute: &str, source: &str, context: &Value, base: &Path) -> LoopResult<PathBuf> {
    let rendered = template::render(attribute, source, context).map_err(|err| {
        LoopError::Misconfiguration(format!("Missing outputs of {owner}, attribute '{attribute}': {err}"))
    })?;
    Ok(base.join(rendered.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn splits_project_and_sample_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("output_schema.yaml");
        fs::write(
            &path,
            "properties:\n  merged:\n    type: string\n    path: '{name}_merged.tsv'\n  note:\n    type: string\n  samples:\n    type: array\n    items:\n      properties:\n        bam:\n          type: string\n          path: 'aligned/{sample_name}.bam'\n",
        )
        .unwrap();

        let schema = load_output_schema(&path).unwrap();
        assert_eq!(schema.project, vec![("merged".to_string(), "{name}_merged.tsv".to_string())]);
        assert_eq!(schema.sample, vec![("bam".to_string(), "aligned/{sample_name}.bam".to_string())]);

        let bam = render_output("s1", "bam", &schema.sample[0].1, &json!({"sample_name": "s1"}), tmp.path()).unwrap();
        assert_eq!(bam, tmp.path().join("aligned/s1.bam"));
        let err = render_output("s1", "bam", "{genome}/x", &json!({"sample_name": "s1"}), tmp.path()).unwrap_err();
        assert!(matches!(err, LoopError::Misconfiguration(_)));
    }
}
