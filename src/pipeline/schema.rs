use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use jsonschema::{JSONSchema, SchemaResolver, SchemaResolverError};
use log::{info, warn};
use serde_json::Value;
use url::Url;

use crate::error::{LoopError, LoopResult};
use crate::project::sample::Sample;

/// A compiled pipeline input schema
pub struct InputSchema {
    pub path: PathBuf,
    compiled: JSONSchema,
}

/// Load and compile a JSON or YAML schema file
///
/// Schemas written for a whole project nest the sample schema under `properties.samples.items`;
/// that sub-schema is used when present so samples are validated one at a time.
pub fn load_schema(path: &Path) -> Result<InputSchema> {
    info!("Loading input schema {}", path.display());
    let schema = read_json_from_path(path)?;
    let sample_schema = schema
        .pointer("/properties/samples/items")
        .cloned()
        .unwrap_or(schema);
    let schema_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
    let compiled = compile_schema(&sample_schema, schema_dir)
        .with_context(|| format!("Invalid schema {}", path.display()))?;
    Ok(InputSchema { path: path.to_path_buf(), compiled })
}

impl InputSchema {
    pub fn validate(&self, sample: &Sample, pipeline_name: &str) -> LoopResult<()> {
        let instance = sample.to_json();
        let result = self.compiled.validate(&instance);
        if let Err(errors) = result {
            let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
            warn!("Sample {} fails validation: {}", sample.name, message);
            return Err(LoopError::Validation {
                sample: sample.name.clone(),
                pipeline: pipeline_name.to_string(),
                message,
            });
        }
        Ok(())
    }
}

/// YAML is a superset of JSON, so both parse the same way
pub(crate) fn read_json_from_path(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Can't read schema {}", path.display()))?;
    let yaml: serde_yaml::Value = serde_yaml::from_str(&text)
        .with_context(|| format!("Can't parse schema {}", path.display()))?;
    serde_json::to_value(yaml).with_context(|| format!("Schema {} isn't JSON compatible", path.display()))
}

fn compile_schema(schema: &Value, schema_dir: PathBuf) -> Result<JSONSchema> {
    let resolver = LocalResolver { schema_dir };
    JSONSchema::options()
        .with_resolver(resolver)
        .compile(schema)
        .map_err(|err| anyhow!("{err}"))
}

/*
Resolve relative `$ref`s against the folder holding the referring schema, so a pipeline can ship
its schemas as plain local files
*/
struct LocalResolver {
    schema_dir: PathBuf,
}

impl SchemaResolver for LocalResolver {
    fn resolve(&self, _root_schema: &Value, url: &Url, original_reference: &str) -> Result<Arc<Value>, SchemaResolverError> {
        match url.scheme() {
            "json-schema" => {
                let local_schema_path = self.schema_dir.join(original_reference);
                Ok(Arc::new(read_json_from_path(&local_schema_path)?))
            }
            _ => Err(anyhow!("scheme is not supported")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(attrs: Value) -> Sample {
        let attributes = attrs.as_object().unwrap().clone().into_iter().collect();
        Sample::new("s1", attributes, Path::new("/out"))
    }

    #[test]
    fn validates_nested_sample_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("input.yaml");
        fs::write(
            &path,
            "properties:\n  samples:\n    type: array\n    items:\n      type: object\n      required: [read1]\n      properties:\n        read1:\n          type: string\n",
        )
        .unwrap();
        let schema = load_schema(&path).unwrap();

        assert!(schema.validate(&sample(json!({"read1": "a.fq"})), "pipe").is_ok());
        let err = schema.validate(&sample(json!({"read2": "b.fq"})), "pipe").unwrap_err();
        assert!(matches!(err, LoopError::Validation { ref sample, .. } if sample == "s1"));
    }

    #[test]
    fn resolves_local_references() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("defs.json"), r#"{"type": "string", "minLength": 2}"#).unwrap();
        let path = tmp.path().join("input.json");
        fs::write(
            &path,
            r#"{"type": "object", "properties": {"genome": {"$ref": "defs.json"}}}"#,
        )
        .unwrap();
        let schema = load_schema(&path).unwrap();
        assert!(schema.validate(&sample(json!({"genome": "hg38"})), "pipe").is_ok());
        assert!(schema.validate(&sample(json!({"genome": "h"})), "pipe").is_err());
    }
}
