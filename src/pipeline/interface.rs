use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compute::{yaml_scalars, ComputeVariables};
use crate::error::LoopResult;
use crate::project::sample::Sample;
use crate::project::ProjectInfo;
use crate::template;

/// Whether a pipeline runs once per sample or once per project
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    #[default]
    Sample,
    Project,
}

/// One runnable pipeline, read from a YAML pipeline interface file
#[derive(Debug, Clone)]
pub struct PipelineInterface {
    pub name: String,
    pub pipeline_type: PipelineType,
    /// The file this interface was read from, unique per run
    pub source: PathBuf,
    pub path: Option<PathBuf>,
    pub command_template: String,
    pub input_schema: Option<PathBuf>,
    pub output_schema: Option<PathBuf>,
    /// Sample attributes naming input files; their sizes drive size-based lumping
    pub input_attributes: Vec<String>,
    /// Compute demand hints, layered over the active compute package
    pub compute: ComputeVariables,
}

#[derive(Debug, Deserialize)]
struct InterfaceFile {
    pipeline_name: String,
    #[serde(default)]
    pipeline_type: PipelineType,
    path: Option<String>,
    command_template: String,
    input_schema: Option<String>,
    output_schema: Option<String>,
    #[serde(default)]
    input_attributes: Vec<String>,
    #[serde(default)]
    compute: BTreeMap<String, serde_yaml::Value>,
}

/// Rendering context for a command template
#[derive(Serialize)]
struct CommandContext<'a> {
    sample: Value,
    project: &'a ProjectInfo,
    pipeline: PipelineContext,
    compute: &'a ComputeVariables,
}

#[derive(Serialize)]
struct PipelineContext {
    name: String,
    path: String,
}

impl PipelineInterface {
    /// Read a pipeline interface; relative paths inside it resolve against its own folder
    pub fn load(source: &Path) -> Result<PipelineInterface> {
        let text = fs::read_to_string(source)
            .with_context(|| format!("Can't read pipeline interface {}", source.display()))?;
        let file: InterfaceFile = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid pipeline interface {}", source.display()))?;
        let dir = source.parent().unwrap_or(Path::new("."));
        info!("Loaded pipeline interface {} ({})", file.pipeline_name, source.display());

        Ok(PipelineInterface {
            name: file.pipeline_name,
            pipeline_type: file.pipeline_type,
            source: source.to_path_buf(),
            path: file.path.map(|p| dir.join(p)),
            command_template: file.command_template,
            input_schema: file.input_schema.map(|p| dir.join(p)),
            output_schema: file.output_schema.map(|p| dir.join(p)),
            input_attributes: file.input_attributes,
            compute: ComputeVariables::from_map(yaml_scalars(file.compute)),
        })
    }

    /// Render the command that runs this pipeline on one sample
    ///
    /// CLI pass-through arguments and the command extra are appended after the template output.
    pub fn render_command(
        &self,
        sample: &Sample,
        project: &ProjectInfo,
        compute: &ComputeVariables,
        extra_args: &[String],
        command_extra: &str,
    ) -> LoopResult<String> {
        self.render(sample.to_json(), project, compute, extra_args, command_extra)
    }

    /// Render the command that runs this pipeline once for the whole project
    pub fn render_project_command(
        &self,
        project: &ProjectInfo,
        compute: &ComputeVariables,
        extra_args: &[String],
        command_extra: &str,
    ) -> LoopResult<String> {
        self.render(Value::Null, project, compute, extra_args, command_extra)
    }

    fn render(
        &self,
        sample: Value,
        project: &ProjectInfo,
        compute: &ComputeVariables,
        extra_args: &[String],
        command_extra: &str,
    ) -> LoopResult<String> {
        let context = CommandContext {
            sample,
            project,
            pipeline: PipelineContext {
                name: self.name.clone(),
                path: self
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            },
            compute,
        };
        let rendered = template::render(&self.name, &self.command_template, &context)?;

        let mut parts = vec![rendered.trim().to_string()];
        parts.extend(extra_args.iter().cloned());
        if !command_extra.trim().is_empty() {
            parts.push(command_extra.trim().to_string());
        }
        Ok(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_interface(dir: &Path) -> PathBuf {
        let path = dir.join("pipe.yaml");
        fs::write(
            &path,
            "pipeline_name: count\npath: bin/count.sh\ncommand_template: '{pipeline.path} --name {sample.sample_name} --in {sample.read1} --cores {compute.cores}'\ninput_attributes: [read1]\ncompute:\n  cores: 2\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn loads_and_renders_sample_command() {
        let tmp = tempfile::tempdir().unwrap();
        let piface = PipelineInterface::load(&write_interface(tmp.path())).unwrap();
        assert_eq!(piface.name, "count");
        assert_eq!(piface.pipeline_type, PipelineType::Sample);
        assert_eq!(piface.compute.get("cores"), Some("2"));

        let project = ProjectInfo::for_tests(tmp.path());
        let attrs = json!({"read1": "a.fq"}).as_object().unwrap().clone().into_iter().collect();
        let sample = Sample::new("s1", attrs, &project.results_folder);

        let command = piface
            .render_command(&sample, &project, &piface.compute, &["--dry".to_string()], " -v ")
            .unwrap();
        let script = tmp.path().join("bin/count.sh");
        assert_eq!(
            command,
            format!("{} --name s1 --in a.fq --cores 2 --dry -v", script.display())
        );
    }
}
