//! The project being run: its samples, folders and pipeline interfaces
//!
//! Loading sample metadata is deliberately minimal. The submission core only needs the sample
//! list, each sample's output folder and which pipeline interfaces apply to which sample.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::{LoopError, LoopResult};
use crate::pipeline::interface::{PipelineInterface, PipelineType};
use crate::pipeline::outputs::{load_output_schema, render_output, OutputSchema};

/// Project configuration file format
pub mod config;
/// Sample attributes and derived values
pub mod sample;
/// Attribute-based sample selection
pub mod select;

use config::{ProjectConfig, RunDefaults};
use sample::{Sample, PIPELINE_INTERFACES_ATTR, SAMPLE_NAME_ATTR};

/// Project values exposed to templates and shared by every conductor
#[derive(Debug, Clone, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub output_dir: PathBuf,
    pub results_folder: PathBuf,
    pub submission_folder: PathBuf,
    /// Folder of the project configuration file, base for relative sample paths
    pub config_dir: PathBuf,
    /// Project-level output paths declared by pipeline output schemas
    pub outputs: BTreeMap<String, String>,
}

/// Pipeline interface sources given on the CLI, overriding the project config
#[derive(Debug, Default, Clone)]
pub struct ProjectOverrides {
    pub output_dir: Option<PathBuf>,
    pub sample_pipeline_interfaces: Vec<PathBuf>,
    pub project_pipeline_interfaces: Vec<PathBuf>,
}

pub struct Project {
    pub info: ProjectInfo,
    pub samples: Vec<Sample>,
    pub defaults: RunDefaults,
    /// Sample-level interfaces, in first-seen order
    pub interfaces: Vec<PipelineInterface>,
    pub project_interfaces: Vec<PipelineInterface>,
    interfaces_by_sample: BTreeMap<String, Vec<usize>>,
}

impl Project {
    pub fn load(config_file: &Path, overrides: &ProjectOverrides) -> Result<Project> {
        info!("Reading project configuration {}", config_file.display());
        let text = fs::read_to_string(config_file)
            .with_context(|| format!("Can't read project config {}", config_file.display()))?;
        let config: ProjectConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Project config parse failed: {}", config_file.display()))?;
        // Scripts are run from their own folder, so every derived path must be absolute
        let config_dir = match config_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let config_dir = absolute(config_dir)?;

        let output_dir = match (&overrides.output_dir, &config.output_dir) {
            (Some(dir), _) => absolute(dir)?,
            (None, Some(dir)) => config_dir.join(dir),
            (None, None) => {
                return Err(anyhow!(LoopError::Misconfiguration(
                    "'output_dir' is missing. Provide it as CLI argument or in the project config"
                        .to_string()
                )))
            }
        };
        let info = ProjectInfo {
            name: config.name.clone(),
            results_folder: output_dir.join(config.results_subdir.as_deref().unwrap_or("results_pipeline")),
            submission_folder: output_dir.join(config.submission_subdir.as_deref().unwrap_or("submission")),
            output_dir,
            config_dir: config_dir.clone(),
            outputs: BTreeMap::new(),
        };

        let samples = build_samples(config.samples, &info.results_folder)?;
        let project_sources = config.project_pipeline_interfaces.clone().into_vec();
        let default_sources = config.pipeline_interfaces.clone().into_vec();

        let mut project = Project {
            info,
            samples,
            defaults: config.pipeloop,
            interfaces: Vec::new(),
            project_interfaces: Vec::new(),
            interfaces_by_sample: BTreeMap::new(),
        };
        project.map_sample_interfaces(&default_sources, &overrides.sample_pipeline_interfaces);

        let project_sources: Vec<PathBuf> = if overrides.project_pipeline_interfaces.is_empty() {
            project_sources.iter().map(|s| config_dir.join(s)).collect()
        } else {
            overrides.project_pipeline_interfaces.clone()
        };
        for source in project_sources {
            match PipelineInterface::load(&source) {
                Ok(piface) if piface.pipeline_type == PipelineType::Project => {
                    project.project_interfaces.push(piface)
                }
                Ok(piface) => warn!(
                    "Ignoring {}: pipeline {} isn't a project-level pipeline",
                    source.display(),
                    piface.name
                ),
                Err(err) => warn!("Ignoring invalid pipeline interface source: {err:#}"),
            }
        }
        Ok(project)
    }

    /// Pipeline interfaces that apply to a sample, empty if there are none
    pub fn sample_interfaces(&self, sample_name: &str) -> Vec<&PipelineInterface> {
        self.sample_interface_ids(sample_name)
            .iter()
            .map(|&i| &self.interfaces[i])
            .collect()
    }

    /// Positions in `interfaces` of the pipelines that apply to a sample
    pub fn sample_interface_ids(&self, sample_name: &str) -> &[usize] {
        self.interfaces_by_sample
            .get(sample_name)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Fill in the output paths that pipeline output schemas declare
    ///
    /// Sample outputs become sample attributes, relative ones placed under the sample's output
    /// folder. Project outputs land in `info.outputs`, relative to the output folder. A template
    /// naming an attribute the sample or project lacks is a misconfiguration. Returns the number
    /// of values set.
    pub fn populate_pipeline_outputs(&mut self) -> LoopResult<usize> {
        let mut schemas: BTreeMap<PathBuf, OutputSchema> = BTreeMap::new();
        for piface in self.interfaces.iter().chain(&self.project_interfaces) {
            let Some(path) = &piface.output_schema else { continue };
            if schemas.contains_key(path) {
                continue;
            }
            let schema = load_output_schema(path).map_err(|err| {
                LoopError::Misconfiguration(format!("Output schema of pipeline {}: {err:#}", piface.name))
            })?;
            schemas.insert(path.clone(), schema);
        }
        if schemas.is_empty() {
            return Ok(0);
        }

        let mut populated = 0;
        for schema in schemas.values() {
            for (attribute, source) in &schema.project {
                let context = serde_json::to_value(&self.info)
                    .map_err(|err| LoopError::Misconfiguration(err.to_string()))?;
                let value = render_output(&self.info.name, attribute, source, &context, &self.info.output_dir)?;
                self.info.outputs.insert(attribute.clone(), value.display().to_string());
                populated += 1;
            }
        }

        for sample in &mut self.samples {
            let ids = self
                .interfaces_by_sample
                .get(&sample.name)
                .map_or(&[][..], Vec::as_slice);
            for &id in ids {
                let Some(path) = &self.interfaces[id].output_schema else { continue };
                for (attribute, source) in &schemas[path].sample {
                    let value = render_output(&sample.name, attribute, source, &sample.to_json(), &sample.output_folder)?;
                    debug!("{}: {} = {}", sample.name, attribute, value.display());
                    sample
                        .attributes
                        .insert(attribute.clone(), Value::String(value.display().to_string()));
                    populated += 1;
                }
            }
        }
        Ok(populated)
    }

    /// Create the results and submission folders
    ///
    /// Every later step writes into these folders, so failing to create them stops the run.
    pub fn make_project_dirs(&self) -> LoopResult<()> {
        for folder in [&self.info.results_folder, &self.info.submission_folder] {
            debug!("Ensuring project dir exists: {}", folder.display());
            fs::create_dir_all(folder).map_err(|err| {
                LoopError::Misconfiguration(format!(
                    "Could not create project folder {}: {}",
                    folder.display(),
                    err
                ))
            })?;
        }
        Ok(())
    }

    /// A sample's own interfaces win over the project's; CLI sources win over both
    fn map_sample_interfaces(&mut self, default_sources: &[String], cli_sources: &[PathBuf]) {
        let config_dir = self.info.config_dir.clone();
        let mut index_by_source: BTreeMap<PathBuf, Option<usize>> = BTreeMap::new();

        for sample in &self.samples {
            let sources: Vec<PathBuf> = if !cli_sources.is_empty() {
                cli_sources.to_vec()
            } else {
                let own = match sample.attributes.get(PIPELINE_INTERFACES_ATTR) {
                    Some(Value::String(s)) => vec![s.clone()],
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect(),
                    _ => default_sources.to_vec(),
                };
                own.iter().map(|s| config_dir.join(s)).collect()
            };

            let mut ids = Vec::new();
            for source in sources {
                let id = *index_by_source.entry(source.clone()).or_insert_with(|| {
                    match PipelineInterface::load(&source) {
                        Ok(piface) if piface.pipeline_type == PipelineType::Sample => {
                            self.interfaces.push(piface);
                            Some(self.interfaces.len() - 1)
                        }
                        Ok(piface) => {
                            warn!("Ignoring {}: pipeline {} isn't a sample-level pipeline", source.display(), piface.name);
                            None
                        }
                        Err(err) => {
                            warn!("Ignoring invalid pipeline interface source: {err:#}");
                            None
                        }
                    }
                });
                if let Some(id) = id {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
            self.interfaces_by_sample.insert(sample.name.clone(), ids);
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Can't resolve {}", path.display()))
}

fn build_samples(rows: Vec<BTreeMap<String, serde_yaml::Value>>, results_folder: &Path) -> Result<Vec<Sample>> {
    let mut samples: Vec<Sample> = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let mut attributes = BTreeMap::new();
        for (key, value) in row {
            let value = serde_json::to_value(value)
                .with_context(|| format!("Sample {i}: attribute {key} isn't JSON compatible"))?;
            attributes.insert(key, value);
        }
        let name = match attributes.remove(SAMPLE_NAME_ATTR) {
            Some(Value::String(name)) => name,
            Some(other) => other.to_string(),
            None => return Err(anyhow!("Sample {i} has no '{SAMPLE_NAME_ATTR}'")),
        };
        if samples.iter().any(|s| s.name == name) {
            return Err(anyhow!("Duplicate sample name '{name}'"));
        }
        samples.push(Sample::new(&name, attributes, results_folder));
    }
    Ok(samples)
}

#[cfg(test)]
impl ProjectInfo {
    pub(crate) fn for_tests(root: &Path) -> ProjectInfo {
        ProjectInfo {
            name: "test".to_string(),
            output_dir: root.to_path_buf(),
            results_folder: root.join("results_pipeline"),
            submission_folder: root.join("submission"),
            config_dir: root.to_path_buf(),
            outputs: BTreeMap::new(),
        }
    }
}
