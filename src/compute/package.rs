use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::Deserialize;

use crate::compute::{yaml_scalars, ComputeVariables};

/// Name of the package used when neither the CLI nor the project selects one
pub const DEFAULT_PACKAGE: &str = "local";

/// A named bundle of compute settings: how to render a submission script and how to hand it off
#[derive(Debug, Clone)]
pub struct ComputePackage {
    pub name: String,
    /// tinytemplate source of the submission script
    pub template: String,
    /// Program run with the script path as its only argument, e.g. `sh` or `sbatch`
    pub submission_command: String,
    pub settings: ComputeVariables,
}

/// All compute packages known to a run, built-in ones first
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    packages: BTreeMap<String, ComputePackage>,
}

/// On-disk compute configuration
#[derive(Debug, Deserialize)]
struct ComputeConfigFile {
    #[serde(default)]
    compute_packages: BTreeMap<String, PackageEntry>,
}

#[derive(Debug, Deserialize)]
struct PackageEntry {
    submission_template: Option<String>,
    submission_command: Option<String>,
    #[serde(flatten)]
    settings: BTreeMap<String, serde_yaml::Value>,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        let mut packages = BTreeMap::new();
        packages.insert("local".to_string(), local_package());
        packages.insert("slurm".to_string(), slurm_package());
        ComputeConfig { packages }
    }
}

impl ComputeConfig {
    /// Built-in packages, extended or overridden by a YAML compute configuration file
    ///
    /// Template paths are resolved relative to the configuration file. A package that shares a
    /// built-in name inherits whatever it doesn't set.
    pub fn load(path: Option<&Path>) -> Result<ComputeConfig> {
        let mut config = ComputeConfig::default();
        let Some(path) = path else {
            return Ok(config);
        };

        info!("Reading compute configuration {}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("Can't read compute configuration {}", path.display()))?;
        let file: ComputeConfigFile = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid compute configuration {}", path.display()))?;
        let base_dir = path.parent().unwrap_or(Path::new("."));

        for (name, entry) in file.compute_packages {
            let mut package = config.packages.remove(&name).unwrap_or_else(|| ComputePackage {
                name: name.clone(),
                template: local_package().template,
                submission_command: "sh".to_string(),
                settings: ComputeVariables::default(),
            });
            if let Some(template) = entry.submission_template {
                let template_path = base_dir.join(template);
                package.template = fs::read_to_string(&template_path).with_context(|| {
                    format!("Can't read submission template {}", template_path.display())
                })?;
            }
            if let Some(command) = entry.submission_command {
                package.submission_command = command;
            }
            package.settings.extend(yaml_scalars(entry.settings));
            debug!("Loaded compute package {name}");
            config.packages.insert(name, package);
        }
        Ok(config)
    }

    pub fn activate(&self, name: &str) -> Result<&ComputePackage> {
        self.packages.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.packages.keys().map(String::as_str).collect();
            anyhow!(
                "Unknown compute package '{name}', choose one of: {}",
                known.join(", ")
            )
        })
    }
}

fn local_package() -> ComputePackage {
    /// included local submission template
    static LOCAL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/local.sub"));
    ComputePackage {
        name: "local".to_string(),
        template: LOCAL.to_string(),
        submission_command: "sh".to_string(),
        settings: ComputeVariables::default(),
    }
}

fn slurm_package() -> ComputePackage {
    /// included SLURM submission template (sbatch header + commands)
    static SLURM: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/slurm.sub"));
    let settings = [
        ("mem", "4000"),
        ("cores", "1"),
        ("time", "01:00:00"),
        ("partition", "standard"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    ComputePackage {
        name: "slurm".to_string(),
        template: SLURM.to_string(),
        submission_command: "sbatch".to_string(),
        settings: ComputeVariables::from_map(settings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_packages_are_available() {
        let config = ComputeConfig::default();
        let slurm = config.activate("slurm").unwrap();
        assert_eq!(slurm.submission_command, "sbatch");
        assert_eq!(slurm.settings.get("partition"), Some("standard"));
        assert!(slurm.template.contains("#SBATCH"));
        assert!(config.activate("nope").is_err());
    }

    #[test]
    fn file_packages_extend_builtins() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("big.sub"), "#!/bin/bash\n{code}\n").unwrap();
        let path = tmp.path().join("compute.yaml");
        fs::write(
            &path,
            "compute_packages:\n  slurm:\n    partition: long\n  big:\n    submission_template: big.sub\n    submission_command: bsub\n    mem: 64000\n",
        )
        .unwrap();

        let config = ComputeConfig::load(Some(&path)).unwrap();
        let slurm = config.activate("slurm").unwrap();
        assert_eq!(slurm.settings.get("partition"), Some("long"));
        assert_eq!(slurm.settings.get("mem"), Some("4000"));

        let big = config.activate("big").unwrap();
        assert_eq!(big.submission_command, "bsub");
        assert_eq!(big.template, "#!/bin/bash\n{code}\n");
        assert_eq!(big.settings.get("mem"), Some("64000"));
    }
}
