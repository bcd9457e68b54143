//! Run options, resolved once at startup
//!
//! Precedence is CLI > project config > built-in defaults. Nothing is added to an `Options`
//! after `Options::resolve` returns.

use std::path::PathBuf;

use anyhow::Result;
use log::debug;

use crate::cli::{CheckArgs, Command, ProjectArgs, RemoveArgs, SubmitArgs};
use crate::compute::package::{ComputePackage, DEFAULT_PACKAGE};
use crate::compute::spec::parse_itemized;
use crate::compute::{read_settings, ComputeVariables};
use crate::flag::{Flag, FLAGS};
use crate::pipeline::interface::PipelineInterface;
use crate::project::config::RunDefaults;
use crate::project::select::Selector;
use crate::submit::batch::Thresholds;
use crate::submit::conductor::SubmissionSettings;

#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub flags: Vec<Flag>,
    pub all_folders: bool,
    pub pipeline: Option<String>,
    pub max_file_count: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            flags: FLAGS.to_vec(),
            all_folders: false,
            pipeline: None,
            max_file_count: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub dry_run: bool,
    /// Skip interactive confirmation of destructive actions
    pub force_yes: bool,
    pub limit: Option<usize>,
    pub selector: Selector,
    pub submission: SubmissionSettings,
    pub compute_package: String,
    pub compute_config: Option<PathBuf>,
    /// Settings file layered under itemized CLI compute settings
    pub compute_overrides: ComputeVariables,
    pub check: CheckOptions,
}

impl Options {
    pub fn resolve(command: &Command, defaults: &RunDefaults) -> Result<Options> {
        let mut options = Options {
            compute_package: defaults
                .compute_package
                .clone()
                .unwrap_or_else(|| DEFAULT_PACKAGE.to_string()),
            ..Default::default()
        };
        options.apply_project_args(command.project_args(), defaults);

        match command {
            Command::Run(args) | Command::Rerun(args) | Command::Runp(args) => {
                options.apply_submit_args(args, defaults)?
            }
            Command::Destroy(args) | Command::Clean(args) => options.apply_remove_args(args),
            Command::Check(args) => options.apply_check_args(args),
            Command::Summarize(_) => {}
        }
        debug!("Resolved options: {options:?}");
        Ok(options)
    }

    /// Compute variables for one pipeline: package < interface hints < settings file < CLI
    pub fn compute_for(&self, package: &ComputePackage, piface: &PipelineInterface) -> ComputeVariables {
        package
            .settings
            .merged(&piface.compute)
            .merged(&self.compute_overrides)
    }

    fn apply_project_args(&mut self, args: &ProjectArgs, defaults: &RunDefaults) {
        self.limit = args.limit;
        self.selector = Selector {
            attribute: args
                .sel_attr
                .clone()
                .or_else(|| defaults.selector_attribute.clone()),
            include: args.sel_incl.clone(),
            exclude: args.sel_excl.clone(),
        };
    }

    fn apply_submit_args(&mut self, args: &SubmitArgs, defaults: &RunDefaults) -> Result<()> {
        self.dry_run = args.dry_run;
        if let Some(package) = &args.package {
            self.compute_package = package.clone();
        }
        self.compute_config = args.compute_config.clone();

        let mut overrides = match &args.settings {
            Some(path) => read_settings(path)?,
            None => ComputeVariables::default(),
        };
        let itemized = parse_itemized(args.compute.as_deref().unwrap_or_default())?;
        overrides.extend(itemized);
        self.compute_overrides = overrides;

        let mut thresholds = Thresholds {
            max_cmds: args.lumpn.or(defaults.lumpn),
            max_size: args.lump.or(defaults.lump),
        };
        if thresholds.max_cmds.is_none() && thresholds.max_size.is_none() {
            // one job per command unless lumping was asked for
            thresholds.max_cmds = Some(1);
        }

        self.submission = SubmissionSettings {
            dry_run: args.dry_run,
            ignore_flags: args.ignore_flags,
            thresholds,
            extra_args: args.pipeline_args.clone(),
            command_extra: args
                .command_extra
                .clone()
                .or_else(|| defaults.command_extra.clone())
                .unwrap_or_default(),
            command_extra_override: args.command_extra_override.clone(),
            time_delay: args.time_delay,
        };
        Ok(())
    }

    fn apply_remove_args(&mut self, args: &RemoveArgs) {
        self.dry_run = args.dry_run;
        self.force_yes = args.force_yes;
    }

    fn apply_check_args(&mut self, args: &CheckArgs) {
        let mut flags = if args.flags.is_empty() {
            FLAGS.to_vec()
        } else {
            args.flags.clone()
        };
        flags.sort();
        flags.dedup();
        self.check = CheckOptions {
            flags,
            all_folders: args.all_folders,
            pipeline: args.pipeline.clone(),
            max_file_count: args.max_file_count,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::error::LoopError;
    use clap::Parser;

    fn command(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn cli_beats_project_beats_defaults() {
        let defaults = RunDefaults {
            compute_package: Some("slurm".to_string()),
            command_extra: Some("--from-project".to_string()),
            lumpn: Some(5),
            ..Default::default()
        };

        let plain = Options::resolve(&command(&["pipeloop", "run", "p.yaml"]), &defaults).unwrap();
        assert_eq!(plain.compute_package, "slurm");
        assert_eq!(plain.submission.thresholds.max_cmds, Some(5));
        assert_eq!(plain.submission.command_extra, "--from-project");

        let cli = Options::resolve(
            &command(&["pipeloop", "run", "p.yaml", "--package", "local", "--lumpn", "2", "--command-extra", "-x"]),
            &defaults,
        )
        .unwrap();
        assert_eq!(cli.compute_package, "local");
        assert_eq!(cli.submission.thresholds.max_cmds, Some(2));
        assert_eq!(cli.submission.command_extra, "-x");

        let bare = Options::resolve(&command(&["pipeloop", "run", "p.yaml"]), &RunDefaults::default()).unwrap();
        assert_eq!(bare.compute_package, DEFAULT_PACKAGE);
        assert_eq!(bare.submission.thresholds, Thresholds { max_cmds: Some(1), max_size: None });

        let by_size = Options::resolve(&command(&["pipeloop", "run", "p.yaml", "--lump", "2.5"]), &RunDefaults::default()).unwrap();
        assert_eq!(by_size.submission.thresholds, Thresholds { max_cmds: None, max_size: Some(2.5) });
    }

    #[test]
    fn bad_itemized_compute_applies_nothing() {
        let err = Options::resolve(
            &command(&["pipeloop", "run", "p.yaml", "--compute", "mem=32000,badtoken,cores=4"]),
            &RunDefaults::default(),
        )
        .unwrap_err();
        let loop_err = err.downcast_ref::<LoopError>().unwrap();
        assert!(matches!(loop_err, LoopError::ComputeSpec { .. }));
        assert!(err.to_string().contains("badtoken"));
    }

    #[test]
    fn check_flags_default_to_all() {
        let options = Options::resolve(&command(&["pipeloop", "check", "p.yaml"]), &RunDefaults::default()).unwrap();
        assert_eq!(options.check.flags, FLAGS.to_vec());
    }
}
