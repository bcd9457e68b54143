//! User-facing workflows
//!
//! Each subcommand maps onto one `Driver` variant. Drivers compose the flag store, the
//! submission conductors, the failure aggregator and the progress counter; destructive ones go
//! through `confirm::preview_then_confirm`.

use log::info;

use crate::cli::Command;
use crate::compute::package::ComputePackage;
use crate::error::{LoopError, LoopResult};
use crate::options::Options;
use crate::project::sample::Sample;
use crate::project::Project;
use crate::submit::dispatch::Submitter;

/// Flag counts over sample folders
pub mod check;
/// Cleanup scripts and result removal
pub mod clean;
/// Project-level pipelines
pub mod collate;
/// Preview/confirm for destructive actions
pub mod confirm;
/// Status line counter
pub mod counter;
/// Failure reasons by sample
pub mod failure;
/// Sample-level pipelines
pub mod run;
/// Per-sample stats table
pub mod summarize;

use check::CheckReport;
use confirm::{Confirm, Outcome};
use run::RunReport;
use summarize::SummaryFiles;

/// Everything a driver needs, resolved before it starts
pub struct ExecutionContext<'a> {
    pub project: &'a Project,
    pub options: &'a Options,
    pub package: &'a ComputePackage,
    pub submitter: &'a dyn Submitter,
    pub confirm: &'a dyn Confirm,
}

impl<'a> ExecutionContext<'a> {
    /// Project samples after selection and `--limit`
    pub fn samples(&self) -> LoopResult<Vec<&'a Sample>> {
        let selected = self.options.selector.select(&self.project.samples)?;
        let total = selected.len();
        let bound = self.options.limit.map_or(total, |limit| limit.min(total));
        if bound < total {
            info!("Limiting to {} of {} samples", bound, total);
        }
        Ok(selected.into_iter().take(bound).collect())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Driver {
    Run { rerun: bool },
    Collate,
    Clean,
    Destroy,
    Check,
    Summarize,
}

#[derive(Debug)]
pub enum Report {
    Run(RunReport),
    Removal(Outcome),
    Check(CheckReport),
    Summary(SummaryFiles),
}

impl Report {
    pub fn exit_code(&self) -> i32 {
        match self {
            Report::Run(report) => report.exit_code(),
            Report::Removal(outcome) => outcome.exit_code(),
            Report::Check(_) | Report::Summary(_) => 0,
        }
    }
}

impl Driver {
    /// Pick the driver for a subcommand; fails early when the project can't support it
    pub fn new(command: &Command, project: &Project) -> LoopResult<Driver> {
        let driver = match command {
            Command::Run(_) => Driver::Run { rerun: false },
            Command::Rerun(_) => Driver::Run { rerun: true },
            Command::Runp(_) => Driver::Collate,
            Command::Destroy(_) => Driver::Destroy,
            Command::Clean(_) => Driver::Clean,
            Command::Check(_) => Driver::Check,
            Command::Summarize(_) => Driver::Summarize,
        };
        if driver == Driver::Collate && project.project_interfaces.is_empty() {
            return Err(LoopError::Misconfiguration(
                "Collation needs at least one project-level pipeline interface, set with \
                 'project_pipeline_interfaces' in the project config or on the command line"
                    .to_string(),
            ));
        }
        Ok(driver)
    }

    /// Project changes a driver needs before it runs
    ///
    /// Collation fills in the outputs pipeline output schemas declare, so project-level
    /// commands can refer to what sample-level pipelines produce.
    pub fn prepare(&self, project: &mut Project) -> LoopResult<()> {
        if *self == Driver::Collate {
            let populated = project.populate_pipeline_outputs()?;
            info!("Populated {} pipeline output paths", populated);
        }
        Ok(())
    }

    pub fn execute(&self, ctx: &ExecutionContext) -> LoopResult<Report> {
        match self {
            Driver::Run { rerun } => run::run(ctx, *rerun).map(Report::Run),
            Driver::Collate => collate::collate(ctx).map(Report::Run),
            Driver::Clean => clean::clean(ctx).map(Report::Removal),
            Driver::Destroy => clean::destroy(ctx).map(Report::Removal),
            Driver::Check => check::check(ctx).map(Report::Check),
            Driver::Summarize => summarize::summarize(ctx).map(Report::Summary),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compute::package::ComputeConfig;
    use crate::project::ProjectOverrides;
    use crate::submit::conductor::tests::{RecordingSubmitter, TEMPLATE};
    use confirm::AutoConfirm;
    use std::fs;
    use std::path::Path;

    /// A project on disk with one sample-level pipeline `pipe` and `n` samples `s1..=sn`
    pub(crate) fn write_project(root: &Path, n: usize, extra: &str) -> Project {
        fs::write(
            root.join("pipe.yaml"),
            "pipeline_name: pipe\ncommand_template: run {sample.sample_name}\n",
        )
        .unwrap();
        let samples: String = (1..=n).map(|i| format!("  - sample_name: s{i}\n")).collect();
        fs::write(
            root.join("project.yaml"),
            format!("name: demo\noutput_dir: out\npipeline_interfaces: pipe.yaml\n{extra}samples:\n{samples}"),
        )
        .unwrap();
        Project::load(&root.join("project.yaml"), &ProjectOverrides::default()).unwrap()
    }

    pub(crate) fn test_package() -> ComputePackage {
        let mut package = ComputeConfig::default().activate("local").unwrap().clone();
        package.template = TEMPLATE.to_string();
        package
    }

    #[test]
    fn collate_without_project_interfaces_is_misconfiguration() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 1, "");
        let cli = <crate::cli::Cli as clap::Parser>::try_parse_from(["pipeloop", "runp", "project.yaml"]).unwrap();
        assert!(matches!(Driver::new(&cli.command, &project), Err(LoopError::Misconfiguration(_))));
    }

    #[test]
    fn limit_bounds_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 5, "");
        let options = Options { limit: Some(2), ..Default::default() };
        let package = test_package();
        let submitter = RecordingSubmitter::default();
        let ctx = ExecutionContext {
            project: &project,
            options: &options,
            package: &package,
            submitter: &submitter,
            confirm: &AutoConfirm(false),
        };
        let names: Vec<&str> = ctx.samples().unwrap().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["s1", "s2"]);
    }
}
