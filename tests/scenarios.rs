use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use pipeloop::cli::Cli;
use pipeloop::compute::package::{ComputeConfig, ComputePackage};
use pipeloop::driver::confirm::AutoConfirm;
use pipeloop::driver::{Driver, ExecutionContext, Report};
use pipeloop::error::LoopError;
use pipeloop::flag::Flag;
use pipeloop::options::Options;
use pipeloop::project::{Project, ProjectOverrides};
use pipeloop::submit::dispatch::Submitter;

#[derive(Default)]
struct Recorder {
    scripts: RefCell<Vec<PathBuf>>,
}

impl Submitter for Recorder {
    fn submit(&self, script: &Path) -> Result<(), String> {
        self.scripts.borrow_mut().push(script.to_path_buf());
        Ok(())
    }
}

fn write_project(root: &Path, samples: usize) -> PathBuf {
    fs::write(
        root.join("pipe.yaml"),
        "pipeline_name: pipe\ncommand_template: run {sample.sample_name}\n",
    )
    .unwrap();
    let listed: String = (1..=samples).map(|i| format!("  - sample_name: s{i}\n")).collect();
    let config = root.join("project.yaml");
    fs::write(
        &config,
        format!("name: demo\noutput_dir: out\npipeline_interfaces: pipe.yaml\nsamples:\n{listed}"),
    )
    .unwrap();
    config
}

fn local_package() -> ComputePackage {
    let mut package = ComputeConfig::default().activate("local").unwrap().clone();
    package.template = "#!/bin/bash\n{code}\n".to_string();
    package
}

/// Parse a command line, load the project and run the matching driver
fn execute(argv: &[&str], submitter: &Recorder) -> (Project, Report) {
    let cli = Cli::try_parse_from(argv).unwrap();
    let args = cli.command.project_args();
    let project = Project::load(&args.config_file, &ProjectOverrides::default()).unwrap();
    let options = Options::resolve(&cli.command, &project.defaults).unwrap();
    let driver = Driver::new(&cli.command, &project).unwrap();
    let package = local_package();
    let report = {
        let ctx = ExecutionContext {
            project: &project,
            options: &options,
            package: &package,
            submitter,
            confirm: &AutoConfirm(true),
        };
        driver.execute(&ctx).unwrap()
    };
    (project, report)
}

#[test]
fn three_samples_lumped_by_two() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_project(tmp.path(), 3);
    let submitter = Recorder::default();

    let (project, report) = execute(&["pipeloop", "run", config.to_str().unwrap(), "--lumpn", "2"], &submitter);
    let Report::Run(report) = report else { panic!("expected a run report") };
    assert_eq!(report.job_submissions, 2);
    assert_eq!(report.cmd_submissions, 3);
    assert!(report.failures.is_empty());

    let scripts = submitter.scripts.borrow();
    assert_eq!(scripts.len(), 2);
    let lump = fs::read_to_string(&scripts[0]).unwrap();
    assert_eq!(lump, "#!/bin/bash\nrun s1\nrun s2\n");
    assert_eq!(scripts[1], project.info.submission_folder.join("pipe_s3.sub"));
}

#[test]
fn completed_sample_is_never_batched() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_project(tmp.path(), 2);
    let done = tmp.path().join("out/results_pipeline/s1");
    fs::create_dir_all(&done).unwrap();
    fs::write(done.join("pipe_completed.flag"), "").unwrap();
    let submitter = Recorder::default();

    let (_, report) = execute(&["pipeloop", "run", config.to_str().unwrap(), "--lumpn", "5"], &submitter);
    let Report::Run(report) = report else { panic!("expected a run report") };
    assert_eq!(report.cmd_submissions, 1);
    let (reason, samples) = report.failures.iter().next().unwrap();
    assert!(reason.contains("completed"));
    assert!(samples.contains("s1"));
    let script = fs::read_to_string(&submitter.scripts.borrow()[0]).unwrap();
    assert!(!script.contains("run s1"));
}

#[test]
fn destroy_dry_run_leaves_output_alone() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_project(tmp.path(), 2);
    let results = tmp.path().join("out/results_pipeline/s1");
    fs::create_dir_all(&results).unwrap();
    let submitter = Recorder::default();

    let (_, report) = execute(&["pipeloop", "destroy", config.to_str().unwrap(), "--dry-run"], &submitter);
    assert_eq!(report.exit_code(), 0);
    assert!(results.is_dir());
}

#[test]
fn check_counts_completed_and_failed() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_project(tmp.path(), 10);
    for i in 1..=9 {
        let folder = tmp.path().join(format!("out/results_pipeline/s{i}"));
        fs::create_dir_all(&folder).unwrap();
        let flag = if i <= 7 { "completed" } else { "failed" };
        fs::write(folder.join(format!("pipe_{flag}.flag")), "").unwrap();
    }
    let submitter = Recorder::default();

    let (_, report) = execute(
        &["pipeloop", "check", config.to_str().unwrap(), "--flags", "completed", "failed", "--max-file-count", "5"],
        &submitter,
    );
    let Report::Check(report) = report else { panic!("expected a check report") };
    assert_eq!(report.counts[&Flag::Completed], 7);
    assert_eq!(report.counts[&Flag::Failed], 2);
    assert_eq!(report.counts.len(), 2);
}

#[test]
fn malformed_compute_spec_names_the_bad_token() {
    let cli = Cli::try_parse_from(["pipeloop", "run", "project.yaml", "--compute", "mem=32000,badtoken,cores=4"]).unwrap();
    let err = Options::resolve(&cli.command, &Default::default()).unwrap_err();
    assert!(matches!(err.downcast_ref::<LoopError>(), Some(LoopError::ComputeSpec { .. })));
    let message = err.to_string();
    assert!(message.contains("badtoken"));
    assert!(message.contains("k1=v1,k2=v2"));
}
