use log::{info, warn};

use crate::driver::counter::ProgressCounter;
use crate::driver::failure::FailureAggregator;
use crate::driver::run::{absorb, RunReport};
use crate::driver::ExecutionContext;
use crate::error::LoopResult;
use crate::submit::conductor::{ConductorContext, SubmissionConductor};

/// Submit each project-level pipeline once for the whole project
pub fn collate(ctx: &ExecutionContext) -> LoopResult<RunReport> {
    let project = ctx.project;
    let options = ctx.options;
    let interfaces = &project.project_interfaces;
    let mut report = RunReport { dry_run: options.dry_run, ..Default::default() };
    if interfaces.is_empty() {
        warn!("No pipelines found to run for this project");
        return Ok(report);
    }
    if !options.dry_run {
        project.make_project_dirs()?;
    }

    let conductor_ctx = ConductorContext {
        project: &project.info,
        template: &ctx.package.template,
        settings: &options.submission,
        submitter: ctx.submitter,
    };
    let mut failures = FailureAggregator::default();
    let mut counter = ProgressCounter::new(interfaces.len());

    for piface in interfaces {
        info!("{}", counter.show(&project.info.name, "project", Some(&piface.name)));
        report.commands_possible += 1;
        let compute = options.compute_for(ctx.package, piface);
        let mut conductor = SubmissionConductor::collator(piface, conductor_ctx, compute);

        let reasons = conductor.add_project()?;
        if !reasons.is_empty() {
            failures.record_all(&project.info.name, reasons);
            continue;
        }
        if absorb(conductor.submit(true), &mut report.failed_scripts)?.is_none() {
            failures.record_submission_failure(&piface.name, &project.info.name);
        }
        report.job_submissions += conductor.num_job_submissions;
        report.cmd_submissions += conductor.num_cmd_submissions;
    }

    report.failures = failures.summarize();
    info!("Collation finished");
    info!("Jobs submitted: {}", report.job_submissions);
    if options.dry_run {
        info!("Dry run. No jobs were actually submitted.");
    }
    failures.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::confirm::AutoConfirm;
    use crate::driver::tests::test_package;
    use crate::driver::Driver;
    use crate::options::Options;
    use crate::project::{Project, ProjectOverrides};
    use crate::submit::conductor::tests::RecordingSubmitter;
    use std::fs;

    #[test]
    fn one_job_per_project_pipeline_and_flags_respected() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["merge", "report"] {
            fs::write(
                tmp.path().join(format!("{name}.yaml")),
                format!("pipeline_name: {name}\npipeline_type: project\ncommand_template: {name} {{project.name}}\n"),
            )
            .unwrap();
        }
        fs::write(
            tmp.path().join("project.yaml"),
            "name: demo\noutput_dir: out\nproject_pipeline_interfaces: [merge.yaml, report.yaml]\nsamples:\n  - sample_name: s1\n  - sample_name: s2\n",
        )
        .unwrap();
        let project = Project::load(&tmp.path().join("project.yaml"), &ProjectOverrides::default()).unwrap();
        fs::create_dir_all(&project.info.results_folder).unwrap();
        fs::write(project.info.results_folder.join("report_completed.flag"), "").unwrap();

        let options = Options::default();
        let package = test_package();
        let submitter = RecordingSubmitter::default();
        let ctx = ExecutionContext {
            project: &project,
            options: &options,
            package: &package,
            submitter: &submitter,
            confirm: &AutoConfirm(false),
        };
        let report = collate(&ctx).unwrap();

        assert_eq!(report.job_submissions, 1);
        assert_eq!(report.cmd_submissions, 1);
        let scripts = submitter.scripts.borrow();
        assert_eq!(scripts.as_slice(), &[project.info.submission_folder.join("merge_demo.sub")]);
        let content = fs::read_to_string(&scripts[0]).unwrap();
        assert!(content.contains("merge demo"));
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures.keys().next().unwrap().contains("report"));
    }

    #[test]
    fn project_command_sees_sample_pipeline_outputs() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("outputs.yaml"),
            "properties:\n  counts:\n    path: '{name}_counts.tsv'\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("count.yaml"),
            "pipeline_name: count\noutput_schema: outputs.yaml\ncommand_template: count {sample.sample_name}\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("merge.yaml"),
            "pipeline_name: merge\npipeline_type: project\ncommand_template: merge {project.outputs.counts}\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("project.yaml"),
            "name: demo\noutput_dir: out\npipeline_interfaces: count.yaml\nproject_pipeline_interfaces: merge.yaml\nsamples:\n  - sample_name: s1\n",
        )
        .unwrap();
        let mut project = Project::load(&tmp.path().join("project.yaml"), &ProjectOverrides::default()).unwrap();
        Driver::Collate.prepare(&mut project).unwrap();

        let options = Options::default();
        let package = test_package();
        let submitter = RecordingSubmitter::default();
        let ctx = ExecutionContext {
            project: &project,
            options: &options,
            package: &package,
            submitter: &submitter,
            confirm: &AutoConfirm(false),
        };
        let report = collate(&ctx).unwrap();
        assert_eq!(report.job_submissions, 1);

        let content = fs::read_to_string(&submitter.scripts.borrow()[0]).unwrap();
        let counts = tmp.path().join("out/demo_counts.tsv");
        assert!(content.contains(&format!("merge {}", counts.display())), "{content}");
    }
}
