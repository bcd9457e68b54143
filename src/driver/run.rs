use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use log::{info, warn};

use crate::driver::counter::ProgressCounter;
use crate::driver::failure::FailureAggregator;
use crate::driver::ExecutionContext;
use crate::error::{LoopError, LoopResult};
use crate::pipeline::interface::PipelineInterface;
use crate::pipeline::schema::{load_schema, InputSchema};
use crate::submit::conductor::{ConductorContext, SubmissionConductor};

pub const NO_INTERFACES_REASON: &str = "No pipeline interfaces defined";

/// Totals of one run or collation
#[derive(Debug, Default)]
pub struct RunReport {
    pub samples_total: usize,
    /// Samples with at least one applicable pipeline
    pub samples_processed: usize,
    pub commands_possible: usize,
    pub job_submissions: usize,
    pub cmd_submissions: usize,
    /// Scripts whose submission failed
    pub failed_scripts: Vec<PathBuf>,
    pub failures: BTreeMap<String, BTreeSet<String>>,
    pub dry_run: bool,
}

impl RunReport {
    /// Skipped samples are expected; only failed submissions make a run fail
    pub fn exit_code(&self) -> i32 {
        if self.failed_scripts.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Submit every selected sample to every pipeline that applies to it
pub fn run(ctx: &ExecutionContext, rerun: bool) -> LoopResult<RunReport> {
    let project = ctx.project;
    let options = ctx.options;
    let samples = ctx.samples()?;
    if !options.dry_run {
        project.make_project_dirs()?;
    }

    let mut report = RunReport {
        samples_total: samples.len(),
        dry_run: options.dry_run,
        ..Default::default()
    };
    let mut failures = FailureAggregator::default();
    let schemas = load_input_schemas(&project.interfaces);

    let conductor_ctx = ConductorContext {
        project: &project.info,
        template: &ctx.package.template,
        settings: &options.submission,
        submitter: ctx.submitter,
    };
    let mut conductors: Vec<SubmissionConductor> = project
        .interfaces
        .iter()
        .map(|piface| SubmissionConductor::new(piface, conductor_ctx, options.compute_for(ctx.package, piface)))
        .collect();

    let total = samples
        .iter()
        .map(|s| project.sample_interface_ids(&s.name).len())
        .sum();
    let mut counter = ProgressCounter::new(total);

    for sample in &samples {
        let ids = project.sample_interface_ids(&sample.name);
        if ids.is_empty() {
            warn!("{}", not_submitted(&sample.name, NO_INTERFACES_REASON));
            failures.record(&sample.name, NO_INTERFACES_REASON);
            continue;
        }
        report.samples_processed += 1;

        for &id in ids {
            let conductor = &mut conductors[id];
            let piface = conductor.piface;
            let pipeline_name = piface.name.as_str();
            info!("{}", counter.show(&sample.name, "sample", Some(pipeline_name)));
            report.commands_possible += 1;

            match &schemas[id] {
                SchemaState::Unavailable => {
                    failures.record(&sample.name, format!("Input schema unavailable for pipeline {pipeline_name}"));
                    continue;
                }
                SchemaState::Loaded(schema) => {
                    if schema.validate(sample, pipeline_name).is_err() {
                        failures.record(&sample.name, format!("Input schema validation failed for pipeline {pipeline_name}"));
                        continue;
                    }
                }
                SchemaState::None => {}
            }

            if let Some(reasons) = absorb(conductor.add_sample(sample, rerun), &mut report.failed_scripts)? {
                failures.record_all(&sample.name, reasons);
            }
        }
    }

    for conductor in conductors.iter_mut() {
        absorb(conductor.submit(true), &mut report.failed_scripts)?;
        report.job_submissions += conductor.num_job_submissions;
        report.cmd_submissions += conductor.num_cmd_submissions;
        let skipped = conductor.write_skipped_sample_scripts();
        if !skipped.is_empty() {
            info!("Wrote {} skipped sample scripts for {}", skipped.len(), conductor.piface.name);
        }
        for sample in &conductor.failed_samples {
            failures.record_submission_failure(&conductor.piface.name, sample);
        }
    }

    report.failures = failures.summarize();
    let failed: BTreeSet<&String> = report.failures.values().flatten().collect();
    info!("Run finished");
    info!(
        "Samples valid for job generation: {} of {}",
        report.samples_processed, report.samples_total
    );
    info!(
        "Successful samples: {} of {}",
        report.samples_total.saturating_sub(failed.len()),
        report.samples_total
    );
    info!(
        "Commands submitted: {} of {}",
        report.cmd_submissions, report.commands_possible
    );
    info!("Jobs submitted: {}", report.job_submissions);
    if options.dry_run {
        info!("Dry run. No jobs were actually submitted.");
    }
    failures.log_summary();
    Ok(report)
}

/// A failed submission is recorded and the run goes on; anything else stops it
pub(crate) fn absorb<T>(result: LoopResult<T>, failed_scripts: &mut Vec<PathBuf>) -> LoopResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(LoopError::Submission { script, .. }) => {
            failed_scripts.push(script);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

enum SchemaState {
    None,
    Loaded(InputSchema),
    Unavailable,
}

/// One entry per interface, in the same order
fn not_submitted(sample: &str, reason: &str) -> String {
    format!("> Not submitted: {sample} ({reason})")
}

fn load_input_schemas(interfaces: &[PipelineInterface]) -> Vec<SchemaState> {
    interfaces
        .iter()
        .map(|piface| match &piface.input_schema {
            None => SchemaState::None,
            Some(path) => match load_schema(path) {
                Ok(schema) => SchemaState::Loaded(schema),
                Err(err) => {
                    warn!("Can't use input schema of {}: {err:#}", piface.name);
                    SchemaState::Unavailable
                }
            },
        })
        .collect()
}
