use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::compute::ComputeVariables;
use crate::error::{LoopError, LoopResult};
use crate::flag::store;
use crate::flag::Flag;
use crate::pipeline::interface::PipelineInterface;
use crate::project::sample::{Sample, COMMAND_EXTRA_ATTR};
use crate::project::ProjectInfo;
use crate::submit::batch::{PendingBatch, PendingCommand, Thresholds};
use crate::submit::dispatch::Submitter;
use crate::submit::script::{script_path, SubmissionScript};

/// Run-wide submission settings shared by every conductor
#[derive(Debug, Clone, Default)]
pub struct SubmissionSettings {
    pub dry_run: bool,
    pub ignore_flags: bool,
    pub thresholds: Thresholds,
    /// CLI arguments passed through to every pipeline command
    pub extra_args: Vec<String>,
    pub command_extra: String,
    /// Replaces both the sample's and the CLI command extra when set
    pub command_extra_override: Option<String>,
    /// Seconds to wait between consecutive job submissions
    pub time_delay: u64,
}

/// Everything a conductor borrows from the run
#[derive(Clone, Copy)]
pub struct ConductorContext<'a> {
    pub project: &'a ProjectInfo,
    /// Submission template of the active compute package
    pub template: &'a str,
    pub settings: &'a SubmissionSettings,
    pub submitter: &'a dyn Submitter,
}

/// Owns one pipeline interface's submission lifecycle for one run
///
/// Eligible commands accumulate in a pending batch; the batch is flushed into a single job as
/// soon as a lumping threshold is reached, and once more at the end of the run.
pub struct SubmissionConductor<'a> {
    pub piface: &'a PipelineInterface,
    ctx: ConductorContext<'a>,
    compute: ComputeVariables,
    collate: bool,
    batch: PendingBatch,
    seen: HashSet<String>,
    skipped: Vec<PendingCommand>,
    pub failed_samples: Vec<String>,
    pub num_job_submissions: usize,
    pub num_cmd_submissions: usize,
    jobs_attempted: usize,
}

impl<'a> SubmissionConductor<'a> {
    /// `compute` must already be resolved for this interface (see `Options::compute_for`)
    pub fn new(piface: &'a PipelineInterface, ctx: ConductorContext<'a>, compute: ComputeVariables) -> Self {
        SubmissionConductor {
            piface,
            ctx,
            compute,
            collate: false,
            batch: PendingBatch::default(),
            seen: HashSet::new(),
            skipped: Vec::new(),
            failed_samples: Vec::new(),
            num_job_submissions: 0,
            num_cmd_submissions: 0,
            jobs_attempted: 0,
        }
    }

    /// A conductor for a project-level pipeline: one pseudo-unit, never lumped
    pub fn collator(piface: &'a PipelineInterface, ctx: ConductorContext<'a>, compute: ComputeVariables) -> Self {
        let mut conductor = SubmissionConductor::new(piface, ctx, compute);
        conductor.collate = true;
        conductor
    }

    pub fn pending(&self) -> &PendingBatch {
        &self.batch
    }

    /// Consider a sample for this pipeline
    ///
    /// Returns the reasons the sample was skipped, empty if it was added to the pending batch.
    /// A skipped sample leaves the batch untouched. Adding may fill the batch, which is then
    /// submitted right away; a failure of that submission is returned as an error.
    pub fn add_sample(&mut self, sample: &Sample, rerun: bool) -> LoopResult<Vec<String>> {
        let piface = self.piface;
        let name = &piface.name;
        if self.seen.contains(&sample.name) {
            return Ok(vec![format!("Sample already submitted for pipeline {name}")]);
        }
        if sample.is_toggled_off() {
            info!("> Skipping sample {}: toggled off", sample.name);
            return Ok(vec!["Sample toggled off".to_string()]);
        }

        let flags = self.observed_flags(&sample.output_folder);
        let command_extra = self.command_extra(sample.attr(COMMAND_EXTRA_ATTR));
        let command = piface.render_command(
            sample,
            self.ctx.project,
            &self.compute,
            &self.ctx.settings.extra_args,
            &command_extra,
        );

        let mut reasons = self.flag_reasons(&flags, rerun);
        if !reasons.is_empty() {
            info!("> Skipping sample {}. {}", sample.name, reasons.join("; "));
            // Unflagged samples skipped by a rerun were never run and get no script
            if let (false, Ok(command)) = (flags.is_empty(), command) {
                self.skipped.push(PendingCommand {
                    name: sample.name.clone(),
                    command,
                    output_folder: sample.output_folder.clone(),
                });
            }
            return Ok(reasons);
        }

        let command = match command {
            Ok(command) => command,
            Err(err) => {
                warn!("> Can't render command for {}: {}", sample.name, err);
                reasons.push(format!("Command rendering failed for pipeline {name}"));
                return Ok(reasons);
            }
        };
        debug!("Command for {}: {}", sample.name, command);

        let size = sample.input_size_gb(&piface.input_attributes, &self.ctx.project.config_dir);
        self.seen.insert(sample.name.clone());
        self.batch.push(
            PendingCommand {
                name: sample.name.clone(),
                command,
                output_folder: sample.output_folder.clone(),
            },
            size,
        );
        self.submit(false)?;
        Ok(reasons)
    }

    /// Queue the single project-level unit of a collating pipeline
    pub fn add_project(&mut self) -> LoopResult<Vec<String>> {
        let project = self.ctx.project;
        if self.seen.contains(&project.name) {
            return Ok(vec![format!("Project already submitted for pipeline {}", self.piface.name)]);
        }
        let flags = self.observed_flags(&project.results_folder);
        let reasons = self.flag_reasons(&flags, false);
        if !reasons.is_empty() {
            info!("> Skipping project {}. {}", project.name, reasons.join("; "));
            return Ok(reasons);
        }

        let command_extra = self.command_extra(None);
        let command = match self.piface.render_project_command(
            project,
            &self.compute,
            &self.ctx.settings.extra_args,
            &command_extra,
        ) {
            Ok(command) => command,
            Err(err) => {
                warn!("> Can't render command for project {}: {}", project.name, err);
                return Ok(vec![format!("Command rendering failed for pipeline {}", self.piface.name)]);
            }
        };
        self.seen.insert(project.name.clone());
        self.batch.push(
            PendingCommand {
                name: project.name.clone(),
                command,
                output_folder: project.results_folder.clone(),
            },
            0.0,
        );
        Ok(reasons)
    }

    /// Flush the pending batch into one job
    ///
    /// Without `force` the batch is only flushed when a threshold has been reached. Returns
    /// whether a job was rendered and dispatched (or would have been, in a dry run).
    pub fn submit(&mut self, force: bool) -> LoopResult<bool> {
        if self.batch.is_empty() {
            return Ok(false);
        }
        if !force && !self.batch.is_full(&self.ctx.settings.thresholds) {
            return Ok(false);
        }

        let num_cmds = self.batch.len();
        let items = self.batch.take();
        self.jobs_attempted += 1;
        let job_name = self.job_name(&items);
        let samples: Vec<String> = items.iter().map(|i| i.name.clone()).collect();
        let commands: Vec<String> = items.iter().map(|i| i.command.clone()).collect();
        let script = match self.render_script(&job_name, &commands) {
            Ok(script) => script,
            Err(err) => {
                warn!("Can't render submission script for {}: {}", job_name, err);
                if !self.collate {
                    self.failed_samples.extend(samples.iter().cloned());
                }
                return Err(LoopError::Submission {
                    script: script_path(&self.ctx.project.submission_folder, &job_name),
                    samples,
                    reason: err.to_string(),
                });
            }
        };

        if self.ctx.settings.dry_run {
            info!("Dry run, not submitted: {}", script.path.display());
            debug!("{}", script.content);
        } else if let Err(reason) = self.dispatch(&script, &items) {
            warn!("Job submission failed for {}: {}", job_name, reason);
            if !self.collate {
                self.failed_samples.extend(samples.iter().cloned());
            }
            return Err(LoopError::Submission { script: script.path, samples, reason });
        }

        self.num_job_submissions += 1;
        self.num_cmd_submissions += num_cmds;
        Ok(true)
    }

    /// Persist would-be scripts of flag-blocked samples so they can be submitted by hand
    ///
    /// Nothing is written in a dry run. Returns the written paths.
    pub fn write_skipped_sample_scripts(&self) -> Vec<PathBuf> {
        let mut written = Vec::new();
        if self.ctx.settings.dry_run {
            return written;
        }
        for item in &self.skipped {
            let job_name = format!("{}_{}", self.piface.name, item.name);
            let path = self
                .ctx
                .project
                .submission_folder
                .join(format!("{job_name}.skipped.sub"));
            let script = SubmissionScript::render(
                self.ctx.template,
                &self.job_compute(&job_name),
                &[item.command.clone()],
                path,
            );
            match script.map(|s| s.write().map(|_| s.path)) {
                Ok(Ok(path)) => written.push(path),
                Ok(Err(err)) => warn!("Can't write skipped sample script for {}: {}", item.name, err),
                Err(err) => warn!("Can't render skipped sample script for {}: {}", item.name, err),
            }
        }
        written
    }

    fn observed_flags(&self, folder: &std::path::Path) -> BTreeSet<Flag> {
        match store::flags(folder, &self.piface.name) {
            Ok(flags) => flags,
            Err(LoopError::NotFound(_)) => BTreeSet::new(),
            Err(err) => {
                warn!("Can't read flags in {}: {}", folder.display(), err);
                BTreeSet::new()
            }
        }
    }

    /// `ignore_flags` always wins. A rerun only resubmits samples with a failed flag; otherwise
    /// any flag at all blocks submission.
    fn flag_reasons(&self, flags: &BTreeSet<Flag>, rerun: bool) -> Vec<String> {
        if self.ctx.settings.ignore_flags {
            return Vec::new();
        }
        let listed = flags.iter().map(Flag::to_string).collect::<Vec<_>>().join(", ");
        if rerun {
            if flags.contains(&Flag::Failed) {
                info!("> Re-running failed sample");
                return Vec::new();
            }
            return vec![format!(
                "No failed flag for pipeline {}; rerun only resubmits failed samples",
                self.piface.name
            )];
        }
        if flags.is_empty() {
            Vec::new()
        } else {
            vec![format!("Found existing flags for pipeline {}: {}", self.piface.name, listed)]
        }
    }

    fn command_extra(&self, sample_extra: Option<String>) -> String {
        let settings = self.ctx.settings;
        if let Some(over) = &settings.command_extra_override {
            return over.clone();
        }
        [sample_extra.unwrap_or_default(), settings.command_extra.clone()]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn job_name(&self, items: &[PendingCommand]) -> String {
        let pipeline = &self.piface.name;
        match items {
            _ if self.collate => format!("{pipeline}_{}", self.ctx.project.name),
            [single] => format!("{pipeline}_{}", single.name),
            _ => format!("{pipeline}_lump{}", self.jobs_attempted),
        }
    }

    fn job_compute(&self, job_name: &str) -> ComputeVariables {
        let mut compute = self.compute.clone();
        compute.insert("job_name", job_name);
        let logfile = self.ctx.project.submission_folder.join(format!("{job_name}.log"));
        compute.insert("logfile", logfile.display().to_string());
        compute
    }

    fn render_script(&self, job_name: &str, commands: &[String]) -> LoopResult<SubmissionScript> {
        let path = script_path(&self.ctx.project.submission_folder, job_name);
        SubmissionScript::render(self.ctx.template, &self.job_compute(job_name), commands, path)
    }

    fn dispatch(&self, script: &SubmissionScript, items: &[PendingCommand]) -> Result<(), String> {
        for item in items {
            fs::create_dir_all(&item.output_folder).map_err(|err| {
                format!("could not create output folder {}: {}", item.output_folder.display(), err)
            })?;
        }
        script
            .write()
            .map_err(|err| format!("could not write {}: {}", script.path.display(), err))?;
        if self.ctx.settings.time_delay > 0 && self.num_job_submissions > 0 {
            thread::sleep(Duration::from_secs(self.ctx.settings.time_delay));
        }
        self.ctx.submitter.submit(&script.path)
    }
}
