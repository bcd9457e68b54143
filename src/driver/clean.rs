use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::driver::confirm::{preview_then_confirm, Destructive, Outcome};
use crate::driver::counter::ProgressCounter;
use crate::driver::ExecutionContext;
use crate::error::LoopResult;
use crate::flag::store::list_dir;
use crate::project::sample::Sample;
use crate::project::ProjectInfo;
use crate::submit::dispatch::{CommandSubmitter, Submitter};

const CLEANUP_SUFFIX: &str = "_cleanup.sh";

pub fn clean(ctx: &ExecutionContext) -> LoopResult<Outcome> {
    let samples = ctx.samples()?;
    let mut cleaner = Cleaner::new(samples);
    preview_then_confirm(&mut cleaner, ctx.options.dry_run, ctx.options.force_yes, ctx.confirm)
}

pub fn destroy(ctx: &ExecutionContext) -> LoopResult<Outcome> {
    let samples = ctx.samples()?;
    let mut destroyer = Destroyer::new(&ctx.project.info, samples);
    preview_then_confirm(&mut destroyer, ctx.options.dry_run, ctx.options.force_yes, ctx.confirm)
}

/// Runs the cleanup scripts pipelines leave in sample folders
pub struct Cleaner<'a> {
    samples: Vec<&'a Sample>,
    counter: ProgressCounter,
    runner: CommandSubmitter,
}

impl<'a> Cleaner<'a> {
    pub fn new(samples: Vec<&'a Sample>) -> Self {
        let counter = ProgressCounter::new(samples.len());
        Cleaner {
            samples,
            counter,
            runner: CommandSubmitter { program: "sh".to_string() },
        }
    }
}

/// `*_cleanup.sh` scripts in a folder; none if it doesn't exist
pub fn cleanup_scripts(folder: &Path) -> Vec<PathBuf> {
    list_dir(folder)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.ends_with(CLEANUP_SUFFIX))
        })
        .collect()
}

impl Destructive for Cleaner<'_> {
    fn label(&self) -> &'static str {
        "Clean"
    }

    fn question(&self) -> &'static str {
        "Are you sure you want to permanently delete all intermediate pipeline results for this project?"
    }

    fn preview(&mut self) {
        info!("Files to clean:");
        for sample in &self.samples {
            info!("{}", self.counter.show(&sample.name, "sample", None));
            let scripts = cleanup_scripts(&sample.output_folder);
            let listed = scripts.iter().map(|p| p.display().to_string()).collect::<Vec<_>>();
            info!("Files to clean: {}", listed.join(", "));
        }
    }

    fn execute(&mut self) -> LoopResult<()> {
        self.counter.reset();
        for sample in &self.samples {
            info!("{}", self.counter.show(&sample.name, "sample", None));
            for script in cleanup_scripts(&sample.output_folder) {
                info!("{}", script.display());
                if let Err(reason) = self.runner.submit(&script) {
                    warn!("Cleanup script {} failed: {}", script.display(), reason);
                }
            }
        }
        Ok(())
    }
}

/// Removes sample output folders and project summary artifacts
pub struct Destroyer<'a> {
    project: &'a ProjectInfo,
    samples: Vec<&'a Sample>,
    counter: ProgressCounter,
}

impl<'a> Destroyer<'a> {
    pub fn new(project: &'a ProjectInfo, samples: Vec<&'a Sample>) -> Self {
        let counter = ProgressCounter::new(samples.len());
        Destroyer { project, samples, counter }
    }
}

/// Project-level files and folders written by summaries and reports
pub fn summary_targets(project: &ProjectInfo) -> Vec<PathBuf> {
    let name = &project.name;
    vec![
        project.output_dir.join(format!("{name}_summary.html")),
        project.output_dir.join(format!("{name}_stats_summary.tsv")),
        project.output_dir.join(format!("{name}_objs_summary.tsv")),
        project.output_dir.join("reports"),
    ]
}

impl Destructive for Destroyer<'_> {
    fn label(&self) -> &'static str {
        "Destroy"
    }

    fn question(&self) -> &'static str {
        "Are you sure you want to permanently delete all pipeline results for this project?"
    }

    fn preview(&mut self) {
        info!("Removing results:");
        for sample in &self.samples {
            info!("{}", self.counter.show(&sample.name, "sample", None));
            info!("{}", sample.output_folder.display());
        }
        info!("Removing summary:");
        for target in summary_targets(self.project) {
            if target.exists() {
                info!("{}", target.display());
            } else {
                info!("{} does not exist.", target.display());
            }
        }
    }

    fn execute(&mut self) -> LoopResult<()> {
        self.counter.reset();
        for sample in &self.samples {
            info!("{}", self.counter.show(&sample.name, "sample", None));
            remove_path(&sample.output_folder)?;
        }
        for target in summary_targets(self.project) {
            remove_path(&target)?;
        }
        Ok(())
    }
}

fn remove_path(path: &Path) -> LoopResult<()> {
    if !path.exists() {
        info!("{} does not exist.", path.display());
        return Ok(());
    }
    info!("Removing: {}", path.display());
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::confirm::tests::CountingConfirm;
    use crate::driver::confirm::{AutoConfirm, Confirm};
    use crate::driver::tests::{test_package, write_project};
    use crate::options::Options;
    use crate::project::Project;
    use crate::submit::conductor::tests::RecordingSubmitter;

    fn populate(project: &Project) {
        for sample in &project.samples {
            fs::create_dir_all(&sample.output_folder).unwrap();
            fs::write(sample.output_folder.join("pipe_completed.flag"), "").unwrap();
            fs::write(sample.output_folder.join("pipe_cleanup.sh"), "touch cleaned\n").unwrap();
        }
        fs::write(project.info.output_dir.join("demo_stats_summary.tsv"), "x\n").unwrap();
    }

    fn removal(
        project: &Project,
        dry_run: bool,
        force_yes: bool,
        confirm: &dyn Confirm,
        destroy_it: bool,
    ) -> Outcome {
        let options = Options { dry_run, force_yes, ..Default::default() };
        let package = test_package();
        let submitter = RecordingSubmitter::default();
        let ctx = ExecutionContext {
            project,
            options: &options,
            package: &package,
            submitter: &submitter,
            confirm,
        };
        if destroy_it {
            destroy(&ctx).unwrap()
        } else {
            clean(&ctx).unwrap()
        }
    }

    #[test]
    fn destroy_dry_run_keeps_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 2, "");
        populate(&project);
        let confirm = CountingConfirm::new(true);

        let outcome = removal(&project, true, true, &confirm, true);
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(confirm.asked.get(), 0);
        assert!(project.samples[0].output_folder.is_dir());
        assert!(project.info.output_dir.join("demo_stats_summary.tsv").is_file());
    }

    #[test]
    fn destroy_declined_then_forced() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 2, "");
        populate(&project);

        assert_eq!(removal(&project, false, false, &AutoConfirm(false), true), Outcome::Aborted);
        assert!(project.samples[1].output_folder.is_dir());

        assert_eq!(removal(&project, false, true, &AutoConfirm(false), true), Outcome::Completed);
        assert!(!project.samples[0].output_folder.exists());
        assert!(!project.samples[1].output_folder.exists());
        assert!(!project.info.output_dir.join("demo_stats_summary.tsv").exists());
    }

    #[test]
    fn clean_runs_cleanup_scripts_once_confirmed() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 1, "");
        populate(&project);
        let folder = &project.samples[0].output_folder;
        assert_eq!(cleanup_scripts(folder), vec![folder.join("pipe_cleanup.sh")]);

        assert_eq!(removal(&project, true, true, &AutoConfirm(true), false), Outcome::DryRun);
        assert!(!folder.join("cleaned").exists());

        assert_eq!(removal(&project, false, false, &AutoConfirm(true), false), Outcome::Completed);
        assert!(folder.join("cleaned").exists());
    }
}
