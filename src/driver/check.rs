use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::driver::ExecutionContext;
use crate::error::LoopResult;
use crate::flag::store::{self, fetch_flag_files, subfolders, FlagFiles};
use crate::flag::Flag;

/// Flag counts found by a check
#[derive(Debug, Default)]
pub struct CheckReport {
    pub counts: BTreeMap<Flag, usize>,
    pub folders_checked: usize,
}

/// Count flag files over sample folders and list them, a bounded number per flag
pub fn check(ctx: &ExecutionContext) -> LoopResult<CheckReport> {
    let options = &ctx.options.check;
    let project = ctx.project;
    let flags = &options.flags;
    let flag_text = flags.iter().map(Flag::to_string).collect::<Vec<_>>().join(", ");
    debug!("Checking project folders for flags: {}", flag_text);

    let samples = ctx.samples()?;
    let folders: Vec<PathBuf> = if options.all_folders {
        subfolders(&project.info.results_folder).unwrap_or_else(|err| {
            warn!("Can't list {}: {}", project.info.results_folder.display(), err);
            Vec::new()
        })
    } else {
        samples.iter().map(|s| s.output_folder.clone()).collect()
    };

    let found = fetch_flag_files(&folders, flags, options.pipeline.as_deref());
    for flag in flags {
        info!("{}: {}", flag.to_string().to_uppercase(), found.count(*flag));
    }
    log_file_lists(&found, flags, options.max_file_count);

    for sample in &samples {
        for piface in project.sample_interfaces(&sample.name) {
            if options.pipeline.as_deref().map_or(true, |p| p == piface.name) {
                let status = store::status(&sample.output_folder, &piface.name);
                debug!("{} / {}: {}", sample.name, piface.name, status);
            }
        }
    }

    Ok(CheckReport {
        counts: flags.iter().map(|f| (*f, found.count(*f))).collect(),
        folders_checked: folders.len(),
    })
}

fn log_file_lists(found: &FlagFiles, flags: &[Flag], max_file_count: usize) {
    for flag in flags {
        let (shown, hidden) = found.capped(*flag, max_file_count);
        if shown.is_empty() {
            continue;
        }
        let listed = shown.iter().map(|p| p.display().to_string()).collect::<Vec<_>>();
        info!(
            "{} ({}):\n{}",
            flag.to_string().to_uppercase(),
            found.count(*flag),
            listed.join("\n")
        );
        if hidden > 0 {
            info!("... and {} more", hidden);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::confirm::AutoConfirm;
    use crate::driver::tests::{test_package, write_project};
    use crate::options::{CheckOptions, Options};
    use crate::submit::conductor::tests::RecordingSubmitter;
    use std::fs;

    #[test]
    fn counts_requested_flags_only() {
        let tmp = tempfile::tempdir().unwrap();
        let project = write_project(tmp.path(), 4, "");
        for (sample, flag) in project.samples.iter().zip(["completed", "completed", "failed"]) {
            fs::create_dir_all(&sample.output_folder).unwrap();
            fs::write(sample.output_folder.join(format!("pipe_{flag}.flag")), "").unwrap();
        }
        let stray = project.info.results_folder.join("stray");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join("pipe_running.flag"), "").unwrap();

        let mut options = Options {
            check: CheckOptions { flags: vec![Flag::Completed, Flag::Failed], ..Default::default() },
            ..Default::default()
        };
        let package = test_package();
        let submitter = RecordingSubmitter::default();
        let report = {
            let ctx = ExecutionContext {
                project: &project,
                options: &options,
                package: &package,
                submitter: &submitter,
                confirm: &AutoConfirm(false),
            };
            check(&ctx).unwrap()
        };
        assert_eq!(report.counts[&Flag::Completed], 2);
        assert_eq!(report.counts[&Flag::Failed], 1);
        assert!(!report.counts.contains_key(&Flag::Running));
        assert_eq!(report.folders_checked, 4);

        options.check = CheckOptions { all_folders: true, ..Default::default() };
        let ctx = ExecutionContext {
            project: &project,
            options: &options,
            package: &package,
            submitter: &submitter,
            confirm: &AutoConfirm(false),
        };
        let report = check(&ctx).unwrap();
        assert_eq!(report.counts[&Flag::Running], 1);
        assert_eq!(report.folders_checked, 4);
    }
}
