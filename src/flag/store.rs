use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{LoopError, LoopResult};
use crate::flag::{Flag, Status, FLAGS};

/// Every flag present in `directory` for `pipeline_name`
///
/// Zero, one or many flags are all valid observations: pipelines write flags out of process and
/// nothing is locked. More than one flag is warned about but never treated as an error.
pub fn flags(directory: &Path, pipeline_name: &str) -> LoopResult<BTreeSet<Flag>> {
    if !directory.is_dir() {
        return Err(LoopError::NotFound(directory.to_path_buf()));
    }
    let found: BTreeSet<Flag> = FLAGS
        .into_iter()
        .filter(|flag| directory.join(flag.file_name(pipeline_name)).exists())
        .collect();
    if found.len() > 1 {
        warn!(
            "Multiple flag files ({}) found for {} in: {}",
            found.len(),
            pipeline_name,
            directory.display()
        );
    }
    Ok(found)
}

/// Classify a folder for one pipeline; an unreadable or absent folder is `Unknown`
pub fn status(directory: &Path, pipeline_name: &str) -> Status {
    match flags(directory, pipeline_name) {
        Ok(found) => Status::classify(&found),
        Err(err) => {
            debug!("Can't inspect flags: {err}");
            Status::Unknown
        }
    }
}

/// Flag files found across many folders, grouped by flag
#[derive(Debug, Default)]
pub struct FlagFiles {
    pub files: BTreeMap<Flag, Vec<PathBuf>>,
}

impl FlagFiles {
    pub fn count(&self, flag: Flag) -> usize {
        self.files.get(&flag).map_or(0, Vec::len)
    }

    /// At most `max` files for a flag, plus how many were left out
    pub fn capped(&self, flag: Flag, max: usize) -> (&[PathBuf], usize) {
        let files = self.files.get(&flag).map_or(&[][..], Vec::as_slice);
        let shown = files.len().min(max);
        (&files[..shown], files.len() - shown)
    }
}

/// Collect flag files of the requested kinds in every folder
///
/// Folders that don't exist are skipped: a sample that never ran has no output folder yet.
/// When `pipeline_name` is `None` flags from any pipeline are collected.
pub fn fetch_flag_files(folders: &[PathBuf], wanted: &[Flag], pipeline_name: Option<&str>) -> FlagFiles {
    let mut result = FlagFiles::default();
    for flag in wanted {
        result.files.entry(*flag).or_default();
    }

    for folder in folders {
        let entries = match list_dir(folder) {
            Ok(entries) => entries,
            Err(err) => {
                debug!("Skipping folder {}: {}", folder.display(), err);
                continue;
            }
        };
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(flag) = Flag::from_file_name(name, pipeline_name) {
                if wanted.contains(&flag) {
                    result.files.entry(flag).or_default().push(path.clone());
                }
            }
        }
    }

    for files in result.files.values_mut() {
        files.sort();
    }
    result
}

/// Every entry of a directory, sorted
pub fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    let mut paths = fs::read_dir(dir)?
        .map(|res| res.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, io::Error>>()?;
    paths.sort();
    Ok(paths)
}

/// Every sub-directory of a directory, sorted
pub fn subfolders(dir: &Path) -> Result<Vec<PathBuf>, io::Error> {
    Ok(list_dir(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}
