use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use serde::Serialize;

use crate::compute::ComputeVariables;
use crate::error::LoopResult;
use crate::template;

/// A rendered job submission document and where it lives
///
/// The script is submitted by path, so it must be written before dispatch.
#[derive(Debug, Clone)]
pub struct SubmissionScript {
    pub path: PathBuf,
    pub content: String,
}

/// Rendering context for a submission template
#[derive(Serialize)]
struct SubmissionContext<'a> {
    compute: &'a ComputeVariables,
    /// Every command of the job, one per line
    code: String,
    time_now: String,
}

impl SubmissionScript {
    /// Render one submission document for a batch of commands
    pub fn render(
        source: &str,
        compute: &ComputeVariables,
        commands: &[String],
        path: PathBuf,
    ) -> LoopResult<SubmissionScript> {
        let context = SubmissionContext {
            compute,
            code: commands.join("\n"),
            time_now: Utc::now().to_string(),
        };
        let content = template::render("submission", source, &context)?;
        Ok(SubmissionScript { path, content })
    }

    /// Write the script, replacing any previous one with the same job name
    pub fn write(&self) -> Result<(), io::Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(self.content.as_bytes())?;
        info!("Writing script to {}", self.path.display());
        Ok(())
    }
}

/// `<folder>/<job_name>.sub`
pub fn script_path(folder: &Path, job_name: &str) -> PathBuf {
    folder.join(format!("{job_name}.sub"))
}
