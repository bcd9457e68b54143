use std::path::Path;
use std::process::Command;

use log::info;

/// Hands a written submission script to whatever executes it
///
/// Only successful submission is awaited, never job completion: `sbatch` returns once the job
/// is queued, `sh` runs a local job to the end.
pub trait Submitter {
    fn submit(&self, script: &Path) -> Result<(), String>;
}

/// Runs `<program> <script>` from the script's folder
pub struct CommandSubmitter {
    pub program: String,
}

impl Submitter for CommandSubmitter {
    fn submit(&self, script: &Path) -> Result<(), String> {
        let wd = script.parent().unwrap_or(Path::new("."));
        let mut process = Command::new(&self.program);
        let cmd = process.arg(script).current_dir(wd);
        info!("Running {} process", self.program);
        info!("{:?}", &cmd);

        let output = cmd
            .output()
            .map_err(|err| format!("failed to execute {}: {}", self.program, err))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            info!("{}", stdout.trim());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }
}
