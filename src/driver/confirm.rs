use std::io::{self, BufRead, Write};

use log::info;

use crate::error::LoopResult;

/// Asks the user before anything is removed
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

/// Yes/no prompt on the terminal; anything but yes declines, as does EOF
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        loop {
            if write!(stdout, "{question} [y/N]: ").and_then(|_| stdout.flush()).is_err() {
                return false;
            }
            let mut answer = String::new();
            match stdin.lock().read_line(&mut answer) {
                Ok(0) | Err(_) => return false,
                Ok(_) => {}
            }
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return true,
                "" | "n" | "no" => return false,
                _ => {
                    let _ = writeln!(stdout, "Please respond with 'yes' or 'no' (or 'y' or 'n').");
                }
            }
        }
    }
}

/// Always gives the same answer
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, _question: &str) -> bool {
        self.0
    }
}

/// How a preview/confirm action ended
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    DryRun,
    Aborted,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed | Outcome::DryRun => 0,
            Outcome::Aborted => 1,
        }
    }
}

/// A filesystem action with a side-effect free listing phase
pub trait Destructive {
    /// Verb used in log lines, e.g. "Clean"
    fn label(&self) -> &'static str;
    fn question(&self) -> &'static str;
    /// Log every target; must not touch the filesystem
    fn preview(&mut self);
    fn execute(&mut self) -> LoopResult<()>;
}

/// Preview, then execute only when not a dry run and forced or confirmed
pub fn preview_then_confirm(
    action: &mut dyn Destructive,
    dry_run: bool,
    force_yes: bool,
    confirm: &dyn Confirm,
) -> LoopResult<Outcome> {
    action.preview();

    if dry_run {
        info!("Dry run. No files touched by {}.", action.label().to_lowercase());
        return Ok(Outcome::DryRun);
    }
    if !force_yes && !confirm.confirm(action.question()) {
        info!("{} action aborted by user.", action.label());
        return Ok(Outcome::Aborted);
    }

    action.execute()?;
    info!("{} complete.", action.label());
    Ok(Outcome::Completed)
}
