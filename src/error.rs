use std::path::PathBuf;

use thiserror::Error;

/// Example shown whenever an itemized compute specification can't be parsed
pub const EXAMPLE_COMPUTE_SPEC_FMT: &str = "k1=v1,k2=v2";

/// Failures raised by the submission core
///
/// Only `Misconfiguration` is fatal to a whole run. Submission and validation failures are
/// scoped to one job or one sample/pipeline pairing and are collected by the drivers.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),

    #[error("job submission failed for script {}: {reason}", script.display())]
    Submission {
        script: PathBuf,
        samples: Vec<String>,
        reason: String,
    },

    #[error("sample '{sample}' fails validation against {pipeline} input schema: {message}")]
    Validation {
        sample: String,
        pipeline: String,
        message: String,
    },

    #[error("path does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not correctly parse itemized compute specification (bad: {}). Correct format: {example}", bad.join(", "))]
    ComputeSpec { bad: Vec<String>, example: String },

    #[error("template rendering failed: {0}")]
    Template(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type LoopResult<T> = Result<T, LoopError>;
