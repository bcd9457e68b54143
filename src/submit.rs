//! Turn eligible samples into job submissions
//!
//! A conductor per pipeline interface accumulates rendered commands, lumps them into jobs,
//! renders one submission script per job and hands it to a `Submitter`.

/// Pending commands and lumping thresholds
pub mod batch;
/// Per-pipeline submission lifecycle
pub mod conductor;
/// Hand written scripts to a local shell or a cluster queue
pub mod dispatch;
/// Render and write submission scripts
pub mod script;
