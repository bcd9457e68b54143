//! Submit and track pipeline jobs over the samples of a project
//!
//! Pipelines mark their progress with flag files in sample folders. Eligible samples are turned
//! into commands, lumped into jobs and handed to a local shell or a cluster queue.

pub mod cli;
pub mod compute;
pub mod driver;
pub mod error;
pub mod flag;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod project;
pub mod submit;
pub mod template;
