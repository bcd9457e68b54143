//! Run status flags written by pipelines into their output folders
//!
//! A pipeline marks its progress by touching `<pipeline_name>_<flag>.flag` in a sample (or
//! project) results folder. Flags are never written here except when results are destroyed.

use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;

/// Scan folders for flag files
pub mod store;

/// Every flag a pipeline is allowed to write
pub const FLAGS: [Flag; 4] = [Flag::Waiting, Flag::Running, Flag::Completed, Flag::Failed];

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Flag {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Flag::Waiting => write!(f, "waiting"),
            Flag::Running => write!(f, "running"),
            Flag::Completed => write!(f, "completed"),
            Flag::Failed => write!(f, "failed"),
        }
    }
}

impl Flag {
    /// File name of this flag for a pipeline, e.g. `rnaseq_completed.flag`
    pub fn file_name(&self, pipeline_name: &str) -> String {
        format!("{pipeline_name}_{self}.flag")
    }

    /// Recover the flag from a file name, optionally restricted to a single pipeline
    pub fn from_file_name(file_name: &str, pipeline_name: Option<&str>) -> Option<Flag> {
        let stem = file_name.strip_suffix(".flag")?;
        FLAGS.into_iter().find(|flag| match pipeline_name {
            Some(name) => stem == format!("{name}_{flag}"),
            None => stem.ends_with(&format!("_{flag}")),
        })
    }
}

/// Presentation status of one sample/pipeline pair at an inspection instant
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Missing,
    Completed,
    Failed,
    Running,
    Waiting,
    Multiple,
    /// The folder couldn't be inspected at all
    Unknown,
}

impl Status {
    pub fn classify(flags: &BTreeSet<Flag>) -> Status {
        let mut iter = flags.iter();
        match (iter.next(), iter.next()) {
            (None, _) => Status::Missing,
            (Some(_), Some(_)) => Status::Multiple,
            (Some(flag), None) => match flag {
                Flag::Waiting => Status::Waiting,
                Flag::Running => Status::Running,
                Flag::Completed => Status::Completed,
                Flag::Failed => Status::Failed,
            },
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Missing => write!(f, "Missing"),
            Status::Completed => write!(f, "Completed"),
            Status::Failed => write!(f, "Failed"),
            Status::Running => write!(f, "Running"),
            Status::Waiting => write!(f, "Waiting"),
            Status::Multiple => write!(f, "Multiple"),
            Status::Unknown => write!(f, "Unknown"),
        }
    }
}
