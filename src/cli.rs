use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::flag::Flag;

#[derive(Parser, Debug)]
#[command(
    name = "pipeloop",
    version,
    about = "Submit and track pipeline jobs over the samples of a project",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Logging verbosity, 0 (errors only) to 4 (trace)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub verbosity: Option<u8>,

    /// Debug mode, listen to every message
    #[arg(long, global = true)]
    pub dbg: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run or submit sample jobs
    Run(SubmitArgs),
    /// Resubmit sample jobs with failed flags
    Rerun(SubmitArgs),
    /// Run or submit project-level jobs
    Runp(SubmitArgs),
    /// Remove output files of the project
    Destroy(RemoveArgs),
    /// Run clean scripts of already processed jobs
    Clean(RemoveArgs),
    /// Check flag status of current runs
    Check(CheckArgs),
    /// Aggregate per-sample stats into a project summary table
    Summarize(ProjectArgs),
}

/// Where the project is and which samples of it to consider
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project configuration file (YAML)
    pub config_file: PathBuf,

    /// Output directory, overrides the project config
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Sample-level pipeline interface files, override the project config
    #[arg(long, num_args = 1.., value_name = "YAML")]
    pub sample_pipeline_interfaces: Vec<PathBuf>,

    /// Project-level pipeline interface files, override the project config
    #[arg(long, num_args = 1.., value_name = "YAML")]
    pub project_pipeline_interfaces: Vec<PathBuf>,

    /// Sample attribute used by --sel-incl and --sel-excl
    #[arg(long, value_name = "ATTR")]
    pub sel_attr: Option<String>,

    /// Only keep samples whose selector attribute is one of these values
    #[arg(long, num_args = 1.., conflicts_with = "sel_excl")]
    pub sel_incl: Vec<String>,

    /// Drop samples whose selector attribute is one of these values
    #[arg(long, num_args = 1..)]
    pub sel_excl: Vec<String>,

    /// Limit to n samples
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Don't actually submit jobs
    #[arg(long, short = 'd')]
    pub dry_run: bool,

    /// Ignore run status flags
    #[arg(long)]
    pub ignore_flags: bool,

    /// Time delay in seconds between job submissions
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=30))]
    pub time_delay: u64,

    /// Total input file size (GB) to batch into one job
    #[arg(long)]
    pub lump: Option<f64>,

    /// Number of commands to batch into one job
    #[arg(long)]
    pub lumpn: Option<usize>,

    /// Itemized compute settings, e.g. mem=32000,cores=4
    #[arg(long, value_name = "K=V,...")]
    pub compute: Option<String>,

    /// YAML file with compute settings
    #[arg(long, value_name = "YAML")]
    pub settings: Option<PathBuf>,

    /// Compute package to activate
    #[arg(long, value_name = "NAME")]
    pub package: Option<String>,

    /// Compute configuration file declaring compute packages
    #[arg(long, value_name = "YAML")]
    pub compute_config: Option<PathBuf>,

    /// String to append to every command
    #[arg(long, allow_hyphen_values = true)]
    pub command_extra: Option<String>,

    /// Same as --command-extra, but overrides values set on samples
    #[arg(long, allow_hyphen_values = true)]
    pub command_extra_override: Option<String>,

    /// Arguments passed to every pipeline command, given after `--`
    #[arg(last = true)]
    pub pipeline_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// List what would be removed, then stop
    #[arg(long, short = 'd')]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(long)]
    pub force_yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Flags to check, all of them by default
    #[arg(long, value_enum, num_args = 1..)]
    pub flags: Vec<Flag>,

    /// Check every folder in the results folder, not only project samples
    #[arg(long)]
    pub all_folders: bool,

    /// Only check flags written by this pipeline
    #[arg(long)]
    pub pipeline: Option<String>,

    /// Maximum number of file paths listed per flag
    #[arg(long, default_value_t = 30)]
    pub max_file_count: usize,
}

impl Command {
    pub fn project_args(&self) -> &ProjectArgs {
        match self {
            Command::Run(args) | Command::Rerun(args) | Command::Runp(args) => &args.project,
            Command::Destroy(args) | Command::Clean(args) => &args.project,
            Command::Check(args) => &args.project,
            Command::Summarize(args) => args,
        }
    }

    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::Run(_) => "run",
            Command::Rerun(_) => "rerun",
            Command::Runp(_) => "runp",
            Command::Destroy(_) => "destroy",
            Command::Clean(_) => "clean",
            Command::Check(_) => "check",
            Command::Summarize(_) => "summarize",
        }
    }
}
