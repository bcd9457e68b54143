use std::process;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use pipeloop::cli::Cli;
use pipeloop::compute::package::ComputeConfig;
use pipeloop::driver::confirm::StdinConfirm;
use pipeloop::driver::{Driver, ExecutionContext};
use pipeloop::logging;
use pipeloop::options::Options;
use pipeloop::project::{Project, ProjectOverrides};
use pipeloop::submit::dispatch::CommandSubmitter;

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbosity, cli.dbg);
    info!(
        "pipeloop {} {} {}",
        env!("CARGO_PKG_VERSION"),
        cli.command.name(),
        cli.command.project_args().config_file.display()
    );

    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            1
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    let args = cli.command.project_args();
    let overrides = ProjectOverrides {
        output_dir: args.output_dir.clone(),
        sample_pipeline_interfaces: args.sample_pipeline_interfaces.clone(),
        project_pipeline_interfaces: args.project_pipeline_interfaces.clone(),
    };
    let mut project = Project::load(&args.config_file, &overrides)?;
    let options = Options::resolve(&cli.command, &project.defaults)?;
    let driver = Driver::new(&cli.command, &project)?;
    driver.prepare(&mut project)?;

    let compute = ComputeConfig::load(options.compute_config.as_deref())?;
    let package = compute.activate(&options.compute_package)?;
    info!("Activating compute package '{}'", package.name);
    let submitter = CommandSubmitter {
        program: package.submission_command.clone(),
    };

    let ctx = ExecutionContext {
        project: &project,
        options: &options,
        package,
        submitter: &submitter,
        confirm: &StdinConfirm,
    };
    let report = driver.execute(&ctx)?;
    Ok(report.exit_code())
}
