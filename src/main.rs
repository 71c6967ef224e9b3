mod cli;
mod config;
mod engine;
mod error;
mod paths;
mod progress;
mod secret;
mod steps;
mod templates;
mod ui;
mod validation;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::DesiredState;
use declarative::{ExecuteOptions, Report};
use engine::Output;
use error::ProvisionError;
use hostkit::Host;
use paths::Layout;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match provision(&cli) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            eprintln!("failed steps: {}", report.failed_ids().join(", "));
            ExitCode::from(1)
        }
        Err(e) => {
            let code = e
                .downcast_ref::<ProvisionError>()
                .map_or(1, ProvisionError::exit_code);
            ui::error(&format!("{e:#}"));
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn provision(cli: &Cli) -> Result<Report> {
    let config_path = cli.config.to_string_lossy();
    let state = DesiredState::load(&config_path)?;
    let layout = Layout::from_env();

    let plan = engine::build(&state, &layout)?.filter_by_target(cli.target.as_deref());
    let output = if cli.json {
        Output::Json
    } else if cli.quiet {
        Output::Quiet
    } else {
        Output::Human
    };

    if output == Output::Human {
        ui::header("hostform");
        ui::kv("config", &config_path);
        if layout.is_rerooted() {
            ui::kv("root", &layout.root().display().to_string());
        }
        if let Some(target) = &cli.target {
            ui::kv("target", target);
        }
    }
    if plan.is_empty() {
        log::warn!("No steps match the target");
    }

    let opts = ExecuteOptions {
        dry_run: cli.dry_run,
        policy: cli.policy(),
        timeout: cli.timeout(),
        verbose: cli.verbose > 0,
    };
    engine::run(&plan, &Host::system(), &opts, output)
}
