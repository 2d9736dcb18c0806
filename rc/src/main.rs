//! rumreplay - scripted replay of browser signals
//!
//! Loads a scenario, plays it through a RUM engine on virtual time and prints
//! every collected event to stdout as one JSON line. Logs go to stderr.

use std::io::{self, Write};

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use rumcore::cli::Cli;
use rumcore::config::Config;
use rumcore::scenario::{Scenario, run_scenario};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) {
    // Priority: CLI --log-level > config file > default (WARN)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to WARN", s);
                tracing::Level::WARN
            }
        },
        None => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref());

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let scenario = Scenario::load(&cli.scenario)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let written = run_scenario(&scenario, &config, &mut out)?;
    out.flush().context("Failed to flush output")?;

    info!(written, "rumreplay finished");
    Ok(())
}
