//! CLI definition for the replay binary

use clap::Parser;
use std::path::PathBuf;

/// rumreplay - replay scripted browser signals through the RUM engine
#[derive(Debug, Parser)]
#[command(
    name = "rumreplay",
    about = "Replay scripted browser signals and print the collected RUM events as JSON lines",
    version
)]
pub struct Cli {
    /// Scenario file (YAML)
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_options() {
        let cli = Cli::try_parse_from(["rumreplay", "scenario.yml", "-c", "custom.yml", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.scenario, PathBuf::from("scenario.yml"));
        assert_eq!(cli.config, Some(PathBuf::from("custom.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_scenario_is_required() {
        assert!(Cli::try_parse_from(["rumreplay"]).is_err());
    }
}
