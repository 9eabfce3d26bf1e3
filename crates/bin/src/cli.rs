//! Command-line interface for the location server.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

use server::Config;

/// Command line arguments, applied on top of the configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind: Option<String>,
    /// Optional override for listen port
    pub port: Option<u16>,
    /// Force movement broadcasts on
    pub track_movement: bool,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Runtime worker threads, defaulting to one per core
    pub threads: Option<usize>,
}

impl CliArgs {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            bind: matches.get_one::<String>("bind").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            track_movement: matches.get_flag("track-movement"),
            log_level: matches.get_one::<String>("log-level").cloned(),
            threads: matches.get_one::<u16>("threads").map(|&n| usize::from(n)),
        }
    }

    /// Apply the overrides to a loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.track_movement {
            config.nearby.track_movement = true;
        }
    }
}

fn command() -> Command {
    Command::new("locsrv")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Real-time location server: tracks users and answers who is nearby")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path, created with defaults if missing")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 127.0.0.1)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Listen port")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("track-movement")
                .short('m')
                .long("track-movement")
                .help("Notify nearby users of every move")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .help("Worker threads for the async runtime")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
}
