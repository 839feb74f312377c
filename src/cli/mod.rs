//! Command-line interface for appctl
//!
//! Flags are parsed with clap after `+macro` expansion and then frozen into
//! an [`Options`] value that every later stage receives:
//! - `-k`: stop running instances
//! - `-c`: remove generated assets
//! - `-u` / `-r`: update / rebuild assets
//! - `-d` / `-p`: start a debug / production server

mod macros;
mod run;

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::config::{BuildMode, CONFIG_FILE};
use crate::error::{AppError, AppResult};

pub use macros::{expand_macros, MACROS, MACRO_HELP};

/// appctl - build assets and launch the application server
#[derive(Parser, Debug)]
#[command(name = "appctl")]
#[command(author, version, about, long_about = None)]
#[command(after_help = MACRO_HELP)]
pub struct Cli {
    /// Application script to launch
    #[arg(short, long, value_name = "FILE")]
    pub app: Option<PathBuf>,

    /// Remove generated assets first
    #[arg(short, long)]
    pub clean: bool,

    /// Build debug assets / start the debug server
    #[arg(short, long)]
    pub debug: bool,

    /// Print an example configuration file
    #[arg(short, long)]
    pub example: bool,

    /// Stop running instances
    #[arg(short, long)]
    pub kill: bool,

    /// Do not start a server
    #[arg(short, long)]
    pub no_start: bool,

    /// Build production assets / start the production server
    #[arg(short, long)]
    pub production: bool,

    /// Regenerate every asset regardless of modification times
    #[arg(short, long)]
    pub rebuild: bool,

    /// Update stale assets
    #[arg(short, long)]
    pub update: bool,

    /// Append to the log files instead of truncating them
    #[arg(long = "appendlog")]
    pub append_log: bool,

    /// Do not stop running instances before starting a server
    #[arg(long)]
    pub no_kill: bool,

    /// Path to the configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated, immutable run configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub app: Option<PathBuf>,
    pub clean: bool,
    pub debug: bool,
    pub example: bool,
    pub kill: bool,
    pub no_start: bool,
    pub production: bool,
    pub rebuild: bool,
    pub update: bool,
    pub append_log: bool,
    pub no_kill: bool,
    pub config: PathBuf,
    /// Whether `config` was named on the command line
    pub config_explicit: bool,
    pub verbose: bool,
}

impl TryFrom<Cli> for Options {
    type Error = AppError;

    fn try_from(cli: Cli) -> AppResult<Self> {
        let options = Self {
            app: cli.app,
            clean: cli.clean,
            debug: cli.debug,
            example: cli.example,
            kill: cli.kill,
            no_start: cli.no_start,
            production: cli.production,
            rebuild: cli.rebuild,
            update: cli.update,
            append_log: cli.append_log,
            no_kill: cli.no_kill,
            config_explicit: cli.config.is_some(),
            config: cli.config.unwrap_or_else(|| PathBuf::from(CONFIG_FILE)),
            verbose: cli.verbose,
        };
        options.validate()?;
        Ok(options)
    }
}

impl Options {
    fn validate(&self) -> AppResult<()> {
        let any_action = self.clean
            || self.debug
            || self.example
            || self.kill
            || self.production
            || self.rebuild
            || self.update;
        if !any_action {
            return Err(AppError::usage("no command given (try --help)"));
        }

        if self.debug && self.production && !self.no_start {
            return Err(AppError::usage(
                "cannot start both a debug and a production server; add -n to only build",
            ));
        }

        Ok(())
    }

    /// Build modes the asset stages act on
    pub fn modes(&self) -> Vec<BuildMode> {
        match (self.debug, self.production) {
            (true, false) => vec![BuildMode::Debug],
            (false, true) => vec![BuildMode::Production],
            _ => BuildMode::ALL.to_vec(),
        }
    }

    /// Server to start, if any
    pub fn starts(&self) -> Option<BuildMode> {
        if self.no_start {
            return None;
        }
        match (self.debug, self.production) {
            (true, false) => Some(BuildMode::Debug),
            (false, true) => Some(BuildMode::Production),
            _ => None,
        }
    }

    pub fn updates_assets(&self) -> bool {
        self.update || self.rebuild || self.starts().is_some()
    }

    pub fn should_kill(&self) -> bool {
        self.kill || (self.starts().is_some() && !self.no_kill)
    }
}

/// Parse raw process arguments
///
/// Returns `Ok(None)` when help or version output was requested and printed.
pub fn parse_args<I, S>(args: I) -> AppResult<Option<Options>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens = expand_macros(args)?;

    match Cli::try_parse_from(tokens) {
        Ok(cli) => Options::try_from(cli).map(Some),
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            // Nothing useful can be done if stdout is gone.
            let _ = err.print();
            Ok(None)
        }
        Err(err) => {
            let rendered = err.render().to_string();
            let message = rendered.trim_end();
            Err(AppError::usage(message.strip_prefix("error: ").unwrap_or(message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AppResult<Options> {
        let mut argv = vec!["appctl"];
        argv.extend_from_slice(args);
        parse_args(argv).map(|o| o.expect("no help requested"))
    }

    #[test]
    fn test_production_macro() {
        let options = parse(&["+production"]).unwrap();

        assert!(options.kill && options.clean && options.rebuild && options.production);
        assert!(!options.debug && !options.update);
        assert_eq!(options.starts(), Some(BuildMode::Production));
        assert_eq!(options.modes(), vec![BuildMode::Production]);
    }

    #[test]
    fn test_update_assets_macro_builds_both_modes() {
        let options = parse(&["+update-assets"]).unwrap();

        assert!(options.update && options.no_start);
        assert_eq!(options.starts(), None);
        assert_eq!(options.modes(), BuildMode::ALL.to_vec());
        assert!(!options.should_kill());
    }

    #[test]
    fn test_clustered_flag_takes_next_token() {
        let options = parse(&["-kda", "server.js"]).unwrap();
        assert!(options.kill && options.debug);
        assert_eq!(options.app, Some(PathBuf::from("server.js")));

        let options = parse(&["--debug", "--app", "main.js", "--appendlog"]).unwrap();
        assert_eq!(options.app, Some(PathBuf::from("main.js")));
        assert!(options.append_log);
    }

    #[test]
    fn test_start_implies_kill_unless_suppressed() {
        let options = parse(&["-d"]).unwrap();
        assert!(options.should_kill());
        assert!(options.updates_assets());

        let options = parse(&["-d", "--no-kill"]).unwrap();
        assert!(!options.should_kill());
    }

    #[test]
    fn test_conflicting_servers() {
        let err = parse(&["-dp"]).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));

        let options = parse(&["-dpn", "-u"]).unwrap();
        assert_eq!(options.modes(), BuildMode::ALL.to_vec());
        assert_eq!(options.starts(), None);
    }

    #[test]
    fn test_no_command() {
        assert!(matches!(parse(&[]), Err(AppError::Usage(_))));
        assert!(matches!(parse(&["-n", "--appendlog"]), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_unknown_flag_is_usage_error() {
        let err = parse(&["-x"]).unwrap_err();
        assert!(matches!(err, AppError::Usage(_)));
        assert_eq!(err.exit_code(), 1);

        assert!(matches!(parse(&["-a"]), Err(AppError::Usage(_))));
    }

    #[test]
    fn test_config_path() {
        let options = parse(&["-k"]).unwrap();
        assert_eq!(options.config, PathBuf::from(CONFIG_FILE));
        assert!(!options.config_explicit);

        let options = parse(&["-k", "--config", "deploy/appctl.toml"]).unwrap();
        assert!(options.config_explicit);
    }
}
