//! Configuration schema definitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Output flavour of an asset build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Debug,
    Production,
}

impl BuildMode {
    /// Both modes, in the order a full build runs them
    pub const ALL: [BuildMode; 2] = [BuildMode::Debug, BuildMode::Production];

    /// Directory name under the public root
    pub fn dir_name(&self) -> &'static str {
        match self {
            BuildMode::Debug => "debug",
            BuildMode::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the asset sources
    #[serde(default = "default_assets_dir")]
    pub assets: String,

    /// Root of the generated output
    #[serde(default = "default_public_dir")]
    pub public: String,

    /// Directory holding the run/out/err/for log files
    #[serde(default = "default_logs_dir")]
    pub logs: String,

    /// Pid file of the debug server
    #[serde(default = "default_pidfile")]
    pub pidfile: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            assets: default_assets_dir(),
            public: default_public_dir(),
            logs: default_logs_dir(),
            pidfile: default_pidfile(),
        }
    }
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_public_dir() -> String {
    "public".to_string()
}

fn default_logs_dir() -> String {
    ".".to_string()
}

fn default_pidfile() -> String {
    "app.pid".to_string()
}

/// Application server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Application script, relative to the project root
    #[serde(default = "default_app")]
    pub app: String,

    /// Interpreter used for debug launches
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Extra arguments appended after the script in debug launches
    #[serde(default = "default_debug_args")]
    pub debug_args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app: default_app(),
            interpreter: default_interpreter(),
            debug_args: default_debug_args(),
        }
    }
}

fn default_app() -> String {
    "app.js".to_string()
}

fn default_interpreter() -> String {
    "node".to_string()
}

fn default_debug_args() -> Vec<String> {
    vec!["--debug".to_string()]
}

/// Persistent process monitor used for production launches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Monitor executable
    #[serde(default = "default_monitor")]
    pub command: String,

    /// Minimum uptime before a crash counts as a spin
    #[serde(default = "default_restart_ms")]
    pub min_uptime_ms: u64,

    /// Delay between restarts of a spinning script
    #[serde(default = "default_restart_ms")]
    pub spin_sleep_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            command: default_monitor(),
            min_uptime_ms: default_restart_ms(),
            spin_sleep_ms: default_restart_ms(),
        }
    }
}

fn default_monitor() -> String {
    "forever".to_string()
}

fn default_restart_ms() -> u64 {
    1000
}

/// How one kind of source file becomes output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRule {
    /// Folder name under both the assets and the public roots
    pub category: String,

    /// Extension of the source files
    pub source_ext: String,

    /// Extension of the generated files
    pub output_ext: String,

    /// Transform command line for debug builds
    pub debug: Vec<String>,

    /// Transform command line for production builds
    pub production: Vec<String>,

    /// Combined bundle, built in production only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<BundleRule>,
}

impl AssetRule {
    /// Command line active for `mode`
    pub fn command(&self, mode: BuildMode) -> &[String] {
        match mode {
            BuildMode::Debug => &self.debug,
            BuildMode::Production => &self.production,
        }
    }
}

/// Combined output of a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRule {
    /// File name of the bundle in the category's output folder
    pub name: String,

    /// Command the concatenated stream is fed through
    pub command: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn default_asset_rules() -> Vec<AssetRule> {
    let mut rules = vec![
        AssetRule {
            category: "stylesheets".to_string(),
            source_ext: "less".to_string(),
            output_ext: "css".to_string(),
            debug: argv(&["lessc", "-"]),
            production: argv(&["lessc", "--compress", "-"]),
            bundle: Some(BundleRule {
                name: "all.css".to_string(),
                command: argv(&["lessc", "--compress", "-"]),
            }),
        },
        AssetRule {
            category: "javascripts".to_string(),
            source_ext: "js".to_string(),
            output_ext: "js".to_string(),
            debug: argv(&["cat"]),
            production: argv(&["uglifyjs"]),
            bundle: Some(BundleRule {
                name: "all.js".to_string(),
                command: argv(&["uglifyjs"]),
            }),
        },
    ];

    for ext in ["png", "jpg", "gif", "ico", "svg"] {
        rules.push(AssetRule {
            category: "images".to_string(),
            source_ext: ext.to_string(),
            output_ext: ext.to_string(),
            debug: argv(&["cat"]),
            production: argv(&["cat"]),
            bundle: None,
        });
    }

    rules
}
