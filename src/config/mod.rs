//! Configuration handling for appctl
//!
//! Parses and manages `appctl.toml`. Every field has a default, so a
//! project without a config file runs on the built-in asset rules.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use schema::*;

/// Default configuration file name
pub const CONFIG_FILE: &str = "appctl.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory layout
    #[serde(default)]
    pub paths: PathsConfig,

    /// Application server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Persistent process monitor settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Asset rules, processed in declaration order
    #[serde(default = "default_asset_rules")]
    pub assets: Vec<AssetRule>,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    ///
    /// A missing file falls back to the defaults unless it was named
    /// explicitly on the command line.
    pub fn load<P: AsRef<Path>>(path: P, explicit: bool) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if !canonical_path.exists() && !explicit {
            let mut config = Self::default_config();
            config.root = root;
            return Ok(config);
        }

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse {}", canonical_path.display()))?;
        config.root = root;

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            paths: PathsConfig::default(),
            server: ServerConfig::default(),
            monitor: MonitorConfig::default(),
            assets: default_asset_rules(),
            root: PathBuf::from("."),
        }
    }

    /// Render the default configuration as TOML
    pub fn example() -> Result<String> {
        toml::to_string_pretty(&Self::default_config()).context("Failed to render example config")
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        for rule in &self.assets {
            if rule.category.trim().is_empty() {
                anyhow::bail!("Asset rule with an empty category");
            }
            if rule.source_ext.is_empty() || rule.output_ext.is_empty() {
                anyhow::bail!("Asset rule '{}' needs both extensions", rule.category);
            }
            if rule.debug.is_empty() || rule.production.is_empty() {
                anyhow::bail!(
                    "Asset rule '{}.{}' needs debug and production commands",
                    rule.category,
                    rule.source_ext
                );
            }
            if let Some(bundle) = &rule.bundle {
                if bundle.command.is_empty() {
                    anyhow::bail!("Bundle '{}' has an empty command", bundle.name);
                }
                if bundle.name.is_empty() || bundle.name.contains(['/', '\\']) {
                    anyhow::bail!("Bundle name '{}' must be a plain file name", bundle.name);
                }
            }
        }

        if self.monitor.command.is_empty() || self.server.interpreter.is_empty() {
            anyhow::bail!("Monitor and interpreter commands must not be empty");
        }

        Ok(())
    }

    /// Source folder of a category
    pub fn source_dir(&self, category: &str) -> PathBuf {
        self.root.join(&self.paths.assets).join(category)
    }

    /// Output root of a build mode
    pub fn public_dir(&self, mode: BuildMode) -> PathBuf {
        self.root.join(&self.paths.public).join(mode.dir_name())
    }

    /// Output folder of a category in a build mode
    pub fn output_dir(&self, category: &str, mode: BuildMode) -> PathBuf {
        self.public_dir(mode).join(category)
    }

    /// Application script, honouring a command-line override
    pub fn app_path(&self, app_override: Option<&Path>) -> PathBuf {
        match app_override {
            Some(app) => self.root.join(app),
            None => self.root.join(&self.server.app),
        }
    }

    pub fn pidfile_path(&self) -> PathBuf {
        self.root.join(&self.paths.pidfile)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(&self.paths.logs)
    }

    /// Name the log files are derived from: the application directory
    pub fn app_name(&self) -> String {
        self.root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_all_categories() {
        let config = Config::default_config();
        let categories: Vec<&str> = config.assets.iter().map(|r| r.category.as_str()).collect();

        assert!(categories.contains(&"stylesheets"));
        assert!(categories.contains(&"javascripts"));
        assert!(categories.contains(&"images"));
        assert_eq!(config.assets.iter().filter(|r| r.bundle.is_some()).count(), 2);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            app = "server.js"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.app, "server.js");
        assert_eq!(config.server.interpreter, "node");
        assert_eq!(config.monitor.command, "forever");
        assert_eq!(config.assets, default_asset_rules());
    }

    #[test]
    fn test_example_round_trips() {
        let text = Config::example().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.assets, Config::default_config().assets);
        assert_eq!(parsed.paths.pidfile, "app.pid");
    }

    #[test]
    fn test_rejects_empty_command() {
        let err = Config::from_toml(
            r#"
            [[assets]]
            category = "stylesheets"
            source_ext = "less"
            output_ext = "css"
            debug = []
            production = ["lessc", "-"]
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("debug and production"));
    }

    #[test]
    fn test_rejects_bundle_path() {
        let err = Config::from_toml(
            r#"
            [[assets]]
            category = "javascripts"
            source_ext = "js"
            output_ext = "js"
            debug = ["cat"]
            production = ["cat"]
            bundle = { name = "../all.js", command = ["cat"] }
            "#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("plain file name"));
    }

    #[test]
    fn test_missing_default_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join(CONFIG_FILE), false).unwrap();

        assert_eq!(config.root, dir.path());
        assert_eq!(
            config.output_dir("images", BuildMode::Debug),
            dir.path().join("public").join("debug").join("images")
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(dir.path().join("custom.toml"), true).is_err());
    }
}
