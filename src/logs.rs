//! Per-run log files
//!
//! Four files named after the application directory:
//! - `.run`: appctl's own record, including transform stderr
//! - `.out` / `.err`: the server's stdout and stderr
//! - `.for`: the process monitor's own log

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::process::{open_append, Sink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLogs {
    pub run: PathBuf,
    pub out: PathBuf,
    pub err: PathBuf,
    pub monitor: PathBuf,
}

impl RunLogs {
    pub fn new(dir: &Path, app_name: &str) -> Self {
        let file = |ext: &str| dir.join(format!("{}.{}", app_name, ext));
        Self {
            run: file("run"),
            out: file("out"),
            err: file("err"),
            monitor: file("for"),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.log_dir(), &config.app_name())
    }

    /// Create the log directory and reset the run/out/err files
    pub fn prepare(&self, append: bool) -> AppResult<()> {
        if let Some(dir) = self.run.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| AppError::io(format!("Failed to create {}", dir.display()), e))?;
        }

        for path in [&self.run, &self.out, &self.err] {
            if append {
                open_append(path)?;
            } else {
                truncate(path)?;
            }
        }

        Ok(())
    }

    /// Reset the monitor's log before a production launch
    pub fn truncate_monitor(&self) -> AppResult<()> {
        truncate(&self.monitor)
    }

    /// Append one line to the run log
    pub fn note(&self, line: &str) -> AppResult<()> {
        let mut file = open_append(&self.run)?;
        writeln!(file, "{}", line)
            .map_err(|e| AppError::io(format!("Failed to write {}", self.run.display()), e))
    }

    /// Sink that appends to the run log
    pub fn run_sink(&self) -> Sink {
        Sink::Append(self.run.clone())
    }

    /// Last `lines` lines of the run log (empty if unreadable)
    pub fn tail(&self, lines: usize) -> Vec<String> {
        let Ok(content) = fs::read_to_string(&self.run) else {
            return Vec::new();
        };

        let all: Vec<&str> = content.lines().collect();
        let start = all.len().saturating_sub(lines);
        all[start..].iter().map(|line| line.to_string()).collect()
    }
}

fn truncate(path: &Path) -> AppResult<()> {
    File::create(path)
        .map(|_| ())
        .map_err(|e| AppError::io(format!("Failed to truncate {}", path.display()), e))
}
