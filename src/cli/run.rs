//! Stage sequencing: kill, clean, assets, start

use std::time::Instant;

use colored::Colorize;
use tracing::info;

use super::Options;
use crate::assets::AssetPipeline;
use crate::config::{BuildMode, Config};
use crate::error::{AppError, AppResult};
use crate::logs::RunLogs;
use crate::process::Runner;
use crate::supervisor::Supervisor;
use crate::utils::{format_duration, relative_path};

/// Lines of the run log shown after a transform failure
const LOG_TAIL_LINES: usize = 20;

impl Options {
    /// Execute every requested stage in order
    pub async fn execute(&self, runner: &dyn Runner) -> AppResult<()> {
        if self.example {
            print!("{}", Config::example().map_err(AppError::Config)?);
            return Ok(());
        }

        print_banner();

        info!("Loading configuration from {}", self.config.display());
        let config = Config::load(&self.config, self.config_explicit).map_err(AppError::Config)?;

        let logs = RunLogs::from_config(&config);
        logs.prepare(self.append_log)?;

        let result = self.run_stages(&config, &logs, runner).await;

        if let Err(err) = &result {
            if err.wants_log_tail() {
                print_log_tail(&logs);
            }
        }

        result
    }

    async fn run_stages(&self, config: &Config, logs: &RunLogs, runner: &dyn Runner) -> AppResult<()> {
        let app = config.app_path(self.app.as_deref());
        let supervisor = Supervisor::new(config, runner, logs);
        let pipeline = AssetPipeline::new(config, runner, logs, self.rebuild);

        if self.should_kill() {
            eprintln!("{} Stopping running instances...", "→".blue());
            supervisor.kill(&app).await;
        }

        if self.clean {
            for mode in self.modes() {
                if !pipeline.clean(mode) {
                    eprintln!("  {} could not fully clean {} assets", "!".yellow(), mode);
                }
            }
        }

        if self.updates_assets() {
            for mode in self.modes() {
                let start = Instant::now();
                eprintln!("{} Updating {} assets...", "→".blue(), mode.to_string().cyan());

                let report = pipeline.run(mode).await?;

                eprintln!(
                    "  {} {} file(s), {} bundle(s) in {}",
                    "✓".green().bold(),
                    report.updated.len(),
                    report.bundles.len(),
                    format_duration(start.elapsed())
                );
                for bundle in &report.bundles {
                    eprintln!(
                        "  {} {}",
                        "•".dimmed(),
                        relative_path(&config.root, bundle).cyan()
                    );
                }
            }
        }

        match self.starts() {
            Some(BuildMode::Production) => {
                supervisor.start_production(&app).await?;
                eprintln!(
                    "{} Production server started; logs in {}",
                    "✓".green().bold(),
                    relative_path(&config.root, &logs.out).cyan()
                );
            }
            Some(BuildMode::Debug) => {
                let pid = supervisor.start_debug(&app).await?;
                eprintln!(
                    "{} Debug server started (pid {})",
                    "✓".green().bold(),
                    pid.to_string().cyan()
                );
            }
            None => {}
        }

        Ok(())
    }
}

/// Print the appctl banner
fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "appctl".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

fn print_log_tail(logs: &RunLogs) {
    let tail = logs.tail(LOG_TAIL_LINES);
    if tail.is_empty() {
        return;
    }

    eprintln!("\n{} {}", "Last lines of".dimmed(), logs.run.display().to_string().dimmed());
    for line in tail {
        eprintln!("  {}", line);
    }
    eprintln!();
}
