//! Server process supervision
//!
//! Production servers are handed to a persistent process monitor; debug
//! servers run as detached children whose pid goes to a pid file. Stopping
//! tries both, since either shape may be left over from an earlier run.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::logs::RunLogs;
use crate::process::{Input, Invocation, Runner, Sink};

pub struct Supervisor<'a> {
    config: &'a Config,
    runner: &'a dyn Runner,
    logs: &'a RunLogs,
}

impl<'a> Supervisor<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn Runner, logs: &'a RunLogs) -> Self {
        Self {
            config,
            runner,
            logs,
        }
    }

    /// Stop any running instance of `app`
    ///
    /// Best-effort: failures are logged, never returned.
    pub async fn kill(&self, app: &Path) {
        let stop = Invocation::new(&self.config.monitor.command)
            .arg("stop")
            .arg(app.display().to_string())
            .cwd(&self.config.root)
            .stdout(self.logs.run_sink())
            .stderr(self.logs.run_sink());

        match self.runner.run(stop).await {
            Ok(outcome) if outcome.success() => {
                info!("Stopped {} under {}", app.display(), self.config.monitor.command)
            }
            Ok(outcome) => debug!(
                "{} stop reported {}; no monitored instance",
                self.config.monitor.command, outcome.status
            ),
            Err(e) => warn!("Could not ask the process monitor to stop: {}", e),
        }

        let pidfile = self.config.pidfile_path();
        if !pidfile.exists() {
            return;
        }

        match read_pidfile(&pidfile) {
            Some(pid) => self.terminate(pid).await,
            None => warn!("Ignoring unreadable pid file {}", pidfile.display()),
        }

        if let Err(e) = fs::remove_file(&pidfile) {
            warn!("Failed to remove {}: {}", pidfile.display(), e);
        }
    }

    async fn terminate(&self, pid: u32) {
        let kill = Invocation::new("kill")
            .arg(pid.to_string())
            .stdout(self.logs.run_sink())
            .stderr(self.logs.run_sink());

        match self.runner.run(kill).await {
            Ok(outcome) if outcome.success() => info!("Terminated debug server (pid {})", pid),
            Ok(outcome) => warn!("kill {} reported {}", pid, outcome.status),
            Err(e) => warn!("Failed to signal pid {}: {}", pid, e),
        }
    }

    /// Launch `app` under the persistent process monitor
    pub async fn start_production(&self, app: &Path) -> AppResult<()> {
        require_script(app)?;

        self.logs.truncate_monitor()?;

        let monitor = &self.config.monitor;
        let invocation = Invocation::new(&monitor.command)
            .arg("start")
            .args([
                "--minUptime".to_string(),
                monitor.min_uptime_ms.to_string(),
                "--spinSleepTime".to_string(),
                monitor.spin_sleep_ms.to_string(),
            ])
            .arg("-l")
            .arg(self.logs.monitor.display().to_string())
            .arg("-o")
            .arg(self.logs.out.display().to_string())
            .arg("-e")
            .arg(self.logs.err.display().to_string())
            .arg("-a")
            .arg(app.display().to_string())
            .cwd(&self.config.root)
            .stdout(self.logs.run_sink())
            .stderr(self.logs.run_sink());

        let command = invocation.display();
        self.logs.note(&format!("[production] {}", command))?;

        let outcome = self.runner.run(invocation).await?;
        if !outcome.success() {
            return Err(AppError::Command {
                command,
                status: outcome.status,
            });
        }

        info!("Started {} under {}", app.display(), monitor.command);
        Ok(())
    }

    /// Launch `app` as a detached child and record its pid
    pub async fn start_debug(&self, app: &Path) -> AppResult<u32> {
        require_script(app)?;

        let invocation = Invocation::new(&self.config.server.interpreter)
            .arg(app.display().to_string())
            .args(self.config.server.debug_args.iter().cloned())
            .cwd(&self.config.root)
            .stdin(Input::Null)
            .stdout(Sink::Append(self.logs.out.clone()))
            .stderr(Sink::Append(self.logs.err.clone()));

        self.logs.note(&format!("[debug] {}", invocation.display()))?;

        let pid = self.runner.spawn_detached(invocation).await?;
        write_pidfile(&self.config.pidfile_path(), pid)?;

        info!("Started {} in the background (pid {})", app.display(), pid);
        Ok(pid)
    }
}

fn require_script(app: &Path) -> AppResult<()> {
    if app.is_file() {
        Ok(())
    } else {
        Err(AppError::MissingInput(app.to_path_buf()))
    }
}

/// Pid recorded in `path`, if readable
pub fn read_pidfile(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

pub fn write_pidfile(path: &Path, pid: u32) -> AppResult<()> {
    fs::write(path, format!("{}\n", pid))
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}
