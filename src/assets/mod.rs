//! Asset pipeline
//!
//! Runs the configured [`AssetRule`]s for one build mode: the per-file
//! update step first, then the bundle merge for categories that changed or
//! whose bundle is missing.
//! Everything is sequential; the first failing transform aborts the run.

mod merge;
mod update;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{BuildMode, Config};
use crate::error::AppResult;
use crate::logs::RunLogs;
use crate::process::Runner;
use crate::utils::relative_path;

pub use merge::{concat_fragments, read_manifest, MANIFEST_FILE};
pub use update::find_sources;

/// What one pipeline run produced
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Per-file outputs regenerated in this run
    pub updated: Vec<PathBuf>,

    /// Bundles written in this run
    pub bundles: Vec<PathBuf>,
}

/// Asset pipeline bound to one configuration and runner
pub struct AssetPipeline<'a> {
    config: &'a Config,
    runner: &'a dyn Runner,
    logs: &'a RunLogs,
    rebuild: bool,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn Runner, logs: &'a RunLogs, rebuild: bool) -> Self {
        Self {
            config,
            runner,
            logs,
            rebuild,
        }
    }

    /// Update every category for `mode`, merging bundles in production
    pub async fn run(&self, mode: BuildMode) -> AppResult<PipelineReport> {
        let start = Instant::now();
        let mut report = PipelineReport::default();

        info!("Updating {} assets", mode);
        self.logs.note(&format!("== {} assets", mode))?;

        for rule in &self.config.assets {
            let updated = self.update(rule, mode, &mut report).await?;

            if let Some(bundle) = &rule.bundle {
                let missing = !self
                    .config
                    .output_dir(&rule.category, mode)
                    .join(&bundle.name)
                    .exists();
                if mode.is_production() && (updated || missing) {
                    let written = self.merge(rule, bundle, mode).await?;
                    report.bundles.extend(written);
                }
            }
        }

        debug!("{} pipeline finished in {:?}", mode, start.elapsed());
        Ok(report)
    }

    /// Remove the output tree of `mode`
    ///
    /// Failures are reported and otherwise ignored.
    pub fn clean(&self, mode: BuildMode) -> bool {
        let dir = self.config.public_dir(mode);
        if !dir.exists() {
            debug!("Nothing to clean at {}", dir.display());
            return true;
        }

        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!("Removed {}", relative_path(&self.config.root, &dir));
                true
            }
            Err(e) => {
                warn!("Failed to remove {}: {}", dir.display(), e);
                false
            }
        }
    }
}

/// Remove an output left behind by a failed command
fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", path.display(), e),
    }
}
