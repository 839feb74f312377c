//! Bundle merge step
//!
//! The manifest (`defaults` in a category's source folder) lists base names
//! one per line. Sources are concatenated in that order, each wrapped in
//! begin/end comment markers, and the stream is fed through the bundle
//! command.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{discard_output, AssetPipeline};
use crate::config::{AssetRule, BuildMode, BundleRule};
use crate::error::{AppError, AppResult};
use crate::process::{Input, Invocation, Sink};

/// Manifest file name inside a source folder
pub const MANIFEST_FILE: &str = "defaults";

impl AssetPipeline<'_> {
    /// Build the bundle of `rule`
    ///
    /// Returns the written path, or `None` when the category has no manifest.
    pub async fn merge(
        &self,
        rule: &AssetRule,
        bundle: &BundleRule,
        mode: BuildMode,
    ) -> AppResult<Option<PathBuf>> {
        let source_dir = self.config.source_dir(&rule.category);

        let Some(names) = read_manifest(&source_dir)? else {
            warn!(
                "No {} in {}, skipping {}",
                MANIFEST_FILE,
                source_dir.display(),
                bundle.name
            );
            return Ok(None);
        };

        let stream = concat_fragments(&source_dir, &names, &rule.source_ext)?;

        let output_dir = self.config.output_dir(&rule.category, mode);
        fs::create_dir_all(&output_dir)
            .map_err(|e| AppError::io(format!("Failed to create {}", output_dir.display()), e))?;
        let output = output_dir.join(&bundle.name);

        self.logs.note(&format!(
            "[{}] merge {} file(s) -> {}",
            mode,
            names.len(),
            output.display()
        ))?;

        let invocation = Invocation::from_argv(&bundle.command)?
            .cwd(&source_dir)
            .stdin(Input::Bytes(stream))
            .stdout(Sink::Truncate(output.clone()))
            .stderr(self.logs.run_sink());

        let outcome = match self.runner.run(invocation).await {
            Ok(outcome) => outcome,
            Err(e) => {
                discard_output(&output);
                return Err(e);
            }
        };
        if !outcome.success() {
            discard_output(&output);
            return Err(AppError::MergeFailed {
                bundle: output,
                status: outcome.status,
            });
        }

        info!("Merged {} file(s) into {}", names.len(), bundle.name);
        Ok(Some(output))
    }
}

/// Read the manifest of a source folder
///
/// Blank lines and `#` comments are skipped. Returns `None` when the folder
/// has no manifest.
pub fn read_manifest(source_dir: &Path) -> AppResult<Option<Vec<String>>> {
    let path = source_dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;

    let names = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    Ok(Some(names))
}

/// Concatenate `names` (base names, `ext` appended) with comment markers
pub fn concat_fragments(source_dir: &Path, names: &[String], ext: &str) -> AppResult<Vec<u8>> {
    let mut stream = Vec::new();

    for name in names {
        let file_name = format!("{}.{}", name, ext);
        let path = source_dir.join(&file_name);
        if !path.is_file() {
            return Err(AppError::MissingInput(path));
        }

        let content = fs::read(&path)
            .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;

        stream.extend_from_slice(format!("/* begin file: {} */\n", file_name).as_bytes());
        stream.extend_from_slice(&content);
        if !content.ends_with(b"\n") {
            stream.push(b'\n');
        }
        stream.extend_from_slice(format!("/* end file: {} */\n", file_name).as_bytes());
    }

    Ok(stream)
}
