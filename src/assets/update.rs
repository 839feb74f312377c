//! Per-file update step

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{GlobBuilder, GlobMatcher};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{discard_output, AssetPipeline, PipelineReport};
use crate::config::{AssetRule, BuildMode};
use crate::error::{AppError, AppResult};
use crate::process::{Input, Invocation, Sink};
use crate::utils::{is_stale, set_mtime};

/// A source whose output must be regenerated
struct StaleFile {
    source: PathBuf,
    output: PathBuf,
    mtime: SystemTime,
}

impl AssetPipeline<'_> {
    /// Transform every stale `*.{source_ext}` file of `rule`
    ///
    /// Returns whether any output was written.
    pub async fn update(
        &self,
        rule: &AssetRule,
        mode: BuildMode,
        report: &mut PipelineReport,
    ) -> AppResult<bool> {
        let source_dir = self.config.source_dir(&rule.category);
        let sources = find_sources(&source_dir, &rule.source_ext)?;

        if sources.is_empty() {
            info!("{}/*.{}: nothing to do", rule.category, rule.source_ext);
            return Ok(false);
        }

        let output_dir = self.config.output_dir(&rule.category, mode);
        let mut stale = Vec::new();

        for source in sources {
            let mtime = fs::metadata(&source)
                .and_then(|m| m.modified())
                .map_err(|e| AppError::io(format!("Failed to stat {}", source.display()), e))?;
            let output = output_path(&output_dir, &source, &rule.output_ext);

            if self.rebuild || is_stale(&output, mtime) {
                stale.push(StaleFile {
                    source,
                    output,
                    mtime,
                });
            }
        }

        if stale.is_empty() {
            debug!("{}/*.{} is up to date", rule.category, rule.source_ext);
            return Ok(false);
        }

        fs::create_dir_all(&output_dir)
            .map_err(|e| AppError::io(format!("Failed to create {}", output_dir.display()), e))?;

        let progress = progress_bar(stale.len(), &rule.category);

        for file in stale {
            let name = file
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.set_message(name.clone());

            self.logs
                .note(&format!("[{}] {} -> {}", mode, file.source.display(), file.output.display()))?;

            let invocation = Invocation::from_argv(rule.command(mode))?
                .cwd(&source_dir)
                .stdin(Input::File(file.source.clone()))
                .stdout(Sink::Truncate(file.output.clone()))
                .stderr(self.logs.run_sink());

            let outcome = match self.runner.run(invocation).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    progress.abandon();
                    discard_output(&file.output);
                    return Err(e);
                }
            };
            if !outcome.success() {
                progress.abandon();
                discard_output(&file.output);
                return Err(AppError::TransformFailed {
                    file: file.source,
                    status: outcome.status,
                });
            }

            set_mtime(&file.output, file.mtime).map_err(|e| {
                AppError::io(format!("Failed to set mtime of {}", file.output.display()), e)
            })?;

            debug!("Updated {} ({})", name, mode);
            report.updated.push(file.output);
            progress.inc(1);
        }

        progress.finish_and_clear();
        Ok(true)
    }
}

/// List `dir/*.{ext}` in file-name order
///
/// Dotfiles are skipped, as a shell glob would. A missing directory yields an
/// empty list.
pub fn find_sources(dir: &Path, ext: &str) -> AppResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let matcher = extension_matcher(ext)?;
    let mut sources = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            AppError::io(format!("Failed to list {}", dir.display()), std::io::Error::other(e))
        })?;

        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden && matcher.is_match(entry.file_name()) {
            sources.push(entry.into_path());
        }
    }

    Ok(sources)
}

fn extension_matcher(ext: &str) -> AppResult<GlobMatcher> {
    GlobBuilder::new(&format!("*.{}", ext))
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| AppError::usage(format!("invalid source extension '{}': {}", ext, e)))
}

fn output_path(output_dir: &Path, source: &Path, output_ext: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir.join(format!("{}.{}", stem, output_ext))
}

fn progress_bar(len: usize, category: &str) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::with_template("  {prefix} [{bar:24}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    progress.set_prefix(category.to_string());
    progress
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::process::testing::RecordingRunner;
    use crate::utils::get_mtime;

    #[tokio::test]
    async fn test_missing_output_is_transformed_and_synced() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = AssetRule {
            output_ext: "css".to_string(),
            ..cat_rule("stylesheets", "less", None)
        };
        write_source(&config, "stylesheets", "a.less", "a { b: c; }", 100);

        let runner = RecordingRunner::default();
        let pipeline = AssetPipeline::new(&config, &runner, &logs, false);
        let mut report = PipelineReport::default();

        let updated = pipeline.update(&rule, BuildMode::Debug, &mut report).await.unwrap();

        let output = config.output_dir("stylesheets", BuildMode::Debug).join("a.css");
        assert!(updated);
        assert_eq!(runner.calls(), vec!["cat"]);
        assert_eq!(fs::read_to_string(&output).unwrap(), "a { b: c; }");
        assert_eq!(get_mtime(&output), Some(at(100)));
        assert_eq!(report.updated, vec![output]);
    }

    #[tokio::test]
    async fn test_only_stale_files_are_transformed() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = cat_rule("javascripts", "js", None);
        write_source(&config, "javascripts", "fresh.js", "1", 100);
        write_source(&config, "javascripts", "newer.js", "2", 300);

        let runner = RecordingRunner::default();
        let pipeline = AssetPipeline::new(&config, &runner, &logs, false);
        let mut report = PipelineReport::default();
        assert!(pipeline.update(&rule, BuildMode::Debug, &mut report).await.unwrap());
        assert_eq!(runner.calls().len(), 2);

        // Touch one source past its output.
        write_source(&config, "javascripts", "newer.js", "22", 400);
        let mut report = PipelineReport::default();
        assert!(pipeline.update(&rule, BuildMode::Debug, &mut report).await.unwrap());
        assert_eq!(runner.calls().len(), 3);
        assert_eq!(report.updated.len(), 1);
        assert!(report.updated[0].ends_with("newer.js"));

        let mut report = PipelineReport::default();
        assert!(!pipeline.update(&rule, BuildMode::Debug, &mut report).await.unwrap());
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_rebuild_ignores_mtimes() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = cat_rule("javascripts", "js", None);
        write_source(&config, "javascripts", "a.js", "a", 100);
        write_source(&config, "javascripts", "b.js", "b", 100);

        let runner = RecordingRunner::default();
        let mut report = PipelineReport::default();
        AssetPipeline::new(&config, &runner, &logs, false)
            .update(&rule, BuildMode::Production, &mut report)
            .await
            .unwrap();

        let mut report = PipelineReport::default();
        let updated = AssetPipeline::new(&config, &runner, &logs, true)
            .update(&rule, BuildMode::Production, &mut report)
            .await
            .unwrap();

        assert!(updated);
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_source_folder_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = cat_rule("images", "png", None);

        let runner = RecordingRunner::default();
        let mut report = PipelineReport::default();
        let updated = AssetPipeline::new(&config, &runner, &logs, true)
            .update(&rule, BuildMode::Debug, &mut report)
            .await
            .unwrap();

        assert!(!updated);
        assert!(runner.calls().is_empty());
        assert!(!config.output_dir("images", BuildMode::Debug).exists());
    }

    #[tokio::test]
    async fn test_transform_runs_in_source_folder() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = AssetRule {
            debug: argv(&["sh", "-c", "cat >/dev/null; pwd -P"]),
            ..cat_rule("stylesheets", "less", None)
        };
        write_source(&config, "stylesheets", "a.less", "", 100);

        let mut report = PipelineReport::default();
        AssetPipeline::new(&config, &crate::process::SystemRunner, &logs, false)
            .update(&rule, BuildMode::Debug, &mut report)
            .await
            .unwrap();

        let printed = fs::read_to_string(&report.updated[0]).unwrap();
        let expected = config.source_dir("stylesheets").canonicalize().unwrap();
        assert_eq!(printed.trim(), expected.display().to_string());
    }

    #[tokio::test]
    async fn test_failure_names_file_and_logs_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = AssetRule {
            debug: argv(&["sh", "-c", "echo 'ParseError: broken' >&2; exit 2"]),
            ..cat_rule("stylesheets", "less", None)
        };
        write_source(&config, "stylesheets", "broken.less", "a {", 100);

        let mut report = PipelineReport::default();
        let err = AssetPipeline::new(&config, &crate::process::SystemRunner, &logs, false)
            .update(&rule, BuildMode::Debug, &mut report)
            .await
            .unwrap_err();

        match err {
            AppError::TransformFailed { file, status } => {
                assert!(file.ends_with("broken.less"));
                assert_eq!(status.code, Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(logs.tail(5).iter().any(|l| l.contains("ParseError: broken")));
    }

    #[tokio::test]
    async fn test_failed_transform_output_is_rebuilt_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let failing = AssetRule {
            debug: argv(&["sh", "-c", "echo partial; exit 1"]),
            ..cat_rule("javascripts", "js", None)
        };
        write_source(&config, "javascripts", "a.js", "a();", 100);
        let output = config.output_dir("javascripts", BuildMode::Debug).join("a.js");

        let runner = crate::process::SystemRunner;
        let pipeline = AssetPipeline::new(&config, &runner, &logs, false);

        let mut report = PipelineReport::default();
        let err = pipeline
            .update(&failing, BuildMode::Debug, &mut report)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(!output.exists());

        let mut report = PipelineReport::default();
        let updated = pipeline
            .update(&cat_rule("javascripts", "js", None), BuildMode::Debug, &mut report)
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(fs::read_to_string(&output).unwrap(), "a();");
        assert_eq!(get_mtime(&output), Some(at(100)));
    }

    #[tokio::test]
    async fn test_missing_transform_program_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let (config, logs) = project(dir.path(), Vec::new());
        let rule = AssetRule {
            debug: argv(&["appctl-no-such-transform"]),
            ..cat_rule("javascripts", "js", None)
        };
        write_source(&config, "javascripts", "a.js", "a();", 100);

        let mut report = PipelineReport::default();
        let err = AssetPipeline::new(&config, &crate::process::SystemRunner, &logs, false)
            .update(&rule, BuildMode::Debug, &mut report)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Io { .. }));
        let output = config.output_dir("javascripts", BuildMode::Debug).join("a.js");
        assert!(!output.exists());
    }

    #[test]
    fn test_find_sources_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.less", "a.less", "c.css", "defaults", ".draft.less"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("nested.less")).unwrap();

        let found = find_sources(dir.path(), "less").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.less", "b.less"]);
        assert!(find_sources(&dir.path().join("missing"), "less").unwrap().is_empty());
    }
}
