//! Error taxonomy and exit-code mapping

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across the crate
pub type AppResult<T> = Result<T, AppError>;

/// Everything that can abort an invocation
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad or unknown flag, missing argument, conflicting modes, no command
    #[error("{0}")]
    Usage(String),

    /// Configuration file could not be read or is invalid
    #[error("configuration error: {0:#}")]
    Config(anyhow::Error),

    /// A required input file is absent
    #[error("missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// The per-file transform exited non-zero
    #[error("transform of {} failed with {status}", file.display())]
    TransformFailed { file: PathBuf, status: ExitStatusText },

    /// The bundle transform exited non-zero
    #[error("merge into {} failed with {status}", bundle.display())]
    MergeFailed { bundle: PathBuf, status: ExitStatusText },

    /// Any other external command exited non-zero
    #[error("`{command}` failed with {status}")]
    Command { command: String, status: ExitStatusText },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) | AppError::Config(_) | AppError::MissingInput(_) => 1,
            AppError::TransformFailed { .. } => 2,
            AppError::MergeFailed { .. } => 3,
            AppError::Command { status, .. } => match status.code {
                Some(code) if code != 0 => code,
                _ => 1,
            },
            AppError::Io { .. } => 1,
        }
    }

    /// Whether the run log tail helps diagnose this error
    pub fn wants_log_tail(&self) -> bool {
        matches!(
            self,
            AppError::TransformFailed { .. } | AppError::MergeFailed { .. }
        )
    }

    pub fn usage(message: impl Into<String>) -> Self {
        AppError::Usage(message.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Printable exit status of a finished subprocess
///
/// `code` is `None` when the process was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatusText {
    pub code: Option<i32>,
}

impl std::fmt::Display for ExitStatusText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "termination by signal"),
        }
    }
}
