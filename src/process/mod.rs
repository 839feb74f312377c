//! External command execution
//!
//! Every subprocess appctl starts (transforms, the process monitor, the
//! interpreter, `kill`) is described by an [`Invocation`] and executed by a
//! [`Runner`]. The runner is a trait so stages can be exercised with a
//! recording implementation.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AppError, AppResult, ExitStatusText};

/// Where a subprocess reads its standard input from
#[derive(Debug, Clone)]
pub enum Input {
    Null,
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// Where a subprocess writes one of its output streams
#[derive(Debug, Clone)]
pub enum Sink {
    Null,
    Inherit,
    Capture,
    Truncate(PathBuf),
    Append(PathBuf),
}

/// A fully described subprocess
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: Input,
    pub stdout: Sink,
    pub stderr: Sink,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: Input::Null,
            stdout: Sink::Capture,
            stderr: Sink::Capture,
        }
    }

    /// Build from a configured command line (`argv[0]` is the program)
    pub fn from_argv(argv: &[String]) -> AppResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AppError::usage("empty command line"))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: Input) -> Self {
        self.stdin = input;
        self
    }

    pub fn stdout(mut self, sink: Sink) -> Self {
        self.stdout = sink;
        self
    }

    pub fn stderr(mut self, sink: Sink) -> Self {
        self.stderr = sink;
        self
    }

    /// Command line as a single printable string
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a finished subprocess
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: ExitStatusText,
    /// Captured stdout (empty unless the sink was [`Sink::Capture`])
    pub stdout: Vec<u8>,
    /// Captured stderr (empty unless the sink was [`Sink::Capture`])
    pub diagnostics: Vec<u8>,
}

impl Outcome {
    pub fn success(&self) -> bool {
        self.status.code == Some(0)
    }
}

/// Executes invocations
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run to completion
    async fn run(&self, invocation: Invocation) -> AppResult<Outcome>;

    /// Start in the background and return the pid without waiting
    async fn spawn_detached(&self, invocation: Invocation) -> AppResult<u32>;
}

/// Runner backed by real OS processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(&self, invocation: &Invocation) -> AppResult<Command> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);

        if let Some(cwd) = &invocation.cwd {
            cmd.current_dir(cwd);
        }

        let stdin = match &invocation.stdin {
            Input::Null => Stdio::null(),
            Input::Bytes(_) => Stdio::piped(),
            Input::File(path) => Stdio::from(
                File::open(path)
                    .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))?,
            ),
        };

        cmd.stdin(stdin)
            .stdout(open_sink(&invocation.stdout)?)
            .stderr(open_sink(&invocation.stderr)?);

        Ok(cmd)
    }
}

#[async_trait]
impl Runner for SystemRunner {
    async fn run(&self, invocation: Invocation) -> AppResult<Outcome> {
        debug!("Running `{}`", invocation.display());

        let mut child = self
            .command(&invocation)?
            .spawn()
            .map_err(|e| AppError::io(format!("Failed to start `{}`", invocation.program), e))?;

        // Feed stdin concurrently so a child filling its stdout pipe cannot
        // deadlock against us.
        let feeder = match (&invocation.stdin, child.stdin.take()) {
            (Input::Bytes(bytes), Some(mut stdin)) => {
                let bytes = bytes.clone();
                Some(tokio::spawn(async move {
                    let result = stdin.write_all(&bytes).await;
                    drop(stdin);
                    result
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AppError::io(format!("Failed to wait for `{}`", invocation.program), e))?;

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Ok(())) => {}
                // The child may exit without draining its input.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => {
                    return Err(AppError::io(
                        format!("Failed to write stdin of `{}`", invocation.program),
                        e,
                    ))
                }
                Err(e) => {
                    return Err(AppError::io(
                        "stdin writer task failed",
                        std::io::Error::other(e),
                    ))
                }
            }
        }

        Ok(Outcome {
            status: ExitStatusText {
                code: output.status.code(),
            },
            stdout: output.stdout,
            diagnostics: output.stderr,
        })
    }

    async fn spawn_detached(&self, invocation: Invocation) -> AppResult<u32> {
        debug!("Spawning `{}` in the background", invocation.display());

        let mut cmd = self.command(&invocation)?;
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| AppError::io(format!("Failed to start `{}`", invocation.program), e))?;

        child.id().ok_or_else(|| {
            AppError::io(
                format!("`{}` exited before its pid was read", invocation.program),
                std::io::Error::other("no pid"),
            )
        })
    }
}

fn open_sink(sink: &Sink) -> AppResult<Stdio> {
    Ok(match sink {
        Sink::Null => Stdio::null(),
        Sink::Inherit => Stdio::inherit(),
        Sink::Capture => Stdio::piped(),
        Sink::Truncate(path) => Stdio::from(
            File::create(path)
                .map_err(|e| AppError::io(format!("Failed to create {}", path.display()), e))?,
        ),
        Sink::Append(path) => Stdio::from(open_append(path)?),
    })
}

/// Open a file for appending, creating it when absent
pub fn open_append(path: &Path) -> AppResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::io(format!("Failed to open {}", path.display()), e))
}
