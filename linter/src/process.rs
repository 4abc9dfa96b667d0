//! Subprocess execution facility.
//!
//! Every lookup and lint invocation goes through [`ProcessRunner`]; nothing
//! else in the crate spawns processes. The trait is object-safe (boxed
//! future) so the manager can hold an `Arc<dyn ProcessRunner>` and tests can
//! script responses without touching the OS.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRequest {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Payload written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    /// Run through the platform shell instead of spawning `program` directly.
    pub use_shell: bool,
}

impl ProcessRequest {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            stdin: None,
            use_shell: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    pub fn use_shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }
}

/// Result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn exited(code: i32, stdout: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }
}

pub type ProcessFut<'a> = Pin<Box<dyn Future<Output = io::Result<ProcessOutput>> + Send + 'a>>;

/// Runs subprocesses asynchronously.
///
/// `Err` means the process could not be started at all; a process that ran
/// and failed is an `Ok` output with a non-zero code.
pub trait ProcessRunner: Send + Sync {
    fn run<'a>(&'a self, request: &'a ProcessRequest) -> ProcessFut<'a>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl ProcessRunner for TokioProcessRunner {
    fn run<'a>(&'a self, request: &'a ProcessRequest) -> ProcessFut<'a> {
        Box::pin(run_command(request))
    }
}

async fn run_command(request: &ProcessRequest) -> io::Result<ProcessOutput> {
    let mut cmd = build_command(request);
    cmd.current_dir(&request.cwd)
        .stdin(if request.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    // Feed stdin concurrently with draining stdout so a chatty child can't
    // deadlock on a full pipe.
    let writer = match (child.stdin.take(), request.stdin.clone()) {
        (Some(mut stdin), Some(payload)) => Some(tokio::spawn(async move {
            let result = stdin.write_all(payload.as_bytes()).await;
            drop(stdin);
            result
        })),
        _ => None,
    };

    let output = child.wait_with_output().await?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => {
                tracing::debug!(program = %request.program.display(), "stdin write failed: {e}");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(
                    program = %request.program.display(),
                    "stdin writer task failed: {e}"
                );
            }
        }
    }

    Ok(ProcessOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn build_command(request: &ProcessRequest) -> Command {
    if !request.use_shell {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        return cmd;
    }

    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(&request.program).args(&request.args);
        cmd
    }
    #[cfg(not(windows))]
    {
        let line = std::iter::once(request.program.to_string_lossy().into_owned())
            .chain(request.args.iter().cloned())
            .map(|part| shell_quote(&part))
            .collect::<Vec<_>>()
            .join(" ");
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

/// Single-quote `value` for a POSIX shell.
#[cfg(not(windows))]
fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '-' | '_' | '=' | ':'))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
