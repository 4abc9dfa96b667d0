//! Lint invoker: runs the tool over an in-memory snapshot.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lintel_types::{Diagnostic, LinterSettings};

use crate::cache::ToolInstance;
use crate::process::{ProcessRequest, ProcessRunner};
use crate::report::parse_report;

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The tool could not be started.
    #[error("failed to run {}: {source}", binary.display())]
    Shell {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The tool ran but exited with a failure-grade code.
    #[error("{} exited with {}: {stderr}", binary.display(), describe_code(*code))]
    Process {
        binary: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    #[error("malformed lint report: {0}")]
    Parse(#[from] serde_json::Error),
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

pub struct LintInvoker {
    runner: Arc<dyn ProcessRunner>,
    source: String,
    max_issue_exit_code: i32,
    cache_dir: Option<PathBuf>,
    use_shell: bool,
}

impl LintInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: &LinterSettings, use_shell: bool) -> Self {
        let cache_dir = settings
            .cache_dir()
            .cloned()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join("lintel")));
        Self {
            runner,
            source: settings.source().to_string(),
            max_issue_exit_code: settings.max_issue_exit_code(),
            cache_dir,
            use_shell,
        }
    }

    /// Lint `text` as if it were the contents of `path`.
    ///
    /// Exit codes `0..=max_issue_exit_code` are success ("no issues" or
    /// "issues found"); anything else is `InvokeError::Process`.
    pub async fn lint(
        &self,
        instance: &ToolInstance,
        text: &str,
        path: &Path,
        working_dir: &Path,
    ) -> Result<Vec<Diagnostic>, InvokeError> {
        let binary = instance.binary_path();
        let mut request = ProcessRequest::new(binary, working_dir)
            .arg("--format")
            .arg("json")
            .arg("--stdin")
            .arg("--stdin-filename")
            .arg(path.to_string_lossy().into_owned())
            .stdin(text)
            .use_shell(self.use_shell);

        if let Some(location) = self.cache_location().await {
            request = request.arg("--cache").arg("--cache-location").arg(location);
        }

        tracing::debug!(
            binary = %binary.display(),
            path = %path.display(),
            "Invoking lint tool"
        );

        let output = self
            .runner
            .run(&request)
            .await
            .map_err(|source| InvokeError::Shell {
                binary: binary.to_path_buf(),
                source,
            })?;

        match output.code {
            Some(code) if (0..=self.max_issue_exit_code).contains(&code) => {}
            code => {
                return Err(InvokeError::Process {
                    binary: binary.to_path_buf(),
                    code,
                    stderr: output.stderr.trim().to_string(),
                });
            }
        }

        Ok(parse_report(&output.stdout, &self.source)?)
    }

    /// Cache directory hint for the tool, if it exists or can be created.
    async fn cache_location(&self) -> Option<String> {
        let dir = self.cache_dir.as_ref()?;
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::debug!(dir = %dir.display(), "Skipping tool cache: {e}");
            return None;
        }
        // Trailing separator marks the location as a directory.
        let mut location = dir.to_string_lossy().into_owned();
        if !location.ends_with(std::path::MAIN_SEPARATOR) {
            location.push(std::path::MAIN_SEPARATOR);
        }
        Some(location)
    }
}
