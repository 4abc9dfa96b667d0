//! Binary locator: asks the package lookup helper where the lint tool lives.
//!
//! The helper is run from the document's directory with the package name as
//! its only argument, so a project-local install shadows a global one. Exit
//! codes are interpreted as:
//!
//! - `0` with a path on the first stdout line: found
//! - `0` with empty stdout or usage text: not found
//! - `1..=not_found_exit_code`: not found
//! - anything else, or a spawn failure: the helper itself is broken

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lintel_types::LookupSettings;

use crate::fs::mark_executable;
use crate::process::{ProcessOutput, ProcessRequest, ProcessRunner};

/// Retries after re-asserting the helper's executable bit.
const MAX_SELF_HEAL_ATTEMPTS: usize = 1;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("lookup helper {} could not run: {message}", helper.display())]
    Shell { helper: PathBuf, message: String },
}

pub struct BinaryLocator {
    runner: Arc<dyn ProcessRunner>,
    settings: LookupSettings,
    package: String,
}

impl BinaryLocator {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: LookupSettings, package: String) -> Self {
        Self {
            runner,
            settings,
            package,
        }
    }

    #[must_use]
    pub fn helper(&self) -> &Path {
        self.settings.helper()
    }

    /// Resolve the tool binary for `directory`.
    ///
    /// `Ok(None)` is a clean miss. A broken helper is healed (executable bit)
    /// and retried once before the error is returned.
    pub async fn locate(&self, directory: &Path) -> Result<Option<PathBuf>, LocateError> {
        let mut heals = 0;
        loop {
            match self.lookup_once(directory).await {
                Err(err) if heals < MAX_SELF_HEAL_ATTEMPTS => {
                    heals += 1;
                    tracing::warn!(
                        directory = %directory.display(),
                        "{err}; marking helper executable and retrying"
                    );
                    self.heal().await;
                }
                result => return result,
            }
        }
    }

    async fn lookup_once(&self, directory: &Path) -> Result<Option<PathBuf>, LocateError> {
        let request = ProcessRequest::new(self.settings.helper(), directory)
            .arg(self.package.clone())
            .use_shell(self.settings.use_shell());

        let output = self
            .runner
            .run(&request)
            .await
            .map_err(|e| LocateError::Shell {
                helper: self.settings.helper().clone(),
                message: e.to_string(),
            })?;

        interpret_lookup(
            &output,
            self.settings.not_found_exit_code(),
            directory,
            self.settings.helper(),
        )
    }

    async fn heal(&self) {
        let Some(path) = self.helper_path() else {
            tracing::debug!(
                helper = %self.settings.helper().display(),
                "Helper not found on disk; nothing to heal"
            );
            return;
        };
        if let Err(e) = mark_executable(&path).await {
            tracing::debug!(helper = %path.display(), "Failed to mark helper executable: {e}");
        }
    }

    /// Concrete path of the helper: as configured when it has a directory
    /// component, otherwise looked up on `PATH`.
    pub(crate) fn helper_path(&self) -> Option<PathBuf> {
        let helper = self.settings.helper();
        if helper.components().count() > 1 || helper.is_absolute() {
            Some(helper.clone())
        } else {
            which::which(helper).ok()
        }
    }
}

fn interpret_lookup(
    output: &ProcessOutput,
    not_found_exit_code: i32,
    directory: &Path,
    helper: &Path,
) -> Result<Option<PathBuf>, LocateError> {
    match output.code {
        Some(0) => {
            let first = output.stdout.lines().next().map(str::trim).unwrap_or("");
            if first.is_empty() || looks_like_usage(first) {
                return Ok(None);
            }
            let path = PathBuf::from(first);
            if path.is_absolute() {
                Ok(Some(path))
            } else {
                Ok(Some(directory.join(path)))
            }
        }
        Some(code) if (1..=not_found_exit_code).contains(&code) => Ok(None),
        Some(code) => Err(LocateError::Shell {
            helper: helper.to_path_buf(),
            message: format!("exited with code {code}: {}", output.stderr.trim()),
        }),
        None => Err(LocateError::Shell {
            helper: helper.to_path_buf(),
            message: "terminated by signal".to_string(),
        }),
    }
}

fn looks_like_usage(line: &str) -> bool {
    line.to_ascii_lowercase().starts_with("usage")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessFut;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::Mutex;

    /// Replays queued responses and records requests.
    struct ScriptedRunner {
        responses: Mutex<VecDeque<io::Result<ProcessOutput>>>,
        requests: Mutex<Vec<ProcessRequest>>,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<io::Result<ProcessOutput>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run<'a>(&'a self, request: &'a ProcessRequest) -> ProcessFut<'a> {
            self.requests.lock().unwrap().push(request.clone());
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ProcessOutput::exited(1, "")));
            Box::pin(async move { response })
        }
    }

    fn locator(runner: Arc<ScriptedRunner>, helper: &Path) -> BinaryLocator {
        BinaryLocator::new(runner, LookupSettings::new(helper), "eslint".to_string())
    }

    #[tokio::test]
    async fn test_found_on_first_stdout_line() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput::exited(
            0,
            "/home/u/proj/node_modules/.bin/eslint\n",
        ))]);
        let loc = locator(runner.clone(), Path::new("/opt/npm-which"));

        let found = loc.locate(Path::new("/home/u/proj/src")).await.unwrap();
        assert_eq!(
            found,
            Some(PathBuf::from("/home/u/proj/node_modules/.bin/eslint"))
        );

        let requests = runner.requests.lock().unwrap();
        assert_eq!(requests[0].program, PathBuf::from("/opt/npm-which"));
        assert_eq!(requests[0].args, vec!["eslint".to_string()]);
        assert_eq!(requests[0].cwd, PathBuf::from("/home/u/proj/src"));
        assert!(requests[0].stdin.is_none());
    }

    #[tokio::test]
    async fn test_relative_path_joins_directory() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput::exited(
            0,
            "node_modules/.bin/eslint",
        ))]);
        let loc = locator(runner, Path::new("/opt/npm-which"));
        let found = loc.locate(Path::new("/home/u/proj")).await.unwrap();
        assert_eq!(
            found,
            Some(PathBuf::from("/home/u/proj/node_modules/.bin/eslint"))
        );
    }

    #[tokio::test]
    async fn test_empty_stdout_is_not_found() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput::exited(0, "  \n"))]);
        let loc = locator(runner, Path::new("/opt/npm-which"));
        assert_eq!(loc.locate(Path::new("/home/u")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_usage_text_is_not_found() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput::exited(
            0,
            "Usage: npm-which <command>\n",
        ))]);
        let loc = locator(runner, Path::new("/opt/npm-which"));
        assert_eq!(loc.locate(Path::new("/home/u")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_not_found_exit_code() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput::exited(1, ""))]);
        let loc = locator(runner.clone(), Path::new("/opt/npm-which"));
        assert_eq!(loc.locate(Path::new("/home/u")).await.unwrap(), None);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_code_retries_once_then_errors() {
        let runner = ScriptedRunner::new(vec![
            Ok(ProcessOutput::exited(126, "").with_stderr("permission denied")),
            Ok(ProcessOutput::exited(126, "").with_stderr("permission denied")),
        ]);
        let loc = locator(runner.clone(), Path::new("/opt/missing/npm-which"));
        let err = loc.locate(Path::new("/home/u")).await.unwrap_err();
        assert!(err.to_string().contains("exited with code 126"));
        assert_eq!(runner.calls(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_self_heal_marks_helper_executable() {
        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("npm-which");
        std::fs::write(&helper, "#!/bin/sh\n").unwrap();

        let runner = ScriptedRunner::new(vec![
            Err(io::Error::from(io::ErrorKind::PermissionDenied)),
            Ok(ProcessOutput::exited(0, "/usr/lib/node_modules/.bin/eslint")),
        ]);
        let loc = locator(runner.clone(), &helper);
        let found = loc.locate(dir.path()).await.unwrap();

        assert_eq!(
            found,
            Some(PathBuf::from("/usr/lib/node_modules/.bin/eslint"))
        );
        assert_eq!(runner.calls(), 2);
        assert!(crate::fs::is_executable(&helper).await);
    }

    #[test]
    fn test_signal_is_shell_error() {
        let output = ProcessOutput {
            code: None,
            ..ProcessOutput::default()
        };
        assert!(interpret_lookup(&output, 1, Path::new("/"), Path::new("h")).is_err());
    }

    #[test]
    fn test_negative_code_is_shell_error() {
        let output = ProcessOutput::exited(-1, "");
        assert!(interpret_lookup(&output, 1, Path::new("/"), Path::new("h")).is_err());
    }

    #[test]
    fn test_helper_path_keeps_explicit_paths() {
        let runner = ScriptedRunner::new(vec![]);
        let loc = locator(runner, Path::new("/opt/bin/npm-which"));
        assert_eq!(loc.helper_path(), Some(PathBuf::from("/opt/bin/npm-which")));
    }
}
