//! Runs the `git` executable.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::{Error, Result};

pub(crate) const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// A single git invocation.
pub(crate) struct GitCommand<'a> {
    repo: &'a str,
    args: Vec<String>,
    cwd: Option<&'a Path>,
    envs: Vec<(&'static str, String)>,
    timeout: Duration,
}

impl<'a> GitCommand<'a> {
    /// `repo` is only used to label errors and must not carry credentials.
    pub(crate) fn new(repo: &'a str) -> Self {
        Self {
            repo,
            args: Vec::new(),
            cwd: None,
            envs: Vec::new(),
            timeout: GIT_TIMEOUT,
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn current_dir(mut self, dir: &'a Path) -> Self {
        self.cwd = Some(dir);
        self
    }

    pub(crate) fn env(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.envs.push((key, value.into()));
        self
    }

    #[cfg(test)]
    pub(crate) fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the command, returning its trimmed stdout.
    pub(crate) async fn run(self) -> Result<String> {
        self.run_program("git").await
    }

    async fn run_program(self, program: &str) -> Result<String> {
        let mut cmd = Command::new(program);
        cmd.args(&self.args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(self.envs.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.cwd {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
            .map_err(|e| self.error(format!("failed to run {}: {}", program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(format!(
                "exit code {:?}: {} {}",
                output.status.code(),
                stdout.trim(),
                stderr.trim()
            )));
        }

        Ok(stdout.trim().to_string())
    }

    fn error(&self, message: String) -> Error {
        Error::Git {
            repo: self.repo.to_string(),
            message,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let out = GitCommand::new("local")
            .arg("-c")
            .arg("echo $GREETING")
            .env("GREETING", "hello")
            .run_program("sh")
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_failure_includes_output() {
        let err = GitCommand::new("local")
            .arg("-c")
            .arg("echo oops >&2; exit 3")
            .run_program("sh")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Git { .. }));
        let message = err.to_string();
        assert!(message.contains("oops"));
        assert!(message.contains("3"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let err = GitCommand::new("local")
            .arg("-c")
            .arg("sleep 5")
            .timeout(Duration::from_millis(100))
            .run_program("sh")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_current_dir() {
        let temp = tempfile::tempdir().unwrap();
        let out = GitCommand::new("local")
            .arg("-c")
            .arg("pwd")
            .current_dir(temp.path())
            .run_program("sh")
            .await
            .unwrap();
        assert!(out.ends_with(temp.path().file_name().unwrap().to_str().unwrap()));
    }
}
