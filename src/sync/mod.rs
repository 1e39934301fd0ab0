//! Background git synchronization.
//!
//! A [`GitSync`] keeps a shallow clone of a repository up to date so that a
//! [`DirectorySource`](crate::loaders::DirectorySource) can read credential
//! files from it.

mod shell;

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{Mutex, OnceCell, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::GitConfig;
use crate::{Error, Result};
use shell::GitCommand;

/// Environment variable the askpass helper reads the key passphrase from.
const PASSPHRASE_ENV: &str = "CREDENTIAL_SOURCES_SSH_PASSPHRASE";

/// Credentials used to reach the repository.
#[derive(Debug, Clone)]
pub enum GitAuth {
    None,
    Http {
        username: String,
        password: SecretString,
    },
    Token(SecretString),
    Ssh {
        private_key: PathBuf,
        passphrase: Option<SecretString>,
    },
}

impl GitAuth {
    /// Username and password win over a token, which wins over an SSH key.
    pub fn from_config(config: &GitConfig) -> Self {
        let non_empty = |s: &&SecretString| !s.expose_secret().is_empty();

        if let (Some(username), Some(password)) = (
            config.username.as_ref().filter(|u| !u.is_empty()),
            config.password.as_ref().filter(non_empty),
        ) {
            return GitAuth::Http {
                username: username.clone(),
                password: password.clone(),
            };
        }
        if let Some(token) = config.token.as_ref().filter(non_empty) {
            return GitAuth::Token(token.clone());
        }
        if let Some(key) = config
            .ssh_private_key_file_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        {
            return GitAuth::Ssh {
                private_key: key.clone(),
                passphrase: config.ssh_private_key_passphrase.clone(),
            };
        }
        GitAuth::None
    }

    pub fn name(&self) -> &'static str {
        match self {
            GitAuth::None => "none",
            GitAuth::Http { .. } => "http",
            GitAuth::Token(_) => "token",
            GitAuth::Ssh { .. } => "ssh",
        }
    }
}

/// Outcome of the sync runs so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub runs: u64,
}

pub struct GitSync {
    repo: String,
    branch: String,
    clone_dir: PathBuf,
    repo_subdir: String,
    interval: Duration,
    auth: GitAuth,
    known_hosts: Option<PathBuf>,
    trust_unknown_hosts: bool,
    askpass: OnceCell<PathBuf>,
    cloned: Mutex<bool>,
}

impl GitSync {
    pub fn new(config: &GitConfig, clone_dir: impl Into<PathBuf>) -> Self {
        let auth = GitAuth::from_config(config);
        let known_hosts = config
            .ssh_known_hosts_file_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty());

        if matches!(auth, GitAuth::Ssh { .. })
            && known_hosts.is_some()
            && config.ssh_trust_unknown_hosts
        {
            tracing::warn!(
                repo = %config.repo,
                "sshTrustUnknownHosts is ignored because sshKnownHostsFilePath is set"
            );
        }

        Self {
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            clone_dir: clone_dir.into(),
            repo_subdir: config.repo_subdir.clone(),
            interval: Duration::from_secs(config.sync_interval_secs.max(1)),
            auth,
            known_hosts,
            trust_unknown_hosts: config.ssh_trust_unknown_hosts,
            askpass: OnceCell::new(),
            cloned: Mutex::new(false),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn auth(&self) -> &GitAuth {
        &self.auth
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Directory holding the credential files inside the clone.
    pub fn content_dir(&self) -> PathBuf {
        let subdir = self.repo_subdir.trim_matches('/');
        if subdir.is_empty() {
            self.clone_dir.clone()
        } else {
            self.clone_dir.join(subdir)
        }
    }

    /// URL passed to `git clone`, with HTTP credentials embedded.
    pub fn clone_url(&self) -> Result<String> {
        match &self.auth {
            GitAuth::Http { username, password } => self.with_userinfo(&format!(
                "{}:{}",
                urlencoding::encode(username),
                urlencoding::encode(password.expose_secret())
            )),
            GitAuth::Token(token) => {
                self.with_userinfo(&urlencoding::encode(token.expose_secret()))
            }
            GitAuth::None | GitAuth::Ssh { .. } => Ok(self.repo.clone()),
        }
    }

    fn with_userinfo(&self, userinfo: &str) -> Result<String> {
        let url = Url::parse(&self.repo)
            .map_err(|e| Error::config(format!("git repo {} is not a valid URL: {}", self.repo, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("git repo {} has no host", self.repo)))?;

        let mut out = format!("{}://{}@{}", url.scheme(), userinfo, host);
        if let Some(port) = url.port() {
            let _ = write!(out, ":{}", port);
        }
        out.push_str(url.path());
        if let Some(query) = url.query() {
            out.push('?');
            out.push_str(query);
        }
        Ok(out)
    }

    /// Value for `GIT_SSH_COMMAND` when authenticating with an SSH key.
    pub fn ssh_command(&self) -> Option<String> {
        let GitAuth::Ssh { private_key, .. } = &self.auth else {
            return None;
        };
        let mut command = format!("ssh -i {}", private_key.display());
        match &self.known_hosts {
            Some(file) => {
                let _ = write!(command, " -o UserKnownHostsFile={}", file.display());
            }
            None if self.trust_unknown_hosts => {
                command.push_str(" -o StrictHostKeyChecking=no");
            }
            None => {}
        }
        Some(command)
    }

    /// Environment for git subprocesses when authenticating with an SSH key.
    ///
    /// A key passphrase is answered by an askpass helper script that echoes
    /// it from the child's environment, so the secret never touches disk.
    async fn ssh_env(&self) -> Result<Vec<(&'static str, String)>> {
        let GitAuth::Ssh { passphrase, .. } = &self.auth else {
            return Ok(Vec::new());
        };
        let mut envs = Vec::new();
        if let Some(ssh) = self.ssh_command() {
            envs.push(("GIT_SSH_COMMAND", ssh));
        }
        if let Some(passphrase) = passphrase {
            let script = self
                .askpass
                .get_or_try_init(write_askpass_script)
                .await?;
            envs.push(("SSH_ASKPASS", script.to_string_lossy().into_owned()));
            envs.push(("SSH_ASKPASS_REQUIRE", "force".to_string()));
            // ssh before 8.4 only consults SSH_ASKPASS when DISPLAY is set.
            if std::env::var_os("DISPLAY").is_none() {
                envs.push(("DISPLAY", ":0".to_string()));
            }
            envs.push((PASSPHRASE_ENV, passphrase.expose_secret().to_string()));
        }
        Ok(envs)
    }

    async fn git(&self) -> Result<GitCommand<'_>> {
        let cmd = self
            .ssh_env()
            .await?
            .into_iter()
            .fold(GitCommand::new(&self.repo), |cmd, (key, value)| cmd.env(key, value));
        Ok(cmd)
    }

    /// Clones the repository on the first successful call, then pulls.
    pub async fn sync_once(&self) -> Result<()> {
        let mut cloned = self.cloned.lock().await;
        if !*cloned {
            self.clone_repo().await?;
            *cloned = true;
        }
        self.pull().await
    }

    async fn clone_repo(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.clone_dir).await.unwrap_or(false) {
            tokio::fs::remove_dir_all(&self.clone_dir).await?;
        }
        tokio::fs::create_dir_all(&self.clone_dir).await?;

        tracing::info!(
            repo = %self.repo,
            branch = %self.branch,
            dir = %self.clone_dir.display(),
            auth = self.auth.name(),
            "cloning credentials repository"
        );

        let dir = self.clone_dir.to_string_lossy().into_owned();
        self.git()
            .await?
            .arg("clone")
            .arg("--branch")
            .arg(&self.branch)
            .arg("--depth")
            .arg("1")
            .arg(self.clone_url()?)
            .arg(dir)
            .run()
            .await?;
        Ok(())
    }

    async fn pull(&self) -> Result<()> {
        let out = self
            .git()
            .await?
            .arg("pull")
            .current_dir(&self.clone_dir)
            .run()
            .await?;
        tracing::debug!(repo = %self.repo, output = %out, "pulled credentials repository");
        Ok(())
    }

    /// Runs [`GitSync::sync_once`] now and then every interval until the
    /// returned handle is shut down. Failed runs are logged and retried on
    /// the next tick.
    pub fn spawn(self: Arc<Self>) -> GitSyncHandle {
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(SyncStatus::default());
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let result = tokio::select! {
                    _ = token.cancelled() => break,
                    result = self.sync_once() => result,
                };

                if let Err(e) = &result {
                    tracing::error!(repo = %self.repo, error = %e, "git sync failed");
                }
                tx.send_modify(|status| {
                    status.runs += 1;
                    match &result {
                        Ok(()) => {
                            status.last_success = Some(Utc::now());
                            status.last_error = None;
                        }
                        Err(e) => status.last_error = Some(e.to_string()),
                    }
                });
            }
            tracing::debug!(repo = %self.repo, "git sync stopped");
        });

        GitSyncHandle {
            status: rx,
            cancel,
            task,
        }
    }
}

async fn write_askpass_script() -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!(
        "credential-sources-askpass-{}.sh",
        uuid::Uuid::new_v4()
    ));
    let script = format!("#!/bin/sh\nprintf '%s\\n' \"${}\"\n", PASSPHRASE_ENV);
    tokio::fs::write(&path, script).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).await?;
    }
    tracing::debug!(path = %path.display(), "wrote ssh askpass helper");
    Ok(path)
}

impl Drop for GitSync {
    fn drop(&mut self) {
        if let Some(script) = self.askpass.get() {
            let _ = std::fs::remove_file(script);
        }
    }
}

impl std::fmt::Debug for GitSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitSync")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("clone_dir", &self.clone_dir)
            .field("auth", &self.auth.name())
            .finish()
    }
}

/// Handle to a running [`GitSync`] task.
#[derive(Debug)]
pub struct GitSyncHandle {
    status: watch::Receiver<SyncStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl GitSyncHandle {
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Waits until at least one sync run has finished.
    pub async fn first_run(&self) -> SyncStatus {
        let mut rx = self.status.clone();
        match rx.wait_for(|s| s.runs > 0).await {
            Ok(status) => status.clone(),
            Err(_) => self.status(),
        }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "git sync task ended abnormally");
        }
    }
}
