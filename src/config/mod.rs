//! Source configuration.
//!
//! Exactly one of the three modes (`url`, `dir`, `git`) is enabled at a time.
//!
//! ```rust,no_run
//! use credential_sources::SourcesConfig;
//!
//! # fn example() -> Result<(), credential_sources::Error> {
//! let config = SourcesConfig::load("accounts.yml", "CREDENTIAL_SOURCES_")?;
//! println!("{:?}", config.mode()?);
//! # Ok(())
//! # }
//! ```

mod loader;

use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use crate::definitions::deserialize_secret;
use crate::kind::AccountKind;
use crate::loaders::FileFormat;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SourcesConfig {
    pub url: UrlConfig,
    pub dir: DirConfig,
    pub git: GitConfig,
}

/// The enabled source mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Url,
    Dir,
    Git,
}

impl SourcesConfig {
    pub fn validate(&self) -> Result<()> {
        self.url.validate()?;
        self.dir.validate()?;
        self.git.validate()?;
        self.mode().map(|_| ())
    }

    /// The single enabled mode.
    pub fn mode(&self) -> Result<SourceMode> {
        let enabled: Vec<SourceMode> = [
            (self.url.enabled, SourceMode::Url),
            (self.dir.enabled, SourceMode::Dir),
            (self.git.enabled, SourceMode::Git),
        ]
        .into_iter()
        .filter_map(|(on, mode)| on.then_some(mode))
        .collect();

        match enabled.as_slice() {
            [mode] => Ok(*mode),
            [] => Err(Error::config(
                "no credential source enabled, enable one of url, dir or git",
            )),
            _ => Err(Error::config(
                "only one of url, dir or git can be enabled at a time",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub format: Option<String>,
}

impl UrlConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.parsed_url()?;
        self.file_format()?;
        Ok(())
    }

    pub fn parsed_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().unwrap_or_default();
        Url::parse(raw).map_err(|e| Error::config(format!("URL {} is not valid: {}", raw, e)))
    }

    pub fn file_format(&self) -> Result<FileFormat> {
        self.format
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: Error| Error::config(e.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DirConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
    pub config_file_prefix: FilePrefixes,
}

impl DirConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => Ok(()),
            _ => Err(Error::config("\"path\" should not be empty")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GitConfig {
    pub enabled: bool,
    pub sync_interval_secs: u64,
    pub repo: String,
    /// Branch, tag or ref name to check out.
    pub branch: String,
    pub local_clone_dir: Option<PathBuf>,
    /// Directory inside the repository holding the credential files.
    pub repo_subdir: String,
    pub config_file_prefix: FilePrefixes,

    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub token: Option<SecretString>,
    pub ssh_private_key_file_path: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub ssh_private_key_passphrase: Option<SecretString>,
    pub ssh_known_hosts_file_path: Option<PathBuf>,
    pub ssh_trust_unknown_hosts: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_interval_secs: 60,
            repo: String::new(),
            branch: "master".to_string(),
            local_clone_dir: None,
            repo_subdir: String::new(),
            config_file_prefix: FilePrefixes::default(),
            username: None,
            password: None,
            token: None,
            ssh_private_key_file_path: None,
            ssh_private_key_passphrase: None,
            ssh_known_hosts_file_path: None,
            ssh_trust_unknown_hosts: false,
        }
    }
}

impl GitConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.repo.trim().is_empty() {
            return Err(Error::config("\"repo\" should not be empty"));
        }
        if self.sync_interval_secs == 0 {
            return Err(Error::config("\"syncIntervalSecs\" must be greater than zero"));
        }
        Ok(())
    }

    /// The configured clone directory, or a fresh directory under the
    /// system temp dir when none is set.
    pub fn resolve_clone_dir(&self) -> PathBuf {
        if let Some(dir) = self.local_clone_dir.as_ref().filter(|d| !d.as_os_str().is_empty()) {
            return dir.clone();
        }
        let dir = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string());
        tracing::info!(dir = %dir.display(), "localCloneDir not defined, using temporary directory");
        dir
    }
}

/// File name prefixes selecting which documents feed which kind.
///
/// Files starting with `default` are read for every kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilePrefixes {
    pub default: String,
    pub kubernetes: String,
    pub cloudfoundry: String,
    pub aws: String,
    pub ecs: String,
    pub docker_registry: String,
}

impl Default for FilePrefixes {
    fn default() -> Self {
        Self {
            default: "clouddriver".to_string(),
            kubernetes: "kube".to_string(),
            cloudfoundry: "cf".to_string(),
            aws: "aws".to_string(),
            ecs: "ecs".to_string(),
            docker_registry: "docker".to_string(),
        }
    }
}

impl FilePrefixes {
    pub fn for_kind(&self, kind: &AccountKind) -> Vec<String> {
        let specific = match kind.as_str() {
            "kubernetes" => Some(&self.kubernetes),
            "cloudFoundry" => Some(&self.cloudfoundry),
            "amazon" => Some(&self.aws),
            "ecs" => Some(&self.ecs),
            "dockerRegistry" => Some(&self.docker_registry),
            _ => None,
        };
        std::iter::once(&self.default)
            .chain(specific)
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }
}
