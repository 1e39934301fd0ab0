//! Startup wiring from [`SourcesConfig`] to a frozen registry.

use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::config::{FilePrefixes, SourceMode, SourcesConfig};
use crate::definitions::{
    AwsAccount, CloudFoundryAccount, CredentialDefinition, DockerRegistryAccount, EcsAccount,
    KubernetesAccount,
};
use crate::loaders::{DirectorySource, FileFormat, PlainSecrets, SecretResolver, UrlSource};
use crate::registry::CredentialSourceRegistry;
use crate::sync::{GitSync, GitSyncHandle};
use crate::Result;

/// Where every built-in kind reads its documents from.
enum Layout {
    Url { url: Url, format: FileFormat },
    Dir { path: PathBuf, prefixes: FilePrefixes },
}

pub struct Bootstrap {
    config: SourcesConfig,
    secrets: Arc<dyn SecretResolver>,
    http: Option<reqwest::Client>,
}

impl Bootstrap {
    pub fn new(config: SourcesConfig) -> Self {
        Self {
            config,
            secrets: Arc::new(PlainSecrets),
            http: None,
        }
    }

    /// Resolver applied to every string in loaded documents.
    pub fn secrets(mut self, resolver: Arc<dyn SecretResolver>) -> Self {
        self.secrets = resolver;
        self
    }

    /// HTTP client shared by URL sources.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn config(&self) -> &SourcesConfig {
        &self.config
    }

    /// Builds and freezes a registry for the url or dir mode.
    ///
    /// In git mode the sources read from the clone directory, which must be
    /// set through `localCloneDir`; use [`Bootstrap::start`] to also run the
    /// sync.
    pub fn build_registry(&self) -> Result<CredentialSourceRegistry> {
        self.config.validate()?;
        let layout = match self.config.mode()? {
            SourceMode::Url => Layout::Url {
                url: self.config.url.parsed_url()?,
                format: self.config.url.file_format()?,
            },
            SourceMode::Dir => Layout::Dir {
                path: self.config.dir.path.clone().unwrap_or_default(),
                prefixes: self.config.dir.config_file_prefix.clone(),
            },
            SourceMode::Git => {
                let clone_dir = self.config.git.resolve_clone_dir();
                let sync = GitSync::new(&self.config.git, clone_dir);
                self.git_layout(&sync)
            }
        };
        self.registry_for(&layout)
    }

    fn git_layout(&self, sync: &GitSync) -> Layout {
        Layout::Dir {
            path: sync.content_dir(),
            prefixes: self.config.git.config_file_prefix.clone(),
        }
    }

    fn registry_for(&self, layout: &Layout) -> Result<CredentialSourceRegistry> {
        let mut registry = CredentialSourceRegistry::new();
        self.register::<KubernetesAccount>(&mut registry, layout)?;
        self.register::<CloudFoundryAccount>(&mut registry, layout)?;
        self.register::<AwsAccount>(&mut registry, layout)?;
        self.register::<EcsAccount>(&mut registry, layout)?;
        self.register::<DockerRegistryAccount>(&mut registry, layout)?;
        registry.freeze();
        Ok(registry)
    }

    fn register<T: CredentialDefinition>(
        &self,
        registry: &mut CredentialSourceRegistry,
        layout: &Layout,
    ) -> Result<()> {
        match layout {
            Layout::Url { url, format } => {
                let mut source = UrlSource::<T>::new(url.clone(), *format, Arc::clone(&self.secrets));
                if let Some(client) = &self.http {
                    source = source.with_client(client.clone());
                }
                registry.register_source(Arc::new(source))
            }
            Layout::Dir { path, prefixes } => {
                let source = DirectorySource::<T>::new(
                    path.clone(),
                    prefixes.for_kind(&T::kind()),
                    Arc::clone(&self.secrets),
                );
                registry.register_source(Arc::new(source))
            }
        }
    }

    /// Validates the configuration, starts the git sync when enabled and
    /// returns the running registry.
    pub async fn start(self) -> Result<Runtime> {
        self.config.validate()?;
        let mode = self.config.mode()?;

        let (registry, sync) = match mode {
            SourceMode::Git => {
                let clone_dir = self.config.git.resolve_clone_dir();
                let sync = Arc::new(GitSync::new(&self.config.git, clone_dir));
                let registry = self.registry_for(&self.git_layout(&sync))?;

                let handle = Arc::clone(&sync).spawn();
                let status = handle.first_run().await;
                if let Some(error) = &status.last_error {
                    tracing::warn!(
                        repo = sync.repo(),
                        error = %error,
                        "initial git sync failed, sources stay empty until a sync succeeds"
                    );
                }
                (registry, Some(handle))
            }
            _ => (self.build_registry()?, None),
        };

        tracing::info!(
            mode = ?mode,
            kinds = registry.len(),
            "credential sources started"
        );
        Ok(Runtime {
            registry: Arc::new(registry),
            sync,
        })
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A started set of credential sources.
#[derive(Debug)]
pub struct Runtime {
    registry: Arc<CredentialSourceRegistry>,
    sync: Option<GitSyncHandle>,
}

impl Runtime {
    pub fn registry(&self) -> &Arc<CredentialSourceRegistry> {
        &self.registry
    }

    pub fn sync(&self) -> Option<&GitSyncHandle> {
        self.sync.as_ref()
    }

    pub async fn stop(self) {
        if let Some(sync) = self.sync {
            sync.shutdown().await;
        }
        tracing::info!("credential sources stopped");
    }
}
