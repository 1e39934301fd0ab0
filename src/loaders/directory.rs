use std::fmt;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use super::document::parse_definitions_blocking;
use super::format::FileFormat;
use super::secrets::SecretResolver;
use crate::definitions::CredentialDefinition;
use crate::source::CredentialSource;
use crate::{Error, Result};

/// Loads account definitions from every matching document under a directory.
///
/// A file matches when it has a YAML or JSON extension and its name starts
/// with one of the configured prefixes. Subdirectories are searched
/// recursively; hidden entries such as `.git` are skipped.
pub struct DirectorySource<T> {
    dir: PathBuf,
    prefixes: Vec<String>,
    secrets: Arc<dyn SecretResolver>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: CredentialDefinition> DirectorySource<T> {
    pub fn new<I, S>(dir: impl Into<PathBuf>, prefixes: I, secrets: Arc<dyn SecretResolver>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        prefixes.sort();
        prefixes.dedup();

        Self {
            dir: dir.into(),
            prefixes,
            secrets,
            _marker: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    fn matches(&self, relative: &Path) -> bool {
        let hidden = relative.components().any(|c| match c {
            Component::Normal(name) => name.to_string_lossy().starts_with('.'),
            _ => false,
        });
        if hidden || !FileFormat::is_document(relative) {
            return false;
        }
        let Some(file_name) = relative.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
    }

    async fn matching_files(&self) -> Result<Vec<PathBuf>> {
        let location = self.dir.display().to_string();
        // glob drops `.` components from its matches, so match against the
        // canonical root instead of the configured spelling.
        let root = tokio::fs::canonicalize(&self.dir)
            .await
            .map_err(|e| Error::load(&location, e))?;
        let pattern = {
            let root = root.to_str().ok_or_else(|| {
                Error::config(format!("directory {} is not valid UTF-8", root.display()))
            })?;
            format!("{}/**/*", glob::Pattern::escape(root))
        };

        let candidates = tokio::task::spawn_blocking(move || {
            glob::glob(&pattern).map(|paths| {
                paths
                    .filter_map(|r| r.ok())
                    .filter(|p| p.is_file())
                    .collect::<Vec<_>>()
            })
        })
        .await
        .map_err(|e| Error::load(&location, e))?
        .map_err(|e| Error::load(&location, e))?;

        let mut files = Vec::new();
        for path in candidates {
            match path.strip_prefix(&root) {
                Ok(relative) if self.matches(relative) => files.push(path),
                Ok(_) => {}
                Err(_) => tracing::warn!(
                    dir = %root.display(),
                    file = %path.display(),
                    "skipping file outside the credentials directory"
                ),
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl<T: CredentialDefinition> CredentialSource for DirectorySource<T> {
    type Definition = T;

    fn source_name(&self) -> &str {
        "directory"
    }

    async fn definitions(&self) -> Result<Vec<T>> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            tracing::warn!(
                dir = %self.dir.display(),
                "unable to open credentials directory because it doesn't exist"
            );
            return Ok(Vec::new());
        }

        let mut definitions = Vec::new();
        for file in self.matching_files().await? {
            let location = file.display().to_string();
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| Error::load(&location, e))?;
            definitions.extend(
                parse_definitions_blocking::<T>(
                    content,
                    FileFormat::from_path(&file),
                    Arc::clone(&self.secrets),
                    location,
                )
                .await?,
            );
        }

        tracing::debug!(
            dir = %self.dir.display(),
            count = definitions.len(),
            definition_type = std::any::type_name::<T>(),
            "loaded credentials"
        );
        Ok(definitions)
    }
}

impl<T> fmt::Debug for DirectorySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySource")
            .field("dir", &self.dir)
            .field("prefixes", &self.prefixes)
            .finish()
    }
}
