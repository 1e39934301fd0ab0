//! # credential-sources
//!
//! Typed registry of cloud account credential sources.
//!
//! Each account kind (Kubernetes, Cloud Foundry, Amazon, ECS, Docker Registry,
//! or any custom kind) is mapped to exactly one [`CredentialSource`] that can
//! produce the current list of account definitions for that kind. The
//! registry is populated during startup, frozen, and then shared read-only.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use credential_sources::{
//!     AccountKind, Bootstrap, CredentialSource, KubernetesAccount, SourcesConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), credential_sources::Error> {
//!     let config = SourcesConfig::load("accounts.yml", "CREDENTIAL_SOURCES_")?;
//!     let runtime = Bootstrap::new(config).start().await?;
//!
//!     let source = runtime
//!         .registry()
//!         .lookup_typed::<KubernetesAccount>(&AccountKind::KUBERNETES)?;
//!     for account in source.definitions().await? {
//!         println!("{}", account.name);
//!     }
//!
//!     runtime.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Manual wiring
//!
//! ```rust
//! use std::sync::Arc;
//! use credential_sources::{
//!     AccountKind, CredentialSourceRegistry, EcsAccount, SourceHandle, StaticSource,
//! };
//!
//! let mut registry = CredentialSourceRegistry::new();
//! registry
//!     .register(
//!         AccountKind::ECS,
//!         SourceHandle::new(Arc::new(StaticSource::<EcsAccount>::new())),
//!     )
//!     .unwrap();
//! registry.freeze();
//!
//! assert!(registry.lookup(&AccountKind::ECS).is_ok());
//! assert!(registry.lookup(&AccountKind::AMAZON).is_err());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bootstrap;
pub mod config;
pub mod definitions;
pub mod kind;
pub mod loaders;
pub mod registry;
pub mod source;
pub mod sync;

pub use bootstrap::{Bootstrap, Runtime};
pub use config::{DirConfig, FilePrefixes, GitConfig, SourceMode, SourcesConfig, UrlConfig};
pub use definitions::{
    AwsAccount, AwsRegion, CloudFoundryAccount, CredentialDefinition, DockerRegistryAccount,
    EcsAccount, KubernetesAccount, Permissions,
};
pub use kind::AccountKind;
pub use loaders::{
    DirectorySource, EnvSecrets, FileFormat, FileSecrets, PlainSecrets, SecretResolver,
    UrlSource, parse_definitions,
};
pub use registry::{CredentialSourceRegistry, SharedRegistry, Snapshot};
pub use source::{CredentialSource, SourceHandle, StaticSource};
pub use sync::{GitAuth, GitSync, GitSyncHandle, SyncStatus};

/// Error type for credential-sources operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A source is already registered for this kind.
    #[error("Credential source already registered for kind '{kind}'")]
    DuplicateKind { kind: AccountKind },

    /// No source was ever registered for this kind.
    #[error("No credential source registered for kind '{kind}'")]
    UnknownKind { kind: AccountKind },

    /// Registration attempted after the registry was frozen.
    #[error("Registry is frozen, cannot register kind '{kind}'")]
    RegistryFrozen { kind: AccountKind },

    /// The registered source produces a different definition type.
    #[error("Source for kind '{kind}' produces {actual}, not {expected}")]
    TypeMismatch {
        kind: AccountKind,
        expected: &'static str,
        actual: &'static str,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A credential document could not be parsed.
    #[error("Parse error in {location}: {message}")]
    Parse { location: String, message: String },

    /// A provider section has no `accounts` entry.
    #[error("Provider '{provider}' doesn't have \"accounts\" entry")]
    MissingAccounts { provider: String },

    /// Document format is not one of the supported ones.
    #[error("Unsupported file format: {format}, valid ones are [YAML, JSON]")]
    UnsupportedFormat { format: String },

    /// Reading a credential document failed.
    #[error("Unable to load credentials from {location}: {message}")]
    Load { location: String, message: String },

    /// A secret reference could not be resolved.
    #[error("Secret resolution failed: {0}")]
    Secret(String),

    /// A git command failed.
    #[error("Git operation on {repo} failed: {message}")]
    Git { repo: String, message: String },

    /// Operation exceeded timeout.
    #[error("Operation timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Network request failed.
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Registry misuse: duplicates, unknown kinds, late registration, wrong type
    Registration,
    /// Configuration, parsing, or secret errors
    Configuration,
    /// IO-bound loading that may succeed on a later attempt
    Load,
    /// Internal errors (IO, JSON)
    Internal,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub(crate) fn parse(location: impl Into<String>, message: impl ToString) -> Self {
        Error::Parse {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn load(location: impl Into<String>, message: impl ToString) -> Self {
        Error::Load {
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::DuplicateKind { .. }
            | Error::UnknownKind { .. }
            | Error::RegistryFrozen { .. }
            | Error::TypeMismatch { .. } => ErrorCategory::Registration,

            Error::Config(_)
            | Error::Parse { .. }
            | Error::MissingAccounts { .. }
            | Error::UnsupportedFormat { .. }
            | Error::Secret(_) => ErrorCategory::Configuration,

            Error::Load { .. } | Error::Network(_) | Error::Timeout(_) | Error::Git { .. } => {
                ErrorCategory::Load
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_registration_error(&self) -> bool {
        self.category() == ErrorCategory::Registration
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Load
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
