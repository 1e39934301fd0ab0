use secrecy::SecretString;
use serde::Deserialize;

use super::{CredentialDefinition, Permissions, deserialize_secret};
use crate::kind::AccountKind;

/// A Docker registry account.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DockerRegistryAccount {
    pub name: String,
    pub address: Option<String>,
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub password_command: Option<String>,
    pub password_file: Option<String>,
    pub email: Option<String>,
    pub cache_interval_seconds: u64,
    pub client_timeout_millis: u64,
    pub cache_threads: u32,
    pub paginate_size: u32,
    pub sort_tags_by_date: bool,
    pub track_digests: bool,
    pub insecure_registry: bool,
    pub repositories: Vec<String>,
    pub skip: Vec<String>,
    pub permissions: Permissions,
}

impl Default for DockerRegistryAccount {
    fn default() -> Self {
        Self {
            name: String::new(),
            address: None,
            username: None,
            password: None,
            password_command: None,
            password_file: None,
            email: None,
            cache_interval_seconds: 30,
            client_timeout_millis: 60_000,
            cache_threads: 1,
            paginate_size: 100,
            sort_tags_by_date: false,
            track_digests: false,
            insecure_registry: false,
            repositories: Vec::new(),
            skip: Vec::new(),
            permissions: Permissions::default(),
        }
    }
}

impl CredentialDefinition for DockerRegistryAccount {
    const PROVIDER_KEY: &'static str = "dockerRegistry";

    fn kind() -> AccountKind {
        AccountKind::DOCKER_REGISTRY
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_to_missing_fields() {
        let account: DockerRegistryAccount = serde_json::from_value(serde_json::json!({
            "name": "dockerhub",
            "address": "https://index.docker.io",
            "repositories": ["library/nginx"]
        }))
        .unwrap();

        assert_eq!(account.cache_interval_seconds, 30);
        assert_eq!(account.client_timeout_millis, 60_000);
        assert_eq!(account.cache_threads, 1);
        assert_eq!(account.paginate_size, 100);
        assert!(!account.sort_tags_by_date);
        assert!(!account.track_digests);
        assert!(!account.insecure_registry);
        assert_eq!(account.repositories, vec!["library/nginx"]);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let account: DockerRegistryAccount = serde_json::from_value(serde_json::json!({
            "name": "quay",
            "cacheThreads": 4,
            "insecureRegistry": true
        }))
        .unwrap();
        assert_eq!(account.cache_threads, 4);
        assert!(account.insecure_registry);
        assert_eq!(account.paginate_size, 100);
    }
}
