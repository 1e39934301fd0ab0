use secrecy::SecretString;
use serde::Deserialize;

use super::{CredentialDefinition, Permissions, deserialize_secret};
use crate::kind::AccountKind;

/// A Kubernetes cluster account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KubernetesAccount {
    pub name: String,
    pub environment: Option<String>,
    pub account_type: Option<String>,
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub user: Option<String>,
    pub kubeconfig_file: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub kubeconfig_contents: Option<SecretString>,
    pub kubectl_executable: Option<String>,
    pub service_account: bool,
    pub only_spinnaker_managed: bool,
    pub cache_threads: Option<u32>,
    pub namespaces: Vec<String>,
    pub omit_namespaces: Vec<String>,
    pub kinds: Vec<String>,
    pub omit_kinds: Vec<String>,
    pub required_group_membership: Vec<String>,
    pub permissions: Permissions,
}

impl CredentialDefinition for KubernetesAccount {
    const PROVIDER_KEY: &'static str = "kubernetes";

    fn kind() -> AccountKind {
        AccountKind::KUBERNETES
    }

    fn name(&self) -> &str {
        &self.name
    }
}
