use secrecy::SecretString;
use serde::Deserialize;

use super::{CredentialDefinition, Permissions, deserialize_secret};
use crate::kind::AccountKind;

/// A Cloud Foundry foundation account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudFoundryAccount {
    pub name: String,
    pub api: Option<String>,
    pub app_manager_uri: Option<String>,
    pub metrics_uri: Option<String>,
    pub user: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    pub environment: Option<String>,
    pub skip_ssl_validation: bool,
    pub only_spinnaker_managed: bool,
    pub result_page_size: Option<u32>,
    pub max_capi_connections_for_cache: Option<u32>,
    pub space_filter: Vec<SpaceFilter>,
    pub permissions: Permissions,
}

/// Organization/space pair restricting which spaces are cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpaceFilter {
    pub organization: String,
    pub space: Option<String>,
}

impl CredentialDefinition for CloudFoundryAccount {
    const PROVIDER_KEY: &'static str = "cloudfoundry";

    fn kind() -> AccountKind {
        AccountKind::CLOUD_FOUNDRY
    }

    fn name(&self) -> &str {
        &self.name
    }
}
