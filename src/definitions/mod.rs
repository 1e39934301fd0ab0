//! Account definition records for the built-in kinds.
//!
//! Each record deserializes from the camelCase documents served by the
//! loaders. Unknown fields are ignored and missing fields take defaults, so
//! a single document can carry accounts for several providers.

mod aws;
mod cloudfoundry;
mod docker;
mod kubernetes;

use std::fmt;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::kind::AccountKind;

pub use aws::{AwsAccount, AwsRegion, EcsAccount};
pub use cloudfoundry::CloudFoundryAccount;
pub use docker::DockerRegistryAccount;
pub use kubernetes::KubernetesAccount;

/// A kind-specific record describing one account.
pub trait CredentialDefinition:
    DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Top-level key holding this kind's `accounts` in a multi-provider document.
    const PROVIDER_KEY: &'static str;

    fn kind() -> AccountKind;

    fn name(&self) -> &str;
}

/// Role-based access lists attached to an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "UPPERCASE")]
pub struct Permissions {
    pub read: Vec<String>,
    pub write: Vec<String>,
    pub execute: Vec<String>,
}

impl Permissions {
    pub fn is_restricted(&self) -> bool {
        !(self.read.is_empty() && self.write.is_empty() && self.execute.is_empty())
    }
}

pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// Accepts numbers where a string is expected (e.g. unquoted YAML account ids).
pub(crate) fn deserialize_lenient_string<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(
        Option::<Lenient>::deserialize(deserializer)?.map(|value| match value {
            Lenient::Text(s) => s,
            Lenient::Int(n) => n.to_string(),
            Lenient::Float(n) => n.to_string(),
        }),
    )
}
