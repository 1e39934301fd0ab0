use serde::Deserialize;

use super::{CredentialDefinition, Permissions, deserialize_lenient_string};
use crate::kind::AccountKind;

/// An Amazon Web Services account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AwsAccount {
    pub name: String,
    pub environment: Option<String>,
    pub account_type: Option<String>,
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub account_id: Option<String>,
    pub default_key_pair: Option<String>,
    pub assume_role: Option<String>,
    pub external_id: Option<String>,
    pub session_name: Option<String>,
    pub discovery: Option<String>,
    pub edda: Option<String>,
    pub bastion_enabled: bool,
    pub lambda_enabled: bool,
    pub regions: Vec<AwsRegion>,
    pub default_security_groups: Vec<String>,
    pub required_group_membership: Vec<String>,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AwsRegion {
    pub name: String,
    pub availability_zones: Vec<String>,
    pub deprecated: bool,
}

impl CredentialDefinition for AwsAccount {
    const PROVIDER_KEY: &'static str = "aws";

    fn kind() -> AccountKind {
        AccountKind::AMAZON
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// An ECS account, layered on top of an existing AWS account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EcsAccount {
    pub name: String,
    pub aws_account: String,
}

impl CredentialDefinition for EcsAccount {
    const PROVIDER_KEY: &'static str = "ecs";

    fn kind() -> AccountKind {
        AccountKind::ECS
    }

    fn name(&self) -> &str {
        &self.name
    }
}
