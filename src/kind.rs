//! Account kind identifiers.

use std::borrow::{Borrow, Cow};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier naming a cloud-provider account category.
///
/// The five kinds served by the built-in loaders are available as constants;
/// any other identifier can be created with [`AccountKind::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountKind(Cow<'static, str>);

impl AccountKind {
    pub const KUBERNETES: Self = Self(Cow::Borrowed("kubernetes"));
    pub const CLOUD_FOUNDRY: Self = Self(Cow::Borrowed("cloudFoundry"));
    pub const AMAZON: Self = Self(Cow::Borrowed("amazon"));
    pub const ECS: Self = Self(Cow::Borrowed("ecs"));
    pub const DOCKER_REGISTRY: Self = Self(Cow::Borrowed("dockerRegistry"));

    pub fn new(id: impl Into<String>) -> Self {
        Self(Cow::Owned(id.into()))
    }

    pub const fn from_static(id: &'static str) -> Self {
        Self(Cow::Borrowed(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The kinds with a built-in account definition type.
    pub fn builtin() -> [AccountKind; 5] {
        [
            Self::KUBERNETES,
            Self::CLOUD_FOUNDRY,
            Self::AMAZON,
            Self::ECS,
            Self::DOCKER_REGISTRY,
        ]
    }

    pub fn is_builtin(&self) -> bool {
        Self::builtin().iter().any(|k| k == self)
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AccountKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for AccountKind {
    fn from(id: &'static str) -> Self {
        Self::from_static(id)
    }
}

impl From<String> for AccountKind {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}
