//! Credential sources and the type-erased handle stored in the registry.

mod handle;

use async_trait::async_trait;

use crate::definitions::CredentialDefinition;

pub use handle::SourceHandle;

/// Produces the current list of account definitions for one kind.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    type Definition: CredentialDefinition;

    /// Short strategy name for logging (e.g. "url", "directory").
    fn source_name(&self) -> &str;

    async fn definitions(&self) -> crate::Result<Vec<Self::Definition>>;
}

/// Source serving a fixed, in-memory list of definitions.
#[derive(Debug, Clone)]
pub struct StaticSource<T> {
    items: Vec<T>,
}

impl<T: CredentialDefinition> Default for StaticSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CredentialDefinition> StaticSource<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn with_item(mut self, item: T) -> Self {
        self.add(item);
        self
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        for item in items {
            self.add(item);
        }
        self
    }

    /// Adds an item, replacing any existing item with the same name.
    pub fn add(&mut self, item: T) {
        match self.items.iter_mut().find(|i| i.name() == item.name()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl<T: CredentialDefinition> CredentialSource for StaticSource<T> {
    type Definition = T;

    fn source_name(&self) -> &str {
        "static"
    }

    async fn definitions(&self) -> crate::Result<Vec<T>> {
        Ok(self.items.clone())
    }
}
