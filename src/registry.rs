//! Credential source registry.
//!
//! The registry has two phases. While building, each integration registers
//! one source per account kind. Once startup completes the registry is
//! frozen and becomes a read-only map that can be shared across threads
//! behind an `Arc` without further synchronization.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::definitions::CredentialDefinition;
use crate::kind::AccountKind;
use crate::source::{CredentialSource, SourceHandle};
use crate::{Error, Result};

#[derive(Debug, Default)]
pub struct CredentialSourceRegistry {
    sources: HashMap<AccountKind, SourceHandle>,
    frozen: bool,
}

impl CredentialSourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `kind`.
    ///
    /// Fails with [`Error::RegistryFrozen`] once frozen and with
    /// [`Error::DuplicateKind`] if `kind` already has a source.
    pub fn register(&mut self, kind: AccountKind, source: SourceHandle) -> Result<()> {
        if self.frozen {
            return Err(Error::RegistryFrozen { kind });
        }
        if self.sources.contains_key(&kind) {
            return Err(Error::DuplicateKind { kind });
        }

        tracing::debug!(
            kind = %kind,
            source = source.source_name(),
            definition_type = source.definition_type(),
            "credential source registered"
        );
        self.sources.insert(kind, source);
        Ok(())
    }

    /// Registers a typed source under the kind its definitions declare.
    pub fn register_source<S>(&mut self, source: Arc<S>) -> Result<()>
    where
        S: CredentialSource + 'static,
    {
        let kind = <S::Definition as CredentialDefinition>::kind();
        self.register(kind, SourceHandle::new(source))
    }

    pub fn lookup(&self, kind: &AccountKind) -> Result<SourceHandle> {
        self.sources
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownKind { kind: kind.clone() })
    }

    pub fn lookup_typed<T: CredentialDefinition>(
        &self,
        kind: &AccountKind,
    ) -> Result<Arc<dyn CredentialSource<Definition = T>>> {
        let handle = self.lookup(kind)?;
        handle.downcast::<T>().ok_or_else(|| Error::TypeMismatch {
            kind: kind.clone(),
            expected: std::any::type_name::<T>(),
            actual: handle.definition_type(),
        })
    }

    /// Snapshot of the current registrations, ordered by kind.
    pub fn list(&self) -> Snapshot {
        let mut entries: Vec<(AccountKind, SourceHandle)> = self
            .sources
            .iter()
            .map(|(kind, source)| (kind.clone(), source.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Snapshot { entries }
    }

    /// Ends the building phase. Calling it again has no effect.
    pub fn freeze(&mut self) {
        if !self.frozen {
            tracing::debug!(kinds = self.sources.len(), "credential source registry frozen");
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn contains(&self, kind: &AccountKind) -> bool {
        self.sources.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<AccountKind> {
        let mut kinds: Vec<AccountKind> = self.sources.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Point-in-time copy of the registrations.
///
/// Iterating a snapshot does not consume it, so the same pairs can be
/// enumerated any number of times.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    entries: Vec<(AccountKind, SourceHandle)>,
}

impl Snapshot {
    pub fn iter(&self) -> impl Iterator<Item = (&AccountKind, &SourceHandle)> + '_ {
        self.entries.iter().map(|(kind, source)| (kind, source))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a (AccountKind, SourceHandle);
    type IntoIter = std::slice::Iter<'a, (AccountKind, SourceHandle)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for Snapshot {
    type Item = (AccountKind, SourceHandle);
    type IntoIter = std::vec::IntoIter<(AccountKind, SourceHandle)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Holder allowing a frozen registry to be swapped at runtime.
///
/// Readers take a cheap `Arc` clone of the current registry; a replacement
/// only affects readers that call [`SharedRegistry::current`] afterwards.
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    current: Arc<RwLock<Arc<CredentialSourceRegistry>>>,
}

impl SharedRegistry {
    pub fn new(registry: Arc<CredentialSourceRegistry>) -> Result<Self> {
        Self::ensure_frozen(&registry)?;
        Ok(Self {
            current: Arc::new(RwLock::new(registry)),
        })
    }

    pub fn current(&self) -> Arc<CredentialSourceRegistry> {
        Arc::clone(&self.current.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Replaces the registry, returning the previous one.
    pub fn replace(
        &self,
        registry: Arc<CredentialSourceRegistry>,
    ) -> Result<Arc<CredentialSourceRegistry>> {
        Self::ensure_frozen(&registry)?;
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(kinds = registry.len(), "credential source registry replaced");
        Ok(std::mem::replace(&mut *current, registry))
    }

    pub fn lookup(&self, kind: &AccountKind) -> Result<SourceHandle> {
        self.current().lookup(kind)
    }

    fn ensure_frozen(registry: &CredentialSourceRegistry) -> Result<()> {
        if registry.is_frozen() {
            Ok(())
        } else {
            Err(Error::config("only a frozen registry can be shared"))
        }
    }
}
