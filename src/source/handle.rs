use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::CredentialSource;
use crate::definitions::CredentialDefinition;

#[async_trait]
trait ErasedSource: Send + Sync {
    fn source_name(&self) -> &str;
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    async fn account_names(&self) -> crate::Result<Vec<String>>;
}

struct Typed<T: CredentialDefinition>(Arc<dyn CredentialSource<Definition = T>>);

#[async_trait]
impl<T: CredentialDefinition> ErasedSource for Typed<T> {
    fn source_name(&self) -> &str {
        self.0.source_name()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    async fn account_names(&self) -> crate::Result<Vec<String>> {
        Ok(self
            .0
            .definitions()
            .await?
            .iter()
            .map(|d| d.name().to_string())
            .collect())
    }
}

/// Type-erased, cheaply clonable handle to one credential source.
///
/// The handle remembers which definition type its source produces, so it can
/// be checked with [`SourceHandle::produces`] and turned back into the typed
/// source with [`SourceHandle::downcast`].
#[derive(Clone)]
pub struct SourceHandle {
    definition_kind: crate::AccountKind,
    definition_type: &'static str,
    type_id: TypeId,
    inner: Arc<dyn ErasedSource>,
}

impl SourceHandle {
    pub fn new<S>(source: Arc<S>) -> Self
    where
        S: CredentialSource + 'static,
    {
        let source: Arc<dyn CredentialSource<Definition = S::Definition>> = source;
        Self::from_dyn(source)
    }

    pub fn from_dyn<T: CredentialDefinition>(
        source: Arc<dyn CredentialSource<Definition = T>>,
    ) -> Self {
        Self {
            definition_kind: T::kind(),
            definition_type: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
            inner: Arc::new(Typed(source)),
        }
    }

    /// Kind declared by the definition type, which may differ from the
    /// kind the handle is registered under.
    pub fn definition_kind(&self) -> &crate::AccountKind {
        &self.definition_kind
    }

    /// Fully qualified name of the definition type.
    pub fn definition_type(&self) -> &'static str {
        self.definition_type
    }

    pub fn source_name(&self) -> &str {
        self.inner.source_name()
    }

    pub fn produces<T: CredentialDefinition>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub fn downcast<T: CredentialDefinition>(
        &self,
    ) -> Option<Arc<dyn CredentialSource<Definition = T>>> {
        self.inner
            .as_any()
            .downcast_ref::<Typed<T>>()
            .map(|typed| Arc::clone(&typed.0))
    }

    /// Loads the source and returns only the account names.
    pub async fn account_names(&self) -> crate::Result<Vec<String>> {
        self.inner.account_names().await
    }

    /// Whether both handles point at the same source instance.
    pub fn ptr_eq(&self, other: &SourceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("source", &self.inner.source_name())
            .field("definition_type", &self.definition_type)
            .finish()
    }
}
