use crate::model::{BatchChange, BatchSpec, ChangesetSpec, GetRewirerMappingsOpts, Id, RewirerMapping};
use anyhow::Result;

#[async_trait::async_trait]
pub trait BatchSpecStore: Send + Sync {
    async fn get_batch_spec(&self, id: Id) -> Result<Option<BatchSpec>>;
}

#[async_trait::async_trait]
pub trait ChangesetSpecStore: Send + Sync {
    async fn get_changeset_spec(&self, id: Id) -> Result<Option<ChangesetSpec>>;
    /// All changeset specs belonging to a batch spec, ordered by id
    async fn list_changeset_specs(&self, batch_spec_id: Id) -> Result<Vec<ChangesetSpec>>;
}

/// Source of the mappings between a batch spec and the changesets of a batch change
#[async_trait::async_trait]
pub trait RewirerMappingStore: Send + Sync {
    /// Ordered mappings for the given scope. Repositories the caller cannot
    /// access are returned with `repo: None`.
    async fn get_rewirer_mappings(&self, opts: &GetRewirerMappingsOpts) -> Result<Vec<RewirerMapping>>;
}

/// Dry-run application of a batch spec onto its batch change
#[async_trait::async_trait]
pub trait BatchChangeReconciler: Send + Sync {
    /// Returns the batch change the spec would be applied to and whether it
    /// would be newly created. Never persists anything.
    async fn reconcile_batch_change(&self, batch_spec: &BatchSpec) -> Result<(BatchChange, bool)>;
}

pub trait Store: BatchSpecStore + ChangesetSpecStore + RewirerMappingStore + BatchChangeReconciler + Send + Sync {}
impl<T: BatchSpecStore + ChangesetSpecStore + RewirerMappingStore + BatchChangeReconciler + Send + Sync> Store for T {}
