use anyhow::{anyhow, Result};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::logic::search::matches_text_search;
use crate::model::{
    BatchChange, BatchSpec, Changeset, ChangesetSpec, ChangesetSpecKind, GetRewirerMappingsOpts, Id,
    Repo, RewirerMapping, UNSAVED_ID,
};
use crate::store::traits::{BatchChangeReconciler, BatchSpecStore, ChangesetSpecStore, RewirerMappingStore};

#[derive(Debug, Default)]
struct Tables {
    repos: HashMap<Id, Arc<Repo>>,
    hidden_repos: HashSet<Id>,
    batch_specs: HashMap<Id, BatchSpec>,
    batch_changes: BTreeMap<Id, BatchChange>,
    changeset_specs: BTreeMap<Id, Arc<ChangesetSpec>>,
    changesets: BTreeMap<Id, Arc<Changeset>>,
}

/// Store backed by in-process tables.
///
/// Used by the server binary with seed data and by the tests. Counts how
/// often the mapping source is queried so callers can observe memoization.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    mapping_loads: AtomicUsize,
    batch_spec_loads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_repo(&self, repo: Repo) {
        self.tables.write().repos.insert(repo.id, Arc::new(repo));
    }

    /// Makes the repository inaccessible: mappings for it lose their repo.
    pub fn hide_repo(&self, repo_id: Id) {
        self.tables.write().hidden_repos.insert(repo_id);
    }

    pub fn insert_batch_spec(&self, batch_spec: BatchSpec) {
        self.tables.write().batch_specs.insert(batch_spec.id, batch_spec);
    }

    pub fn insert_batch_change(&self, batch_change: BatchChange) {
        self.tables
            .write()
            .batch_changes
            .insert(batch_change.id, batch_change);
    }

    pub fn insert_changeset_spec(&self, spec: ChangesetSpec) {
        self.tables.write().changeset_specs.insert(spec.id, Arc::new(spec));
    }

    pub fn insert_changeset(&self, changeset: Changeset) {
        self.tables
            .write()
            .changesets
            .insert(changeset.id, Arc::new(changeset));
    }

    pub fn get_changeset(&self, id: Id) -> Option<Changeset> {
        self.tables.read().changesets.get(&id).map(|c| c.as_ref().clone())
    }

    /// Number of `get_rewirer_mappings` calls served so far.
    pub fn mapping_loads(&self) -> usize {
        self.mapping_loads.load(Ordering::SeqCst)
    }

    pub fn batch_spec_loads(&self) -> usize {
        self.batch_spec_loads.load(Ordering::SeqCst)
    }
}

impl Tables {
    fn head_ref_of(&self, changeset: &Changeset) -> Option<&str> {
        changeset
            .current_spec_id
            .and_then(|id| self.changeset_specs.get(&id))
            .and_then(|spec| spec.head_ref())
    }

    /// Title of the mapping's spec, or of the changeset's current spec for
    /// changesets that would be removed.
    fn title_of<'a>(&'a self, mapping: &'a RewirerMapping) -> Option<&'a str> {
        match (&mapping.changeset_spec, &mapping.changeset) {
            (Some(spec), _) => spec.title(),
            (None, Some(changeset)) => changeset
                .current_spec_id
                .and_then(|id| self.changeset_specs.get(&id))
                .and_then(|spec| spec.title()),
            (None, None) => None,
        }
    }

    fn visible_repo(&self, repo_id: Id) -> Option<Arc<Repo>> {
        if self.hidden_repos.contains(&repo_id) {
            return None;
        }
        self.repos.get(&repo_id).cloned()
    }

    fn repo_name(&self, repo_id: Id) -> &str {
        self.repos
            .get(&repo_id)
            .map(|repo| repo.name.as_str())
            .unwrap_or_default()
    }

    /// Pairs every changeset spec of the batch spec with the changeset it
    /// would update, then adds the attached changesets no spec claimed.
    /// Changesets already archived in the batch change are left out of the
    /// second pass.
    fn match_mappings(&self, opts: &GetRewirerMappingsOpts) -> Vec<RewirerMapping> {
        let batch_change_id = opts.batch_change_id;
        let attached: Vec<&Arc<Changeset>> = if batch_change_id == UNSAVED_ID {
            Vec::new()
        } else {
            self.changesets
                .values()
                .filter(|c| c.attached_to(batch_change_id))
                .collect()
        };

        let mut claimed = HashSet::new();
        let mut mappings = Vec::new();

        for spec in self
            .changeset_specs
            .values()
            .filter(|spec| spec.batch_spec_id == opts.batch_spec_id)
        {
            let changeset = match &spec.kind {
                ChangesetSpecKind::Branch(branch) => attached
                    .iter()
                    .find(|c| {
                        c.repo_id == spec.repo_id
                            && c.is_owned_by(batch_change_id)
                            && !claimed.contains(&c.id)
                            && self.head_ref_of(c) == Some(branch.head_ref.as_str())
                    })
                    .map(|c| Arc::clone(c)),
                ChangesetSpecKind::Existing { external_id } => self
                    .changesets
                    .values()
                    .find(|c| {
                        c.repo_id == spec.repo_id
                            && !claimed.contains(&c.id)
                            && c.external_id.as_deref() == Some(external_id.as_str())
                    })
                    .cloned(),
            };
            if let Some(changeset) = &changeset {
                claimed.insert(changeset.id);
            }
            mappings.push(RewirerMapping {
                changeset_spec_id: Some(spec.id),
                changeset_id: changeset.as_ref().map(|c| c.id),
                repo_id: spec.repo_id,
                repo: self.visible_repo(spec.repo_id),
                changeset_spec: Some(Arc::clone(spec)),
                changeset,
            });
        }

        for changeset in attached
            .into_iter()
            .filter(|c| !claimed.contains(&c.id) && !c.archived_in(batch_change_id))
        {
            mappings.push(RewirerMapping {
                changeset_spec_id: None,
                changeset_id: Some(changeset.id),
                repo_id: changeset.repo_id,
                repo: self.visible_repo(changeset.repo_id),
                changeset_spec: None,
                changeset: Some(Arc::clone(changeset)),
            });
        }

        mappings
    }

    fn filter_mapping(&self, mapping: &RewirerMapping, opts: &GetRewirerMappingsOpts) -> bool {
        if let Some(state) = opts.current_state {
            // Mappings without a changeset have no state yet.
            match &mapping.changeset {
                Some(changeset) if changeset.state() == state => {}
                _ => return false,
            }
        }

        if opts.text_search.is_empty() {
            return true;
        }
        let mut haystacks = Vec::new();
        if let Some(repo) = &mapping.repo {
            haystacks.push(repo.name.as_str());
        }
        if let Some(title) = self.title_of(mapping) {
            haystacks.push(title);
        }
        matches_text_search(&opts.text_search, &haystacks)
    }
}

#[async_trait::async_trait]
impl BatchSpecStore for InMemoryStore {
    async fn get_batch_spec(&self, id: Id) -> Result<Option<BatchSpec>> {
        self.batch_spec_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.read().batch_specs.get(&id).cloned())
    }
}

#[async_trait::async_trait]
impl ChangesetSpecStore for InMemoryStore {
    async fn get_changeset_spec(&self, id: Id) -> Result<Option<ChangesetSpec>> {
        Ok(self
            .tables
            .read()
            .changeset_specs
            .get(&id)
            .map(|spec| spec.as_ref().clone()))
    }

    async fn list_changeset_specs(&self, batch_spec_id: Id) -> Result<Vec<ChangesetSpec>> {
        Ok(self
            .tables
            .read()
            .changeset_specs
            .values()
            .filter(|spec| spec.batch_spec_id == batch_spec_id)
            .map(|spec| spec.as_ref().clone())
            .collect())
    }
}

#[async_trait::async_trait]
impl RewirerMappingStore for InMemoryStore {
    async fn get_rewirer_mappings(&self, opts: &GetRewirerMappingsOpts) -> Result<Vec<RewirerMapping>> {
        self.mapping_loads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.read();

        if !tables.batch_specs.contains_key(&opts.batch_spec_id) {
            return Err(anyhow!("batch spec {} does not exist", opts.batch_spec_id));
        }

        let mappings = tables
            .match_mappings(opts)
            .into_iter()
            .filter(|mapping| tables.filter_mapping(mapping, opts))
            .sorted_by(|a, b| {
                tables
                    .repo_name(a.repo_id)
                    .cmp(tables.repo_name(b.repo_id))
                    .then_with(|| a.key().cmp(&b.key()))
            })
            .collect();

        Ok(mappings)
    }
}

#[async_trait::async_trait]
impl BatchChangeReconciler for InMemoryStore {
    async fn reconcile_batch_change(&self, batch_spec: &BatchSpec) -> Result<(BatchChange, bool)> {
        let tables = self.tables.read();
        let existing = tables
            .batch_changes
            .values()
            .find(|bc| bc.namespace == batch_spec.namespace && bc.name == batch_spec.name);

        match existing {
            Some(batch_change) if batch_change.closed_at.is_some() => Err(anyhow!(
                "batch change '{}' is closed and cannot be updated",
                batch_change.name
            )),
            Some(batch_change) => {
                let mut batch_change = batch_change.clone();
                batch_change.batch_spec_id = batch_spec.id;
                batch_change.description = batch_spec.description.clone();
                Ok((batch_change, false))
            }
            None => Ok((BatchChange::from_spec(batch_spec), true)),
        }
    }
}
