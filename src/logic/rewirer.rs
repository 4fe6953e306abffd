use crate::error::{PreviewError, PreviewResult};
use crate::logic::clone::clone_entity;
use crate::model::{
    Changeset, ChangesetSpec, Id, ReconcilerState, Repo, RewirerMapping, UNSAVED_ID,
};

/// Changesets as they would look after applying, split by whether they would
/// be created or updated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rewired {
    pub created: Vec<Changeset>,
    pub updated: Vec<Changeset>,
}

impl Rewired {
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The only changeset of a single-mapping rewire. Any other count means
    /// the rewirer and the mapping disagree, which is never recoverable.
    pub fn into_single(self) -> PreviewResult<Changeset> {
        let count = self.len();
        let mut all = self.created.into_iter().chain(self.updated);
        match (all.next(), all.next()) {
            (Some(changeset), None) => Ok(changeset),
            _ => Err(PreviewError::Internal(format!(
                "rewirer returned {} changesets for a single mapping",
                count
            ))),
        }
    }
}

/// Classifies mappings against the batch change identified by
/// `batch_change_id`. Pure: shared entities are cloned, never modified.
///
/// Mappings without a changeset spec are left out; see [`detach`].
pub fn rewire(mappings: &[RewirerMapping], batch_change_id: Id) -> PreviewResult<Rewired> {
    let mut rewired = Rewired::default();

    for mapping in mappings {
        let Some(spec) = &mapping.changeset_spec else {
            continue;
        };
        let repo = mapping
            .repo
            .as_deref()
            .ok_or(PreviewError::RepoNotFound(mapping.repo_id))?;
        if !repo.external_service_type.supports_batch_changes() {
            return Err(PreviewError::UnsupportedCodeHost(repo.name.clone()));
        }

        match &mapping.changeset {
            None => rewired
                .created
                .push(new_changeset(repo, spec, batch_change_id)),
            Some(existing) => {
                let mut changeset = clone_entity(existing);
                if spec.is_existing() {
                    attach_tracking_changeset(&mut changeset, batch_change_id);
                } else {
                    update_to_new_spec(&mut changeset, spec, batch_change_id);
                }
                rewired.updated.push(changeset);
            }
        }
    }

    Ok(rewired)
}

/// Applies the removal of a spec-less changeset from the batch change.
///
/// Owned changesets are archived (and closed when published and still
/// open), tracked ones detached. Returns `None` when the changeset is not
/// attached to the batch change, in which case nothing would happen.
pub fn detach(changeset: &Changeset, batch_change_id: Id) -> Option<Changeset> {
    if batch_change_id == UNSAVED_ID || !changeset.attached_to(batch_change_id) {
        return None;
    }

    let mut changeset = changeset.clone();
    if changeset.is_owned_by(batch_change_id)
        && changeset.current_spec_id.is_some()
        && changeset.published()
        && changeset.closeable()
    {
        changeset.closing = true;
    }
    if !changeset.archived_in(batch_change_id) {
        if changeset.is_owned_by(batch_change_id) {
            changeset.archive(batch_change_id);
        } else {
            changeset.detach(batch_change_id);
        }
    }
    changeset.reconciler_state = ReconcilerState::Queued;
    Some(changeset)
}

fn new_changeset(repo: &Repo, spec: &ChangesetSpec, batch_change_id: Id) -> Changeset {
    let mut changeset = Changeset::new(UNSAVED_ID, repo.id, repo.external_service_type);
    changeset.current_spec_id = Some(spec.id);
    changeset.attach(batch_change_id);
    match spec.external_id() {
        // Tracking an existing changeset: it is imported, not owned.
        Some(external_id) => changeset.external_id = Some(external_id.to_string()),
        None => changeset.owned_by_batch_change_id = Some(batch_change_id),
    }
    changeset
}

fn update_to_new_spec(changeset: &mut Changeset, spec: &ChangesetSpec, batch_change_id: Id) {
    changeset.previous_spec_id = changeset.current_spec_id;
    changeset.current_spec_id = Some(spec.id);
    changeset.attach(batch_change_id);
    changeset.reconciler_state = ReconcilerState::Queued;
}

fn attach_tracking_changeset(changeset: &mut Changeset, batch_change_id: Id) {
    changeset.attach(batch_change_id);
    if changeset.owned_by_batch_change_id.is_none()
        && matches!(
            changeset.reconciler_state,
            ReconcilerState::Errored | ReconcilerState::Failed
        )
    {
        changeset.reconciler_state = ReconcilerState::Queued;
    }
}
