use log::debug;

use crate::model::{
    Changeset, ChangesetSpec, ChangesetSpecDelta, ExternalState, Operations, Plan,
    PublicationIntent, PublicationState, ReconcilerOperation,
};

/// Compares two changeset specs field by field.
///
/// Only branch specs carry comparable fields: if either side is missing or
/// imports an existing changeset the delta is empty. `previous_ui` and
/// `current_ui` are the UI publication overrides that apply when a spec
/// leaves `published` unset.
pub fn compare_changeset_specs(
    previous: Option<&ChangesetSpec>,
    current: Option<&ChangesetSpec>,
    previous_ui: Option<PublicationIntent>,
    current_ui: Option<PublicationIntent>,
) -> ChangesetSpecDelta {
    let (Some(previous), Some(current)) = (
        previous.and_then(|s| s.branch()),
        current.and_then(|s| s.branch()),
    ) else {
        return ChangesetSpecDelta::default();
    };

    let previous_intent = previous.published.or(previous_ui);
    let current_intent = current.published.or(current_ui);

    ChangesetSpecDelta {
        title_changed: previous.title != current.title,
        body_changed: previous.body != current.body,
        undraft: matches!(previous_intent, None | Some(PublicationIntent::Draft))
            && current_intent == Some(PublicationIntent::Published),
        base_ref_changed: previous.base_ref != current.base_ref,
        diff_changed: previous.diff != current.diff,
        commit_message_changed: previous.commit_message != current.commit_message,
        author_name_changed: previous.commit_author_name != current.commit_author_name,
        author_email_changed: previous.commit_author_email != current.commit_author_email,
    }
}

/// Determines the operations the reconciler would run to move
/// `existing` (the changeset as stored, if any) to `wanted` (the changeset
/// as rewired for the new batch spec).
pub fn determine_plan(
    previous_spec: Option<&ChangesetSpec>,
    current_spec: Option<&ChangesetSpec>,
    existing: Option<&Changeset>,
    wanted: &Changeset,
) -> Plan {
    let mut ops = Operations::new();

    let mut want_detach = false;
    let mut want_archive = false;
    let mut still_attached = false;
    for assoc in &wanted.batch_changes {
        if assoc.detach {
            want_detach = true;
        } else if assoc.archive {
            want_archive = true;
            if wanted.owned_by_batch_change_id == Some(assoc.batch_change_id) && wanted.published() {
                ops.add(ReconcilerOperation::Archive);
            }
        } else if !assoc.is_archived {
            still_attached = true;
        }
    }
    if want_detach {
        ops.add(ReconcilerOperation::Detach);
    }
    if wanted.closing {
        ops.add(ReconcilerOperation::Close);
    }
    if want_detach || want_archive || wanted.closing {
        return finish(ChangesetSpecDelta::default(), ops);
    }

    if still_attached && existing.is_some_and(|c| c.detached_at.is_some()) {
        ops.add(ReconcilerOperation::Reattach);
    }

    let Some(current) = current_spec else {
        return finish(ChangesetSpecDelta::default(), ops);
    };
    if current.is_existing() {
        if wanted.unpublished() {
            ops.add(ReconcilerOperation::Import);
        }
        return finish(ChangesetSpecDelta::default(), ops);
    }

    let delta = compare_changeset_specs(
        previous_spec,
        Some(current),
        existing.and_then(|c| c.ui_publication_state),
        wanted.ui_publication_state,
    );

    match wanted.publication_state {
        PublicationState::Unpublished => {
            let intent = current
                .published()
                .or(wanted.ui_publication_state)
                .unwrap_or(PublicationIntent::Unpublished);
            match intent {
                PublicationIntent::Published => {
                    ops.add(ReconcilerOperation::Publish);
                    ops.add(ReconcilerOperation::Push);
                }
                PublicationIntent::Draft if wanted.supports_draft() => {
                    ops.add(ReconcilerOperation::PublishDraft);
                    ops.add(ReconcilerOperation::Push);
                }
                // Drafts on hosts without draft support stay unpublished.
                PublicationIntent::Draft | PublicationIntent::Unpublished => {}
            }
        }
        PublicationState::Published => {
            if matches!(
                wanted.external_state,
                Some(ExternalState::Merged) | Some(ExternalState::Deleted) | Some(ExternalState::ReadOnly)
            ) {
                return finish(delta, ops);
            }

            if reopen_after_detach(wanted) {
                ops.add(ReconcilerOperation::Reopen);
            }
            if delta.undraft && wanted.supports_draft() {
                ops.add(ReconcilerOperation::Undraft);
            }
            if delta.attributes_changed() {
                if delta.needs_commit_update() {
                    ops.add(ReconcilerOperation::Push);
                }
                if delta.needs_code_host_update() {
                    ops.add(ReconcilerOperation::Update);
                } else {
                    // The code host needs a moment to pick up the pushed commit.
                    ops.add(ReconcilerOperation::Sleep);
                    ops.add(ReconcilerOperation::Sync);
                }
            }
            if ops.is_empty() && wanted.synced_at.is_none() {
                ops.add(ReconcilerOperation::Sync);
            }
        }
    }

    finish(delta, ops)
}

/// A closed changeset comes back open when its owner tracks it again.
fn reopen_after_detach(changeset: &Changeset) -> bool {
    if changeset.external_state != Some(ExternalState::Closed) || changeset.closing {
        return false;
    }
    match changeset.owned_by_batch_change_id {
        Some(owner) => changeset.attached_to(owner),
        None => false,
    }
}

fn finish(delta: ChangesetSpecDelta, ops: Operations) -> Plan {
    let operations = ops.execution_order();
    debug!("determined plan with {} operation(s): {:?}", operations.len(), operations);
    Plan { delta, operations }
}
