use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PreviewError, PreviewResult};
use crate::logic::cancel::CancelToken;
use crate::logic::clone::PlanningEntities;
use crate::logic::memo::Memo;
use crate::logic::plan::determine_plan;
use crate::logic::rewirer;
use crate::model::{
    Changeset, ChangesetSpec, ChangesetSpecDelta, Id, MappingKey, Plan, PublicationIntent,
    ReconcilerOperation, RewirerMapping,
};
use crate::store::Store;

/// An entity as a viewer may see it: hydrated, or only its id when the
/// repository is inaccessible.
#[derive(Debug, Clone)]
pub enum EntityView<T> {
    Visible(Arc<T>),
    Hidden(Id),
}

impl<T> EntityView<T> {
    pub fn is_hidden(&self) -> bool {
        matches!(self, EntityView::Hidden(_))
    }

    pub fn visible(&self) -> Option<&T> {
        match self {
            EntityView::Visible(entity) => Some(entity),
            EntityView::Hidden(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetKind {
    Attach,
    Update,
    Detach,
}

/// What applying the batch spec would do with the entities of a mapping.
#[derive(Debug, Clone)]
pub enum PreviewTargets {
    /// A new changeset would be created from the spec.
    Attach {
        changeset_spec: EntityView<ChangesetSpec>,
    },
    /// An existing changeset would be updated to the spec.
    Update {
        changeset_spec: EntityView<ChangesetSpec>,
        changeset: EntityView<Changeset>,
    },
    /// A changeset no longer backed by a spec would leave the batch change.
    Detach { changeset: EntityView<Changeset> },
}

impl PreviewTargets {
    fn from_mapping(mapping: &RewirerMapping) -> PreviewResult<Self> {
        let hidden = mapping.is_hidden();
        let spec = view(hidden, mapping.changeset_spec_id, &mapping.changeset_spec, mapping)?;
        let changeset = view(hidden, mapping.changeset_id, &mapping.changeset, mapping)?;

        match (spec, changeset) {
            (Some(changeset_spec), None) => Ok(PreviewTargets::Attach { changeset_spec }),
            (Some(changeset_spec), Some(changeset)) => Ok(PreviewTargets::Update {
                changeset_spec,
                changeset,
            }),
            (None, Some(changeset)) => Ok(PreviewTargets::Detach { changeset }),
            (None, None) => Err(PreviewError::Internal(format!(
                "mapping {} has neither a changeset spec nor a changeset",
                mapping.key()
            ))),
        }
    }

    pub fn kind(&self) -> TargetKind {
        match self {
            PreviewTargets::Attach { .. } => TargetKind::Attach,
            PreviewTargets::Update { .. } => TargetKind::Update,
            PreviewTargets::Detach { .. } => TargetKind::Detach,
        }
    }

    pub fn changeset_spec(&self) -> Option<&EntityView<ChangesetSpec>> {
        match self {
            PreviewTargets::Attach { changeset_spec } | PreviewTargets::Update { changeset_spec, .. } => {
                Some(changeset_spec)
            }
            PreviewTargets::Detach { .. } => None,
        }
    }

    pub fn changeset(&self) -> Option<&EntityView<Changeset>> {
        match self {
            PreviewTargets::Update { changeset, .. } | PreviewTargets::Detach { changeset } => Some(changeset),
            PreviewTargets::Attach { .. } => None,
        }
    }
}

fn view<T>(
    hidden: bool,
    id: Option<Id>,
    entity: &Option<Arc<T>>,
    mapping: &RewirerMapping,
) -> PreviewResult<Option<EntityView<T>>> {
    let Some(id) = id else {
        return Ok(None);
    };
    if hidden {
        return Ok(Some(EntityView::Hidden(id)));
    }
    match entity {
        Some(entity) => Ok(Some(EntityView::Visible(Arc::clone(entity)))),
        None => Err(PreviewError::Internal(format!(
            "mapping {} references entity {} that was not loaded",
            mapping.key(),
            id
        ))),
    }
}

/// Everything a visible preview needs besides its mapping. Shared by every
/// resolver of one request.
pub struct PreviewContext<S: Store> {
    pub store: Arc<S>,
    pub batch_change_id: Id,
    /// UI publication overrides keyed by changeset spec rand id.
    pub publication_states: Arc<HashMap<String, PublicationIntent>>,
    pub cancel: CancelToken,
}

impl<S: Store> Clone for PreviewContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            batch_change_id: self.batch_change_id,
            publication_states: Arc::clone(&self.publication_states),
            cancel: self.cancel.clone(),
        }
    }
}

/// Preview of a mapping whose repository the viewer cannot access. Exposes
/// ids only and never computes a plan.
#[derive(Debug, Clone)]
pub struct HiddenPreview {
    key: MappingKey,
    targets: PreviewTargets,
}

pub struct VisiblePreview<S: Store> {
    mapping: RewirerMapping,
    targets: PreviewTargets,
    context: PreviewContext<S>,
    plan: Memo<Plan>,
}

impl<S: Store> VisiblePreview<S> {
    pub fn mapping(&self) -> &RewirerMapping {
        &self.mapping
    }

    /// The plan of this mapping, computed on first access.
    pub async fn plan(&self) -> PreviewResult<Plan> {
        self.plan
            .get_or_try_init(|| self.context.cancel.guard(self.compute_plan()))
            .await
    }

    async fn compute_plan(&self) -> PreviewResult<Plan> {
        debug!("computing plan for mapping {}", self.mapping.key());
        let PlanningEntities {
            changeset_spec,
            changeset,
            ..
        } = PlanningEntities::from_mapping(&self.mapping);
        let batch_change_id = self.context.batch_change_id;

        let Some(current_spec) = changeset_spec else {
            let existing = changeset.as_ref().ok_or_else(|| {
                PreviewError::Internal(format!("mapping {} has no changeset", self.mapping.key()))
            })?;
            return Ok(match rewirer::detach(existing, batch_change_id) {
                Some(wanted) => determine_plan(None, None, Some(existing), &wanted),
                None => Plan::default(),
            });
        };

        let mut wanted =
            rewirer::rewire(std::slice::from_ref(&self.mapping), batch_change_id)?.into_single()?;
        if let Some(intent) = self.context.publication_states.get(&current_spec.rand_id) {
            wanted.ui_publication_state = Some(*intent);
        }

        let previous_spec = match wanted.previous_spec_id {
            Some(id) => Some(
                self.context
                    .store
                    .get_changeset_spec(id)
                    .await
                    .map_err(PreviewError::store)?
                    .ok_or(PreviewError::ChangesetSpecNotFound(id))?,
            ),
            None => None,
        };

        Ok(determine_plan(
            previous_spec.as_ref(),
            Some(&current_spec),
            changeset.as_ref(),
            &wanted,
        ))
    }
}

/// Per-mapping view of an apply preview.
pub enum ApplyPreview<S: Store> {
    Hidden(HiddenPreview),
    Visible(VisiblePreview<S>),
}

impl<S: Store> ApplyPreview<S> {
    pub fn new(mapping: RewirerMapping, context: PreviewContext<S>) -> PreviewResult<Self> {
        let targets = PreviewTargets::from_mapping(&mapping)?;
        if mapping.is_hidden() {
            return Ok(ApplyPreview::Hidden(HiddenPreview {
                key: mapping.key(),
                targets,
            }));
        }
        Ok(ApplyPreview::Visible(VisiblePreview {
            mapping,
            targets,
            context,
            plan: Memo::new(),
        }))
    }

    pub fn key(&self) -> MappingKey {
        match self {
            ApplyPreview::Hidden(hidden) => hidden.key,
            ApplyPreview::Visible(visible) => visible.mapping.key(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, ApplyPreview::Hidden(_))
    }

    pub fn targets(&self) -> &PreviewTargets {
        match self {
            ApplyPreview::Hidden(hidden) => &hidden.targets,
            ApplyPreview::Visible(visible) => &visible.targets,
        }
    }

    pub async fn operations(&self) -> PreviewResult<Vec<ReconcilerOperation>> {
        match self {
            ApplyPreview::Hidden(_) => Ok(Vec::new()),
            ApplyPreview::Visible(visible) => Ok(visible.plan().await?.operations),
        }
    }

    pub async fn delta(&self) -> PreviewResult<ChangesetSpecDelta> {
        match self {
            ApplyPreview::Hidden(_) => Ok(ChangesetSpecDelta::default()),
            ApplyPreview::Visible(visible) => Ok(visible.plan().await?.delta),
        }
    }
}
