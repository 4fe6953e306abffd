use std::sync::Arc;

use crate::model::{Changeset, ChangesetSpec, Repo, RewirerMapping};

/// Independent copy of a shared entity.
///
/// Mappings are shared by every resolver of a request; anything that gets
/// modified while planning must be a copy made here.
pub fn clone_entity<T: Clone>(shared: &Arc<T>) -> T {
    T::clone(shared)
}

/// Owned copies of the entities hydrated on one mapping.
#[derive(Debug, Clone, Default)]
pub struct PlanningEntities {
    pub repo: Option<Repo>,
    pub changeset_spec: Option<ChangesetSpec>,
    pub changeset: Option<Changeset>,
}

impl PlanningEntities {
    pub fn from_mapping(mapping: &RewirerMapping) -> Self {
        Self {
            repo: mapping.repo.as_ref().map(clone_entity),
            changeset_spec: mapping.changeset_spec.as_ref().map(clone_entity),
            changeset: mapping.changeset.as_ref().map(clone_entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExternalServiceType, PublicationIntent};

    #[test]
    fn test_modifying_clone_leaves_shared_untouched() {
        let shared = Arc::new(Changeset::new(1, 2, ExternalServiceType::GitLab));
        let mapping = RewirerMapping {
            changeset_spec_id: None,
            changeset_id: Some(1),
            repo_id: 2,
            repo: Some(Arc::new(Repo::new(2, "gitlab.com/acme/api", ExternalServiceType::GitLab))),
            changeset_spec: None,
            changeset: Some(Arc::clone(&shared)),
        };

        let mut entities = PlanningEntities::from_mapping(&mapping);
        let changeset = entities.changeset.as_mut().unwrap();
        changeset.ui_publication_state = Some(PublicationIntent::Published);
        changeset.current_spec_id = Some(99);
        changeset.attach(3);

        assert_eq!(shared.ui_publication_state, None);
        assert_eq!(shared.current_spec_id, None);
        assert!(shared.batch_changes.is_empty());
        assert_eq!(entities.repo.unwrap().name, "gitlab.com/acme/api");
    }
}
