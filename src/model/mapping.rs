use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::model::{Changeset, ChangesetSpec, Id, Repo};

/// Stable identity of a mapping within one preview request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    pub changeset_spec_id: Option<Id>,
    pub changeset_id: Option<Id>,
    pub repo_id: Id,
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "spec={} changeset={} repo={}",
            self.changeset_spec_id.unwrap_or_default(),
            self.changeset_id.unwrap_or_default(),
            self.repo_id
        )
    }
}

/// Links a repository to the changeset spec and/or existing changeset that
/// are relevant to it for one batch spec.
///
/// At least one of `changeset_spec_id` and `changeset_id` is set. A missing
/// `repo` means the viewer cannot access the repository.
#[derive(Debug, Clone)]
pub struct RewirerMapping {
    pub changeset_spec_id: Option<Id>,
    pub changeset_id: Option<Id>,
    pub repo_id: Id,
    pub repo: Option<Arc<Repo>>,
    pub changeset_spec: Option<Arc<ChangesetSpec>>,
    pub changeset: Option<Arc<Changeset>>,
}

impl RewirerMapping {
    pub fn key(&self) -> MappingKey {
        MappingKey {
            changeset_spec_id: self.changeset_spec_id,
            changeset_id: self.changeset_id,
            repo_id: self.repo_id,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.repo.is_none()
    }
}
