use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_rand_id, Id};

/// Publication a changeset should end up in, either declared in a spec or
/// chosen in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationIntent {
    Unpublished,
    Draft,
    Published,
}

/// Desired state of a changeset that is created and pushed from a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchChangeset {
    pub title: String,
    pub body: String,
    pub diff: String,
    pub base_ref: String,
    pub base_rev: String,
    pub head_ref: String,
    pub commit_message: String,
    pub commit_author_name: String,
    pub commit_author_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<PublicationIntent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangesetSpecKind {
    Branch(BranchChangeset),
    /// Import of a changeset that already exists on the code host.
    Existing { external_id: String },
}

/// Desired state for one changeset inside a batch spec. Never mutated once
/// created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetSpec {
    pub id: Id,
    pub rand_id: String,
    pub batch_spec_id: Id,
    pub repo_id: Id,
    pub kind: ChangesetSpecKind,
    pub created_at: DateTime<Utc>,
}

impl ChangesetSpec {
    pub fn new(id: Id, batch_spec_id: Id, repo_id: Id, kind: ChangesetSpecKind) -> Self {
        Self {
            id,
            rand_id: generate_rand_id(),
            batch_spec_id,
            repo_id,
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn branch(&self) -> Option<&BranchChangeset> {
        match &self.kind {
            ChangesetSpecKind::Branch(branch) => Some(branch),
            ChangesetSpecKind::Existing { .. } => None,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self.kind, ChangesetSpecKind::Existing { .. })
    }

    pub fn external_id(&self) -> Option<&str> {
        match &self.kind {
            ChangesetSpecKind::Existing { external_id } => Some(external_id),
            ChangesetSpecKind::Branch(_) => None,
        }
    }

    pub fn head_ref(&self) -> Option<&str> {
        self.branch().map(|b| b.head_ref.as_str())
    }

    /// Publication declared by the spec itself, if any.
    pub fn published(&self) -> Option<PublicationIntent> {
        self.branch().and_then(|b| b.published)
    }

    pub fn title(&self) -> Option<&str> {
        self.branch().map(|b| b.title.as_str())
    }
}
