use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{ExternalServiceType, Id, PublicationIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationState {
    Unpublished,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalState {
    Draft,
    Open,
    Closed,
    Merged,
    Deleted,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcilerState {
    Scheduled,
    Queued,
    Processing,
    Errored,
    Failed,
    Completed,
}

/// User-facing state derived from reconciler, publication and external state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangesetState {
    Unpublished,
    Scheduled,
    Processing,
    Open,
    Draft,
    Closed,
    Merged,
    Deleted,
    ReadOnly,
    Retrying,
    Failed,
}

impl FromStr for ChangesetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let state = match s.to_ascii_uppercase().as_str() {
            "UNPUBLISHED" => ChangesetState::Unpublished,
            "SCHEDULED" => ChangesetState::Scheduled,
            "PROCESSING" => ChangesetState::Processing,
            "OPEN" => ChangesetState::Open,
            "DRAFT" => ChangesetState::Draft,
            "CLOSED" => ChangesetState::Closed,
            "MERGED" => ChangesetState::Merged,
            "DELETED" => ChangesetState::Deleted,
            "READONLY" | "READ_ONLY" => ChangesetState::ReadOnly,
            "RETRYING" => ChangesetState::Retrying,
            "FAILED" => ChangesetState::Failed,
            _ => return Err(format!("unknown changeset state '{}'", s)),
        };
        Ok(state)
    }
}

impl fmt::Display for ChangesetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangesetState::Unpublished => "UNPUBLISHED",
            ChangesetState::Scheduled => "SCHEDULED",
            ChangesetState::Processing => "PROCESSING",
            ChangesetState::Open => "OPEN",
            ChangesetState::Draft => "DRAFT",
            ChangesetState::Closed => "CLOSED",
            ChangesetState::Merged => "MERGED",
            ChangesetState::Deleted => "DELETED",
            ChangesetState::ReadOnly => "READONLY",
            ChangesetState::Retrying => "RETRYING",
            ChangesetState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Link between a changeset and one batch change tracking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchChangeAssoc {
    pub batch_change_id: Id,
    #[serde(default)]
    pub detach: bool,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub is_archived: bool,
}

impl BatchChangeAssoc {
    pub fn new(batch_change_id: Id) -> Self {
        Self {
            batch_change_id,
            detach: false,
            archive: false,
            is_archived: false,
        }
    }
}

/// A changeset on a code host, tracked by one or more batch changes.
///
/// Only the real reconciler mutates stored changesets. The preview engine
/// works on clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changeset {
    pub id: Id,
    pub repo_id: Id,
    pub external_id: Option<String>,
    pub external_service_type: ExternalServiceType,
    pub external_state: Option<ExternalState>,
    pub batch_changes: Vec<BatchChangeAssoc>,
    /// `None` for imported changesets that are only tracked.
    pub owned_by_batch_change_id: Option<Id>,
    pub current_spec_id: Option<Id>,
    pub previous_spec_id: Option<Id>,
    pub publication_state: PublicationState,
    pub ui_publication_state: Option<PublicationIntent>,
    pub reconciler_state: ReconcilerState,
    #[serde(default)]
    pub closing: bool,
    pub detached_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Changeset {
    pub fn new(id: Id, repo_id: Id, external_service_type: ExternalServiceType) -> Self {
        let now = Utc::now();
        Self {
            id,
            repo_id,
            external_id: None,
            external_service_type,
            external_state: None,
            batch_changes: Vec::new(),
            owned_by_batch_change_id: None,
            current_spec_id: None,
            previous_spec_id: None,
            publication_state: PublicationState::Unpublished,
            ui_publication_state: None,
            reconciler_state: ReconcilerState::Queued,
            closing: false,
            detached_at: None,
            synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn published(&self) -> bool {
        self.publication_state == PublicationState::Published
    }

    pub fn unpublished(&self) -> bool {
        self.publication_state == PublicationState::Unpublished
    }

    pub fn supports_draft(&self) -> bool {
        self.external_service_type.supports_draft()
    }

    /// False once the changeset is closed, merged or read-only on the code host.
    pub fn closeable(&self) -> bool {
        !matches!(
            self.external_state,
            Some(ExternalState::Closed) | Some(ExternalState::Merged) | Some(ExternalState::ReadOnly)
        )
    }

    pub fn is_owned_by(&self, batch_change_id: Id) -> bool {
        self.owned_by_batch_change_id == Some(batch_change_id)
    }

    pub fn attached_to(&self, batch_change_id: Id) -> bool {
        self.batch_changes
            .iter()
            .any(|assoc| assoc.batch_change_id == batch_change_id)
    }

    pub fn archived_in(&self, batch_change_id: Id) -> bool {
        self.batch_changes
            .iter()
            .any(|assoc| assoc.batch_change_id == batch_change_id && assoc.is_archived)
    }

    /// Attaches the batch change, clearing pending detach/archive flags if it
    /// is already attached.
    pub fn attach(&mut self, batch_change_id: Id) {
        if let Some(assoc) = self
            .batch_changes
            .iter_mut()
            .find(|assoc| assoc.batch_change_id == batch_change_id)
        {
            assoc.detach = false;
            assoc.archive = false;
            assoc.is_archived = false;
            return;
        }
        self.batch_changes.push(BatchChangeAssoc::new(batch_change_id));
        self.detached_at = None;
    }

    /// Marks the batch change as to be detached. Returns false if it was not
    /// attached.
    pub fn detach(&mut self, batch_change_id: Id) -> bool {
        match self
            .batch_changes
            .iter_mut()
            .find(|assoc| assoc.batch_change_id == batch_change_id)
        {
            Some(assoc) => {
                assoc.detach = true;
                true
            }
            None => false,
        }
    }

    /// Marks the batch change as to be archived. Returns false if it was not
    /// attached or is already archived.
    pub fn archive(&mut self, batch_change_id: Id) -> bool {
        match self
            .batch_changes
            .iter_mut()
            .find(|assoc| assoc.batch_change_id == batch_change_id && !assoc.is_archived)
        {
            Some(assoc) => {
                assoc.archive = true;
                true
            }
            None => false,
        }
    }

    pub fn state(&self) -> ChangesetState {
        match self.reconciler_state {
            ReconcilerState::Errored => ChangesetState::Retrying,
            ReconcilerState::Failed => ChangesetState::Failed,
            ReconcilerState::Scheduled => ChangesetState::Scheduled,
            ReconcilerState::Queued | ReconcilerState::Processing => ChangesetState::Processing,
            ReconcilerState::Completed => {
                if self.unpublished() {
                    return ChangesetState::Unpublished;
                }
                match self.external_state {
                    Some(ExternalState::Draft) => ChangesetState::Draft,
                    Some(ExternalState::Closed) => ChangesetState::Closed,
                    Some(ExternalState::Merged) => ChangesetState::Merged,
                    Some(ExternalState::Deleted) => ChangesetState::Deleted,
                    Some(ExternalState::ReadOnly) => ChangesetState::ReadOnly,
                    Some(ExternalState::Open) | None => ChangesetState::Open,
                }
            }
        }
    }
}
