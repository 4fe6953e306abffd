use serde::{Deserialize, Serialize};

use crate::model::ReconcilerOperation;

/// Which fields differ between the previous and the current changeset spec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetSpecDelta {
    pub title_changed: bool,
    pub body_changed: bool,
    pub undraft: bool,
    pub base_ref_changed: bool,
    pub diff_changed: bool,
    pub commit_message_changed: bool,
    pub author_name_changed: bool,
    pub author_email_changed: bool,
}

impl ChangesetSpecDelta {
    /// Changes that require a new commit to be pushed.
    pub fn needs_commit_update(&self) -> bool {
        self.diff_changed
            || self.commit_message_changed
            || self.author_name_changed
            || self.author_email_changed
    }

    /// Changes that require updating the changeset on the code host.
    pub fn needs_code_host_update(&self) -> bool {
        self.title_changed || self.body_changed || self.base_ref_changed
    }

    pub fn attributes_changed(&self) -> bool {
        self.needs_commit_update() || self.needs_code_host_update()
    }
}

/// Computed outcome for one mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub delta: ChangesetSpecDelta,
    pub operations: Vec<ReconcilerOperation>,
}

impl Plan {
    pub fn contains(&self, op: ReconcilerOperation) -> bool {
        self.operations.contains(&op)
    }
}
