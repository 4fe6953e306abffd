use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{ChangesetState, Id, PublicationIntent, ReconcilerOperation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearchTerm {
    pub term: String,
    #[serde(default)]
    pub negated: bool,
}

/// Scope of a mapping query against the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRewirerMappingsOpts {
    pub batch_spec_id: Id,
    pub batch_change_id: Id,
    pub text_search: Vec<TextSearchTerm>,
    pub current_state: Option<ChangesetState>,
}

/// Raw input of one apply preview, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyPreviewRequest {
    pub batch_spec_id: Id,
    #[serde(default)]
    pub batch_change_id: Option<Id>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub current_state: Option<String>,
    /// UI publication overrides keyed by changeset spec rand id.
    #[serde(default)]
    pub publication_states: HashMap<String, PublicationIntent>,
}

/// Pagination arguments for one connection page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PageArgs {
    pub limit: usize,
    pub offset: usize,
    pub action: Option<ReconcilerOperation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Aggregate counts over every visible mapping of a preview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPreviewStats {
    pub push: u32,
    pub update: u32,
    pub undraft: u32,
    pub publish: u32,
    pub publish_draft: u32,
    pub sync: u32,
    pub import: u32,
    pub close: u32,
    pub reopen: u32,
    pub sleep: u32,
    pub detach: u32,
    pub archive: u32,
    pub reattach: u32,
    pub added: u32,
    pub modified: u32,
    pub removed: u32,
}

impl ApplyPreviewStats {
    pub fn record(&mut self, op: ReconcilerOperation) {
        let counter = match op {
            ReconcilerOperation::Push => &mut self.push,
            ReconcilerOperation::Update => &mut self.update,
            ReconcilerOperation::Undraft => &mut self.undraft,
            ReconcilerOperation::Publish => &mut self.publish,
            ReconcilerOperation::PublishDraft => &mut self.publish_draft,
            ReconcilerOperation::Sync => &mut self.sync,
            ReconcilerOperation::Import => &mut self.import,
            ReconcilerOperation::Close => &mut self.close,
            ReconcilerOperation::Reopen => &mut self.reopen,
            ReconcilerOperation::Sleep => &mut self.sleep,
            ReconcilerOperation::Detach => &mut self.detach,
            ReconcilerOperation::Archive => &mut self.archive,
            ReconcilerOperation::Reattach => &mut self.reattach,
        };
        *counter += 1;
    }

    pub fn count(&self, op: ReconcilerOperation) -> u32 {
        match op {
            ReconcilerOperation::Push => self.push,
            ReconcilerOperation::Update => self.update,
            ReconcilerOperation::Undraft => self.undraft,
            ReconcilerOperation::Publish => self.publish,
            ReconcilerOperation::PublishDraft => self.publish_draft,
            ReconcilerOperation::Sync => self.sync,
            ReconcilerOperation::Import => self.import,
            ReconcilerOperation::Close => self.close,
            ReconcilerOperation::Reopen => self.reopen,
            ReconcilerOperation::Sleep => self.sleep,
            ReconcilerOperation::Detach => self.detach,
            ReconcilerOperation::Archive => self.archive,
            ReconcilerOperation::Reattach => self.reattach,
        }
    }
}
