use serde::{Deserialize, Serialize};

use crate::model::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalServiceType {
    GitHub,
    GitLab,
    BitbucketServer,
    BitbucketCloud,
    AzureDevOps,
    Gerrit,
    Perforce,
    Other,
}

impl ExternalServiceType {
    /// Whether changesets can be created on this code host at all.
    pub fn supports_batch_changes(&self) -> bool {
        !matches!(self, ExternalServiceType::Other)
    }

    /// Whether the code host has a notion of draft changesets.
    pub fn supports_draft(&self) -> bool {
        matches!(
            self,
            ExternalServiceType::GitHub
                | ExternalServiceType::GitLab
                | ExternalServiceType::AzureDevOps
                | ExternalServiceType::Gerrit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: Id,
    pub name: String,
    pub external_service_type: ExternalServiceType,
}

impl Repo {
    pub fn new(id: Id, name: impl Into<String>, external_service_type: ExternalServiceType) -> Self {
        Self {
            id,
            name: name.into(),
            external_service_type,
        }
    }
}
