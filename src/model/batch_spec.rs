use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{generate_rand_id, Id, UNSAVED_ID};

/// A versioned, not yet applied description of a multi-repository change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSpec {
    pub id: Id,
    pub rand_id: String,
    pub namespace: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BatchSpec {
    pub fn new(id: Id, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            rand_id: generate_rand_id(),
            namespace: namespace.into(),
            name: name.into(),
            description: None,
            created_at: Utc::now(),
        }
    }
}

/// The applied, tracked collection of changesets a batch spec turns into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchChange {
    pub id: Id,
    pub namespace: String,
    pub name: String,
    pub description: Option<String>,
    pub batch_spec_id: Id,
    pub closed_at: Option<DateTime<Utc>>,
}

impl BatchChange {
    pub fn new(id: Id, namespace: impl Into<String>, name: impl Into<String>, batch_spec_id: Id) -> Self {
        Self {
            id,
            namespace: namespace.into(),
            name: name.into(),
            description: None,
            batch_spec_id,
            closed_at: None,
        }
    }

    /// Builds the batch change that applying `spec` would create when none
    /// exists yet. It is never written anywhere.
    pub fn from_spec(spec: &BatchSpec) -> Self {
        Self {
            id: UNSAVED_ID,
            namespace: spec.namespace.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            batch_spec_id: spec.id,
            closed_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNSAVED_ID
    }
}
