use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One action the reconciler would perform against a code host.
///
/// Variants are declared in execution precedence: the derived `Ord` is the
/// order in which the worker runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcilerOperation {
    Detach,
    Archive,
    Reattach,
    Push,
    Import,
    Publish,
    PublishDraft,
    Close,
    Reopen,
    Undraft,
    Update,
    Sleep,
    Sync,
}

impl ReconcilerOperation {
    pub const ALL: [ReconcilerOperation; 13] = [
        ReconcilerOperation::Detach,
        ReconcilerOperation::Archive,
        ReconcilerOperation::Reattach,
        ReconcilerOperation::Push,
        ReconcilerOperation::Import,
        ReconcilerOperation::Publish,
        ReconcilerOperation::PublishDraft,
        ReconcilerOperation::Close,
        ReconcilerOperation::Reopen,
        ReconcilerOperation::Undraft,
        ReconcilerOperation::Update,
        ReconcilerOperation::Sleep,
        ReconcilerOperation::Sync,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilerOperation::Detach => "DETACH",
            ReconcilerOperation::Archive => "ARCHIVE",
            ReconcilerOperation::Reattach => "REATTACH",
            ReconcilerOperation::Push => "PUSH",
            ReconcilerOperation::Import => "IMPORT",
            ReconcilerOperation::Publish => "PUBLISH",
            ReconcilerOperation::PublishDraft => "PUBLISH_DRAFT",
            ReconcilerOperation::Close => "CLOSE",
            ReconcilerOperation::Reopen => "REOPEN",
            ReconcilerOperation::Undraft => "UNDRAFT",
            ReconcilerOperation::Update => "UPDATE",
            ReconcilerOperation::Sleep => "SLEEP",
            ReconcilerOperation::Sync => "SYNC",
        }
    }
}

impl fmt::Display for ReconcilerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconcilerOperation {
    type Err = String;

    /// Accepts `PUBLISH_DRAFT`, `publish_draft` and `publishDraft`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        ReconcilerOperation::ALL
            .into_iter()
            .find(|op| op.as_str().replace('_', "").to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

/// Set of operations with a fixed execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Operations(BTreeSet<ReconcilerOperation>);

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, op: ReconcilerOperation) {
        self.0.insert(op);
    }

    pub fn contains(&self, op: ReconcilerOperation) -> bool {
        self.0.contains(&op)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn execution_order(&self) -> Vec<ReconcilerOperation> {
        self.0.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_order_is_independent_of_insertion() {
        let mut ops = Operations::new();
        ops.add(ReconcilerOperation::Sync);
        ops.add(ReconcilerOperation::Push);
        ops.add(ReconcilerOperation::Sleep);
        ops.add(ReconcilerOperation::Publish);

        assert_eq!(
            ops.execution_order(),
            vec![
                ReconcilerOperation::Push,
                ReconcilerOperation::Publish,
                ReconcilerOperation::Sleep,
                ReconcilerOperation::Sync,
            ]
        );
    }

    #[test]
    fn test_parse_operation_names() {
        assert_eq!("push".parse(), Ok(ReconcilerOperation::Push));
        assert_eq!("PUBLISH_DRAFT".parse(), Ok(ReconcilerOperation::PublishDraft));
        assert_eq!("publishDraft".parse(), Ok(ReconcilerOperation::PublishDraft));
        assert!("merge".parse::<ReconcilerOperation>().is_err());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&ReconcilerOperation::PublishDraft).unwrap();
        assert_eq!(json, "\"PUBLISH_DRAFT\"");
    }
}
