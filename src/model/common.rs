use uuid::Uuid;

/// Numeric identifier used for every stored entity.
///
/// `0` is reserved for entities that only exist in memory, such as a batch
/// change synthesized by a dry-run reconciliation.
pub type Id = i64;

pub const UNSAVED_ID: Id = 0;

pub fn generate_rand_id() -> String {
    Uuid::new_v4().simple().to_string()
}
