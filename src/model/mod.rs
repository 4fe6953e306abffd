pub mod batch_spec;
pub mod changeset;
pub mod changeset_spec;
pub mod common;
pub mod mapping;
pub mod operation;
pub mod plan;
pub mod preview;
pub mod repo;

pub use batch_spec::*;
pub use changeset::*;
pub use changeset_spec::*;
pub use common::*;
pub use mapping::*;
pub use operation::*;
pub use plan::*;
pub use preview::*;
pub use repo::*;
