pub mod cancel;
pub mod clone;
pub mod facade;
pub mod memo;
pub mod plan;
pub mod preview;
pub mod rewirer;
pub mod search;

pub use facade::{clamp_page, page_args, parse_cursor, ApplyPreviewConnection, ApplyPreviewFacade, PreviewPage};
pub use plan::{compare_changeset_specs, determine_plan};
pub use preview::{ApplyPreview, EntityView, PreviewTargets, TargetKind};
pub use rewirer::{rewire, Rewired};
