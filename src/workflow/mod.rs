pub mod draft_ctx;
pub mod draft_flow;
pub mod markers;
pub mod section_runner;
pub mod sections;

pub use draft_ctx::DraftCtx;
pub use draft_flow::DraftFlow;
pub use markers::Marker;
pub use section_runner::{run_section, SectionProgress, SectionProtocol, StepEnv};
