pub mod credentials;
pub mod draft;
pub mod section;

pub use credentials::Credentials;
pub use draft::{DraftHandle, DraftJobState, DraftOutcome, SectionReport, SectionStatus};
pub use section::{SectionCatalogue, SectionDescriptor, SectionKind};
