pub mod credential_prompt;
pub mod diagnostics;
pub mod discovery;
pub mod job_description;
pub mod llm_service;
pub mod session;
pub mod status;

pub use credential_prompt::{CredentialPrompt, NonInteractivePrompt, PromptResponse, TerminalPrompt};
pub use diagnostics::DiagnosticSink;
pub use discovery::DraftDiscovery;
pub use job_description::{DocumentGenerator, LlmDocumentGenerator};
pub use llm_service::LlmService;
pub use session::{AuthResult, SessionManager};
pub use status::{StatusChannel, StatusHandle, StatusSnapshot};
