//! Language server for pipeline and task files: diagnostics on edit,
//! completion, hover, definitions, outline and quick fixes.
pub mod code_action;
pub mod completion;
pub mod definition;
pub mod diagnostic;
pub mod document;
pub mod hover;
pub mod server;
pub mod symbols;

pub use document::{DocumentManager, PublishGate};
pub use server::PipelineLanguageServer;
