pub mod assist;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod languages;
pub mod lsp;
pub mod providers;
pub mod reconcile;
pub mod schema;
pub mod server;
pub mod telemetry;
pub mod yaml;

pub use engine::Engine;
pub use error::{PipelineError, Result};
pub use languages::LanguageId;
