//! Vecscope Server
//!
//! Process-level front ends for the vecscope pipeline:
//! - `serve`: the embedding worker driven over newline-delimited JSON on stdio
//! - `search`: an interactive terminal search session
//! - `embed`: print the embedding of one text

pub mod commands;
pub mod config;
pub mod error;
pub mod serve;
pub mod terminal;
pub mod transport;

pub use config::AppConfig;
pub use error::{ServerError, ServerResult};
pub use serve::serve;
pub use terminal::{format_vector_preview, TerminalView};
pub use transport::{Inbound, RequestReader, ResponseWriter};
