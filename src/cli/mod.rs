//! Command-line interface.
//!
//! One-shot commands that act on the backend or the persisted store, organized
//! by category in a [`CommandRegistry`]. Help text is generated from each
//! command's metadata.

mod commands;
pub mod formatting;
mod registry;
mod service;
mod types;

#[cfg(test)]
mod tests;

pub use commands::media::parse_seek_target;
pub use registry::CommandRegistry;
pub use service::{CliService, CommandEnv};
pub use types::{ArgType, CliError, Command, CommandArg, CommandMetadata, CommandResult};
