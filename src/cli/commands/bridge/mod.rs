/// Diagnostics for the backend and the persisted bridge state
mod logs;
mod ping;
mod status;

pub use logs::LogsCommand;
pub use ping::PingCommand;
pub use status::StatusCommand;

use crate::cli::{CommandRegistry, service::CommandEnv};

/// Registers every command of the "bridge" category.
pub fn register_commands(registry: &mut CommandRegistry, env: &CommandEnv) {
    const CATEGORY_NAME: &str = "bridge";

    registry.register_command(CATEGORY_NAME, Box::new(PingCommand::new(env.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(StatusCommand::new(env.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(LogsCommand::new(env.clone())));
}
