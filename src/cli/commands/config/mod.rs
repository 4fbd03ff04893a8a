/// Reading configuration and changing the stored base URL
mod get;
mod set;
mod show;

pub use get::GetCommand;
pub use set::SetCommand;
pub use show::ShowCommand;

use toml::Value;

use crate::{
    cli::{CliError, CommandRegistry, service::CommandEnv},
    config::BridgeConfig,
};

/// Store key exposed on the command line.
pub const BASE_URL_ARG: &str = "base-url";

/// Registers every command of the "config" category.
pub fn register_commands(registry: &mut CommandRegistry, env: &CommandEnv) {
    const CATEGORY_NAME: &str = "config";

    registry.register_command(CATEGORY_NAME, Box::new(GetCommand::new(env.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(SetCommand::new(env.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(ShowCommand::new(env.clone())));
}

/// Looks up a dotted path such as `stream.reconnect_delay_ms`.
///
/// # Errors
/// Returns `CliError::ConfigError` if the path does not exist.
pub fn lookup(config: &BridgeConfig, path: &str) -> Result<Value, CliError> {
    let mut value =
        Value::try_from(config).map_err(|e| CliError::ConfigError(e.to_string()))?;

    for segment in path.split('.') {
        value = match value {
            Value::Table(mut table) => table.remove(segment),
            _ => None,
        }
        .ok_or_else(|| CliError::ConfigError(format!("Unknown key '{path}'")))?;
    }

    Ok(value)
}
