use async_trait::async_trait;

use crate::cli::{
    CliError, Command, CommandResult,
    formatting::format_toml_value,
    service::CommandEnv,
    types::{ArgType, CommandArg, CommandMetadata},
};

use super::{BASE_URL_ARG, lookup};

/// Command for reading the stored base URL or a configuration value.
///
/// # Example Usage
///
/// ```bash
/// mediabridge config get base-url
/// mediabridge config get stream.reconnect_delay_ms
/// ```
pub struct GetCommand {
    env: CommandEnv,
}

impl GetCommand {
    /// Creates a new GetCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for GetCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let key = args.first().ok_or_else(|| CliError::MissingArgument {
            arg: "key".to_string(),
            command: "get".to_string(),
        })?;

        if key == BASE_URL_ARG {
            return Ok(format!("{key}: {}", self.env.store.base_url()));
        }

        let value = lookup(&self.env.config, key)?;
        Ok(format!("{key}: {}", format_toml_value(&value)))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "get".to_string(),
            description: "Print the stored base URL or a configuration value".to_string(),
            category: "config".to_string(),
            args: vec![CommandArg {
                name: "key".to_string(),
                description: "'base-url' or a dotted config path".to_string(),
                required: true,
                value_type: ArgType::Key,
            }],
            examples: vec![
                "mediabridge config get base-url".to_string(),
                "mediabridge config get stream.reconnect_delay_ms".to_string(),
            ],
        }
    }
}
