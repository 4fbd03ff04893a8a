use async_trait::async_trait;

use crate::{
    backend::BackendClient,
    cli::{
        CliError, Command, CommandResult,
        service::CommandEnv,
        types::{ArgType, CommandArg, CommandMetadata},
    },
};

use super::BASE_URL_ARG;

/// Command for changing the stored base URL.
///
/// A running bridge picks the change up through its store file watcher and
/// reconnects. An empty value restores the default.
pub struct SetCommand {
    env: CommandEnv,
}

impl SetCommand {
    /// Creates a new SetCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for SetCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let (Some(key), Some(value)) = (args.first(), args.get(1)) else {
            return Err(CliError::MissingArgument {
                arg: "value".to_string(),
                command: "set".to_string(),
            });
        };

        if key != BASE_URL_ARG {
            return Err(CliError::InvalidArgument {
                arg: "key".to_string(),
                reason: format!(
                    "only '{BASE_URL_ARG}' can be set; edit config.toml for '{key}'"
                ),
            });
        }

        let value = value.trim();
        if !value.is_empty() {
            BackendClient::new(value, self.env.config.backend.request_timeout()).map_err(
                |e| CliError::InvalidArgument {
                    arg: "value".to_string(),
                    reason: e.to_string(),
                },
            )?;
        }

        self.env
            .store
            .set_base_url(value)
            .await
            .map_err(|e| CliError::ConfigError(e.to_string()))?;

        Ok(format!("{key}: {}", self.env.store.base_url()))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "set".to_string(),
            description: "Store a new base URL (empty restores the default)".to_string(),
            category: "config".to_string(),
            args: vec![
                CommandArg {
                    name: "key".to_string(),
                    description: "'base-url'".to_string(),
                    required: true,
                    value_type: ArgType::Key,
                },
                CommandArg {
                    name: "value".to_string(),
                    description: "http(s) origin of the backend".to_string(),
                    required: true,
                    value_type: ArgType::Url,
                },
            ],
            examples: vec![
                "mediabridge config set base-url http://penguin.linux.test:5000".to_string(),
                "mediabridge config set base-url ''".to_string(),
            ],
        }
    }
}
