use async_trait::async_trait;

use crate::cli::{
    CliError, Command, CommandResult, service::CommandEnv, types::CommandMetadata,
};

/// Prints the effective configuration and stored base URL
pub struct ShowCommand {
    env: CommandEnv,
}

impl ShowCommand {
    /// Creates a new ShowCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for ShowCommand {
    async fn execute(&self, _args: &[String]) -> CommandResult {
        let config = toml::to_string_pretty(self.env.config.as_ref())
            .map_err(|e| CliError::ConfigError(e.to_string()))?;

        Ok(format!(
            "# stored base-url: {}\n{}",
            self.env.store.base_url(),
            config.trim_end()
        ))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "show".to_string(),
            description: "Print the effective configuration".to_string(),
            category: "config".to_string(),
            args: vec![],
            examples: vec!["mediabridge config show".to_string()],
        }
    }
}
