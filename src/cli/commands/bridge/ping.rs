use async_trait::async_trait;

use crate::cli::{
    CliError, Command, CommandResult, service::CommandEnv, types::CommandMetadata,
};

/// Probes the backend's health endpoint
pub struct PingCommand {
    env: CommandEnv,
}

impl PingCommand {
    /// Creates a new PingCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for PingCommand {
    async fn execute(&self, _args: &[String]) -> CommandResult {
        let backend = self.env.backend()?;
        let reply = backend.ping().await.map_err(CliError::backend)?;

        let body = reply.body.trim();
        Ok(if body.is_empty() {
            format!("{}: {}", backend.base_url(), reply.status)
        } else {
            format!("{}: {} {body}", backend.base_url(), reply.status)
        })
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "ping".to_string(),
            description: "Check that the backend answers /healthz".to_string(),
            category: "bridge".to_string(),
            args: vec![],
            examples: vec!["mediabridge bridge ping".to_string()],
        }
    }
}
