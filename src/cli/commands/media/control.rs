use async_trait::async_trait;

use crate::{
    backend::ControlCommand,
    cli::{
        CliError, Command, CommandResult, service::CommandEnv, types::CommandMetadata,
    },
};

/// One transport action (play, pause, next, previous or stop).
pub struct ControlActionCommand {
    env: CommandEnv,
    command: ControlCommand,
}

impl ControlActionCommand {
    /// Command sending `command` to the stored backend.
    pub fn new(env: CommandEnv, command: ControlCommand) -> Self {
        Self { env, command }
    }

    fn description(&self) -> &'static str {
        match self.command {
            ControlCommand::Play => "Start or resume playback",
            ControlCommand::Pause => "Pause playback",
            ControlCommand::Previous => "Go to the previous track",
            ControlCommand::Next => "Skip to the next track",
            ControlCommand::Stop => "Stop playback",
        }
    }
}

#[async_trait]
impl Command for ControlActionCommand {
    async fn execute(&self, _args: &[String]) -> CommandResult {
        let backend = self.env.backend()?;

        backend
            .control(self.command)
            .await
            .map_err(CliError::backend)?;

        Ok(format!("Sent {} to {}", self.command, backend.base_url()))
    }

    fn metadata(&self) -> CommandMetadata {
        let name = self.command.to_string();

        CommandMetadata {
            examples: vec![format!("mediabridge media {name}")],
            name,
            description: self.description().to_string(),
            category: "media".to_string(),
            args: vec![],
        }
    }
}
