use async_trait::async_trait;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        service::CommandEnv,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    model::PlayerSelection,
};

/// Command to choose which player the backend follows
pub struct SelectCommand {
    env: CommandEnv,
}

impl SelectCommand {
    /// Creates a new SelectCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for SelectCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let player = args.first().map(|arg| arg.trim()).unwrap_or_default();

        let selection = if player.is_empty() || player.eq_ignore_ascii_case("auto") {
            PlayerSelection::auto()
        } else {
            PlayerSelection::manual(player)
        };

        self.env
            .backend()?
            .select_player(&selection)
            .await
            .map_err(CliError::backend)?;

        Ok(match selection.selected_player_bus_name {
            Some(bus_name) => format!("Following {bus_name}"),
            None => "Following the most relevant player".to_string(),
        })
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "select".to_string(),
            description: "Pin a player by bus name, or let the backend choose".to_string(),
            category: "media".to_string(),
            args: vec![CommandArg {
                name: "player".to_string(),
                description: "MPRIS bus name, or 'auto' (default)".to_string(),
                required: false,
                value_type: ArgType::String,
            }],
            examples: vec![
                "mediabridge media select auto".to_string(),
                "mediabridge media select org.mpris.MediaPlayer2.vlc".to_string(),
            ],
        }
    }
}
