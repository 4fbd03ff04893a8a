use async_trait::async_trait;

use crate::{
    cli::{Command, CommandResult, service::CommandEnv, types::CommandMetadata},
    model::DebugState,
    panel::render::{PanelView, render},
};

/// Prints the persisted debug state the way the panel shows it
pub struct StatusCommand {
    env: CommandEnv,
}

impl StatusCommand {
    /// Creates a new StatusCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for StatusCommand {
    async fn execute(&self, _args: &[String]) -> CommandResult {
        let store = &self.env.store;
        let mut debug = store
            .debug_state()
            .unwrap_or_else(|| DebugState::default_for(store.base_url()));
        debug.base_url = store.base_url();

        Ok(render(&PanelView {
            debug: &debug,
            projected: debug.last_state.as_ref(),
            logs: &[],
        })
        .trim_end()
        .to_string())
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "status".to_string(),
            description: "Show connection health and the last known playback state".to_string(),
            category: "bridge".to_string(),
            args: vec![],
            examples: vec!["mediabridge bridge status".to_string()],
        }
    }
}
