/// Playback commands sent straight to the backend
mod control;
mod seek;
mod select;

pub use control::ControlActionCommand;
pub use seek::{SeekCommand, SeekTarget, parse_seek_target};
pub use select::SelectCommand;

use crate::{
    backend::ControlCommand,
    cli::{CommandRegistry, service::CommandEnv},
};

/// Registers every command of the "media" category.
pub fn register_commands(registry: &mut CommandRegistry, env: &CommandEnv) {
    const CATEGORY_NAME: &str = "media";

    for command in ControlCommand::ALL {
        registry.register_command(
            CATEGORY_NAME,
            Box::new(ControlActionCommand::new(env.clone(), command)),
        );
    }
    registry.register_command(CATEGORY_NAME, Box::new(SeekCommand::new(env.clone())));
    registry.register_command(CATEGORY_NAME, Box::new(SelectCommand::new(env.clone())));
}
