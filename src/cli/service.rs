use std::sync::Arc;

use crate::{backend::BackendClient, config::BridgeConfig, store::BridgeStore};

use super::{
    CliError, CommandRegistry,
    formatting::{format_category, format_command, format_description, format_header, format_usage},
};

/// What commands work against: the loaded configuration and the store.
#[derive(Clone)]
pub struct CommandEnv {
    /// Loaded configuration.
    pub config: Arc<BridgeConfig>,
    /// Persisted bridge store, shared with a running daemon through its file.
    pub store: BridgeStore,
}

impl CommandEnv {
    /// Bundles `config` and `store`.
    pub fn new(config: BridgeConfig, store: BridgeStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Backend client for the stored base URL.
    ///
    /// # Errors
    /// Returns `CliError::ConfigError` if the stored base URL is unusable.
    pub fn backend(&self) -> Result<BackendClient, CliError> {
        BackendClient::new(
            &self.store.base_url(),
            self.config.backend.request_timeout(),
        )
        .map_err(|e| CliError::ConfigError(e.to_string()))
    }
}

/// High-level service for managing and executing CLI commands.
pub struct CliService {
    registry: CommandRegistry,
}

impl CliService {
    /// Creates a CLI service with all built-in commands registered.
    pub fn new(env: CommandEnv) -> Self {
        let mut registry = CommandRegistry::new();
        registry.register_all_commands(&env);

        CliService { registry }
    }

    /// Executes a command by category and name with the provided arguments.
    ///
    /// # Errors
    /// Returns `CliError::CommandNotFound` if the command doesn't exist in the category,
    /// or whatever the command itself fails with.
    pub async fn execute_command(
        &self,
        category: &str,
        command_name: &str,
        args: &[String],
    ) -> Result<String, CliError> {
        self.registry.execute(category, command_name, args).await
    }

    /// Lists all available commands organized by category.
    pub fn list_all(&self) -> Vec<(String, Vec<String>)> {
        self.registry.list_commands()
    }

    /// Help text covering every registered command.
    pub fn help_text(&self) -> String {
        let mut lines = vec![
            format_header("mediabridge"),
            format_description("Bridge desktop media keys to a remote playback backend"),
            String::new(),
            format!(
                "  {} {}",
                format_command("run"),
                format_usage("[--headless] [--base-url URL]")
            ),
        ];

        for (category, commands) in self.list_all() {
            lines.push(String::new());
            lines.push(format_category(&category));

            for name in commands {
                let Some(metadata) = self.registry.metadata(&category, &name) else {
                    continue;
                };

                let args: Vec<String> = metadata
                    .args
                    .iter()
                    .map(|arg| {
                        if arg.required {
                            format!("<{}>", arg.name)
                        } else {
                            format!("[{}]", arg.name)
                        }
                    })
                    .collect();

                lines.push(format!(
                    "  {} {}  {}",
                    format_command(&name),
                    format_usage(&args.join(" ")),
                    format_description(&metadata.description)
                ));
            }
        }

        lines.join("\n")
    }
}
