use async_trait::async_trait;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        service::CommandEnv,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    panel::render::log_line,
};

const DEFAULT_COUNT: usize = 20;

/// Prints the most recent bridge log records
pub struct LogsCommand {
    env: CommandEnv,
}

impl LogsCommand {
    /// Creates a new LogsCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for LogsCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let count = match args.first() {
            Some(count) => count.parse::<usize>().map_err(|_| CliError::InvalidArgument {
                arg: "count".to_string(),
                reason: "Expected a positive number".to_string(),
            })?,
            None => DEFAULT_COUNT,
        };

        let records = self.env.store.logs().tail(count);
        if records.is_empty() {
            return Ok("No bridge logs recorded".to_string());
        }

        Ok(records.iter().map(log_line).collect::<Vec<_>>().join("\n"))
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "logs".to_string(),
            description: "Show the most recent bridge log records".to_string(),
            category: "bridge".to_string(),
            args: vec![CommandArg {
                name: "count".to_string(),
                description: format!("Number of records to show (default {DEFAULT_COUNT})"),
                required: false,
                value_type: ArgType::Number,
            }],
            examples: vec![
                "mediabridge bridge logs".to_string(),
                "mediabridge bridge logs 50".to_string(),
            ],
        }
    }
}
