use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during CLI command execution.
///
/// Covers command lookup, argument validation and failures of whatever the
/// command talks to.
#[derive(Error, Debug)]
pub enum CliError {
    /// A command or category was not found in the registry.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// The number of arguments does not match the command's metadata.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// A single argument has an unusable value.
    #[error("Invalid value for '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: String,
        /// Why the value was rejected
        reason: String,
    },

    /// A required argument is missing.
    #[error("Missing argument '{arg}' for '{command}'")]
    MissingArgument {
        /// Argument name
        arg: String,
        /// Command that needs it
        command: String,
    },

    /// Reading or writing configuration or the store failed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The backend or another service failed.
    ///
    /// Carries the service name so the user can tell which side broke.
    #[error("{service} error: {details}")]
    ServiceError {
        /// Service name
        service: String,
        /// Failure details
        details: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CliError {
    /// Wraps a backend failure.
    pub fn backend(error: impl std::fmt::Display) -> Self {
        CliError::ServiceError {
            service: "Backend".to_string(),
            details: error.to_string(),
        }
    }
}

/// Type alias for command execution results.
///
/// Commands return the text to print on success.
pub type CommandResult = Result<String, CliError>;

/// Specification for a single command argument.
#[derive(Debug, Clone)]
pub struct CommandArg {
    /// The name of the argument (e.g., "position", "url").
    pub name: String,

    /// Human-readable description of what this argument does.
    pub description: String,

    /// Whether this argument is required for command execution.
    pub required: bool,

    /// The expected type of this argument for help display.
    pub value_type: ArgType,
}

/// Type classification for command arguments.
#[derive(Debug, Clone)]
pub enum ArgType {
    /// A general string value.
    String,

    /// A numeric value (integer or float).
    Number,

    /// An http(s) URL.
    Url,

    /// A configuration key.
    Key,
}

impl ArgType {
    /// Short label used in help output.
    pub fn label(&self) -> &'static str {
        match self {
            ArgType::String => "string",
            ArgType::Number => "number",
            ArgType::Url => "url",
            ArgType::Key => "key",
        }
    }
}

/// Complete metadata for a CLI command.
///
/// Single source of truth for a command's identity, arguments and usage
/// examples; drives help output and argument-count validation.
#[derive(Debug, Clone)]
pub struct CommandMetadata {
    /// The command name (e.g., "play", "ping", "get").
    pub name: String,

    /// Brief description of what this command does.
    pub description: String,

    /// Specification of all arguments this command accepts.
    pub args: Vec<CommandArg>,

    /// Example usage strings to show in help text.
    pub examples: Vec<String>,

    /// Category this command belongs to (e.g., "media", "bridge").
    pub category: String,
}

/// Interface for all CLI commands.
///
/// Commands receive their dependencies through their constructors.
#[async_trait]
pub trait Command: Send + Sync {
    /// Executes the command with the provided arguments.
    ///
    /// The registry has already checked the argument count against the
    /// command's metadata.
    ///
    /// # Errors
    ///
    /// Returns `CliError` for invalid argument values, store failures and
    /// backend failures.
    async fn execute(&self, args: &[String]) -> CommandResult;

    /// Returns the complete metadata for this command.
    fn metadata(&self) -> CommandMetadata;
}
