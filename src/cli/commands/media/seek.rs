use async_trait::async_trait;

use crate::{
    cli::{
        CliError, Command, CommandResult,
        service::CommandEnv,
        types::{ArgType, CommandArg, CommandMetadata},
    },
    panel::render::format_clock,
};

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Where a seek goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// Absolute position in microseconds
    To(i64),
    /// Signed offset in microseconds
    By(i64),
}

/// Parses `seconds`, `mm:ss`, `+N` or `-N` (seconds, fractions allowed).
///
/// # Errors
/// Returns `CliError::InvalidArgument` for anything else.
pub fn parse_seek_target(position: &str) -> Result<SeekTarget, CliError> {
    let invalid = |reason: &str| CliError::InvalidArgument {
        arg: "position".to_string(),
        reason: reason.to_string(),
    };

    let position = position.trim();

    if let Some(sign) = position.chars().next().filter(|c| *c == '+' || *c == '-') {
        let seconds = parse_seconds(&position[1..]).ok_or_else(|| {
            invalid("Invalid relative seek format. Use +10 or -10")
        })?;
        let offset = (seconds * MICROS_PER_SECOND).round() as i64;

        return Ok(SeekTarget::By(if sign == '-' { -offset } else { offset }));
    }

    if let Some((minutes, seconds)) = position.split_once(':') {
        let minutes = minutes
            .parse::<u64>()
            .map_err(|_| invalid("Invalid minutes value"))?;
        let seconds = parse_seconds(seconds).ok_or_else(|| invalid("Invalid seconds value"))?;

        if seconds >= 60.0 {
            return Err(invalid("Seconds must be less than 60"));
        }

        let total = minutes as f64 * 60.0 + seconds;
        return Ok(SeekTarget::To((total * MICROS_PER_SECOND).round() as i64));
    }

    let seconds = parse_seconds(position).ok_or_else(|| {
        invalid("Invalid position format. Use seconds, mm:ss, or relative (+10, -10)")
    })?;

    Ok(SeekTarget::To((seconds * MICROS_PER_SECOND).round() as i64))
}

fn parse_seconds(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
}

/// Command to seek within the current track
pub struct SeekCommand {
    env: CommandEnv,
}

impl SeekCommand {
    /// Creates a new SeekCommand
    pub fn new(env: CommandEnv) -> Self {
        Self { env }
    }
}

#[async_trait]
impl Command for SeekCommand {
    async fn execute(&self, args: &[String]) -> CommandResult {
        let position = args.first().ok_or_else(|| CliError::MissingArgument {
            arg: "position".to_string(),
            command: "seek".to_string(),
        })?;

        let target = parse_seek_target(position)?;
        let backend = self.env.backend()?;

        match target {
            SeekTarget::To(position_us) => {
                let sent = backend
                    .seek_to(position_us)
                    .await
                    .map_err(CliError::backend)?;
                Ok(format!("Seeked to {}", format_clock(sent)))
            }
            SeekTarget::By(offset_us) => {
                backend
                    .seek_by(offset_us)
                    .await
                    .map_err(CliError::backend)?;

                let sign = if offset_us < 0 { '-' } else { '+' };
                Ok(format!(
                    "Seeked by {sign}{}",
                    format_clock(offset_us.unsigned_abs())
                ))
            }
        }
    }

    fn metadata(&self) -> CommandMetadata {
        CommandMetadata {
            name: "seek".to_string(),
            description: "Seek to a position or by an offset".to_string(),
            category: "media".to_string(),
            args: vec![CommandArg {
                name: "position".to_string(),
                description: "Seconds (90), minutes and seconds (1:30), or a relative offset (+10, -10)".to_string(),
                required: true,
                value_type: ArgType::String,
            }],
            examples: vec![
                "mediabridge media seek 90".to_string(),
                "mediabridge media seek 1:30".to_string(),
                "mediabridge media seek +10".to_string(),
                "mediabridge media seek -10".to_string(),
            ],
        }
    }
}
