//! Text rendering of the panel surface.

use std::fmt::Write;

use chrono::{DateTime, Local};

use crate::{
    cli::formatting::Colors,
    model::{
        ConnectionHealth, DebugState, LogRecord, PlaybackSnapshot, PlayerCapabilities,
        PlayerSelectionMode, RecordLevel,
    },
};

const PROGRESS_WIDTH: usize = 32;

/// Everything one panel frame shows.
#[derive(Debug, Clone)]
pub struct PanelView<'a> {
    /// Cached debug state of the panel context.
    pub debug: &'a DebugState,
    /// Last snapshot with its position projected to now.
    pub projected: Option<&'a PlaybackSnapshot>,
    /// Most recent log records, oldest first.
    pub logs: &'a [LogRecord],
}

/// Renders a full frame.
pub fn render(view: &PanelView<'_>) -> String {
    let mut out = String::new();
    let debug = view.debug;

    let _ = writeln!(
        out,
        "{}Media Bridge{}  {}",
        Colors::BOLD,
        Colors::RESET,
        health_badge(debug.health)
    );
    let _ = writeln!(out, "{}", field("backend", &debug.base_url));
    if let Some(error) = debug.last_error.as_deref() {
        let _ = writeln!(
            out,
            "{}",
            field("error", &format!("{}{error}{}", Colors::RED, Colors::RESET))
        );
    }
    out.push('\n');

    match view.projected {
        Some(snapshot) => render_playback(&mut out, snapshot),
        None => {
            let _ = writeln!(
                out,
                "{}waiting for the first state event{}",
                Colors::DIM,
                Colors::RESET
            );
        }
    }

    if !view.logs.is_empty() {
        let _ = writeln!(out, "\n{}logs{}", Colors::BOLD, Colors::RESET);
        for record in view.logs {
            let _ = writeln!(out, "  {}", log_line(record));
        }
    }

    out
}

fn render_playback(out: &mut String, snapshot: &PlaybackSnapshot) {
    let _ = writeln!(
        out,
        "{}",
        field(
            "player",
            &format!("{} ({})", snapshot.player_name, snapshot.playback_status)
        )
    );
    let _ = writeln!(
        out,
        "{}",
        field("title", snapshot.title.as_deref().unwrap_or("-"))
    );
    let _ = writeln!(out, "{}", field("artist", &snapshot.artist_display()));
    let _ = writeln!(
        out,
        "{}",
        field("album", snapshot.album.as_deref().unwrap_or("-"))
    );
    let _ = writeln!(out, "{}", progress_line(snapshot));
    let _ = writeln!(
        out,
        "{}",
        field("controls", &capability_row(snapshot.capabilities()))
    );

    if snapshot.available_players.is_empty() {
        return;
    }

    let _ = writeln!(out, "\n{}players{}", Colors::BOLD, Colors::RESET);
    for player in &snapshot.available_players {
        let active = snapshot.active_player_bus_name.as_deref() == Some(&player.bus_name);
        let selected = snapshot.selection_mode == PlayerSelectionMode::Manual
            && snapshot.selected_player_bus_name.as_deref() == Some(&player.bus_name);

        let marker = if active { '*' } else { ' ' };
        let pinned = if selected { " [selected]" } else { "" };
        let _ = writeln!(
            out,
            "  {marker} {} {}({}){}{pinned}",
            player.player_name,
            Colors::DIM,
            player.bus_name,
            Colors::RESET
        );
    }
}

fn field(label: &str, value: &str) -> String {
    format!("{}{label:<9}{} {value}", Colors::DIM, Colors::RESET)
}

/// Colored badge for a connection health.
pub fn health_badge(health: ConnectionHealth) -> String {
    let color = match health {
        ConnectionHealth::Connected => Colors::GREEN,
        ConnectionHealth::Connecting => Colors::YELLOW,
        ConnectionHealth::Error => Colors::RED,
        ConnectionHealth::Idle => Colors::BRIGHT_BLACK,
    };
    format!("{color}[{health}]{}", Colors::RESET)
}

/// Progress bar followed by `position / duration`.
///
/// Without a known duration only the position is shown.
pub fn progress_line(snapshot: &PlaybackSnapshot) -> String {
    let position = snapshot.clamped_position_us();

    match snapshot.known_duration_us() {
        Some(duration) => {
            let filled = ((position as f64 / duration as f64) * PROGRESS_WIDTH as f64).round()
                as usize;
            let filled = filled.min(PROGRESS_WIDTH);
            format!(
                "[{}{}] {} / {}",
                "#".repeat(filled),
                "-".repeat(PROGRESS_WIDTH - filled),
                format_clock(position),
                format_clock(duration)
            )
        }
        None => format!("[{}] {}", " ".repeat(PROGRESS_WIDTH), format_clock(position)),
    }
}

/// Formats microseconds as `m:ss`, or `h:mm:ss` past an hour.
pub fn format_clock(us: u64) -> String {
    let total = us / 1_000_000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn capability_row(caps: PlayerCapabilities) -> String {
    const LABELS: [(PlayerCapabilities, &str); 5] = [
        (PlayerCapabilities::GO_PREVIOUS, "prev"),
        (PlayerCapabilities::PLAY, "play"),
        (PlayerCapabilities::PAUSE, "pause"),
        (PlayerCapabilities::GO_NEXT, "next"),
        (PlayerCapabilities::SEEK, "seek"),
    ];

    LABELS
        .iter()
        .map(|(flag, label)| {
            if caps.contains(*flag) {
                (*label).to_string()
            } else {
                format!("{}{label}{}", Colors::BRIGHT_BLACK, Colors::RESET)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One log record as `HH:MM:SS level message`.
pub fn log_line(record: &LogRecord) -> String {
    let time = DateTime::from_timestamp_millis(record.at)
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let color = match record.level {
        RecordLevel::Info => Colors::DIM,
        RecordLevel::Warn => Colors::YELLOW,
        RecordLevel::Error => Colors::RED,
    };

    format!(
        "{}{time}{} {color}{:<5}{} {}",
        Colors::DIM,
        Colors::RESET,
        record.level,
        Colors::RESET,
        record.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlayerDescriptor;

    fn snapshot() -> PlaybackSnapshot {
        PlaybackSnapshot {
            player_name: "vlc".into(),
            title: Some("Song".into()),
            artists: vec!["A".into(), "B".into()],
            duration_us: Some(200_000_000),
            position_us: 50_000_000,
            can_play: true,
            selection_mode: PlayerSelectionMode::Manual,
            active_player_bus_name: Some("org.mpris.MediaPlayer2.vlc".into()),
            selected_player_bus_name: Some("org.mpris.MediaPlayer2.vlc".into()),
            available_players: vec![
                PlayerDescriptor {
                    bus_name: "org.mpris.MediaPlayer2.vlc".into(),
                    player_name: "vlc".into(),
                },
                PlayerDescriptor {
                    bus_name: "org.mpris.MediaPlayer2.mpv".into(),
                    player_name: "mpv".into(),
                },
            ],
            ..PlaybackSnapshot::default()
        }
    }

    #[test]
    fn clock_formats() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(83_400_000), "1:23");
        assert_eq!(format_clock(3_723_000_000), "1:02:03");
    }

    #[test]
    fn progress_is_quarter_full() {
        let line = progress_line(&snapshot());
        assert!(line.starts_with(&format!("[{}{}]", "#".repeat(8), "-".repeat(24))));
        assert!(line.ends_with("0:50 / 3:20"));
    }

    #[test]
    fn progress_without_duration_shows_position_only() {
        let line = progress_line(&PlaybackSnapshot {
            duration_us: None,
            ..snapshot()
        });
        assert!(line.ends_with("] 0:50"));
        assert!(!line.contains('/'));
    }

    #[test]
    fn frame_marks_active_and_selected_player() {
        let debug = DebugState {
            health: ConnectionHealth::Error,
            last_error: Some("SSE error (status 500)".into()),
            ..DebugState::default_for("http://localhost:5000")
        };
        let projected = snapshot();
        let logs = vec![LogRecord::now(RecordLevel::Warn, "SSE error (status 500)")];

        let frame = render(&PanelView {
            debug: &debug,
            projected: Some(&projected),
            logs: &logs,
        });

        assert!(frame.contains("[error]"));
        assert!(frame.contains("http://localhost:5000"));
        assert!(frame.contains("A, B"));
        assert!(frame.contains("* vlc"));
        assert!(frame.contains("[selected]"));
        assert!(frame.contains("  mpv"));
        assert!(frame.contains("SSE error (status 500)"));
    }

    #[test]
    fn frame_without_state_waits() {
        let debug = DebugState::default();
        let frame = render(&PanelView {
            debug: &debug,
            projected: None,
            logs: &[],
        });

        assert!(frame.contains("waiting for the first state event"));
        assert!(!frame.contains("logs"));
    }
}
