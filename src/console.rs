//! Console
//!
//! Terminal front end: line commands read from stdin and the screen that is
//! redrawn on every state change.

use std::io::ErrorKind;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;

use crate::chart::{render_chart, ChartSize};
use crate::client::HealthStatus;
use crate::measurement::DisplayWindow;
use crate::state::DashboardState;

/// Clear screen and move the cursor home
const CLEAR: &str = "\x1b[2J\x1b[H";

pub const HELP: &str = "\
Commands:
  address <url>   (a)  poll a different sensor server
  last <n>        (n)  draw the latest n readings
  interval <ms>   (i)  data poll interval in milliseconds
  refresh              redraw now
  help            (h)  show this help
  quit            (q)  exit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Address(String),
    LastN(usize),
    Interval(Duration),
    Refresh,
    Help,
    Quit,
}

/// Errors from parsing a console line
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Unknown command '{0}' (type 'help')")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{command}' expects a whole number, got '{value}'")]
    InvalidNumber { command: &'static str, value: String },

    #[error("Interval must be greater than zero")]
    ZeroInterval,
}

/// Parse one console line. Blank lines are `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "address" | "a" => {
            if rest.is_empty() {
                return Err(CommandError::MissingArgument("address"));
            }
            Command::Address(rest.to_string())
        }
        "last" | "n" => Command::LastN(number("last", rest)?),
        "interval" | "i" => {
            let ms: u64 = number("interval", rest)?;
            if ms == 0 {
                return Err(CommandError::ZeroInterval);
            }
            Command::Interval(Duration::from_millis(ms))
        }
        "refresh" | "r" => Command::Refresh,
        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn number<T: std::str::FromStr>(command: &'static str, value: &str) -> Result<T, CommandError> {
    if value.is_empty() {
        return Err(CommandError::MissingArgument(command));
    }
    value.parse().map_err(|_| CommandError::InvalidNumber {
        command,
        value: value.to_string(),
    })
}

/// What one read from stdin means for the dashboard
#[derive(Debug, PartialEq)]
pub enum Input {
    Command(Command),
    /// Feedback for the status line; keep reading
    Status(String),
    Blank,
    /// Stdin is gone, keep drawing until a signal arrives
    Closed,
}

/// Classify the result of reading one stdin line.
///
/// Undecodable lines only produce a status message. Any other read error
/// closes input, it never ends the dashboard.
pub fn read_input(line: std::io::Result<Option<String>>) -> Input {
    match line {
        Ok(Some(line)) => match parse_command(&line) {
            Ok(Some(command)) => Input::Command(command),
            Ok(None) => Input::Blank,
            Err(e) => Input::Status(e.to_string()),
        },
        Ok(None) => Input::Closed,
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            Input::Status(format!("Unreadable input: {}", e))
        }
        Err(e) => {
            tracing::warn!("Stopped reading commands: {}", e);
            Input::Closed
        }
    }
}

/// What the screen needs besides the polled state
#[derive(Debug, Clone)]
pub struct View {
    pub window: DisplayWindow,
    pub refresh_interval: Duration,
    pub size: ChartSize,
    /// Feedback for the last command
    pub status: Option<String>,
}

/// Render the whole screen for one state snapshot
pub fn render_screen(state: &DashboardState, view: &View) -> String {
    let mut out = String::new();

    out.push_str(&format!("CO2 Data  {}\n", state.address));
    let marker = match state.health {
        HealthStatus::Healthy => "[+]",
        HealthStatus::Unhealthy | HealthStatus::Unknown => "[-]",
    };
    out.push_str(&format!("{} {}\n", marker, state.health));

    if let Some(alert) = &state.alert {
        out.push_str(&format!(
            "!! {} (HTTP {}) at {}\n",
            alert.message,
            alert.status,
            alert.raised_at.with_timezone(&Local).format("%H:%M:%S")
        ));
    }
    if let Some(error) = &state.last_error {
        out.push_str(&format!("!! {}\n", error));
    }
    out.push('\n');

    let points = view.window.apply(&state.measurements);
    out.push_str("CO2 Measurements (ppm)\n");
    out.push_str(&render_chart(&points, view.size));
    out.push('\n');

    let updated = state
        .last_update
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    out.push_str(&format!(
        "Last N: {}  Refresh: {} ms  Showing: {}/{}  Updated: {}\n",
        view.window.last_n,
        view.refresh_interval.as_millis(),
        points.len(),
        state.measurements.len(),
        updated
    ));

    if let Some(status) = &view.status {
        out.push_str(status);
        out.push('\n');
    }
    out.push_str("> ");
    out
}

/// Terminal output that skips frames identical to the one on screen
#[derive(Debug, Default)]
pub struct Screen {
    last: Option<String>,
}

impl Screen {
    /// Clear-and-draw sequence for this state, or `None` if nothing changed
    pub fn frame(&mut self, state: &DashboardState, view: &View) -> Option<String> {
        let screen = render_screen(state, view);
        if self.last.as_deref() == Some(screen.as_str()) {
            return None;
        }
        let out = format!("{}{}", CLEAR, screen);
        self.last = Some(screen);
        Some(out)
    }

    /// Force the next frame to be drawn
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
