//! Operator console: command parsing and replies.

/// Console commands with a one-line description, in help order.
pub const COMMANDS: &[(&str, &str)] = &[
    ("help", "List console commands"),
    ("reload", "Re-read every behavior script"),
    ("status", "Print engine status as JSON"),
    ("behaviors", "List behavior ids and animation names"),
    ("summon [id]", "Summon a companion for the owner"),
    ("use <id>", "Switch the companion to another behavior"),
    ("attack [damage]", "Make the companion strike the nearest hostile"),
    ("hurt <amount>", "Damage the owner"),
    ("dismiss", "Dismiss the companion"),
    ("disconnect", "Take the owner offline"),
    ("stop", "Stop the host"),
];

const DEFAULT_ATTACK_DAMAGE: f64 = 4.0;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Help,
    Reload,
    Status,
    Behaviors,
    /// `None` summons the configured default behavior.
    Summon(Option<String>),
    Use(String),
    Attack(f64),
    Hurt(f64),
    Dismiss,
    Disconnect,
    Stop,
}

impl ConsoleCommand {
    /// Parse one console line. A leading `/` is accepted; names are case-insensitive.
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.trim().trim_start_matches('/').split_whitespace();
        let Some(name) = words.next() else {
            return Err("Empty command".into());
        };
        let arg = words.next();

        let command = match name.to_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "reload" => Self::Reload,
            "status" => Self::Status,
            "behaviors" | "list" => Self::Behaviors,
            "summon" => Self::Summon(arg.map(str::to_string)),
            "use" => match arg {
                Some(id) => Self::Use(id.to_string()),
                None => return Err("Usage: use <id>".into()),
            },
            "attack" => Self::Attack(match arg {
                Some(raw) => amount(raw)?,
                None => DEFAULT_ATTACK_DAMAGE,
            }),
            "hurt" => match arg {
                Some(raw) => Self::Hurt(amount(raw)?),
                None => return Err("Usage: hurt <amount>".into()),
            },
            "dismiss" => Self::Dismiss,
            "disconnect" => Self::Disconnect,
            "stop" | "quit" | "exit" => Self::Stop,
            other => {
                return Err(format!(
                    "Unknown command: {other}. Type help for a list of commands."
                ))
            }
        };
        Ok(command)
    }
}

fn amount(raw: &str) -> Result<f64, String> {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(format!("Invalid amount: {raw}")),
    }
}

/// Result of running a console command.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleReply {
    pub success: bool,
    pub messages: Vec<String>,
    /// If true, the host should shut down.
    pub should_stop: bool,
}

impl ConsoleReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            messages: vec![message.into()],
            should_stop: false,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            should_stop: false,
        }
    }

    pub fn lines(messages: Vec<String>) -> Self {
        Self {
            success: true,
            messages,
            should_stop: false,
        }
    }

    pub fn stop() -> Self {
        Self {
            success: true,
            messages: vec!["Stopping the host...".to_string()],
            should_stop: true,
        }
    }
}

pub fn help() -> ConsoleReply {
    let mut lines = vec!["Available commands:".to_string()];
    for (usage, description) in COMMANDS {
        lines.push(format!("  {usage} - {description}"));
    }
    ConsoleReply::lines(lines)
}
