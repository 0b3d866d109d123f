use std::collections::HashMap;

use tracing::warn;

pub(crate) const MAX_TICK_SECONDS: f32 = 600.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ConsoleCommand {
    Help,
    Visit { zone_id: String },
    Discover { identifier: String },
    Tick { seconds: Option<f32> },
    Save,
    Load,
    Delete,
    NewGame,
    Activate { id: String },
    Deactivate { id: String },
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CommandParseError {
    reason: String,
    usage: String,
}

impl CommandParseError {
    fn new(reason: impl Into<String>, usage: &str) -> Self {
        Self {
            reason: reason.into(),
            usage: usage.to_string(),
        }
    }
}

type ParseFn = fn(&[String]) -> Result<ConsoleCommand, CommandParseError>;

struct CommandSpec {
    name: String,
    help: String,
    arg_schema: String,
    parse: ParseFn,
}

const BUILTINS: &[(&str, &str, &str, ParseFn)] = &[
    ("help", "List commands", "", parse_help_command),
    (
        "visit",
        "Record one visit to a zone",
        "<zone_id:string>",
        parse_visit_command,
    ),
    (
        "discover",
        "Mark a species as discovered",
        "<identifier:string>",
        parse_discover_command,
    ),
    (
        "tick",
        "Advance fixed ticks (one tick, or enough to cover the seconds)",
        "[seconds:f32]",
        parse_tick_command,
    ),
    ("save", "Write the save file now", "", parse_save_command),
    ("load", "Reload progress from the save file", "", parse_load_command),
    ("delete", "Delete the save file", "", parse_delete_command),
    (
        "new",
        "Start a new game (wipes save and progress)",
        "",
        parse_new_command,
    ),
    (
        "activate",
        "Activate entities by identifier",
        "<id:string>",
        parse_activate_command,
    ),
    (
        "deactivate",
        "Deactivate non-permanent entities by identifier",
        "<id:string>",
        parse_deactivate_command,
    ),
    (
        "status",
        "Print visits, discoveries and entity states",
        "",
        parse_status_command,
    ),
    ("quit", "Save and exit", "", parse_quit_command),
];

pub(crate) struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub(crate) fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub(crate) fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, help, arg_schema, parse) in BUILTINS {
            if let Err(reason) = registry.register(name, help, arg_schema, *parse) {
                warn!(command = *name, reason = %reason, "builtin_command_rejected");
            }
        }
        registry
    }

    pub(crate) fn register(
        &mut self,
        name: &str,
        help: &str,
        arg_schema: &str,
        parse: ParseFn,
    ) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err("command name cannot be empty".to_string());
        }
        let lower = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&lower) {
            return Err(format!("duplicate command registration: {name}"));
        }

        self.specs.push(CommandSpec {
            name: name.to_string(),
            help: help.to_string(),
            arg_schema: arg_schema.to_string(),
            parse,
        });
        self.lookup_by_lower_name
            .insert(lower, self.specs.len() - 1);
        Ok(())
    }

    /// `Ok(None)` for blank lines. Errors are ready to print.
    pub(crate) fn parse_line(&self, raw_line: &str) -> Result<Option<ConsoleCommand>, String> {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let tokens = tokenize_line(trimmed).map_err(|reason| format!("{reason}. usage: help"))?;
        let Some((command_name, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let lower = command_name.to_ascii_lowercase();
        let Some(spec) = self
            .lookup_by_lower_name
            .get(&lower)
            .and_then(|index| self.specs.get(*index))
        else {
            return Err(format!("unknown command '{command_name}'. try: help"));
        };

        (spec.parse)(args)
            .map(Some)
            .map_err(|error| format!("{}. usage: {}", error.reason, error.usage))
    }

    /// Registration order.
    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.specs
            .iter()
            .map(|spec| {
                if spec.arg_schema.is_empty() {
                    format!("{} - {}", spec.name, spec.help)
                } else {
                    format!("{} {} - {}", spec.name, spec.arg_schema, spec.help)
                }
            })
            .collect()
    }
}

fn tokenize_line(line: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut pending = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if pending {
                    tokens.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            _ => {
                current.push(ch);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quoted string".to_string());
    }
    if pending {
        tokens.push(current);
    }
    Ok(tokens)
}

fn parse_help_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "help")?;
    Ok(ConsoleCommand::Help)
}

fn parse_visit_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let zone_id = require_single_arg(args, "<zone_id>", "visit <zone_id>")?;
    Ok(ConsoleCommand::Visit { zone_id })
}

fn parse_discover_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let identifier = require_single_arg(args, "<identifier>", "discover <identifier>")?;
    Ok(ConsoleCommand::Discover { identifier })
}

fn parse_tick_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    const USAGE: &str = "tick [seconds]";
    match args {
        [] => Ok(ConsoleCommand::Tick { seconds: None }),
        [raw] => {
            let seconds = raw.parse::<f32>().map_err(|_| {
                CommandParseError::new(format!("invalid seconds '{raw}' (expected f32)"), USAGE)
            })?;
            if !seconds.is_finite() || seconds <= 0.0 || seconds > MAX_TICK_SECONDS {
                return Err(CommandParseError::new(
                    format!("seconds must be in (0, {MAX_TICK_SECONDS}]"),
                    USAGE,
                ));
            }
            Ok(ConsoleCommand::Tick {
                seconds: Some(seconds),
            })
        }
        _ => Err(CommandParseError::new("expected at most one argument", USAGE)),
    }
}

fn parse_save_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "save")?;
    Ok(ConsoleCommand::Save)
}

fn parse_load_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "load")?;
    Ok(ConsoleCommand::Load)
}

fn parse_delete_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "delete")?;
    Ok(ConsoleCommand::Delete)
}

fn parse_new_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "new")?;
    Ok(ConsoleCommand::NewGame)
}

fn parse_activate_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let id = require_single_arg(args, "<id>", "activate <id>")?;
    Ok(ConsoleCommand::Activate { id })
}

fn parse_deactivate_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    let id = require_single_arg(args, "<id>", "deactivate <id>")?;
    Ok(ConsoleCommand::Deactivate { id })
}

fn parse_status_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "status")?;
    Ok(ConsoleCommand::Status)
}

fn parse_quit_command(args: &[String]) -> Result<ConsoleCommand, CommandParseError> {
    require_no_args(args, "quit")?;
    Ok(ConsoleCommand::Quit)
}

fn require_single_arg(
    args: &[String],
    name: &str,
    usage: &str,
) -> Result<String, CommandParseError> {
    match args {
        [value] => Ok(value.clone()),
        _ => Err(CommandParseError::new(
            format!("expected exactly one argument {name}"),
            usage,
        )),
    }
}

fn require_no_args(args: &[String], usage: &str) -> Result<(), CommandParseError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandParseError::new("unexpected extra arguments", usage))
    }
}
