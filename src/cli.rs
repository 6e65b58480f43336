//! Console command table.
//!
//! A flat table of `(name, help, handler)` rows. [`dispatch`] splits a
//! line on whitespace, finds the row by name and runs it against a
//! caller-supplied executor (normally `NodeService::handle_command`).

use core::fmt;

use crate::app::commands::{AppCommand, CommandReply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliError {
    /// Blank line.
    Empty,
    UnknownCommand,
    MissingArgument(&'static str),
    InvalidArgument(&'static str),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand => write!(f, "unknown command (try 'help')"),
            Self::MissingArgument(what) => write!(f, "missing argument: {what}"),
            Self::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
        }
    }
}

type Handler = fn(&[&str]) -> Result<AppCommand, CliError>;

pub struct CliCommand {
    pub name: &'static str,
    pub help: &'static str,
    handler: Handler,
}

pub const COMMANDS: &[CliCommand] = &[
    CliCommand {
        name: "blsync_state",
        help: "blsync_state: show provisioning and Wi-Fi state",
        handler: |_| Ok(AppCommand::ShowState),
    },
    CliCommand {
        name: "blsync_clear",
        help: "blsync_clear: erase stored Wi-Fi credentials",
        handler: |_| Ok(AppCommand::ClearCredentials),
    },
    CliCommand {
        name: "mesh_onoff_get",
        help: "mesh_onoff_get: print Generic OnOff present state",
        handler: |_| Ok(AppCommand::MeshOnOffGet),
    },
    CliCommand {
        name: "mesh_onoff_set",
        help: "mesh_onoff_set:[onoff 0|1]",
        handler: onoff_set,
    },
    CliCommand {
        name: "mesh_level_get",
        help: "mesh_level_get: print Generic Level present state",
        handler: |_| Ok(AppCommand::MeshLevelGet),
    },
    CliCommand {
        name: "mesh_level_set",
        help: "mesh_level_set:[level -32768..32767]",
        handler: level_set,
    },
];

fn onoff_set(args: &[&str]) -> Result<AppCommand, CliError> {
    match args.first().copied() {
        Some("0") => Ok(AppCommand::MeshOnOffSet(false)),
        Some("1") => Ok(AppCommand::MeshOnOffSet(true)),
        Some(_) => Err(CliError::InvalidArgument("onoff")),
        None => Err(CliError::MissingArgument("onoff")),
    }
}

fn level_set(args: &[&str]) -> Result<AppCommand, CliError> {
    let raw = args.first().ok_or(CliError::MissingArgument("level"))?;
    raw.parse::<i16>()
        .map(AppCommand::MeshLevelSet)
        .map_err(|_| CliError::InvalidArgument("level"))
}

/// Help text for every command, one per line.
pub fn help() -> String {
    let mut out = String::from("help: list commands\n");
    for cmd in COMMANDS {
        out.push_str(cmd.help);
        out.push('\n');
    }
    out
}

/// Parse `line` into a command without running it.
pub fn parse(line: &str) -> Result<AppCommand, CliError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(CliError::Empty)?;
    let args: Vec<&str> = words.collect();
    let cmd = COMMANDS
        .iter()
        .find(|c| c.name == name)
        .ok_or(CliError::UnknownCommand)?;
    (cmd.handler)(&args)
}

/// Run one console line. `help` is answered here; everything else is
/// handed to `exec`.
pub fn dispatch(
    line: &str,
    mut exec: impl FnMut(AppCommand) -> CommandReply,
) -> Result<String, CliError> {
    if line.trim() == "help" {
        return Ok(help());
    }
    let cmd = parse(line)?;
    log::debug!("cli: {:?}", cmd);
    Ok(exec(cmd).to_string())
}
