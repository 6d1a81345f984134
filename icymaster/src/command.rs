//! Parsing des lignes de commande opérateur.
//!
//! La ligne arrive déjà filtrée des séquences telnet ; la tokenisation se
//! fait sur les suites d'espaces, les espaces de tête, de queue et répétés
//! sont sans effet. Une ligne vide n'est pas une commande.

use icyproto::strict;
use thiserror::Error;

use crate::model::{LaunchSpec, PlayerId, SpecError};

/// Commande opérateur validée.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(LaunchSpec),
    At {
        hour: u32,
        minute: u32,
        duration_secs: u32,
        spec: LaunchSpec,
    },
    Quit(PlayerId),
    Play(PlayerId),
    Pause(PlayerId),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("unrecognized command")]
    UnknownVerb,
    #[error("wrong number of arguments for {0}")]
    WrongArity(&'static str),
    #[error("invalid time {0:?}")]
    InvalidTime(String),
    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
    #[error("invalid player id {0:?}")]
    InvalidPlayerId(String),
    #[error(transparent)]
    Spec(#[from] SpecError),
}

/// Parse une ligne tokenisée. `Ok(None)` pour une ligne blanche.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = tokens.split_first() else {
        return Ok(None);
    };
    let command = match verb {
        "START" => {
            let [player_host, rest @ ..] = args else {
                return Err(CommandError::WrongArity("START"));
            };
            let spec_args: &[&str; 6] = rest
                .try_into()
                .map_err(|_| CommandError::WrongArity("START"))?;
            Command::Start(LaunchSpec::from_args(player_host, spec_args)?)
        }
        "AT" => {
            let [time, duration, player_host, rest @ ..] = args else {
                return Err(CommandError::WrongArity("AT"));
            };
            let spec_args: &[&str; 6] =
                rest.try_into().map_err(|_| CommandError::WrongArity("AT"))?;
            let (hour, minute) = parse_time(time)?;
            let duration_secs = strict::parse_decimal(duration, 7)
                .ok_or_else(|| CommandError::InvalidDuration(duration.to_string()))?;
            Command::At {
                hour,
                minute,
                duration_secs,
                spec: LaunchSpec::from_args(player_host, spec_args)?,
            }
        }
        "QUIT" => Command::Quit(parse_id(args, "QUIT")?),
        "PLAY" => Command::Play(parse_id(args, "PLAY")?),
        "PAUSE" => Command::Pause(parse_id(args, "PAUSE")?),
        _ => return Err(CommandError::UnknownVerb),
    };
    Ok(Some(command))
}

/// `H.M` strict : uniquement des chiffres et exactement un point,
/// `0 ≤ h ≤ 23`, `0 ≤ m ≤ 59`.
fn parse_time(value: &str) -> Result<(u32, u32), CommandError> {
    let invalid = || CommandError::InvalidTime(value.to_string());
    let (hours, minutes) = value.split_once('.').ok_or_else(invalid)?;
    let ok = |s: &str| {
        !s.is_empty() && s.len() <= 2 && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !ok(hours) || !ok(minutes) {
        return Err(invalid());
    }
    let hour: u32 = hours.parse().map_err(|_| invalid())?;
    let minute: u32 = minutes.parse().map_err(|_| invalid())?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }
    Ok((hour, minute))
}

fn parse_id(args: &[&str], verb: &'static str) -> Result<PlayerId, CommandError> {
    let [id] = args else {
        return Err(CommandError::WrongArity(verb));
    };
    match strict::parse_decimal(id, 9) {
        Some(parsed) if parsed >= 1 => Ok(parsed),
        _ => Err(CommandError::InvalidPlayerId(id.to_string())),
    }
}
