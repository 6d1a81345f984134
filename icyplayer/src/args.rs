//! Validation stricte des six arguments positionnels du player.
//!
//! Toute violation est une erreur d'argument : diagnostic sur stderr,
//! code de sortie 1, aucun effet de bord.

use std::path::PathBuf;

use icyproto::strict;
use thiserror::Error;

pub const USAGE: &str = "usage: player <host> <path> <port> <output|-> <control_port> <yes|no>";

/// Destination des octets audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Marqueur `-` : l'audio part sur stdout.
    Stdout,
    File(PathBuf),
}

/// Arguments validés du player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerArgs {
    pub host: String,
    pub path: String,
    pub port: u16,
    pub output: OutputTarget,
    pub control_port: u16,
    pub want_metadata: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArgError {
    #[error("expected 6 arguments, got {0}")]
    WrongCount(usize),
    #[error("empty {0} argument")]
    Empty(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidPort { field: &'static str, value: String },
    #[error("metadata flag must be yes or no, got {0:?}")]
    InvalidMetaFlag(String),
}

impl PlayerArgs {
    /// Valide les arguments dans l'ordre
    /// `host path port output control_port meta`.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ArgError> {
        if args.len() != 6 {
            return Err(ArgError::WrongCount(args.len()));
        }
        let host = non_empty(args[0].as_ref(), "host")?;
        let path = non_empty(args[1].as_ref(), "path")?;
        let port = port(args[2].as_ref(), "port")?;
        let output = match non_empty(args[3].as_ref(), "output")?.as_str() {
            "-" => OutputTarget::Stdout,
            other => OutputTarget::File(PathBuf::from(other)),
        };
        let control_port = self::port(args[4].as_ref(), "control port")?;
        let want_metadata = match args[5].as_ref() {
            "yes" => true,
            "no" => false,
            other => return Err(ArgError::InvalidMetaFlag(other.to_string())),
        };
        Ok(Self {
            host,
            path,
            port,
            output,
            control_port,
            want_metadata,
        })
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<String, ArgError> {
    if value.trim().is_empty() {
        return Err(ArgError::Empty(field));
    }
    Ok(value.to_string())
}

fn port(value: &str, field: &'static str) -> Result<u16, ArgError> {
    strict::parse_port(value).ok_or_else(|| ArgError::InvalidPort {
        field,
        value: value.to_string(),
    })
}
