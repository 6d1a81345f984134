//! Modèle : identité, états et spécification de lancement d'un player.

use icyproto::strict;
use thiserror::Error;

/// Identifiant d'un player, croissant à partir de 1, jamais réutilisé.
pub type PlayerId = u32;

/// Cycle de vie côté master.
///
/// `Stopped` et `Crashed` sont terminaux : un id dans l'un de ces états
/// n'est plus adressable par les commandes de contrôle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Créé par `AT`, en attente du déclenchement de l'ordonnanceur.
    Scheduled,
    Running,
    Paused,
    /// `QUIT` envoyé, fin de processus attendue.
    Stopping,
    Stopped,
    Crashed,
}

impl PlayerState {
    /// Un engine tourne et peut recevoir des commandes de contrôle.
    pub fn is_live(self) -> bool {
        matches!(self, PlayerState::Running | PlayerState::Paused)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerState::Stopped | PlayerState::Crashed)
    }
}

/// Issue d'un processus player observée par le moniteur.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerExit {
    /// Code de sortie 0.
    Clean,
    /// Code non nul ou fin par signal.
    Crashed,
}

/// Spécification complète d'un lancement, telle que validée par `START`/`AT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Machine qui exécutera le player (locale ou distante).
    pub player_host: String,
    pub source_host: String,
    pub path: String,
    pub source_port: u16,
    /// Chemin de sortie, ou `-` pour stdout.
    pub output: String,
    pub control_port: u16,
    pub want_metadata: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpecError {
    #[error("empty {0} argument")]
    Empty(&'static str),
    #[error("invalid source port {0:?}")]
    InvalidSourcePort(String),
    #[error("invalid control port {0:?}")]
    InvalidControlPort(String),
    #[error("metadata flag must be yes or no, got {0:?}")]
    InvalidMetaFlag(String),
}

impl LaunchSpec {
    /// Valide les arguments `player_host` + les six arguments player, dans
    /// l'ordre du protocole (§ commandes `START`/`AT`).
    pub fn from_args(player_host: &str, args: &[&str; 6]) -> Result<Self, SpecError> {
        let player_host = non_empty(player_host, "player host")?;
        let source_host = non_empty(args[0], "source host")?;
        let path = non_empty(args[1], "path")?;
        let source_port = strict::parse_port(args[2])
            .ok_or_else(|| SpecError::InvalidSourcePort(args[2].to_string()))?;
        let output = non_empty(args[3], "output")?;
        let control_port = strict::parse_port(args[4])
            .ok_or_else(|| SpecError::InvalidControlPort(args[4].to_string()))?;
        let want_metadata = match args[5] {
            "yes" => true,
            "no" => false,
            other => return Err(SpecError::InvalidMetaFlag(other.to_string())),
        };
        Ok(Self {
            player_host,
            source_host,
            path,
            source_port,
            output,
            control_port,
            want_metadata,
        })
    }

    /// Vecteur d'arguments à passer au binaire `player`.
    pub fn player_args(&self) -> Vec<String> {
        vec![
            self.source_host.clone(),
            self.path.clone(),
            self.source_port.to_string(),
            self.output.clone(),
            self.control_port.to_string(),
            if self.want_metadata { "yes" } else { "no" }.to_string(),
        ]
    }
}

fn non_empty(value: &str, field: &'static str) -> Result<String, SpecError> {
    if value.trim().is_empty() {
        return Err(SpecError::Empty(field));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [&str; 6] = ["stream3.polskieradio.pl", "/", "8904", "-", "40123", "no"];

    #[test]
    fn accepts_a_valid_specification() {
        let spec = LaunchSpec::from_args("localhost", &VALID).unwrap();
        assert_eq!(spec.source_port, 8904);
        assert_eq!(spec.output, "-");
        assert!(!spec.want_metadata);
        assert_eq!(
            spec.player_args(),
            vec!["stream3.polskieradio.pl", "/", "8904", "-", "40123", "no"]
        );
    }

    #[test]
    fn rejects_malformed_ports() {
        for bad in ["0", "-1", "65538", "89043284023823099", "r", " "] {
            let mut args = VALID;
            args[2] = bad;
            assert!(LaunchSpec::from_args("localhost", &args).is_err(), "{bad:?}");
            let mut args = VALID;
            args[4] = bad;
            assert!(LaunchSpec::from_args("localhost", &args).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn rejects_bad_metadata_flags() {
        for bad in ["tak", "nie", "", "-", "0", "1"] {
            let mut args = VALID;
            args[5] = bad;
            assert!(LaunchSpec::from_args("localhost", &args).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn rejects_empty_fields() {
        assert_eq!(
            LaunchSpec::from_args(" ", &VALID),
            Err(SpecError::Empty("player host"))
        );
        let mut args = VALID;
        args[3] = "";
        assert_eq!(
            LaunchSpec::from_args("localhost", &args),
            Err(SpecError::Empty("output"))
        );
    }
}
