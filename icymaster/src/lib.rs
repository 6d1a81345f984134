//! Master : protocole de commande TCP, registre des players, ordonnanceur.
//!
//! Le binaire `master` accepte des sessions opérateur en mode ligne,
//! valide les commandes, lance des players (localement ou via ssh) et
//! propage leurs crashs vers la connexion propriétaire.

pub mod command;
mod error;
pub mod launcher;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod server;

pub use command::{parse_command, Command, CommandError};
pub use error::MasterError;
pub use launcher::{PlayerLauncher, PlayerProcess, ProcessLauncher, PLAYER_BIN_ENV};
pub use model::{LaunchSpec, PlayerExit, PlayerId, PlayerState, SpecError};
pub use registry::PlayerRegistry;
pub use scheduler::{next_occurrence, ScheduledAction, Scheduler};
pub use server::MasterServer;
