//! Player : une session de relais d'un flux ICY/SHOUTcast.
//!
//! Le binaire `player` se connecte à une source, démultiplexe audio et
//! métadonnées, écrit l'audio dans un sink (fichier ou stdout) et expose un
//! canal de contrôle UDP (`PLAY`/`PAUSE`/`QUIT`/`TITLE`). La logique est
//! entièrement dans la bibliothèque pour rester testable sans processus.

pub mod args;
pub mod control;
pub mod engine;
mod error;
pub mod sink;

pub use args::{OutputTarget, PlayerArgs, USAGE};
pub use engine::{EngineConfig, PlayerEngine};
pub use error::PlayerError;
