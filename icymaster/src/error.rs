use thiserror::Error;

use crate::model::PlayerId;

#[derive(Error, Debug)]
pub enum MasterError {
    #[error("cannot resolve host {0:?}")]
    HostResolution(String),
    #[error("cannot launch player: {0}")]
    Launch(String),
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is not addressable")]
    NotAddressable(PlayerId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
