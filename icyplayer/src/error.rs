use std::time::Duration;

use icyproto::ProtoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("cannot connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("connection closed before end of headers")]
    HeaderEof,
    #[error("no data from source within {0:?}")]
    DataTimeout(Duration),
    #[error(transparent)]
    Protocol(#[from] ProtoError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
