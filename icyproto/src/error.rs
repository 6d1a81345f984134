use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("malformed status line: {0}")]
    MalformedStatusLine(String),
    #[error("server answered with status {0}")]
    BadStatus(u32),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid icy-metaint value: {0}")]
    InvalidMetaint(String),
}
