//! Error types for workq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown execution mode: {0}")]
    UnknownMode(String),

    #[error("inlet is closed")]
    InletClosed,

    #[error("inlet is full")]
    InletFull,

    #[error("config error: {0}")]
    Config(String),

    #[error("plan error: {0}")]
    Plan(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
