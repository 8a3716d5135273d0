use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MidiError {
    #[error("truncated input: needed {needed} bytes, {available} available")]
    TruncatedInput { needed: usize, available: usize },

    #[error("invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("data byte {byte:#04x} found with no running status to inherit")]
    MissingStatus { byte: u8 },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Config(#[from] ron::error::SpannedError),

    #[error("failed to write config: {0}")]
    ConfigWrite(#[from] ron::Error),

    #[error("input device error: {0}")]
    Input(String),
}

pub type Result<T> = std::result::Result<T, Error>;
