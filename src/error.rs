use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Config,
    Resource,
    Service,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::Config => "config",
            ErrorKind::Resource => "resource",
            ErrorKind::Service => "service",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorKind::Input => 2,
            ErrorKind::Config => 3,
            ErrorKind::Resource => 4,
            ErrorKind::Service => 5,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("no text to render (input is empty)")]
    MissingText,
    #[error("failed to read input file {}: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("ambiguous input: {0}")]
    AmbiguousInput(String),

    #[error("unknown style '{name}' (expected one of: {expected})")]
    InvalidStyle { name: String, expected: String },
    #[error("settings error: {0:#}")]
    Settings(anyhow::Error),

    #[error("failed to load font {}: {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },
    #[error("unsupported output format for {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("model service unavailable at {host}: {reason}")]
    ServiceUnavailable { host: String, reason: String },
    #[error("model '{0}' not found on the server")]
    ModelNotFound(String),
    #[error("no model to use: {0}")]
    NoModel(String),
    #[error("model request failed: {0}")]
    StreamFailed(String),
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingText | Error::ReadInput { .. } | Error::AmbiguousInput(_) => {
                ErrorKind::Input
            }
            Error::InvalidStyle { .. } | Error::Settings(_) => ErrorKind::Config,
            Error::FontLoad { .. }
            | Error::UnsupportedFormat { .. }
            | Error::Write { .. }
            | Error::Encode(_) => ErrorKind::Resource,
            Error::ServiceUnavailable { .. }
            | Error::ModelNotFound(_)
            | Error::NoModel(_)
            | Error::StreamFailed(_)
            | Error::StreamInterrupted(_) => ErrorKind::Service,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
