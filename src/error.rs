use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
    #[error("could not determine delimiter")]
    Dialect,
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("missing required columns: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },
}

/// Failure while setting up the SMTP session. Fatal to the whole batch.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("STARTTLS negotiation with {host} failed: {reason}")]
    Tls { host: String, reason: String },
    #[error("authentication as {email} failed: {reason}")]
    Auth { email: String, reason: String },
}

/// Failure delivering one report. Logged and counted, never fatal.
#[derive(Debug, Error)]
pub enum RecipientError {
    #[error("could not read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },
    #[error("could not build message: {0}")]
    Build(String),
    #[error("server rejected message: {0}")]
    Send(String),
    #[error("could not re-establish the session: {0}")]
    Reconnect(#[source] SessionError),
}
