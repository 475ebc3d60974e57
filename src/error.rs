//! Error types for mail-facade

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Opening a mailbox session failed (socket, TLS, timeout or login).
    #[error("Connection error: {0}")]
    Connection(String),

    /// A mailbox operation was issued while no session is open.
    #[error("IMAP connection not established; open the session first")]
    NotConnected,

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),
}

pub type Result<T> = std::result::Result<T, Error>;
