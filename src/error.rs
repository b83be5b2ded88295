//! Error types for imapbox

use crate::transport::Status;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// SEARCH answered with something other than OK.
    #[error("Search failed with status {status}: {data}")]
    Search { status: Status, data: String },

    /// UID argument empty or not made of UID tokens.
    #[error("Invalid UID argument: {0}")]
    UidParam(String),

    /// Flag name outside `\Seen \Answered \Flagged \Deleted \Draft`.
    #[error("Unsupported flag: {0}")]
    WrongFlag(String),

    /// SELECT answered with something other than OK.
    #[error("Cannot select folder {folder}: {reason}")]
    FolderSet { folder: String, reason: String },

    /// STATUS option outside the fixed option set.
    #[error("Unsupported folder status option: {0}")]
    FolderWrongStatus(String),

    /// Any other command answered with something other than OK.
    #[error("Response status for command {command} = {status}, OK expected, data: {data}")]
    CommandStatus {
        command: String,
        status: Status,
        data: String,
    },

    #[error("Response parsing error: {0}")]
    Parse(String),

    #[error("IMAP error: {0}")]
    Imap(String),

    #[error("Response line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
