//! IMAP message flags
//!
//! The standard system flags a client may set or clear with STORE.
//! Names are validated client-side; anything outside this set is
//! rejected before a command is sent.

use crate::error::Error;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A standard IMAP system flag.
///
/// # Examples
///
/// ```
/// use imapbox::Flag;
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!("flagged".parse::<Flag>().unwrap(), Flag::Flagged);
/// assert!("$Junk".parse::<Flag>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
    /// Message has been answered (`\Answered`).
    Answered,
    /// Message is flagged for attention (`\Flagged`).
    Flagged,
    /// Message is marked for deletion (`\Deleted`).
    Deleted,
    /// Message is a draft (`\Draft`).
    Draft,
}

impl Flag {
    pub const ALL: [Self; 5] = [
        Self::Seen,
        Self::Answered,
        Self::Flagged,
        Self::Deleted,
        Self::Draft,
    ];

    /// The IMAP wire representation, with the leading backslash.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

impl AsRef<str> for Flag {
    fn as_ref(&self) -> &str {
        self.as_imap_str()
    }
}

/// Case-insensitive; a leading backslash is optional.
impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bare = s.strip_prefix('\\').unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_imap_str()[1..].eq_ignore_ascii_case(bare))
            .ok_or_else(|| Error::WrongFlag(s.to_string()))
    }
}
