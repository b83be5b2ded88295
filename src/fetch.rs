//! FETCH response reconciliation
//!
//! Servers disagree on where the UID goes in a `(RFC822 UID)` fetch
//! and on what else they interleave with it. This module reduces one
//! FETCH response to the message bytes and the protocol fragment that
//! carries the UID, then pulls the UID out of that fragment.

use crate::transport::{Response, ResponseItem};
use regex_lite::Regex;
use std::sync::LazyLock;

/// One server dialect's placement of the UID around the `RFC822` marker.
struct UidPattern {
    dialect: &'static str,
    regex: Regex,
}

impl UidPattern {
    fn new(dialect: &'static str, pattern: &str) -> Self {
        Self {
            dialect,
            regex: Regex::new(pattern).expect("valid UID pattern"),
        }
    }

    fn capture<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .captures(text)
            .and_then(|caps| caps.name("uid"))
            .map(|m| m.as_str())
    }
}

/// Tried in order; the first match wins. New dialects go at the end.
static UID_PATTERNS: LazyLock<Vec<UidPattern>> = LazyLock::new(|| {
    vec![
        // Zimbra, Yandex, Gmail: `1 (UID 42 RFC822 {n}`
        UidPattern::new("uid-first", r"\(UID (?P<uid>\d+) RFC822"),
        // IceWarp: `42 (RFC822 {n}`
        UidPattern::new("number-first", r"(?P<uid>\d+) \(RFC822"),
    ]
});

/// Extract the UID from a FETCH fragment, or `None` when no known
/// dialect matches.
///
/// ```
/// assert_eq!(imapbox::extract_uid(b"7 (UID 1234 RFC822 {512}").as_deref(), Some("1234"));
/// assert_eq!(imapbox::extract_uid(b"7 (FLAGS (\\Seen))"), None);
/// ```
#[must_use]
pub fn extract_uid(fragment: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(fragment);
    UID_PATTERNS.iter().find_map(|pattern| {
        let uid = pattern.capture(&text)?;
        tracing::trace!(dialect = pattern.dialect, uid, "UID matched");
        Some(uid.to_string())
    })
}

/// A FETCH response element, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFragment<'r> {
    /// Protocol text with no message attached: the closing `)`,
    /// unsolicited `FLAGS (...)` updates and the like.
    Noise,
    /// A literal together with the fragment that announced it.
    Paired { uid_fragment: &'r [u8], message: &'r [u8] },
}

impl<'r> From<&'r ResponseItem> for FetchFragment<'r> {
    fn from(item: &'r ResponseItem) -> Self {
        match item {
            ResponseItem::Line(_) => Self::Noise,
            ResponseItem::Literal { head, body } => Self::Paired {
                uid_fragment: head,
                message: body,
            },
        }
    }
}

/// Message bytes and UID fragment of one FETCH call.
///
/// Noise is discarded. When several paired elements arrive, the last
/// one wins. With none at all both halves are empty.
#[must_use]
pub fn pair_response(response: &Response) -> (Vec<u8>, Vec<u8>) {
    pair_items(response.data("FETCH"))
}

fn pair_items<'r>(items: impl IntoIterator<Item = &'r ResponseItem>) -> (Vec<u8>, Vec<u8>) {
    items
        .into_iter()
        .map(FetchFragment::from)
        .fold((Vec::new(), Vec::new()), |acc, fragment| match fragment {
            FetchFragment::Noise => acc,
            FetchFragment::Paired {
                uid_fragment,
                message,
            } => (message.to_vec(), uid_fragment.to_vec()),
        })
}
