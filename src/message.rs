//! Fetched mail messages

use crate::address::{self, Address};
use crate::error::{Error, Result};
use crate::fetch::{extract_uid, pair_response};
use crate::mime::{self, Attachments, Defect};
use crate::transport::Response;
use chrono::{DateTime, FixedOffset};
use mailparse::ParsedMail;
use regex_lite::Regex;
use std::sync::LazyLock;

static FOLDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n\t]+").expect("valid folding pattern"));

/// One message fetched from the selected folder.
///
/// Holds the raw RFC 822 bytes. The header block is decoded once when
/// the message is built; body accessors ([`text`](Self::text),
/// [`html`](Self::html), [`attachments`](Self::attachments),
/// [`defects`](Self::defects)) parse the MIME tree on each call, so
/// keep their results when reading a body more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    id: String,
    uid: Option<String>,
    raw: Vec<u8>,
    headers: Vec<(String, String)>,
}

/// Decoded `(name, value)` pairs in message order; empty when the
/// header block does not parse.
fn decode_headers(raw: &[u8]) -> Vec<(String, String)> {
    mailparse::parse_headers(raw)
        .map(|(headers, _)| {
            headers
                .iter()
                .map(|h| (h.get_key(), h.get_value()))
                .collect()
        })
        .unwrap_or_default()
}

impl MailMessage {
    #[must_use]
    pub fn new(id: impl Into<String>, uid: Option<String>, raw: impl Into<Vec<u8>>) -> Self {
        let raw = raw.into();
        Self {
            id: id.into(),
            uid,
            headers: decode_headers(&raw),
            raw,
        }
    }

    /// Build a message from the response to `FETCH <id> (RFC822 UID)`.
    #[must_use]
    pub fn from_fetch(id: impl Into<String>, response: &Response) -> Self {
        let (raw, uid_fragment) = pair_response(response);
        Self::new(id, extract_uid(&uid_fragment), raw)
    }

    /// Sequence number in the current session. Not stable across sessions.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Folder-unique UID, `None` when the server's FETCH layout was not
    /// recognised.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parse the full MIME tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the MIME parser rejects the bytes.
    pub fn parsed(&self) -> Result<ParsedMail<'_>> {
        mailparse::parse_mail(&self.raw).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Every header in message order, with encoded words decoded.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of a header, name matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    /// Decoded `Subject`, empty when absent.
    #[must_use]
    pub fn subject(&self) -> String {
        self.header("Subject").unwrap_or_default()
    }

    /// Sender parsed from the `From` header, folded whitespace collapsed.
    #[must_use]
    pub fn from_details(&self) -> Address {
        self.header("From")
            .map(|from| Address::parse(&FOLDING.replace_all(&from, " ")))
            .unwrap_or_default()
    }

    /// Sender email address.
    #[must_use]
    pub fn from(&self) -> String {
        self.from_details().email
    }

    /// Every recipient in the `To` header.
    #[must_use]
    pub fn to_details(&self) -> Vec<Address> {
        self.header("To")
            .map(|to| address::parse_list(&to))
            .unwrap_or_default()
    }

    /// Recipient email addresses.
    #[must_use]
    pub fn to(&self) -> Vec<String> {
        self.to_details().into_iter().map(|a| a.email).collect()
    }

    /// Raw `Date` header, empty when absent.
    #[must_use]
    pub fn date(&self) -> String {
        self.header("Date").unwrap_or_default()
    }

    /// `Date` as a timestamp, `None` if absent or malformed.
    #[must_use]
    pub fn date_parsed(&self) -> Option<DateTime<FixedOffset>> {
        let date = self.header("Date")?;
        DateTime::parse_from_rfc2822(date.trim()).ok()
    }

    /// Body of the first `text/plain` part.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let mail = self.parsed().ok()?;
        mime::find_text(&mail, |ct| ct == "text/plain" || ct == "text/")
    }

    /// Body of the first `text/html` part.
    #[must_use]
    pub fn html(&self) -> Option<String> {
        let mail = self.parsed().ok()?;
        mime::find_text(&mail, |ct| ct == "text/html")
    }

    /// Attached files, decoded one at a time.
    #[must_use]
    pub fn attachments(&self) -> Attachments<'_> {
        self.parsed()
            .map_or_else(|_| Attachments::empty(), Attachments::new)
    }

    /// Structural problems; an empty list means the message is well formed.
    #[must_use]
    pub fn defects(&self) -> Vec<Defect> {
        if self.raw.is_empty() {
            return vec![Defect::NoMessageData];
        }
        match self.parsed() {
            Ok(mail) => mime::defects(&mail),
            Err(e) => vec![Defect::Unparseable(e.to_string())],
        }
    }
}
