//! IMAP folder management
//!
//! Folder names go over the wire in modified UTF-7 (RFC 3501 §5.1.3)
//! as quoted strings. [`FolderManager`] applies that encoding on the
//! way out and decodes LIST replies on the way back.

use crate::error::{Error, Result};
use crate::transport::{ResponseItem, Transport, quote};
use regex_lite::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Data items a STATUS command may ask for.
///
/// # Examples
///
/// ```
/// use imapbox::StatusOption;
///
/// assert_eq!("uidnext".parse::<StatusOption>().unwrap(), StatusOption::UidNext);
/// assert!("SIZE".parse::<StatusOption>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusOption {
    /// Number of messages in the folder.
    Messages,
    /// Number of messages with `\Recent` set.
    Recent,
    /// The UID the next message will get.
    UidNext,
    /// UID validity value of the folder.
    UidValidity,
    /// Number of messages without `\Seen`.
    Unseen,
}

impl StatusOption {
    pub const ALL: [Self; 5] = [
        Self::Messages,
        Self::Recent,
        Self::UidNext,
        Self::UidValidity,
        Self::Unseen,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "MESSAGES",
            Self::Recent => "RECENT",
            Self::UidNext => "UIDNEXT",
            Self::UidValidity => "UIDVALIDITY",
            Self::Unseen => "UNSEEN",
        }
    }
}

impl fmt::Display for StatusOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for StatusOption {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl FromStr for StatusOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|option| option.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::FolderWrongStatus(s.to_string()))
    }
}

/// Values returned by STATUS, keyed by option.
pub type FolderStatus = BTreeMap<StatusOption, u64>;

/// One line of a LIST/LSUB reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderListEntry {
    /// Raw attribute list, e.g. `\HasNoChildren \Noselect`.
    pub flags: String,
    /// Hierarchy delimiter, empty when the server sends `NIL`.
    pub delim: String,
    /// Decoded folder name.
    pub name: String,
}

static LIST_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\((?P<flags>[^)]*)\) (?:"(?P<delim>(?:[^"\\]|\\.)*)"|NIL) (?:"(?P<quoted>(?:[^"\\]|\\.)*)"|(?P<atom>[^\s"]+))$"#,
    )
    .expect("valid LIST pattern")
});

static LIST_LITERAL_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\((?P<flags>[^)]*)\) (?:"(?P<delim>(?:[^"\\]|\\.)*)"|NIL) \{\d+\+?\}$"#)
        .expect("valid LIST literal pattern")
});

/// Modified UTF-7, then quoted.
pub fn encode_folder(name: &str) -> Result<String> {
    quote(&utf7_imap::encode_utf7_imap(name.to_string()))
}

/// UTF-16 code units of one `&...-` run, or `None` unless it is
/// well-formed modified base64 (`,` for `/`, no padding, zero trailing
/// bits) of valid UTF-16.
fn utf7_run(run: &str) -> Option<Vec<u16>> {
    let mut bytes = Vec::with_capacity(run.len() * 3 / 4);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    for c in run.bytes() {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'a'..=b'z' => c - b'a' + 26,
            b'0'..=b'9' => c - b'0' + 52,
            b'+' => 62,
            b',' => 63,
            _ => return None,
        };
        acc = (acc << 6) | u32::from(value);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            bytes.push(u8::try_from(acc >> bits).ok()?);
            acc &= (1 << bits) - 1;
        }
    }
    if bits >= 6 || acc != 0 || !bytes.len().is_multiple_of(2) {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    char::decode_utf16(units.iter().copied())
        .all(|unit| unit.is_ok())
        .then_some(units)
}

/// Decode a modified UTF-7 folder name.
///
/// Every shifted run is checked before decoding, so a malformed name
/// from the server is an error instead of a panic.
fn decode_folder(name: &str) -> Result<String> {
    let invalid = || Error::Parse(format!("Invalid modified UTF-7 folder name: {name}"));
    let mut rest = name;
    while let Some(start) = rest.find('&') {
        let shifted = &rest[start + 1..];
        let end = shifted.find('-').ok_or_else(invalid)?;
        utf7_run(&shifted[..end]).ok_or_else(invalid)?;
        rest = &shifted[end + 1..];
    }
    Ok(utf7_imap::decode_utf7_imap(name.to_string()))
}

fn unescape(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse one LIST/LSUB data item.
///
/// # Errors
///
/// Returns [`Error::Parse`] when the item does not have the
/// `(flags) delimiter name` shape.
pub fn parse_list_item(item: &ResponseItem) -> Result<FolderListEntry> {
    let head = String::from_utf8_lossy(item.head());
    let mismatch = || Error::Parse(format!("Unexpected LIST line: {head}"));

    let (caps, raw_name) = match item {
        ResponseItem::Line(_) => {
            let caps = LIST_LINE.captures(&head).ok_or_else(mismatch)?;
            let name = caps.name("quoted").map_or_else(
                || caps.name("atom").map_or_else(String::new, |m| m.as_str().to_string()),
                |m| unescape(m.as_str()),
            );
            (caps, name)
        }
        ResponseItem::Literal { body, .. } => {
            let caps = LIST_LITERAL_HEAD.captures(&head).ok_or_else(mismatch)?;
            (caps, String::from_utf8_lossy(body).into_owned())
        }
    };

    Ok(FolderListEntry {
        flags: caps["flags"].to_string(),
        delim: caps.name("delim").map_or_else(String::new, |m| unescape(m.as_str())),
        name: decode_folder(&raw_name)?,
    })
}

/// Pair adjacent tokens: `[MESSAGES, 3, UIDNEXT, 4]` becomes
/// `{MESSAGES: 3, UIDNEXT: 4}`.
///
/// # Errors
///
/// Returns [`Error::Parse`] for an odd number of tokens.
pub fn pairs_to_map<'t>(tokens: &[&'t str]) -> Result<BTreeMap<&'t str, &'t str>> {
    if !tokens.len().is_multiple_of(2) {
        return Err(Error::Parse(format!(
            "An even number of tokens is expected, got {}",
            tokens.len()
        )));
    }
    Ok(tokens
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .collect())
}

/// Extract the `(KEY value ...)` run of a STATUS reply.
fn parse_status(text: &str) -> Result<FolderStatus> {
    let open = text
        .rfind('(')
        .ok_or_else(|| Error::Parse(format!("No status list in: {text}")))?;
    let inner = &text[open + 1..];
    let inner = inner.find(')').map_or(inner, |close| &inner[..close]);
    let tokens: Vec<&str> = inner.split_whitespace().collect();

    let mut status = FolderStatus::new();
    for (key, value) in pairs_to_map(&tokens)? {
        let Ok(option) = key.parse::<StatusOption>() else {
            warn!(key, "Ignoring unknown STATUS item");
            continue;
        };
        let value = value
            .parse()
            .map_err(|_| Error::Parse(format!("Invalid {key} value: {value}")))?;
        status.insert(option, value);
    }
    Ok(status)
}

/// Folder operations on a logged-in session.
///
/// Borrowed from [`crate::MailBox::folder`]; selecting a folder here
/// changes which folder the mailbox fetches from.
pub struct FolderManager<'a, T: Transport> {
    transport: &'a mut T,
    current: &'a mut Option<String>,
}

impl<'a, T: Transport> FolderManager<'a, T> {
    pub(crate) const fn new(transport: &'a mut T, current: &'a mut Option<String>) -> Self {
        Self { transport, current }
    }

    /// SELECT `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderSet`] with the server's reason if the
    /// folder cannot be selected.
    pub async fn set(&mut self, folder: &str) -> Result<()> {
        let encoded = encode_folder(folder)?;
        let response = self.transport.select(&encoded).await?;
        if !response.is_ok() {
            return Err(Error::FolderSet {
                folder: folder.to_string(),
                reason: response.text,
            });
        }
        debug!(folder, "Selected folder");
        *self.current = Some(folder.to_string());
        Ok(())
    }

    /// The folder selected by the last successful [`Self::set`].
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// STATUS of `folder`. An empty `options` asks for every option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderWrongStatus`] before sending anything if
    /// an option is unknown, [`Error::CommandStatus`] if the server
    /// rejects the command, and [`Error::Parse`] if the reply cannot be
    /// read.
    pub async fn status<I>(&mut self, folder: &str, options: I) -> Result<FolderStatus>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut wanted = options
            .into_iter()
            .map(|option| option.as_ref().parse::<StatusOption>())
            .collect::<Result<Vec<_>>>()?;
        if wanted.is_empty() {
            wanted = StatusOption::ALL.to_vec();
        }
        let items = format!(
            "({})",
            wanted
                .iter()
                .map(|option| option.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let response = self
            .transport
            .command("STATUS", &[encode_folder(folder)?.as_str(), items.as_str()])
            .await?;
        response.check("STATUS")?;

        let mut text = String::new();
        for item in response.data("STATUS") {
            text.push_str(&String::from_utf8_lossy(item.head()));
            if let ResponseItem::Literal { body, .. } = item {
                text.push_str(&String::from_utf8_lossy(body));
            }
        }
        if text.is_empty() {
            return Err(Error::Parse(format!("No STATUS data for {folder}")));
        }
        parse_status(&text)
    }

    /// LIST (or LSUB when `subscribed_only`) under reference `folder`
    /// matching `pattern` (`*` and `%` wildcards).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server rejects the
    /// command and [`Error::Parse`] for any reply line that does not
    /// parse.
    pub async fn list(
        &mut self,
        folder: &str,
        pattern: &str,
        subscribed_only: bool,
    ) -> Result<Vec<FolderListEntry>> {
        let command = if subscribed_only { "LSUB" } else { "LIST" };
        let response = self
            .transport
            .command(command, &[encode_folder(folder)?.as_str(), quote(pattern)?.as_str()])
            .await?;
        response.check(command)?;

        response
            .data(command)
            .filter(|item| !item.head().is_empty())
            .map(parse_list_item)
            .collect()
    }

    /// CREATE `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server refuses.
    pub async fn create(&mut self, folder: &str) -> Result<()> {
        self.simple("CREATE", &[folder]).await
    }

    /// DELETE `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server refuses.
    pub async fn delete(&mut self, folder: &str) -> Result<()> {
        self.simple("DELETE", &[folder]).await
    }

    /// RENAME `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server refuses.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        self.simple("RENAME", &[from, to]).await?;
        if self.current.as_deref() == Some(from) {
            *self.current = Some(to.to_string());
        }
        Ok(())
    }

    /// SUBSCRIBE to `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server refuses.
    pub async fn subscribe(&mut self, folder: &str) -> Result<()> {
        self.simple("SUBSCRIBE", &[folder]).await
    }

    /// UNSUBSCRIBE from `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if the server refuses.
    pub async fn unsubscribe(&mut self, folder: &str) -> Result<()> {
        self.simple("UNSUBSCRIBE", &[folder]).await
    }

    async fn simple(&mut self, command: &str, folders: &[&str]) -> Result<()> {
        let encoded = folders
            .iter()
            .map(|f| encode_folder(f))
            .collect::<Result<Vec<_>>>()?;
        let args: Vec<&str> = encoded.iter().map(String::as_str).collect();
        self.transport.command(command, &args).await?.check(command)?;
        debug!(command, ?folders, "Folder command completed");
        Ok(())
    }
}
