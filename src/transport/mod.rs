//! IMAP transport seam
//!
//! The mailbox layer never touches a socket. It talks to a
//! [`Transport`], which sends one tagged command at a time and hands
//! back the raw [`Response`]: the tagged status plus every untagged
//! response, keyed by kind and split into byte lines and counted
//! literals. Interpreting those bytes is the caller's job.
//!
//! [`ImapConnection`] is the network implementation. It drives an
//! `async-imap` session and renders the parsed replies back into that
//! shape.

mod connection;
mod convert;

pub use connection::ImapConnection;

use crate::error::{Error, Result};
use std::fmt;
use std::future::Future;

/// Completion status of a tagged IMAP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    No,
    Bad,
}

impl Status {
    /// Parse the status word of a tagged response line.
    #[must_use]
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of an untagged response's data.
///
/// A response line carrying a counted literal (`{n}` followed by `n`
/// raw bytes) becomes a [`ResponseItem::Literal`]; the text after the
/// literal arrives as a separate item. Everything else is a plain
/// [`ResponseItem::Line`] without the trailing CRLF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseItem {
    Line(Vec<u8>),
    Literal { head: Vec<u8>, body: Vec<u8> },
}

impl ResponseItem {
    /// The protocol text of this item: the whole line, or the part of
    /// the line up to and including the literal marker.
    #[must_use]
    pub fn head(&self) -> &[u8] {
        match self {
            Self::Line(line) => line,
            Self::Literal { head, .. } => head,
        }
    }
}

/// An untagged response, e.g. `* 3 FETCH (...)` has kind `FETCH` and
/// data starting with `3 (`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Untagged {
    pub kind: String,
    pub item: ResponseItem,
}

/// Everything the server sent in answer to one tagged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Text of the tagged completion line after the status word.
    pub text: String,
    pub untagged: Vec<Untagged>,
}

impl Response {
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
            untagged: Vec::new(),
        }
    }

    /// A tagged `OK` with no untagged data.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(Status::Ok, text)
    }

    /// Append an untagged data line of the given kind.
    #[must_use]
    pub fn with_line(mut self, kind: &str, line: impl Into<Vec<u8>>) -> Self {
        self.untagged.push(Untagged {
            kind: kind.to_ascii_uppercase(),
            item: ResponseItem::Line(line.into()),
        });
        self
    }

    /// Append an untagged literal of the given kind.
    #[must_use]
    pub fn with_literal(
        mut self,
        kind: &str,
        head: impl Into<Vec<u8>>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.untagged.push(Untagged {
            kind: kind.to_ascii_uppercase(),
            item: ResponseItem::Literal {
                head: head.into(),
                body: body.into(),
            },
        });
        self
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Untagged data items of one kind (case-insensitive), in arrival
    /// order.
    pub fn data<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ResponseItem> + 'a {
        self.untagged
            .iter()
            .filter(move |u| u.kind.eq_ignore_ascii_case(kind))
            .map(|u| &u.item)
    }

    /// Human-readable dump of the tagged text and untagged data, used
    /// as the payload of status errors.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.text.clone();
        for u in &self.untagged {
            out.push_str(" | ");
            out.push_str(&u.kind);
            out.push(' ');
            out.push_str(&String::from_utf8_lossy(u.item.head()));
        }
        out
    }

    /// Fail with [`Error::CommandStatus`] unless the status is OK.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] for `NO` and `BAD`.
    pub fn check(&self, command: &str) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::CommandStatus {
                command: command.to_string(),
                status: self.status,
                data: self.describe(),
            })
        }
    }
}

/// Quote a string per IMAP quoted-string rules.
///
/// ```
/// assert_eq!(imapbox::quote(r#"a"b\c"#).unwrap(), r#""a\"b\\c""#);
/// assert!(imapbox::quote("x\r\nA2 LOGOUT").is_err());
/// ```
///
/// # Errors
///
/// Returns [`Error::Parse`] if `arg` contains CR, LF or NUL, which a
/// quoted string cannot carry.
pub fn quote(arg: &str) -> Result<String> {
    if let Some(bad) = arg.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
        return Err(Error::Parse(format!(
            "Character {bad:?} cannot be sent in a quoted string"
        )));
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    Ok(out)
}

/// Command/response primitives of an IMAP session.
///
/// Implementors only provide [`Transport::command`]; every other
/// primitive is a thin wrapper that formats its arguments. Arguments
/// are sent verbatim, so folder names must already be encoded and
/// quoted.
pub trait Transport: Send {
    /// Send `name args...` as one tagged command and collect the
    /// response. A non-OK status is returned, not raised; only
    /// transport failures are errors.
    fn command(
        &mut self,
        name: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<Response>> + Send;

    fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let username = quote(username)?;
            let password = quote(password)?;
            self.command("LOGIN", &[username.as_str(), password.as_str()]).await
        }
    }

    fn logout(&mut self) -> impl Future<Output = Result<Response>> + Send {
        self.command("LOGOUT", &[])
    }

    fn select(&mut self, mailbox: &str) -> impl Future<Output = Result<Response>> + Send {
        async move { self.command("SELECT", &[mailbox]).await }
    }

    fn search(&mut self, criteria: &str) -> impl Future<Output = Result<Response>> + Send {
        async move { self.command("SEARCH", &[criteria]).await }
    }

    fn fetch(
        &mut self,
        message_set: &str,
        items: &str,
    ) -> impl Future<Output = Result<Response>> + Send {
        async move { self.command("FETCH", &[message_set, items]).await }
    }

    /// `UID <command> args...`
    fn uid(
        &mut self,
        command: &str,
        args: &[&str],
    ) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(command);
            all.extend_from_slice(args);
            self.command("UID", &all).await
        }
    }

    fn expunge(&mut self) -> impl Future<Output = Result<Response>> + Send {
        self.command("EXPUNGE", &[])
    }
}
