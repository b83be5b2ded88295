//! MIME part-tree traversal
//!
//! Containers (`multipart/*`) only hold structure; text, HTML and
//! attachments live in the leaves. [`Parts`] walks a parsed message
//! depth-first, parent before children, keeping its stack local to
//! the call so every walk starts fresh.

use mailparse::{MailHeaderMap, ParsedMail};
use serde::Serialize;
use std::fmt;

/// Depth-first, pre-order iterator over every part of a message,
/// the root included.
pub struct Parts<'m, 'a> {
    stack: Vec<&'m ParsedMail<'a>>,
}

impl<'m, 'a> Iterator for Parts<'m, 'a> {
    type Item = &'m ParsedMail<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.subparts.iter().rev());
        Some(part)
    }
}

/// Walk every part of `mail`.
#[must_use]
pub fn walk<'m, 'a>(mail: &'m ParsedMail<'a>) -> Parts<'m, 'a> {
    Parts { stack: vec![mail] }
}

/// Walk only the content-bearing parts, skipping `multipart/*`.
pub fn leaves<'m, 'a>(mail: &'m ParsedMail<'a>) -> impl Iterator<Item = &'m ParsedMail<'a>> {
    walk(mail).filter(|part| !is_container(part))
}

/// Lower-cased `type/subtype` of a part.
#[must_use]
pub fn content_type(part: &ParsedMail<'_>) -> String {
    part.ctype.mimetype.to_ascii_lowercase()
}

#[must_use]
pub fn is_container(part: &ParsedMail<'_>) -> bool {
    content_type(part).starts_with("multipart/")
}

/// Decoded text of a part. Transfer encoding is undone, the declared
/// charset applied, and undecodable bytes replaced.
#[must_use]
pub fn decode_text(part: &ParsedMail<'_>) -> String {
    part.get_body().unwrap_or_else(|_| {
        let raw = part.get_body_raw().unwrap_or_default();
        String::from_utf8_lossy(&raw).into_owned()
    })
}

/// Decode RFC 2047 encoded words (`=?utf-8?B?...?=`) in a header value.
#[must_use]
pub fn decode_words(value: &str) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }
    let line = format!("X: {value}");
    match mailparse::parse_header(line.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => value.to_string(),
    }
}

/// First leaf whose content type satisfies `wanted`, decoded.
pub fn find_text(mail: &ParsedMail<'_>, wanted: impl Fn(&str) -> bool) -> Option<String> {
    leaves(mail)
        .find(|part| wanted(&content_type(part)))
        .map(decode_text)
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub payload: Vec<u8>,
}

/// Filename of a part that declares a `Content-Disposition`, taken
/// from its `filename` parameter or, failing that, the content type's
/// `name` parameter.
fn attachment_name(part: &ParsedMail<'_>) -> Option<String> {
    part.headers.get_first_value("Content-Disposition")?;
    let disposition = part.get_content_disposition();
    let name = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))?;
    let name = decode_words(name.trim());
    (!name.is_empty()).then_some(name)
}

fn attachment(part: &ParsedMail<'_>) -> Option<Attachment> {
    let filename = attachment_name(part)?;
    let payload = part.get_body_raw().ok()?;
    if payload.is_empty() {
        return None;
    }
    Some(Attachment { filename, payload })
}

/// Lazy attachment sequence over an owned message tree.
///
/// Yields leaves with a `Content-Disposition`, a filename and a
/// non-empty decoded payload. Payloads are decoded one part at a time
/// as the iterator advances. Pending parts are tracked as child-index
/// paths from the root.
pub struct Attachments<'a> {
    mail: Option<ParsedMail<'a>>,
    pending: Vec<Vec<usize>>,
}

impl<'a> Attachments<'a> {
    #[must_use]
    pub(crate) fn new(mail: ParsedMail<'a>) -> Self {
        Self {
            mail: Some(mail),
            pending: vec![Vec::new()],
        }
    }

    /// A sequence with nothing in it, for messages that failed to parse.
    #[must_use]
    pub(crate) const fn empty() -> Self {
        Self {
            mail: None,
            pending: Vec::new(),
        }
    }
}

fn resolve<'m, 'a>(root: &'m ParsedMail<'a>, path: &[usize]) -> Option<&'m ParsedMail<'a>> {
    path.iter().try_fold(root, |node, &i| node.subparts.get(i))
}

impl Iterator for Attachments<'_> {
    type Item = Attachment;

    fn next(&mut self) -> Option<Attachment> {
        let mail = self.mail.as_ref()?;
        while let Some(path) = self.pending.pop() {
            let Some(part) = resolve(mail, &path) else {
                continue;
            };
            for i in (0..part.subparts.len()).rev() {
                let mut child = path.clone();
                child.push(i);
                self.pending.push(child);
            }
            if is_container(part) {
                continue;
            }
            if let Some(found) = attachment(part) {
                return Some(found);
            }
        }
        None
    }
}

/// Structural problems found in a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Defect {
    /// The FETCH response carried no message bytes.
    NoMessageData,
    /// The MIME parser rejected the message.
    Unparseable(String),
    /// A multipart part has no `boundary` parameter.
    NoBoundaryInMultipart,
    /// A multipart part declares a boundary that never appears.
    StartBoundaryNotFound,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMessageData => f.write_str("no message data"),
            Self::Unparseable(reason) => write!(f, "unparseable message: {reason}"),
            Self::NoBoundaryInMultipart => f.write_str("multipart without boundary"),
            Self::StartBoundaryNotFound => f.write_str("multipart boundary not found"),
        }
    }
}

/// Multipart defects across the whole tree.
#[must_use]
pub fn defects(mail: &ParsedMail<'_>) -> Vec<Defect> {
    walk(mail)
        .filter(|part| is_container(part))
        .filter_map(|part| {
            if !part.ctype.params.contains_key("boundary") {
                Some(Defect::NoBoundaryInMultipart)
            } else if part.subparts.is_empty() {
                Some(Defect::StartBoundaryNotFound)
            } else {
                None
            }
        })
        .collect()
}
