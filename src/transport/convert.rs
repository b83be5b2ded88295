//! Parsed `async-imap` responses rendered back to protocol text.
//!
//! The mailbox layer reads untagged data the way it appears on the
//! wire. async-imap hands over `imap-proto` values instead, so each one
//! is written out again: `* 2 FETCH (UID 7 RFC822 {n}` becomes a
//! [`ResponseItem::Literal`] with head `2 (UID 7 RFC822 {n}` followed by
//! a `)` line, `* LIST (\Noselect) "/" "Work"` becomes the line
//! `(\Noselect) "/" "Work"`, and so on.

use super::{ResponseItem, Status, Untagged};
use async_imap::imap_proto::{
    AttributeValue, MailboxDatum, NameAttribute, Response, Status as WireStatus, StatusAttribute,
};
use std::fmt::Write;
use tracing::trace;

/// Status of a tagged completion. `PREAUTH` and `BYE` never complete a
/// command.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(super) const fn tagged_status(status: &WireStatus) -> Option<Status> {
    match status {
        WireStatus::Ok => Some(Status::Ok),
        WireStatus::No => Some(Status::No),
        WireStatus::Bad => Some(Status::Bad),
        WireStatus::PreAuth | WireStatus::Bye => None,
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn status_word(status: &WireStatus) -> &'static str {
    match status {
        WireStatus::Ok => "OK",
        WireStatus::No => "NO",
        WireStatus::Bad => "BAD",
        WireStatus::PreAuth => "PREAUTH",
        WireStatus::Bye => "BYE",
    }
}

fn line(kind: &str, text: impl Into<Vec<u8>>) -> Untagged {
    Untagged {
        kind: kind.to_string(),
        item: ResponseItem::Line(text.into()),
    }
}

/// `"name"` with backslash and quote escaped. Names come from the
/// server, so nothing is rejected here.
fn quoted(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Untagged items of one response. `command` is the command in flight;
/// it tells a LIST reply from an LSUB one, which parse the same.
pub(super) fn untagged(response: &Response<'_>, command: &str) -> Vec<Untagged> {
    match response {
        Response::Data {
            status,
            information,
            ..
        } => vec![line(
            status_word(status),
            information.as_deref().unwrap_or_default(),
        )],
        Response::Expunge(seq) => vec![line("EXPUNGE", seq.to_string())],
        Response::Fetch(seq, attributes) => fetch(*seq, attributes)
            .into_iter()
            .map(|item| Untagged {
                kind: "FETCH".to_string(),
                item,
            })
            .collect(),
        Response::MailboxData(datum) => mailbox_data(datum, command).into_iter().collect(),
        other => {
            trace!(?other, "Dropping untagged response");
            Vec::new()
        }
    }
}

fn mailbox_data(datum: &MailboxDatum<'_>, command: &str) -> Option<Untagged> {
    let rendered = match datum {
        MailboxDatum::Exists(count) => line("EXISTS", count.to_string()),
        MailboxDatum::Recent(count) => line("RECENT", count.to_string()),
        MailboxDatum::Flags(flags) => line("FLAGS", format!("({})", flags.join(" "))),
        MailboxDatum::Search(ids) => line(
            "SEARCH",
            ids.iter().map(u32::to_string).collect::<Vec<_>>().join(" "),
        ),
        MailboxDatum::List {
            name_attributes,
            delimiter,
            name,
        } => {
            let kind = if command.eq_ignore_ascii_case("LSUB") {
                "LSUB"
            } else {
                "LIST"
            };
            let attributes: Vec<String> = name_attributes.iter().map(name_attribute).collect();
            let delimiter = delimiter
                .as_deref()
                .map_or_else(|| "NIL".to_string(), quoted);
            line(
                kind,
                format!("({}) {delimiter} {}", attributes.join(" "), quoted(name)),
            )
        }
        MailboxDatum::Status { mailbox, status } => {
            let items: Vec<String> = status.iter().filter_map(status_attribute).collect();
            line(
                "STATUS",
                format!("{} ({})", quoted(mailbox), items.join(" ")),
            )
        }
        other => {
            trace!(?other, "Dropping mailbox data");
            return None;
        }
    };
    Some(rendered)
}

/// `\Noselect`, `\HasNoChildren`, ...
fn name_attribute(attribute: &NameAttribute<'_>) -> String {
    match attribute {
        NameAttribute::Extension(name) if name.starts_with('\\') => name.to_string(),
        NameAttribute::Extension(name) => format!("\\{name}"),
        other => format!("\\{other:?}"),
    }
}

fn status_attribute(attribute: &StatusAttribute) -> Option<String> {
    let (key, value) = match attribute {
        StatusAttribute::Messages(n) => ("MESSAGES", n),
        StatusAttribute::Recent(n) => ("RECENT", n),
        StatusAttribute::UidNext(n) => ("UIDNEXT", n),
        StatusAttribute::UidValidity(n) => ("UIDVALIDITY", n),
        StatusAttribute::Unseen(n) => ("UNSEEN", n),
        _ => return None,
    };
    Some(format!("{key} {value}"))
}

/// One `FETCH` response split at its literals, in attribute order.
fn fetch(seq: u32, attributes: &[AttributeValue<'_>]) -> Vec<ResponseItem> {
    let mut items = Vec::new();
    let mut text = format!("{seq} (");
    let mut first = true;

    for attribute in attributes {
        let (name, literal): (String, Option<&[u8]>) = match attribute {
            AttributeValue::Uid(uid) => (format!("UID {uid}"), None),
            AttributeValue::Flags(flags) => (format!("FLAGS ({})", flags.join(" ")), None),
            AttributeValue::Rfc822Size(size) => (format!("RFC822.SIZE {size}"), None),
            AttributeValue::Rfc822(Some(body)) => ("RFC822".to_string(), Some(&**body)),
            AttributeValue::Rfc822(None) => ("RFC822 NIL".to_string(), None),
            AttributeValue::BodySection {
                data: Some(body), ..
            } => ("BODY[]".to_string(), Some(&**body)),
            _ => continue,
        };
        if !first {
            text.push(' ');
        }
        first = false;
        text.push_str(&name);

        if let Some(body) = literal {
            let _ = write!(text, " {{{}}}", body.len());
            items.push(ResponseItem::Literal {
                head: std::mem::take(&mut text).into_bytes(),
                body: body.to_vec(),
            });
        }
    }

    text.push(')');
    items.push(ResponseItem::Line(text.into_bytes()));
    items
}
