//! SEARCH (without the UID prefix).
//!
//! Answers with sequence numbers, not UIDs:
//!
//! ```text
//! * SEARCH 1 3
//! A0003 OK SEARCH completed
//! ```
//!
//! Supported keys: `ALL`, `SEEN`/`UNSEEN`, `FLAGGED`/`UNFLAGGED`,
//! `DELETED`/`UNDELETED`, `SINCE`/`BEFORE` against the `Date` header,
//! and `NOT`, `OR` and parenthesised conjunctions. Anything else gets
//! a `NO`.

use crate::fake_imap::io::{complete, write_line};
use crate::fake_imap::mailbox::{Mailbox, TestEmail};
use chrono::NaiveDate;
use imap_codec::imap_types::search::SearchKey;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_search<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected_folder.and_then(|name| mailbox.get_folder(name)) else {
        let _ = complete(stream, tag, "BAD", "No mailbox selected").await;
        return;
    };

    let mut seqs = Vec::new();
    for (idx, email) in folder.emails.iter().enumerate() {
        let mut matched = true;
        for key in criteria {
            match matches_key(email, key) {
                Some(hit) => matched &= hit,
                None => {
                    let _ = complete(stream, tag, "NO", "Unsupported search key").await;
                    return;
                }
            }
        }
        if matched {
            seqs.push((idx + 1).to_string());
        }
    }

    let line = if seqs.is_empty() {
        "* SEARCH\r\n".to_string()
    } else {
        format!("* SEARCH {}\r\n", seqs.join(" "))
    };
    if write_line(stream, &line).await.is_err() {
        return;
    }
    let _ = complete(stream, tag, "OK", "SEARCH completed").await;
}

/// `None` for a key this server does not implement.
fn matches_key(email: &TestEmail, key: &SearchKey<'_>) -> Option<bool> {
    let hit = match key {
        SearchKey::All => true,
        SearchKey::Seen => email.seen,
        SearchKey::Unseen => !email.seen,
        SearchKey::Flagged => email.flagged,
        SearchKey::Unflagged => !email.flagged,
        SearchKey::Deleted => email.deleted,
        SearchKey::Undeleted => !email.deleted,
        SearchKey::Since(date) => email_date(&email.raw).is_some_and(|d| d >= *date.as_ref()),
        SearchKey::Before(date) => email_date(&email.raw).is_some_and(|d| d < *date.as_ref()),
        SearchKey::Not(inner) => !matches_key(email, inner)?,
        SearchKey::Or(a, b) => matches_key(email, a)? || matches_key(email, b)?,
        SearchKey::And(keys) => {
            let mut all = true;
            for k in keys.as_ref() {
                all &= matches_key(email, k)?;
            }
            all
        }
        _ => return None,
    };
    Some(hit)
}

fn email_date(raw: &[u8]) -> Option<NaiveDate> {
    let (headers, _) = mailparse::parse_headers(raw).ok()?;
    let date = mailparse::MailHeaderMap::get_first_value(headers.as_slice(), "Date")?;
    chrono::DateTime::parse_from_rfc2822(date.trim())
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::{drain, duplex};
    use crate::fake_imap::mailbox::MailboxBuilder;
    use imap_codec::imap_types::datetime::NaiveDate as ImapDate;

    fn dated(date: &str) -> Vec<u8> {
        format!("Date: {date}\r\nSubject: x\r\n\r\nbody").into_bytes()
    }

    async fn run(criteria: &[SearchKey<'_>], mailbox: &Mailbox) -> String {
        let (client, mut stream) = duplex();
        handle_search("A1", criteria, mailbox, Some("INBOX"), &mut stream).await;
        drop(stream);
        drain(client).await
    }

    fn sample() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(40, true, &dated("Mon, 01 Jan 2024 10:00:00 +0000"))
            .email(41, false, &dated("Mon, 15 Jan 2024 10:00:00 +0000"))
            .email(42, false, &dated("Thu, 01 Feb 2024 10:00:00 +0000"))
            .build()
    }

    #[tokio::test]
    async fn answers_with_sequence_numbers() {
        let output = run(&[SearchKey::Unseen], &sample()).await;
        assert_eq!(output, "* SEARCH 2 3\r\nA1 OK SEARCH completed\r\n");
    }

    #[tokio::test]
    async fn all_lists_every_message() {
        let output = run(&[SearchKey::All], &sample()).await;
        assert!(output.starts_with("* SEARCH 1 2 3\r\n"));
    }

    #[tokio::test]
    async fn empty_result_is_bare_search_line() {
        let output = run(&[SearchKey::Flagged], &sample()).await;
        assert_eq!(output, "* SEARCH\r\nA1 OK SEARCH completed\r\n");
    }

    #[tokio::test]
    async fn since_compares_date_header() {
        let since = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let key = SearchKey::Since(ImapDate::unvalidated(since));
        let output = run(&[key], &sample()).await;
        assert!(output.starts_with("* SEARCH 2 3\r\n"));
    }

    #[tokio::test]
    async fn unsupported_key_is_refused() {
        let output = run(&[SearchKey::Answered], &sample()).await;
        assert_eq!(output, "A1 NO Unsupported search key\r\n");
    }

    #[tokio::test]
    async fn requires_selected_folder() {
        let (client, mut stream) = duplex();
        handle_search("A1", &[SearchKey::All], &sample(), None, &mut stream).await;
        drop(stream);
        assert_eq!(drain(client).await, "A1 BAD No mailbox selected\r\n");
    }
}
