//! SELECT.
//!
//! Reports the folder's size and UID state before the tagged OK:
//!
//! ```text
//! * FLAGS (\Seen \Answered \Flagged \Deleted \Draft)
//! * 3 EXISTS
//! * 0 RECENT
//! * OK [UIDVALIDITY 1]
//! * OK [UIDNEXT 43]
//! A0002 OK [READ-WRITE] SELECT completed
//! ```

use crate::fake_imap::io::{complete, write_line};
use crate::fake_imap::mailbox::{Folder, Mailbox};
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Untagged lines describing `folder`.
fn folder_report(folder: &Folder) -> Vec<String> {
    let mut lines = vec![
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n".to_string(),
        format!("* {} EXISTS\r\n", folder.emails.len()),
        "* 0 RECENT\r\n".to_string(),
        "* OK [UIDVALIDITY 1]\r\n".to_string(),
        format!("* OK [UIDNEXT {}]\r\n", folder.uid_next()),
    ];
    if let Some(pos) = folder.emails.iter().position(|e| !e.seen) {
        lines.push(format!("* OK [UNSEEN {}]\r\n", pos + 1));
    }
    lines
}

/// Returns the selected folder name, or `None` after a `NO`.
pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let _ = complete(stream, tag, "NO", "Mailbox does not exist").await;
        return None;
    };

    for line in folder_report(folder) {
        if write_line(stream, &line).await.is_err() {
            return None;
        }
    }
    let _ = complete(stream, tag, "OK", "[READ-WRITE] SELECT completed").await;
    Some(folder_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::{drain, duplex};
    use crate::fake_imap::mailbox::MailboxBuilder;

    const RAW: &[u8] = b"Subject: t\r\n\r\nbody";

    #[tokio::test]
    async fn selects_existing_folder() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .email(5, true, RAW)
            .email(10, false, RAW)
            .build();
        let (client, mut stream) = duplex();

        let selected = handle_select("A1", "INBOX", &mailbox, &mut stream).await;
        drop(stream);
        let output = drain(client).await;

        assert_eq!(selected.as_deref(), Some("INBOX"));
        assert!(output.contains("* 2 EXISTS\r\n"));
        assert!(output.contains("* OK [UIDNEXT 11]\r\n"));
        assert!(output.contains("* OK [UNSEEN 2]\r\n"));
        assert!(output.ends_with("A1 OK [READ-WRITE] SELECT completed\r\n"));
    }

    #[tokio::test]
    async fn missing_folder_is_refused() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let (client, mut stream) = duplex();

        let selected = handle_select("A1", "Nope", &mailbox, &mut stream).await;
        drop(stream);

        assert!(selected.is_none());
        assert_eq!(drain(client).await, "A1 NO Mailbox does not exist\r\n");
    }

    #[test]
    fn empty_folder_report() {
        let folder = Folder::new("Trash");
        let lines = folder_report(&folder);
        assert!(lines.contains(&"* 0 EXISTS\r\n".to_string()));
        assert!(lines.contains(&"* OK [UIDNEXT 1]\r\n".to_string()));
        assert!(!lines.iter().any(|l| l.contains("UNSEEN")));
    }
}
