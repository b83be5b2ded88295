//! Folder commands: LIST, LSUB, STATUS, CREATE, DELETE, RENAME,
//! SUBSCRIBE and UNSUBSCRIBE.
//!
//! LIST and LSUB ignore their reference and pattern and report every
//! (subscribed) folder:
//!
//! ```text
//! * LIST (\HasNoChildren) "/" "INBOX"
//! * LIST (\HasNoChildren) "/" "Entw&APw-rfe"
//! A0004 OK LIST completed
//! ```

use crate::fake_imap::io::{complete, write_line};
use crate::fake_imap::mailbox::{Folder, Mailbox};
use imap_codec::imap_types::status::StatusDataItemName;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_list<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    subscribed_only: bool,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    let command = if subscribed_only { "LSUB" } else { "LIST" };
    for folder in &mailbox.folders {
        if subscribed_only && !folder.subscribed {
            continue;
        }
        let line = format!("* {command} (\\HasNoChildren) \"/\" \"{}\"\r\n", folder.name);
        if write_line(stream, &line).await.is_err() {
            return;
        }
    }
    let _ = complete(stream, tag, "OK", &format!("{command} completed")).await;
}

/// `MESSAGES 3 UNSEEN 1` for the requested items. Unsupported items
/// are left out.
fn status_items(folder: &Folder, items: &[StatusDataItemName]) -> String {
    items
        .iter()
        .filter_map(|item| {
            let (name, value) = match item {
                StatusDataItemName::Messages => ("MESSAGES", folder.emails.len() as u64),
                StatusDataItemName::Recent => ("RECENT", 0),
                StatusDataItemName::UidNext => ("UIDNEXT", u64::from(folder.uid_next())),
                StatusDataItemName::UidValidity => ("UIDVALIDITY", 1),
                StatusDataItemName::Unseen => ("UNSEEN", folder.unseen() as u64),
                _ => return None,
            };
            Some(format!("{name} {value}"))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub async fn handle_status<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    items: &[StatusDataItemName],
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let _ = complete(stream, tag, "NO", "[NONEXISTENT] Mailbox does not exist").await;
        return;
    };
    let line = format!(
        "* STATUS \"{folder_name}\" ({})\r\n",
        status_items(folder, items)
    );
    if write_line(stream, &line).await.is_err() {
        return;
    }
    let _ = complete(stream, tag, "OK", "STATUS completed").await;
}

/// A folder-changing command, by wire name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOp {
    Create(String),
    Delete(String),
    Rename { from: String, to: String },
    Subscribe(String),
    Unsubscribe(String),
}

impl FolderOp {
    const fn command(&self) -> &'static str {
        match self {
            Self::Create(_) => "CREATE",
            Self::Delete(_) => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Unsubscribe(_) => "UNSUBSCRIBE",
        }
    }

    /// Apply to `mailbox`, or return the `NO` text.
    fn apply(&self, mailbox: &mut Mailbox) -> Result<(), &'static str> {
        const MISSING: &str = "[NONEXISTENT] Mailbox does not exist";
        const EXISTS: &str = "[ALREADYEXISTS] Mailbox already exists";

        match self {
            Self::Create(name) => {
                if mailbox.get_folder(name).is_some() {
                    return Err(EXISTS);
                }
                mailbox.folders.push(Folder::new(name));
            }
            Self::Delete(name) => {
                let before = mailbox.folders.len();
                mailbox.folders.retain(|f| f.name != *name);
                if mailbox.folders.len() == before {
                    return Err(MISSING);
                }
            }
            Self::Rename { from, to } => {
                if mailbox.get_folder(to).is_some() {
                    return Err(EXISTS);
                }
                mailbox.get_folder_mut(from).ok_or(MISSING)?.name.clone_from(to);
            }
            Self::Subscribe(name) => mailbox.get_folder_mut(name).ok_or(MISSING)?.subscribed = true,
            Self::Unsubscribe(name) => {
                mailbox.get_folder_mut(name).ok_or(MISSING)?.subscribed = false;
            }
        }
        Ok(())
    }
}

pub async fn handle_folder_op<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    op: &FolderOp,
    mailbox: &Mutex<Mailbox>,
    stream: &mut BufReader<S>,
) {
    let result = op.apply(&mut mailbox.lock().unwrap());
    let _ = match result {
        Ok(()) => complete(stream, tag, "OK", &format!("{} completed", op.command())).await,
        Err(reason) => complete(stream, tag, "NO", reason).await,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::{drain, duplex};
    use crate::fake_imap::mailbox::MailboxBuilder;

    fn sample() -> Mailbox {
        MailboxBuilder::new()
            .folder("INBOX")
            .email(3, true, b"a")
            .email(8, false, b"b")
            .folder("Entw&APw-rfe")
            .unsubscribed()
            .build()
    }

    #[tokio::test]
    async fn list_reports_every_folder() {
        let (client, mut stream) = duplex();
        handle_list("A1", false, &sample(), &mut stream).await;
        drop(stream);
        assert_eq!(
            drain(client).await,
            "* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
             * LIST (\\HasNoChildren) \"/\" \"Entw&APw-rfe\"\r\n\
             A1 OK LIST completed\r\n"
        );
    }

    #[tokio::test]
    async fn lsub_skips_unsubscribed() {
        let (client, mut stream) = duplex();
        handle_list("A1", true, &sample(), &mut stream).await;
        drop(stream);
        let output = drain(client).await;
        assert!(output.contains("* LSUB (\\HasNoChildren) \"/\" \"INBOX\"\r\n"));
        assert!(!output.contains("Entw"));
    }

    #[tokio::test]
    async fn status_reports_requested_items() {
        let (client, mut stream) = duplex();
        let items = [StatusDataItemName::Messages, StatusDataItemName::UidNext];
        handle_status("A1", "INBOX", &items, &sample(), &mut stream).await;
        drop(stream);
        assert_eq!(
            drain(client).await,
            "* STATUS \"INBOX\" (MESSAGES 2 UIDNEXT 9)\r\nA1 OK STATUS completed\r\n"
        );
    }

    #[tokio::test]
    async fn status_of_missing_folder_is_refused() {
        let (client, mut stream) = duplex();
        handle_status("A1", "Nope", &[StatusDataItemName::Messages], &sample(), &mut stream).await;
        drop(stream);
        assert!(drain(client).await.starts_with("A1 NO "));
    }

    #[test]
    fn create_rename_delete() {
        let mut mailbox = sample();

        FolderOp::Create("Archive".into()).apply(&mut mailbox).unwrap();
        assert!(mailbox.get_folder("Archive").unwrap().subscribed);
        assert!(FolderOp::Create("Archive".into()).apply(&mut mailbox).is_err());

        FolderOp::Rename {
            from: "Archive".into(),
            to: "Old".into(),
        }
        .apply(&mut mailbox)
        .unwrap();
        assert!(mailbox.get_folder("Archive").is_none());

        FolderOp::Delete("Old".into()).apply(&mut mailbox).unwrap();
        assert!(mailbox.get_folder("Old").is_none());
        assert!(FolderOp::Delete("Old".into()).apply(&mut mailbox).is_err());
    }

    #[test]
    fn subscribe_toggles_flag() {
        let mut mailbox = sample();
        FolderOp::Subscribe("Entw&APw-rfe".into()).apply(&mut mailbox).unwrap();
        assert!(mailbox.get_folder("Entw&APw-rfe").unwrap().subscribed);
        FolderOp::Unsubscribe("INBOX".into()).apply(&mut mailbox).unwrap();
        assert!(!mailbox.get_folder("INBOX").unwrap().subscribed);
    }

    #[tokio::test]
    async fn folder_op_completion_names_command() {
        let mb = Mutex::new(sample());
        let (client, mut stream) = duplex();
        handle_folder_op("A1", &FolderOp::Create("New".into()), &mb, &mut stream).await;
        drop(stream);
        assert_eq!(drain(client).await, "A1 OK CREATE completed\r\n");
    }
}
