//! Mailbox session
//!
//! [`MailBox`] drives one IMAP session: login, folder selection,
//! searching and lazily fetching messages, and UID-addressed flag,
//! copy, move and delete operations.

use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::folder::{FolderManager, encode_folder};
use crate::message::MailMessage;
use crate::transport::{ImapConnection, Response, Transport};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tracing::{debug, info, warn};

/// Folder selected by a plain login.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// FETCH items requested for every message.
const FETCH_ITEMS: &str = "(RFC822 UID)";

/// One IMAP session over a [`Transport`].
///
/// Commands run strictly one at a time. A message stream returned by
/// [`MailBox::fetch`] borrows the mailbox until it is dropped.
pub struct MailBox<T: Transport = ImapConnection> {
    transport: T,
    folder: Option<String>,
}

impl MailBox<ImapConnection> {
    /// Open a network connection to the configured server.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection, STARTTLS exchange or TLS
    /// handshake fails.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let connection = ImapConnection::connect(config).await?;
        Ok(Self::new(connection))
    }
}

impl<T: Transport> MailBox<T> {
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            folder: None,
        }
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Folder operations. Selecting through the manager changes which
    /// folder [`MailBox::fetch`] reads.
    pub const fn folder(&mut self) -> FolderManager<'_, T> {
        FolderManager::new(&mut self.transport, &mut self.folder)
    }

    /// Authenticate, then select `initial_folder` (usually
    /// [`DEFAULT_FOLDER`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if LOGIN is refused and
    /// [`Error::FolderSet`] if the folder cannot be selected.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        initial_folder: &str,
    ) -> Result<Response> {
        let response = self.transport.login(username, password).await?;
        response.check("LOGIN")?;
        info!("Logged in as {}", username);

        self.folder().set(initial_folder).await?;
        Ok(response)
    }

    /// End the session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandStatus`] if LOGOUT is refused.
    pub async fn logout(&mut self) -> Result<Response> {
        let response = self.transport.logout().await?;
        response.check("LOGOUT")?;
        self.folder = None;
        info!("Logged out");
        Ok(response)
    }

    /// Messages in the selected folder matching `criteria` (IMAP SEARCH
    /// syntax, e.g. `ALL`, `UNSEEN`, `FROM "ivan"`), in server order.
    ///
    /// SEARCH runs when this is awaited; each message is then fetched
    /// only when the stream is polled for it, one FETCH per message.
    /// `limit` caps the number of messages yielded (`None` or `0`
    /// means no cap). With `miss_defect`, messages whose MIME structure
    /// is broken or whose FETCH carried no message are skipped.
    ///
    /// The stream ends after the first error it yields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Search`] if the server rejects the search.
    /// Items fail with [`Error::CommandStatus`] if a FETCH is refused.
    pub async fn fetch(
        &mut self,
        criteria: &str,
        limit: Option<usize>,
        miss_defect: bool,
    ) -> Result<BoxStream<'_, Result<MailMessage>>> {
        let response = self.transport.search(criteria).await?;
        if !response.is_ok() {
            return Err(Error::Search {
                status: response.status,
                data: response.describe(),
            });
        }
        let ids = search_ids(&response);
        info!("Found {} messages matching '{}'", ids.len(), criteria);

        let state = FetchState {
            mailbox: self,
            ids: ids.into_iter(),
            remaining: limit.filter(|&n| n > 0),
            miss_defect,
        };
        Ok(stream::unfold(state, FetchState::next_message).boxed())
    }

    /// EXPUNGE the selected folder.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failure.
    pub async fn expunge(&mut self) -> Result<Response> {
        self.transport.expunge().await
    }

    /// Mark messages `\Deleted`, then EXPUNGE. Both raw responses are
    /// returned; EXPUNGE is sent whatever STORE answered.
    ///
    /// UIDs go in as a collection:
    ///
    /// ```no_run
    /// # async fn run(mailbox: &mut imapbox::MailBox) -> imapbox::Result<()> {
    /// mailbox.delete(["1", "2"]).await?;
    /// mailbox.delete(vec![String::from("3:5")]).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// A bare string does not compile, as its characters would be
    /// joined into a different UID set:
    ///
    /// ```compile_fail
    /// # async fn run(mailbox: &mut imapbox::MailBox) -> imapbox::Result<()> {
    /// mailbox.delete("1,2").await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// ```compile_fail
    /// # async fn run(mailbox: &mut imapbox::MailBox) -> imapbox::Result<()> {
    /// mailbox.delete(String::from("1")).await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::UidParam`] before sending anything if `uids` is
    /// empty or malformed.
    pub async fn delete<I>(&mut self, uids: I) -> Result<(Response, Response)>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let uid_set = uid_set(uids)?;
        self.delete_set(&uid_set).await
    }

    /// UID COPY messages into `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UidParam`] before sending anything if `uids` is
    /// empty or malformed.
    pub async fn copy<I>(&mut self, uids: I, folder: &str) -> Result<Response>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let uid_set = uid_set(uids)?;
        self.copy_set(&uid_set, folder).await
    }

    /// Copy messages into `folder`, then delete them here.
    ///
    /// This is not atomic. If the copy succeeds and the delete fails,
    /// the messages exist in both folders. A refused copy stops before
    /// anything is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UidParam`] for a bad `uids`, and
    /// [`Error::CommandStatus`] if the server refuses the copy.
    pub async fn move_to<I>(
        &mut self,
        uids: I,
        folder: &str,
    ) -> Result<(Response, (Response, Response))>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let uid_set = uid_set(uids)?;
        let copied = self.copy_set(&uid_set, folder).await?;
        copied.check("COPY")?;
        let deleted = self.delete_set(&uid_set).await?;
        Ok((copied, deleted))
    }

    /// Set (`value = true`) or clear standard flags, then EXPUNGE.
    ///
    /// Flag names are matched case-insensitively against `Seen`,
    /// `Answered`, `Flagged`, `Deleted` and `Draft`; [`Flag`] values
    /// work too.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongFlag`] or [`Error::UidParam`] before
    /// sending anything if a flag or the UID list is invalid.
    pub async fn flag<I, F>(&mut self, uids: I, flags: F, value: bool) -> Result<(Response, Response)>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let flags = flags
            .into_iter()
            .map(|flag| flag.as_ref().parse::<Flag>())
            .collect::<Result<Vec<_>>>()?;
        let uid_set = uid_set(uids)?;

        let action = if value { "+FLAGS" } else { "-FLAGS" };
        let flag_list = format!(
            "({})",
            flags
                .iter()
                .map(|flag| flag.as_imap_str())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let store = self
            .transport
            .uid("STORE", &[uid_set.as_str(), action, flag_list.as_str()])
            .await?;
        let expunge = self.transport.expunge().await?;
        Ok((store, expunge))
    }

    /// Mark messages read or unread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UidParam`] before sending anything if `uids` is
    /// empty or malformed.
    pub async fn seen<I>(&mut self, uids: I, value: bool) -> Result<(Response, Response)>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.flag(uids, [Flag::Seen], value).await
    }

    async fn copy_set(&mut self, uid_set: &str, folder: &str) -> Result<Response> {
        let folder = encode_folder(folder)?;
        self.transport
            .uid("COPY", &[uid_set, folder.as_str()])
            .await
    }

    async fn delete_set(&mut self, uid_set: &str) -> Result<(Response, Response)> {
        let store = self
            .transport
            .uid("STORE", &[uid_set, "+FLAGS", "(\\Deleted)"])
            .await?;
        if !store.is_ok() {
            warn!("STORE \\Deleted for {} answered {}", uid_set, store.status);
        }
        let expunge = self.transport.expunge().await?;
        Ok((store, expunge))
    }
}

/// Sequence numbers from the SEARCH data, blank tokens dropped.
fn search_ids(response: &Response) -> Vec<String> {
    response
        .data("SEARCH")
        .flat_map(|item| {
            String::from_utf8_lossy(item.head())
                .split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Join UIDs into a UID set, e.g. `["3", "7:9"]` into `3,7:9`.
///
/// Taking a collection rather than a string means a plain `&str` or
/// `String` does not compile here.
fn uid_set<I>(uids: I) -> Result<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut parts = Vec::new();
    for uid in uids {
        let uid = uid.as_ref().trim();
        let valid = !uid.is_empty()
            && uid
                .chars()
                .all(|c| c.is_ascii_digit() || c == ':' || c == '*');
        if !valid {
            return Err(Error::UidParam(format!("{uid:?} is not a UID")));
        }
        parts.push(uid.to_string());
    }
    if parts.is_empty() {
        return Err(Error::UidParam("UID list should not be empty".into()));
    }
    Ok(parts.join(","))
}

struct FetchState<'a, T: Transport> {
    mailbox: &'a mut MailBox<T>,
    ids: std::vec::IntoIter<String>,
    remaining: Option<usize>,
    miss_defect: bool,
}

impl<T: Transport> FetchState<'_, T> {
    async fn next_message(mut self) -> Option<(Result<MailMessage>, Self)> {
        loop {
            if self.remaining == Some(0) {
                return None;
            }
            let id = self.ids.next()?;
            match self.fetch_one(&id).await {
                Ok(message) => {
                    if self.miss_defect {
                        let defects = message.defects();
                        if !defects.is_empty() {
                            warn!("Skipping message {}: {:?}", id, defects);
                            continue;
                        }
                    }
                    if let Some(n) = self.remaining.as_mut() {
                        *n -= 1;
                    }
                    return Some((Ok(message), self));
                }
                Err(e) => {
                    self.remaining = Some(0);
                    return Some((Err(e), self));
                }
            }
        }
    }

    async fn fetch_one(&mut self, id: &str) -> Result<MailMessage> {
        let response = self.mailbox.transport.fetch(id, FETCH_ITEMS).await?;
        response.check("FETCH")?;
        let message = MailMessage::from_fetch(id, &response);
        if message.uid().is_none() {
            debug!("No UID recognised for message {}", id);
        }
        Ok(message)
    }
}
