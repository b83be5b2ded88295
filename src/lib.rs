//! IMAP mailbox client library
//!
//! Turns raw IMAP responses into a typed mailbox model. A [`MailBox`]
//! logs in, selects folders through a [`FolderManager`], searches and
//! lazily fetches [`MailMessage`]s, and flags, copies, moves or
//! deletes messages by UID.
//!
//! Servers lay out FETCH responses in different ways; the mailbox
//! pairs each message with its UID regardless. Messages expose decoded
//! headers, sender and recipient [`Address`]es, text and HTML bodies
//! and [`Attachment`]s.
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use imapbox::{Credentials, ImapConfig, MailBox};
//!
//! # async fn run() -> imapbox::Result<()> {
//! let config = ImapConfig::from_env()?;
//! let creds = Credentials::from_env()?;
//!
//! let mut mailbox = MailBox::connect(&config).await?;
//! mailbox.login(&creds.username, &creds.password, imapbox::DEFAULT_FOLDER).await?;
//!
//! let mut messages = mailbox.fetch("UNSEEN", Some(10), true).await?;
//! while let Some(msg) = messages.try_next().await? {
//!     println!("{} {}: {}", msg.uid().unwrap_or("-"), msg.from(), msg.subject());
//! }
//! drop(messages);
//!
//! mailbox.logout().await?;
//! # Ok(())
//! # }
//! ```

mod address;
mod config;
mod error;
mod fetch;
mod flag;
mod folder;
mod mailbox;
mod message;
mod mime;
mod transport;

pub use address::Address;
pub use config::{Credentials, DEFAULT_MAX_LINE_LENGTH, ImapConfig, Security};
pub use error::{Error, Result};
pub use fetch::extract_uid;
pub use flag::Flag;
pub use folder::{FolderListEntry, FolderManager, FolderStatus, StatusOption};
pub use mailbox::{DEFAULT_FOLDER, MailBox};
pub use message::MailMessage;
pub use mime::{Attachment, Attachments, Defect};
pub use transport::{ImapConnection, Response, ResponseItem, Status, Transport, Untagged, quote};
