//! LOGIN and LOGOUT.
//!
//! Credentials are not checked; a mailbox built with `refuse_login`
//! answers `NO` to every attempt instead.

use crate::fake_imap::io::{complete, write_line};
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns whether the session is now authenticated.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> bool {
    if mailbox.refuse_login {
        let _ = complete(stream, tag, "NO", "[AUTHENTICATIONFAILED] Invalid credentials").await;
        return false;
    }
    complete(stream, tag, "OK", "LOGIN completed").await.is_ok()
}

/// `* BYE` then the tagged OK. The caller closes the connection.
pub async fn handle_logout<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    stream: &mut BufReader<S>,
) {
    if write_line(stream, "* BYE Logging out\r\n").await.is_err() {
        return;
    }
    let _ = complete(stream, tag, "OK", "LOGOUT completed").await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::{drain, duplex};
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn login_accepts_by_default() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();
        let (client, mut stream) = duplex();

        assert!(handle_login("A0001", &mailbox, &mut stream).await);
        drop(stream);
        assert_eq!(drain(client).await, "A0001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn login_refused_when_configured() {
        let mailbox = MailboxBuilder::new().folder("INBOX").refuse_login().build();
        let (client, mut stream) = duplex();

        assert!(!handle_login("A0001", &mailbox, &mut stream).await);
        drop(stream);
        assert!(drain(client).await.starts_with("A0001 NO "));
    }

    #[tokio::test]
    async fn logout_says_bye_first() {
        let (client, mut stream) = duplex();
        handle_logout("A0009", &mut stream).await;
        drop(stream);
        assert_eq!(
            drain(client).await,
            "* BYE Logging out\r\nA0009 OK LOGOUT completed\r\n"
        );
    }
}
