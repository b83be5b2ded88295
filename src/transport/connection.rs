//! Network transport: an `async-imap` session over TCP, STARTTLS or
//! TLS.

use super::convert::{tagged_status, untagged};
use super::{Response, Status, Transport, quote};
use crate::config::{ImapConfig, Security};
use crate::error::{Error, Result};
use async_imap::error::Error as ImapError;
use async_imap::imap_proto::Response as WireResponse;
use async_imap::{Client, Session};
use rustls::pki_types::ServerName;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// Byte stream under an [`ImapConnection`].
#[derive(Debug)]
pub enum Stream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// A logged-in `async-imap` session.
pub type ImapSession = Session<Compat<Stream>>;

enum State {
    Connected(Client<Compat<Stream>>),
    Authenticated(ImapSession),
    /// A login attempt was abandoned halfway (timeout).
    Closed,
}

/// One IMAP session driven by `async-imap`.
///
/// Commands are strictly sequential: each [`Transport::command`] call
/// sends one tagged command and reads until its completion. Every
/// command except LOGIN needs a logged-in session.
pub struct ImapConnection {
    state: State,
    max_line_length: usize,
    timeout: Option<Duration>,
}

async fn within<T>(limit: Option<Duration>, work: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => work.await,
    }
}

impl ImapConnection {
    /// Open a session to `config.host:config.port` using the configured
    /// security mode. The server greeting is consumed by the first
    /// command.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection, STARTTLS exchange or TLS
    /// handshake fails, or if `config.timeout` elapses.
    pub async fn connect(config: &ImapConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!("Connecting to IMAP server at {}", addr);

        let open = async {
            let tcp_stream = TcpStream::connect(&addr).await?;
            let stream = match config.security {
                Security::None => Stream::Plain(tcp_stream),
                Security::Implicit => Stream::Tls(Box::new(tls_handshake(tcp_stream, config).await?)),
                Security::StartTls => {
                    let mut client = Client::new(tcp_stream.compat());
                    client
                        .run_command_and_check_ok("STARTTLS", None)
                        .await
                        .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;
                    let inner = client.into_inner().into_inner();
                    Stream::Tls(Box::new(tls_handshake(inner, config).await?))
                }
            };
            Ok::<_, Error>(Client::new(stream.compat()))
        };
        let client = within(config.timeout, open).await?;

        info!("Connected to IMAP server");
        Ok(Self {
            state: State::Connected(client),
            max_line_length: config.max_line_length,
            timeout: config.timeout,
        })
    }
}

impl Transport for ImapConnection {
    async fn command(&mut self, name: &str, args: &[&str]) -> Result<Response> {
        let mut line = name.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        if line.len() > self.max_line_length {
            return Err(Error::LineTooLong(self.max_line_length));
        }
        let State::Authenticated(session) = &mut self.state else {
            return Err(Error::Imap(format!("{name} needs a logged-in session")));
        };
        debug!("C: {}", line);

        within(
            self.timeout,
            exchange(session, name, &line, self.max_line_length),
        )
        .await
    }

    /// LOGIN through `async-imap`. A refusal comes back as a `NO`/`BAD`
    /// response and leaves the connection ready for another attempt.
    async fn login(&mut self, username: &str, password: &str) -> Result<Response> {
        quote(username)?;
        quote(password)?;
        let client = match std::mem::replace(&mut self.state, State::Closed) {
            State::Connected(client) => client,
            State::Authenticated(session) => {
                self.state = State::Authenticated(session);
                return Err(Error::Imap("Already logged in".into()));
            }
            State::Closed => return Err(Error::Imap("Connection closed".into())),
        };
        debug!("C: LOGIN <credentials>");

        let attempt = within(self.timeout, async {
            Ok::<_, Error>(client.login(username, password).await)
        })
        .await?;
        match attempt {
            Ok(session) => {
                self.state = State::Authenticated(session);
                Ok(Response::ok("LOGIN completed"))
            }
            Err((err, client)) => {
                self.state = State::Connected(client);
                match err {
                    ImapError::No(text) => Ok(Response::new(Status::No, text)),
                    ImapError::Bad(text) => Ok(Response::new(Status::Bad, text)),
                    other => Err(Error::Imap(format!("Login failed: {other}"))),
                }
            }
        }
    }
}

/// Send `line` and collect the untagged replies up to its completion.
async fn exchange(
    session: &mut ImapSession,
    command: &str,
    line: &str,
    max_line_length: usize,
) -> Result<Response> {
    let tag = session
        .run_command(line)
        .await
        .map_err(|e| Error::Imap(format!("{command} failed: {e}")))?;

    let mut items = Vec::new();
    loop {
        let data = session
            .read_response()
            .await
            .map_err(|e| Error::Imap(format!("{command} failed: {e}")))?
            .ok_or_else(|| Error::Imap(format!("Connection closed during {command}")))?;

        match data.parsed() {
            WireResponse::Done {
                tag: done,
                status,
                information,
                ..
            } if *done == tag => {
                let status = tagged_status(status).ok_or_else(|| {
                    Error::Imap(format!("{command} completed with {status:?}"))
                })?;
                return Ok(Response {
                    status,
                    text: information.as_deref().unwrap_or_default().to_string(),
                    untagged: items,
                });
            }
            other => {
                for item in untagged(other, command) {
                    if item.item.head().len() > max_line_length {
                        return Err(Error::LineTooLong(max_line_length));
                    }
                    items.push(item);
                }
            }
        }
    }
}

fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?;
    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

async fn tls_handshake(tcp: TcpStream, config: &ImapConfig) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector(config.accept_invalid_certs)?;
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

/// Certificate verifier that accepts all certificates
/// (self-signed bridges and test servers).
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
