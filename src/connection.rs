//! IMAP connection and TLS helpers
//!
//! [`MailboxConnector`] and [`MailboxConnection`] are the seam between
//! [`MailboxReader`](crate::MailboxReader) and the wire. The default
//! implementation, [`ImapConnector`], speaks IMAP over implicit TLS
//! through `async-imap`.

use crate::config::ConnectionSettings;
use crate::error::{Error, Result};
use crate::parsed::MessageId;
use async_imap::Session;
use async_imap::imap_proto::{Response, Status};
use async_imap::types::Fetch;
use futures::TryStreamExt;
use rustls::RootCertStore;
use rustls::pki_types::ServerName;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// A TLS-wrapped IMAP session.
pub type ImapSession = Session<Compat<tokio_rustls::client::TlsStream<TcpStream>>>;

/// Opens authenticated mailbox connections.
pub trait MailboxConnector {
    type Connection: MailboxConnection;

    /// Connect to `settings.host():settings.port()` and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the socket, TLS handshake,
    /// server greeting or login fails.
    fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// The commands a logged-in mailbox session issues.
pub trait MailboxConnection {
    fn select(&mut self, folder: &str) -> impl Future<Output = Result<()>> + Send;

    /// `SEARCH ALL`, returning identifiers in ascending order.
    fn search_all(&mut self) -> impl Future<Output = Result<Vec<MessageId>>> + Send;

    /// Fetch the full raw message, or `None` if the server sent no
    /// body for it.
    fn fetch_raw(&mut self, id: &MessageId) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// `STORE <message_set> <query>`, e.g. `+FLAGS (\Seen)`.
    fn store(&mut self, message_set: &str, query: &str) -> impl Future<Output = Result<()>> + Send;

    /// Leave the selected mailbox.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn logout(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Connects over implicit TLS (IMAPS) and logs in with `LOGIN`.
#[derive(Clone)]
pub struct ImapConnector {
    tls: TlsConnector,
}

impl ImapConnector {
    /// Verify server certificates against the Mozilla root set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_root_store(RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        })
    }

    /// Verify server certificates against `roots` only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn with_root_store(roots: RootCertStore) -> Result<Self> {
        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        Ok(Self {
            tls: TlsConnector::from(Arc::new(config)),
        })
    }
}

impl MailboxConnector for ImapConnector {
    type Connection = ImapConnection;

    async fn connect(&self, settings: &ConnectionSettings) -> Result<ImapConnection> {
        let addr = format!("{}:{}", settings.host(), settings.port());
        debug!("Connecting to IMAP server at {}", addr);

        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Connection(format!("Failed to connect to {addr}: {e}")))?;

        let server_name = ServerName::try_from(settings.host().to_string())
            .map_err(|e| Error::Connection(format!("Invalid server name: {e}")))?;

        let tls_stream = self
            .tls
            .connect(server_name, tcp_stream)
            .await
            .map_err(|e| Error::Connection(format!("TLS handshake failed: {e}")))?;

        let mut client = async_imap::Client::new(tls_stream.compat());

        // Implicit TLS: the greeting arrives after the handshake.
        match client.read_response().await {
            Ok(Some(greeting)) => {
                if let Response::Data {
                    status: Status::Bye,
                    information,
                    ..
                } = greeting.parsed()
                {
                    return Err(Error::Connection(format!(
                        "Server at {addr} refused the connection: {}",
                        information.as_deref().unwrap_or("BYE")
                    )));
                }
            }
            Ok(None) => {
                return Err(Error::Connection(format!(
                    "No greeting from {addr}: connection closed"
                )));
            }
            Err(e) => {
                return Err(Error::Connection(format!("No greeting from {addr}: {e}")));
            }
        }

        let session = client
            .login(settings.username(), settings.password())
            .await
            .map_err(|(e, _)| Error::Connection(format!("Login failed: {e}")))?;

        info!("Connected to IMAP server");
        Ok(ImapConnection { session })
    }
}

/// A logged-in `async-imap` session.
pub struct ImapConnection {
    session: ImapSession,
}

impl MailboxConnection for ImapConnection {
    async fn select(&mut self, folder: &str) -> Result<()> {
        self.session
            .select(folder)
            .await
            .map_err(|e| Error::Imap(format!("Failed to select {folder}: {e}")))?;
        Ok(())
    }

    async fn search_all(&mut self) -> Result<Vec<MessageId>> {
        let found = self
            .session
            .search("ALL")
            .await
            .map_err(|e| Error::Imap(format!("Search failed: {e}")))?;

        let mut ids: Vec<u32> = found.into_iter().collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(MessageId::from).collect())
    }

    async fn fetch_raw(&mut self, id: &MessageId) -> Result<Option<Vec<u8>>> {
        // BODY[] is the RFC 3501 equivalent of RFC822 and likewise sets \Seen.
        let fetches: Vec<Fetch> = self
            .session
            .fetch(id.as_str(), "BODY[]")
            .await
            .map_err(|e| Error::Imap(format!("Fetch failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Fetch error: {e}")))?;

        Ok(fetches
            .iter()
            .find_map(|fetch| fetch.body().map(<[u8]>::to_vec)))
    }

    async fn store(&mut self, message_set: &str, query: &str) -> Result<()> {
        let _updated: Vec<Fetch> = self
            .session
            .store(message_set, query)
            .await
            .map_err(|e| Error::Imap(format!("Store failed: {e}")))?
            .try_collect()
            .await
            .map_err(|e| Error::Imap(format!("Store error: {e}")))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.session
            .close()
            .await
            .map_err(|e| Error::Imap(format!("Close failed: {e}")))
    }

    async fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .await
            .map_err(|e| Error::Imap(format!("Logout failed: {e}")))
    }
}
