//! Mailbox session: list, fetch, parse and flag messages
//!
//! A [`MailboxReader`] moves through
//! `Closed -> Open -> [Selected] -> Closed`. Every mailbox operation
//! checks that a connection is open and fails with
//! [`Error::NotConnected`] otherwise.
//!
//! Prefer [`MailboxReader::session`], which opens the connection, runs
//! an async closure, and always closes (CLOSE if a folder is selected,
//! then LOGOUT) before returning, even when the closure failed.

use crate::config::ConnectionSettings;
use crate::connection::{ImapConnector, MailboxConnection, MailboxConnector};
use crate::error::{Error, Result};
use crate::flag::{Flag, StoreCommand};
use crate::folder::Folder;
use crate::parsed::{MessageId, ParsedMail};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Session establishment timeout used by [`MailboxReader::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Reads and flags messages in one mailbox session.
///
/// Parsed messages accumulate across calls: each
/// [`get_inbox`](Self::get_inbox) appends to the same sequence. Use
/// [`clear_results`](Self::clear_results) to start over.
pub struct MailboxReader<K: MailboxConnector = ImapConnector> {
    settings: ConnectionSettings,
    connector: K,
    timeout: Duration,
    connection: Option<K::Connection>,
    selected: Option<Folder>,
    results: Vec<(MessageId, ParsedMail)>,
}

impl MailboxReader {
    /// A closed reader using [`ImapConnector`] with default trust roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn new(settings: ConnectionSettings) -> Result<Self> {
        Ok(Self::with_connector(settings, ImapConnector::new()?))
    }
}

impl<K: MailboxConnector> MailboxReader<K> {
    #[must_use]
    pub const fn with_connector(settings: ConnectionSettings, connector: K) -> Self {
        Self {
            settings,
            connector,
            timeout: DEFAULT_TIMEOUT,
            connection: None,
            selected: None,
            results: Vec::new(),
        }
    }

    /// Bound on connect plus login. Later commands are not timed.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    /// The currently selected folder, if any.
    #[must_use]
    pub const fn selected(&self) -> Option<&Folder> {
        self.selected.as_ref()
    }

    /// Everything fetched so far, in fetch order.
    #[must_use]
    pub fn results(&self) -> &[(MessageId, ParsedMail)] {
        &self.results
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the session is already open,
    /// if establishment exceeds the timeout, or if the connector fails.
    /// The reader stays closed on error.
    pub async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::Connection("Session is already open".into()));
        }

        let connection = tokio::time::timeout(self.timeout, self.connector.connect(&self.settings))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "Timed out after {:?} connecting to {}:{}",
                    self.timeout,
                    self.settings.host(),
                    self.settings.port()
                ))
            })??;

        self.connection = Some(connection);
        Ok(())
    }

    /// CLOSE the selected folder (if any), then LOGOUT.
    ///
    /// The connection is released whatever the server answers. Closing
    /// a closed reader is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the LOGOUT failure, if any. A failed CLOSE is logged
    /// and does not prevent LOGOUT.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        if let Some(folder) = self.selected.take() {
            if let Err(e) = connection.close().await {
                warn!("Failed to close {}: {}", folder, e);
            }
        }

        let result = connection.logout().await;
        debug!("Logged out of IMAP server");
        result
    }

    /// Run `body` inside an open session.
    ///
    /// Opens the session, awaits `body`, then always calls
    /// [`close`](Self::close). A failure while closing is logged; the
    /// body's result is returned.
    ///
    /// ```no_run
    /// # async fn demo() -> mail_facade::Result<()> {
    /// use mail_facade::{ConnectionSettings, Flag, MailboxReader, StoreCommand};
    ///
    /// let settings = ConnectionSettings::new("me@example.com", "pw", "imap.example.com", 993, false)?;
    /// let mut reader = MailboxReader::new(settings)?;
    /// reader
    ///     .session(async |reader| {
    ///         let ids: Vec<_> = reader.get_inbox().await?.iter().map(|(id, _)| id.clone()).collect();
    ///         for id in ids {
    ///             reader.store(id.as_str(), StoreCommand::Add, &[Flag::Seen]).await?;
    ///         }
    ///         Ok(())
    ///     })
    ///     .await
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns the error from [`open`](Self::open) or from `body`.
    pub async fn session<F, R>(&mut self, body: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        self.open().await?;
        let outcome = body(&mut *self).await;

        if let Err(e) = self.close().await {
            warn!("Failed to log out cleanly: {}", e);
        }
        outcome
    }

    /// SELECT `folder` without fetching anything, e.g. before a
    /// [`store`](Self::store).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the session is not open, or
    /// [`Error::Imap`] if the folder cannot be selected.
    pub async fn select(&mut self, folder: impl Into<Folder>) -> Result<()> {
        let folder = folder.into();
        let connection = self.connection.as_mut().ok_or(Error::NotConnected)?;
        // A failed SELECT leaves the server with no mailbox selected.
        self.selected = None;
        connection.select(folder.as_str()).await?;
        self.selected = Some(folder);
        Ok(())
    }

    /// SELECT `INBOX`, fetch every message and append the parsed
    /// results. See [`fetch_folder`](Self::fetch_folder).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the session is not open, or
    /// [`Error::Imap`] if a command fails.
    pub async fn get_inbox(&mut self) -> Result<&[(MessageId, ParsedMail)]> {
        self.fetch_folder(Folder::Inbox).await
    }

    /// SELECT `folder`, `SEARCH ALL`, fetch and parse each message.
    ///
    /// Messages the server returns no body for are skipped. Messages
    /// that fail to parse are logged and skipped. Returns every result
    /// accumulated so far, including those from earlier calls.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the session is not open, or
    /// [`Error::Imap`] if SELECT, SEARCH or FETCH fails.
    pub async fn fetch_folder(
        &mut self,
        folder: impl Into<Folder>,
    ) -> Result<&[(MessageId, ParsedMail)]> {
        self.select(folder).await?;
        let connection = self.connection.as_mut().ok_or(Error::NotConnected)?;

        let ids = connection.search_all().await?;
        info!("Found {} messages", ids.len());

        for id in ids {
            let Some(raw) = connection.fetch_raw(&id).await? else {
                debug!("No body returned for message {}", id);
                continue;
            };
            match ParsedMail::parse(&raw) {
                Ok(mail) => self.results.push((id, mail)),
                Err(e) => warn!("Failed to parse message {}: {}", id, e),
            }
        }

        Ok(&self.results)
    }

    /// Apply a flag mutation to `message_set` (one id, or an IMAP
    /// sequence set such as `1,3:5`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the session is not open, or
    /// [`Error::Imap`] if the server rejects the STORE.
    pub async fn store(
        &mut self,
        message_set: &str,
        command: StoreCommand,
        flags: &[Flag],
    ) -> Result<()> {
        let connection = self.connection.as_mut().ok_or(Error::NotConnected)?;
        let query = command.query(flags);
        debug!("STORE {} {}", message_set, query);
        connection.store(message_set, &query).await
    }
}

impl<K: MailboxConnector> fmt::Display for MailboxReader<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<MailboxReader: {} message(s)>", self.results.len())?;
        for (id, mail) in &self.results {
            write!(
                f,
                "\n{id}: {}",
                mail.subject.as_deref().unwrap_or("(no subject)")
            )?;
        }
        Ok(())
    }
}

impl<K: MailboxConnector> Drop for MailboxReader<K> {
    fn drop(&mut self) {
        if self.connection.is_some() {
            warn!("MailboxReader dropped while open; connection released without LOGOUT");
        }
    }
}
