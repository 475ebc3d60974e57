//! SMTP delivery of composed messages
//!
//! [`Transmitter::send`] never returns an error for transport trouble.
//! Every failure is folded into [`SendReport::Failed`] so callers
//! sending many messages can check one value per message.

use crate::config::ConnectionSettings;
use crate::error::{Error, Result};
use crate::message::{FinalizedMessage, MessageBuilder};
use lettre::address::{Address, Envelope};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Certificate, Tls, TlsParameters, TlsParametersBuilder};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error, info};

/// Outcome of [`Transmitter::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendReport {
    /// The server accepted the message.
    Delivered,
    /// Dev mode: the message was rendered and logged, not sent.
    DryRun,
    /// Delivery failed; carries the transport's error text.
    Failed(String),
}

impl SendReport {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::Delivered | Self::DryRun => None,
        }
    }
}

/// One complete delivery: connect, authenticate, submit, disconnect.
///
/// The session must be released before the future resolves, whether
/// delivery succeeded or not.
pub trait Delivery {
    /// # Errors
    ///
    /// Returns [`Error::Smtp`] for any connection, authentication or
    /// submission failure.
    fn deliver(
        &self,
        settings: &ConnectionSettings,
        message: &FinalizedMessage,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// SMTP submission with a mandatory STARTTLS upgrade.
///
/// Certificates are checked against the default web PKI roots plus any
/// added with [`with_root_certificate`](Self::with_root_certificate).
#[derive(Debug, Clone, Default)]
pub struct SmtpDelivery {
    extra_roots: Vec<Vec<u8>>,
}

impl SmtpDelivery {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            extra_roots: Vec::new(),
        }
    }

    /// Also trust the DER-encoded certificate `der`, e.g. a private CA.
    #[must_use]
    pub fn with_root_certificate(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.extra_roots.push(der.into());
        self
    }

    fn transport(&self, settings: &ConnectionSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let tls = self
            .extra_roots
            .iter()
            .try_fold(
                TlsParameters::builder(settings.host().to_string()),
                |tls, der| {
                    Certificate::from_der(der.clone()).map(|cert| tls.add_root_certificate(cert))
                },
            )
            .and_then(TlsParametersBuilder::build_rustls)
            .map_err(|e| Error::Smtp(format!("TLS setup failed: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host())
            .port(settings.port())
            .tls(Tls::Required(tls))
            .credentials(Credentials::new(
                settings.username().to_string(),
                settings.password().to_string(),
            ))
            .build();
        Ok(transport)
    }
}

/// Envelope for `message`: the settings username as sender, every
/// To, CC and BCC address as a recipient.
///
/// Addresses may carry a display name (`Bob <bob@example.com>`); only
/// the address part goes on the envelope, once.
fn envelope(settings: &ConnectionSettings, message: &FinalizedMessage) -> Result<Envelope> {
    let sender = settings
        .username()
        .parse::<Mailbox>()
        .map_err(|e| Error::Smtp(format!("Invalid envelope sender: {e}")))?;

    let mut recipients: Vec<Address> = Vec::new();
    for r in message.envelope_recipients() {
        let mailbox = r
            .parse::<Mailbox>()
            .map_err(|e| Error::Smtp(format!("Invalid recipient {r}: {e}")))?;
        if !recipients.contains(&mailbox.email) {
            recipients.push(mailbox.email);
        }
    }

    Envelope::new(Some(sender.email), recipients)
        .map_err(|e| Error::Smtp(format!("Invalid envelope: {e}")))
}

impl Delivery for SmtpDelivery {
    async fn deliver(&self, settings: &ConnectionSettings, message: &FinalizedMessage) -> Result<()> {
        let envelope = envelope(settings, message)?;

        debug!(
            "Connecting to SMTP server at {}:{}",
            settings.host(),
            settings.port()
        );
        let transport = self.transport(settings)?;

        transport
            .send_raw(&envelope, &message.formatted())
            .await
            .map_err(|e| Error::Smtp(e.to_string()))?;
        Ok(())
    }
}

/// Sends [`MessageBuilder`] output through a [`Delivery`].
pub struct Transmitter<D = SmtpDelivery> {
    settings: ConnectionSettings,
    delivery: D,
}

impl Transmitter {
    #[must_use]
    pub const fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            delivery: SmtpDelivery::new(),
        }
    }
}

impl<D: Delivery> Transmitter<D> {
    #[must_use]
    pub const fn with_delivery(settings: ConnectionSettings, delivery: D) -> Self {
        Self { settings, delivery }
    }

    #[must_use]
    pub const fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Finalize `message` and deliver it to every To, CC and BCC
    /// address, with the settings username as envelope sender.
    ///
    /// In dev mode the message is logged and [`SendReport::DryRun`]
    /// is returned without touching the network. `debug` raises the
    /// failure text to error level and logs the message after a
    /// successful send.
    pub async fn send(&self, message: &MessageBuilder, debug: bool) -> SendReport {
        let finalized = message.finalize();

        if self.settings.dev_mode() {
            info!(
                "Dev mode, printing email:\n{message}\n\nOriginal message:\n{}",
                message.original_body()
            );
            return SendReport::DryRun;
        }

        match self.delivery.deliver(&self.settings, &finalized).await {
            Ok(()) => {
                info!(
                    "Email sent to {} recipient(s)",
                    finalized.envelope_recipients().len()
                );
                if debug {
                    info!(
                        "Email after sending:\n{message}\n\nOriginal message:\n{}",
                        message.original_body()
                    );
                }
                SendReport::Delivered
            }
            Err(e) => {
                if debug {
                    error!("Failed to send email: {e}");
                } else {
                    debug!("Failed to send email: {e}");
                }
                SendReport::Failed(e.to_string())
            }
        }
    }
}
