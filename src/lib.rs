//! Mail facade: compose and send over SMTP, read and flag over IMAP
//!
//! Two clients share one [`ConnectionSettings`] type:
//!
//! - [`MessageBuilder`] and [`Transmitter`] compose a MIME message
//!   (HTML body plus attachments) and submit it over SMTP with
//!   STARTTLS. Dev mode renders and logs the message instead of
//!   sending it.
//! - [`MailboxReader`] opens an IMAP session over implicit TLS, lists
//!   and parses the inbox into [`ParsedMail`] values, and updates
//!   message flags.
//!
//! Everything is async on tokio.

mod config;
mod connection;
mod error;
mod flag;
mod folder;
mod message;
mod parsed;
mod reader;
mod transmitter;

pub use config::{ConnectionSettings, DevModeValue, PortValue};
pub use connection::{ImapConnection, ImapConnector, ImapSession, MailboxConnection, MailboxConnector};
pub use error::{Error, Result};
pub use flag::{Flag, StoreCommand};
pub use folder::Folder;
pub use message::{AttachmentStatus, FinalizedMessage, MessageBuilder};
pub use parsed::{MessageId, ParsedAddress, ParsedAttachment, ParsedMail};
pub use reader::{DEFAULT_TIMEOUT, MailboxReader};
pub use transmitter::{Delivery, SendReport, SmtpDelivery, Transmitter};
