//! Outbound message composition
//!
//! [`MessageBuilder`] keeps every compose-time value as a plain field
//! and only materializes the MIME container in [`MessageBuilder::finalize`].
//! Repeated `body()` or header calls therefore never leave stale parts
//! behind: the finalized message always has one body part and one
//! value per singleton header, taken from the latest call.

use crate::config::ConnectionSettings;
use crate::error::Result;
use lettre::message::header::{ContentType, HeaderName, HeaderValue, Headers};
use lettre::message::{Attachment, MultiPart, SinglePart};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether an attached path pointed at a file when it was attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttachmentStatus {
    Exists,
    /// Recorded for visibility; contributes no MIME part.
    Missing,
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exists => "Exists",
            Self::Missing => "Missing",
        })
    }
}

#[derive(Debug, Clone)]
struct AttachedFile {
    status: AttachmentStatus,
    part: Option<SinglePart>,
}

/// Chainable composer for one outbound message.
///
/// ```
/// use mail_facade::{ConnectionSettings, MessageBuilder};
///
/// let settings = ConnectionSettings::new("me@example.com", "pw", "smtp.example.com", 587, true)?;
/// let mut message = MessageBuilder::new(&settings);
/// message
///     .subject("test")
///     .body("<p>hello</p>")
///     .recipients(["a@example.com"]);
///
/// let finalized = message.finalize();
/// assert_eq!(finalized.header("Subject"), Some("test"));
/// assert_eq!(finalized.header("To"), Some("a@example.com"));
/// # Ok::<(), mail_facade::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    subject: String,
    body: String,
    original_sender: String,
    reply_to: String,
    from: String,
    recipients: BTreeSet<String>,
    cc_recipients: BTreeSet<String>,
    bcc_recipients: BTreeSet<String>,
    attachments: BTreeMap<PathBuf, AttachedFile>,
}

impl MessageBuilder {
    /// Start an empty message. Sender, reply-to and the
    /// `Original-Sender` annotation default to the settings username.
    #[must_use]
    pub fn new(settings: &ConnectionSettings) -> Self {
        let identity = settings.username().to_string();
        Self {
            subject: String::new(),
            body: String::new(),
            original_sender: identity.clone(),
            reply_to: identity.clone(),
            from: identity,
            recipients: BTreeSet::new(),
            cc_recipients: BTreeSet::new(),
            bcc_recipients: BTreeSet::new(),
            attachments: BTreeMap::new(),
        }
    }

    pub fn subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = subject.into();
        self
    }

    /// Set the HTML body. Replaces any earlier body.
    pub fn body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn from(&mut self, from: impl Into<String>) -> &mut Self {
        self.from = from.into();
        self
    }

    pub fn reply_to(&mut self, reply_to: impl Into<String>) -> &mut Self {
        self.reply_to = reply_to.into();
        self
    }

    /// Add addresses to the `To` set. Duplicates are ignored.
    pub fn recipients<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn cc_recipients<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cc_recipients.extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn bcc_recipients<I, S>(&mut self, addresses: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bcc_recipients
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    /// Attach one file. See [`MessageBuilder::attach_files`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file exists but
    /// cannot be read.
    pub fn attach_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.attach_files([path])
    }

    /// Attach files by path.
    ///
    /// Each path is recorded with its [`AttachmentStatus`]. Existing
    /// files are read whole and added as `application/<extension>`
    /// parts. Missing files are recorded but add no part; this is not
    /// an error, so inspect [`MessageBuilder::attachments`] to find
    /// them. Attaching a path again replaces the earlier entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if a file exists but
    /// cannot be read. Paths before it stay attached.
    pub fn attach_files<I, P>(&mut self, paths: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let path = path.as_ref();
            let entry = if path.exists() {
                let content = std::fs::read(path)?;
                debug!("Attaching {} ({} bytes)", path.display(), content.len());
                AttachedFile {
                    status: AttachmentStatus::Exists,
                    part: Some(attachment_part(path, content)),
                }
            } else {
                debug!("Attachment {} is missing", path.display());
                AttachedFile {
                    status: AttachmentStatus::Missing,
                    part: None,
                }
            };
            self.attachments.insert(path.to_path_buf(), entry);
        }
        Ok(self)
    }

    /// Every attached path with its status, ordered by path.
    pub fn attachments(&self) -> impl Iterator<Item = (&Path, AttachmentStatus)> {
        self.attachments
            .iter()
            .map(|(path, file)| (path.as_path(), file.status))
    }

    #[must_use]
    pub const fn recipient_set(&self) -> &BTreeSet<String> {
        &self.recipients
    }

    #[must_use]
    pub const fn cc_set(&self) -> &BTreeSet<String> {
        &self.cc_recipients
    }

    #[must_use]
    pub const fn bcc_set(&self) -> &BTreeSet<String> {
        &self.bcc_recipients
    }

    /// The body as given, before MIME encoding.
    #[must_use]
    pub fn original_body(&self) -> &str {
        &self.body
    }

    /// Union of `To`, `CC` and `BCC`, each address once.
    #[must_use]
    pub fn envelope_recipients(&self) -> Vec<String> {
        self.recipients
            .iter()
            .chain(&self.cc_recipients)
            .chain(&self.bcc_recipients)
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Materialize the headers and MIME container.
    ///
    /// The builder is left untouched, so it can be finalized again
    /// after further changes.
    #[must_use]
    pub fn finalize(&self) -> FinalizedMessage {
        let mut headers = Headers::new();
        set_header(&mut headers, "Original-Sender", &self.original_sender);
        set_header(&mut headers, "Reply-To", &self.reply_to);
        set_header(&mut headers, "From", &self.from);
        set_header(&mut headers, "Subject", &self.subject);
        set_address_header(&mut headers, "To", &self.recipients);
        set_address_header(&mut headers, "CC", &self.cc_recipients);
        set_address_header(&mut headers, "BCC", &self.bcc_recipients);
        set_header(&mut headers, "MIME-Version", "1.0");

        let body = SinglePart::builder()
            .header(ContentType::TEXT_HTML)
            .body(self.body.clone());

        let parts: Vec<SinglePart> = self
            .attachments
            .values()
            .filter_map(|file| file.part.clone())
            .collect();
        let attachment_parts = parts.len();

        let container = parts
            .into_iter()
            .fold(MultiPart::alternative().singlepart(body), MultiPart::singlepart);

        FinalizedMessage {
            headers,
            container,
            attachment_parts,
            envelope_recipients: self.envelope_recipients(),
        }
    }
}

impl fmt::Display for MessageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.finalize().formatted();
        writeln!(f, "{}", String::from_utf8_lossy(&formatted))?;
        write!(f, "Files set for attachment:")?;
        for (path, status) in self.attachments() {
            write!(f, "\n{} - {status}", path.display())?;
        }
        Ok(())
    }
}

/// A message ready for the wire.
#[derive(Debug, Clone)]
pub struct FinalizedMessage {
    headers: Headers,
    container: MultiPart,
    attachment_parts: usize,
    envelope_recipients: Vec<String>,
}

impl FinalizedMessage {
    /// Top-level header value as written to the wire.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_raw(name)
    }

    /// Number of file parts in the container, excluding the body.
    #[must_use]
    pub const fn attachment_parts(&self) -> usize {
        self.attachment_parts
    }

    #[must_use]
    pub fn envelope_recipients(&self) -> &[String] {
        &self.envelope_recipients
    }

    /// Serialize headers and container into RFC 5322 bytes.
    #[must_use]
    pub fn formatted(&self) -> Vec<u8> {
        let mut out = self.headers.to_string().into_bytes();
        out.extend(self.container.formatted());
        out
    }
}

fn set_header(headers: &mut Headers, name: &'static str, value: &str) {
    headers.insert_raw(HeaderValue::new(
        HeaderName::new_from_ascii_str(name),
        value.to_string(),
    ));
}

fn set_address_header(headers: &mut Headers, name: &'static str, addresses: &BTreeSet<String>) {
    if addresses.is_empty() {
        return;
    }
    let joined = addresses
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    set_header(headers, name, &joined);
}

/// Subtype comes from the file extension, not the content, so a
/// misnamed file is labelled by its name.
fn attachment_part(path: &Path, content: Vec<u8>) -> SinglePart {
    let filename = path
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());

    let subtype = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map_or_else(|| "octet-stream".to_string(), str::to_ascii_lowercase);

    let content_type = ContentType::parse(&format!("application/{subtype}"))
        .or_else(|_| ContentType::parse("application/octet-stream"))
        .unwrap_or(ContentType::TEXT_PLAIN);

    Attachment::new(filename).body(content, content_type)
}
