//! Structured view of fetched messages
//!
//! Raw RFC 822 bytes are handed to [`mailparse`]; the result is copied
//! into owned types so a [`ParsedMail`] outlives the fetch buffer and
//! can be serialized.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mailparse::body::Body;
use mailparse::{DispositionType, MailAddr, MailHeaderMap, addrparse_header, dateparse};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Identifier the server assigned to a message.
///
/// Treat it as an opaque token: it is returned by SEARCH and passed
/// back verbatim to FETCH and STORE. It is not guaranteed to be small
/// or stable across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<u32> for MessageId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single mailbox from an address header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAddress {
    pub name: Option<String>,
    pub address: String,
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// A non-text part of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAttachment {
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ParsedAttachment {
    /// Write the decoded content into `dir` and return the file path.
    ///
    /// Only the final component of the advertised filename is used, so
    /// a hostile `../` name cannot escape `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let name = self
            .filename
            .as_deref()
            .and_then(|f| Path::new(f).file_name())
            .map_or_else(|| "attachment.bin".into(), ToOwned::to_owned);
        let path = dir.as_ref().join(name);
        std::fs::write(&path, &self.data)?;
        Ok(path)
    }
}

/// One fetched message, parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMail {
    pub headers: Vec<(String, String)>,
    pub subject: Option<String>,
    pub from: Vec<ParsedAddress>,
    pub to: Vec<ParsedAddress>,
    pub cc: Vec<ParsedAddress>,
    pub date: Option<DateTime<Utc>>,
    pub message_id: Option<String>,
    /// Decoded `text/plain` parts in document order.
    pub text_plain: Vec<String>,
    /// Decoded `text/html` parts in document order.
    pub text_html: Vec<String>,
    pub attachments: Vec<ParsedAttachment>,
}

impl ParsedMail {
    /// Parse raw RFC 822 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the bytes are not a parseable
    /// message. A part whose body cannot be decoded does not fail the
    /// message: its undecoded bytes are kept instead.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))?;
        let headers = &parsed.headers;

        let mut mail = Self {
            headers: headers
                .iter()
                .map(|h| (h.get_key(), h.get_value()))
                .collect(),
            subject: headers.get_first_value("Subject"),
            from: addresses(headers, "From"),
            to: addresses(headers, "To"),
            cc: addresses(headers, "Cc"),
            date: headers
                .get_first_value("Date")
                .and_then(|d| dateparse(&d).ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            message_id: headers.get_first_value("Message-ID"),
            text_plain: Vec::new(),
            text_html: Vec::new(),
            attachments: Vec::new(),
        };
        mail.collect_parts(&parsed);
        Ok(mail)
    }

    /// First value of the named header, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn collect_parts(&mut self, part: &mailparse::ParsedMail<'_>) {
        if !part.subparts.is_empty() {
            for sub in &part.subparts {
                self.collect_parts(sub);
            }
            return;
        }

        let disposition = part.get_content_disposition();
        let mimetype = part.ctype.mimetype.to_ascii_lowercase();
        let is_attachment = disposition.disposition == DispositionType::Attachment;

        match mimetype.as_str() {
            "text/plain" if !is_attachment => self.text_plain.push(body_text(part)),
            "text/html" if !is_attachment => self.text_html.push(body_text(part)),
            _ => {
                let data = body_bytes(part);
                let filename = disposition
                    .params
                    .get("filename")
                    .or_else(|| part.ctype.params.get("name"))
                    .cloned();
                self.attachments.push(ParsedAttachment {
                    filename,
                    content_type: mimetype,
                    size: data.len(),
                    data,
                });
            }
        }
    }
}

fn body_text(part: &mailparse::ParsedMail<'_>) -> String {
    part.get_body().unwrap_or_else(|e| {
        warn!("Keeping undecoded {} body: {}", part.ctype.mimetype, e);
        String::from_utf8_lossy(&undecoded(part)).into_owned()
    })
}

fn body_bytes(part: &mailparse::ParsedMail<'_>) -> Vec<u8> {
    part.get_body_raw().unwrap_or_else(|e| {
        warn!("Keeping undecoded {} body: {}", part.ctype.mimetype, e);
        undecoded(part)
    })
}

/// Body bytes as they appear on the wire, before transfer decoding.
fn undecoded(part: &mailparse::ParsedMail<'_>) -> Vec<u8> {
    match part.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

fn addresses(headers: &[mailparse::MailHeader<'_>], name: &str) -> Vec<ParsedAddress> {
    let Some(header) = headers.get_first_header(name) else {
        return Vec::new();
    };

    let list = match addrparse_header(header) {
        Ok(list) => list,
        Err(e) => {
            warn!("Unparseable {} header: {}", name, e);
            return Vec::new();
        }
    };

    list.iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(info) => vec![info.clone()],
            MailAddr::Group(group) => group.addrs.clone(),
        })
        .map(|info| ParsedAddress {
            name: info.display_name,
            address: info.addr,
        })
        .collect()
}
