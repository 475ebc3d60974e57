//! Flag mutations for STORE
//!
//! [`Flag`] names a message flag; [`StoreCommand`] says whether the
//! flags are added, removed, or replace the current set.

use std::fmt;

/// An IMAP message flag.
///
/// System flags (prefixed with `\` on the wire) have dedicated
/// variants. User-defined keywords use [`Flag::Keyword`].
///
/// ```
/// use mail_facade::Flag;
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!(Flag::Keyword("$Important".into()).to_string(), "$Important");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `\Seen`: the message has been read.
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    /// A keyword flag, sent as-is.
    Keyword(String),
}

impl Flag {
    #[must_use]
    pub fn as_imap_str(&self) -> &str {
        match self {
            Self::Seen => "\\Seen",
            Self::Answered => "\\Answered",
            Self::Flagged => "\\Flagged",
            Self::Deleted => "\\Deleted",
            Self::Draft => "\\Draft",
            Self::Keyword(kw) => kw,
        }
    }

    /// Parse a flag from its wire form or bare name.
    ///
    /// `\Seen`, `Seen` and `seen` all map to [`Flag::Seen`]. Anything
    /// else becomes a keyword.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let name = s.strip_prefix('\\').unwrap_or(s);
        match name.to_ascii_lowercase().as_str() {
            "seen" => Self::Seen,
            "answered" => Self::Answered,
            "flagged" => Self::Flagged,
            "deleted" => Self::Deleted,
            "draft" => Self::Draft,
            _ => Self::Keyword(s.to_string()),
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// How a STORE applies its flag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreCommand {
    /// `+FLAGS`
    #[default]
    Add,
    /// `-FLAGS`
    Remove,
    /// `FLAGS`
    Replace,
}

impl StoreCommand {
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Add => "+FLAGS",
            Self::Remove => "-FLAGS",
            Self::Replace => "FLAGS",
        }
    }

    /// Render the STORE data item, e.g. `+FLAGS (\Seen \Flagged)`.
    #[must_use]
    pub fn query(self, flags: &[Flag]) -> String {
        let list = flags
            .iter()
            .map(Flag::as_imap_str)
            .collect::<Vec<_>>()
            .join(" ");
        format!("{} ({list})", self.as_imap_str())
    }
}

impl fmt::Display for StoreCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}
