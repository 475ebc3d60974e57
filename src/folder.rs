//! Mailbox folder names

use std::fmt;

/// A mailbox to SELECT before searching.
///
/// ```
/// use mail_facade::Folder;
///
/// assert_eq!(Folder::from("inbox"), Folder::Inbox);
/// assert_eq!(Folder::from("Archive").as_str(), "Archive");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Folder {
    /// `INBOX`, the only name IMAP treats case-insensitively.
    #[default]
    Inbox,
    Named(String),
}

impl Folder {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Named(name) => name,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Named(s.to_string())
        }
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
