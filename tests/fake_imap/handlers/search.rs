//! SEARCH command handler.
//!
//! Only `ALL` is understood; any other criteria get a tagged BAD.
//! Results are sequence numbers:
//!
//! ```text
//! * SEARCH 1 2 3
//! A0003 OK SEARCH completed
//! ```

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use imap_codec::imap_types::search::SearchKey;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_search<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    criteria: &[SearchKey<'_>],
    mailbox: &Mailbox,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder) = selected_folder.and_then(|name| mailbox.get_folder(name)) else {
        let resp = format!("{tag} BAD No folder selected\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    };

    if !criteria.iter().all(|key| matches!(key, SearchKey::All)) {
        let resp = format!("{tag} BAD Only SEARCH ALL is supported\r\n");
        let _ = write_line(stream, &resp).await;
        return;
    }

    let seqs: Vec<String> = (1..=folder.messages.len()).map(|n| n.to_string()).collect();
    let line = if seqs.is_empty() {
        "* SEARCH\r\n".to_string()
    } else {
        format!("* SEARCH {}\r\n", seqs.join(" "))
    };
    let _ = write_line(stream, &line).await;
    let resp = format!("{tag} OK SEARCH completed\r\n");
    let _ = write_line(stream, &resp).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn all_lists_every_sequence_number() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .message(b"Subject: a\r\n\r\n")
            .message(b"Subject: b\r\n\r\n")
            .message(b"Subject: c\r\n\r\n")
            .build();

        let output = capture(|mut s| async move {
            handle_search("A2", &[SearchKey::All], &mailbox, Some("INBOX"), &mut s).await;
        })
        .await;

        assert_eq!(output, "* SEARCH 1 2 3\r\nA2 OK SEARCH completed\r\n");
    }

    #[tokio::test]
    async fn empty_folder_returns_empty_result() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = capture(|mut s| async move {
            handle_search("A2", &[SearchKey::All], &mailbox, Some("INBOX"), &mut s).await;
        })
        .await;

        assert!(output.starts_with("* SEARCH\r\n"));
    }

    #[tokio::test]
    async fn requires_selected_folder() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = capture(|mut s| async move {
            handle_search("A2", &[SearchKey::All], &mailbox, None, &mut s).await;
        })
        .await;

        assert_eq!(output, "A2 BAD No folder selected\r\n");
    }
}
