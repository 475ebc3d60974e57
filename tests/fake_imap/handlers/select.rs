//! SELECT command handler.
//!
//! Reports the folder's FLAGS, EXISTS and RECENT counts, then the
//! tagged OK. Returns the selected folder name, or `None` (with a
//! tagged NO) if the folder does not exist.

use crate::fake_imap::io::write_line;
use crate::fake_imap::mailbox::Mailbox;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_select<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    folder_name: &str,
    mailbox: &Mailbox,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let Some(folder) = mailbox.get_folder(folder_name) else {
        let resp = format!("{tag} NO Folder not found\r\n");
        let _ = write_line(stream, &resp).await;
        return None;
    };

    let lines = [
        "* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n".to_string(),
        format!("* {} EXISTS\r\n", folder.messages.len()),
        "* 0 RECENT\r\n".to_string(),
        "* OK [UIDVALIDITY 1]\r\n".to_string(),
        format!("{tag} OK [READ-WRITE] SELECT completed\r\n"),
    ];
    for line in &lines {
        if write_line(stream, line).await.is_err() {
            return None;
        }
    }
    Some(folder_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;
    use crate::fake_imap::mailbox::MailboxBuilder;

    #[tokio::test]
    async fn reports_message_count() {
        let mailbox = MailboxBuilder::new()
            .folder("INBOX")
            .message(b"Subject: a\r\n\r\n")
            .seen_message(b"Subject: b\r\n\r\n")
            .build();

        let output = capture(|mut s| async move {
            let selected = handle_select("A1", "INBOX", &mailbox, &mut s).await;
            assert_eq!(selected.as_deref(), Some("INBOX"));
        })
        .await;

        assert!(output.contains("* 2 EXISTS"));
        assert!(output.ends_with("A1 OK [READ-WRITE] SELECT completed\r\n"));
    }

    #[tokio::test]
    async fn missing_folder_is_rejected() {
        let mailbox = MailboxBuilder::new().folder("INBOX").build();

        let output = capture(|mut s| async move {
            assert!(handle_select("A1", "Nope", &mailbox, &mut s).await.is_none());
        })
        .await;

        assert_eq!(output, "A1 NO Folder not found\r\n");
    }
}
