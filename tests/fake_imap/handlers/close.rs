//! CLOSE command handler. Nothing is marked `\Deleted` in these tests,
//! so there is nothing to expunge; the folder is simply deselected.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Returns the new selection state (always `None`).
pub async fn handle_close<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) -> Option<String> {
    let resp = if selected_folder.is_some() {
        format!("{tag} OK CLOSE completed\r\n")
    } else {
        format!("{tag} BAD No folder selected\r\n")
    };
    let _ = write_line(stream, &resp).await;
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;

    #[tokio::test]
    async fn deselects_folder() {
        let output = capture(|mut s| async move {
            assert!(handle_close("A5", Some("INBOX"), &mut s).await.is_none());
        })
        .await;
        assert_eq!(output, "A5 OK CLOSE completed\r\n");
    }

    #[tokio::test]
    async fn close_without_select_is_bad() {
        let output = capture(|mut s| async move {
            handle_close("A5", None, &mut s).await;
        })
        .await;
        assert!(output.starts_with("A5 BAD"));
    }
}
