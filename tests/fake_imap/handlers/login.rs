//! LOGIN command handler.
//!
//! Credentials are compared against the ones the server was started
//! with. A mismatch gets a tagged NO and the session stays
//! unauthenticated.

use crate::fake_imap::io::write_line;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

/// Handle LOGIN. Returns whether the client is now authenticated.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    given: (&[u8], &[u8]),
    expected: (&str, &str),
    stream: &mut BufReader<S>,
) -> bool {
    let accepted = given.0 == expected.0.as_bytes() && given.1 == expected.1.as_bytes();
    let resp = if accepted {
        format!("{tag} OK LOGIN completed\r\n")
    } else {
        format!("{tag} NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
    };
    let _ = write_line(stream, &resp).await;
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;

    #[tokio::test]
    async fn accepts_matching_credentials() {
        let output = capture(|mut s| async move {
            assert!(handle_login("A1", (b"user", b"pw"), ("user", "pw"), &mut s).await);
        })
        .await;
        assert_eq!(output, "A1 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let output = capture(|mut s| async move {
            assert!(!handle_login("A1", (b"user", b"nope"), ("user", "pw"), &mut s).await);
        })
        .await;
        assert!(output.starts_with("A1 NO"));
    }
}
