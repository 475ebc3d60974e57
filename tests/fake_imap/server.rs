//! In-process fake IMAP server for integration testing
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Client connects via TCP and immediately starts TLS (IMAPS)
//!       |
//!   Server sends greeting: "* OK IMAP4rev1 ready\r\n"
//!       |
//!   Client sends LOGIN with username and password
//!       |
//!   Client issues commands: SELECT, SEARCH, FETCH, STORE, CLOSE
//!       |
//!   Client sends LOGOUT
//! ```
//!
//! Every client command starts with a tag (async-imap uses `A0001`,
//! `A0002`, ...) that the server echoes in its completion response.
//! Lines prefixed with `*` are untagged data sent before it.

use super::handlers::{
    StoreArgs, handle_close, handle_fetch, handle_login, handle_logout, handle_search,
    handle_select, handle_store,
};
use super::io::write_line;
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const USERNAME: &str = "testuser";
pub const PASSWORD: &str = "testpass";

/// A fake IMAPS server on `127.0.0.1` with an OS-assigned port.
///
/// A self-signed certificate for `127.0.0.1` is generated at startup;
/// [`root_store`](Self::root_store) hands it to the client as its only
/// trust anchor. The accept loop is aborted when the server drops.
pub struct FakeImapServer {
    port: u16,
    cert: CertificateDer<'static>,
    mailbox: Arc<Mutex<Mailbox>>,
    logouts: Arc<AtomicUsize>,
    handle: tokio::task::JoinHandle<()>,
}

const GREETING: &str = "* OK IMAP4rev1 Fake server ready\r\n";

impl FakeImapServer {
    pub async fn start(mailbox: Mailbox) -> Self {
        Self::start_with_greeting(mailbox, GREETING).await
    }

    /// Like [`start`](Self::start), but open each connection with
    /// `greeting`. Anything other than a `* OK` line is sent and the
    /// connection is closed; an empty greeting closes it silently.
    pub async fn start_with_greeting(mailbox: Mailbox, greeting: &'static str) -> Self {
        // Several tests may race to install the provider.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();

        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let cert_der = cert.cert.der().clone();
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der.into())
            .expect("build server TLS config");

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));
        let mailbox = Arc::new(Mutex::new(mailbox));
        let logouts = Arc::new(AtomicUsize::new(0));

        let shared_mailbox = Arc::clone(&mailbox);
        let shared_logouts = Arc::clone(&logouts);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let mailbox = Arc::clone(&shared_mailbox);
                let logouts = Arc::clone(&shared_logouts);
                tokio::spawn(async move {
                    let Ok(tls_stream) = acceptor.accept(stream).await else {
                        return;
                    };
                    handle_imap_session(tls_stream, greeting, &mailbox, &logouts).await;
                });
            }
        });

        Self {
            port,
            cert: cert_der,
            mailbox,
            logouts,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Trust store containing only this server's certificate.
    pub fn root_store(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert.clone()).expect("add server cert");
        roots
    }

    /// Snapshot of the current mailbox state.
    pub fn mailbox(&self) -> Mailbox {
        self.mailbox.lock().unwrap().clone()
    }

    /// Number of LOGOUT commands received across all connections.
    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Greet, then run the command loop until LOGOUT or disconnect.
///
/// Commands are parsed with `imap-codec`'s `CommandCodec`. Only LOGIN
/// and LOGOUT are accepted before authentication.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    greeting: &str,
    mailbox: &Mutex<Mailbox>,
    logouts: &AtomicUsize,
) {
    let mut reader = BufReader::new(stream);
    if !greeting.is_empty() && write_line(&mut reader, greeting).await.is_err() {
        return;
    }
    if !greeting.starts_with("* OK") {
        return;
    }

    let codec = CommandCodec::default();
    let mut authenticated = false;
    let mut selected_folder: Option<String> = None;

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = trimmed.split_whitespace().next().unwrap_or("*");
            let resp = format!("{tag} BAD Parse error\r\n");
            if write_line(&mut reader, &resp).await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();

        match command.body {
            CommandBody::Login { username, password } => {
                let given: (&[u8], &[u8]) = (username.as_ref(), password.declassify().as_ref());
                authenticated =
                    handle_login(tag, given, (USERNAME, PASSWORD), &mut reader).await;
            }
            CommandBody::Logout => {
                logouts.fetch_add(1, Ordering::SeqCst);
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ if !authenticated => {
                let resp = format!("{tag} NO Not authenticated\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
            CommandBody::Select { mailbox: mb, .. } => {
                let snap = mailbox.lock().unwrap().clone();
                selected_folder = handle_select(tag, &mailbox_name(&mb), &snap, &mut reader).await;
            }
            CommandBody::Search {
                criteria,
                uid: false,
                ..
            } => {
                let snap = mailbox.lock().unwrap().clone();
                handle_search(
                    tag,
                    criteria.as_ref(),
                    &snap,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: false,
                ..
            } => {
                handle_fetch(
                    tag,
                    &sequence_set,
                    mailbox,
                    selected_folder.as_deref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Store {
                ref sequence_set,
                ref kind,
                ref response,
                ref flags,
                uid: false,
                ..
            } => {
                let args = StoreArgs {
                    sequence_set,
                    kind,
                    response,
                    flags,
                };
                handle_store(tag, &args, mailbox, selected_folder.as_deref(), &mut reader).await;
            }
            CommandBody::Close => {
                selected_folder = handle_close(tag, selected_folder.as_deref(), &mut reader).await;
            }
            _ => {
                let resp = format!("{tag} BAD Unknown command\r\n");
                if write_line(&mut reader, &resp).await.is_err() {
                    break;
                }
            }
        }
    }
}
