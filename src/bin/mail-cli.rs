#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for sending mail over SMTP and reading or flagging it over IMAP
//!
//! SMTP settings come from `SMTP_*` variables, IMAP settings from
//! `IMAP_*` (see [`ConnectionSettings::from_env`]).

use clap::{Parser, Subcommand};
use mail_facade::{
    ConnectionSettings, Flag, Folder, MailboxReader, MessageBuilder, MessageId, ParsedMail, SendReport,
    StoreCommand, Transmitter,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SMTP_PORT: u16 = 587;
const IMAP_PORT: u16 = 993;

#[derive(Parser)]
#[command(name = "mail-cli")]
#[command(about = "Send mail over SMTP, read and flag it over IMAP")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose and send one message
    Send {
        /// Primary recipient (repeatable)
        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long)]
        cc: Vec<String>,

        #[arg(long)]
        bcc: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,

        /// HTML body
        #[arg(long, default_value = "")]
        body: String,

        /// Override the From header (defaults to SMTP_USERNAME)
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        reply_to: Option<String>,

        /// File to attach (repeatable); missing files are reported, not fatal
        #[arg(long)]
        attach: Vec<PathBuf>,

        /// Log the message after sending and failures at error level
        #[arg(long)]
        debug: bool,
    },

    /// List every message in the inbox
    Inbox {
        /// Set \Seen on every listed message
        #[arg(long)]
        mark_seen: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add, remove or replace flags on a message set
    Store {
        /// Message number or sequence set (e.g. 1,3:5)
        message_set: String,

        /// Flag to apply, e.g. Seen or \Flagged (repeatable)
        #[arg(long = "flag", required = true)]
        flags: Vec<String>,

        #[arg(long, conflicts_with = "replace")]
        remove: bool,

        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Send {
            to,
            cc,
            bcc,
            subject,
            body,
            from,
            reply_to,
            attach,
            debug,
        } => {
            let settings = ConnectionSettings::from_env("SMTP", SMTP_PORT)?;
            let mut message = MessageBuilder::new(&settings);
            message
                .subject(subject)
                .body(body)
                .recipients(to)
                .cc_recipients(cc)
                .bcc_recipients(bcc)
                .attach_files(attach)?;
            if let Some(from) = from {
                message.from(from);
            }
            if let Some(reply_to) = reply_to {
                message.reply_to(reply_to);
            }
            cmd_send(settings, &message, debug).await?;
        }
        Command::Inbox { mark_seen, json } => {
            let settings = ConnectionSettings::from_env("IMAP", IMAP_PORT)?;
            cmd_inbox(settings, mark_seen, json).await?;
        }
        Command::Store {
            message_set,
            flags,
            remove,
            replace,
        } => {
            let settings = ConnectionSettings::from_env("IMAP", IMAP_PORT)?;
            let command = if remove {
                StoreCommand::Remove
            } else if replace {
                StoreCommand::Replace
            } else {
                StoreCommand::Add
            };
            let flags: Vec<Flag> = flags.iter().map(|f| Flag::parse(f)).collect();
            cmd_store(settings, &message_set, command, &flags).await?;
        }
    }

    Ok(())
}

async fn cmd_send(
    settings: ConnectionSettings,
    message: &MessageBuilder,
    debug: bool,
) -> anyhow::Result<()> {
    let transmitter = Transmitter::new(settings);

    match transmitter.send(message, debug).await {
        SendReport::Delivered => println!("Sent."),
        SendReport::DryRun => {
            println!("{message}");
            println!("\nDev mode: message not sent.");
        }
        SendReport::Failed(reason) => anyhow::bail!("Failed to send email: {reason}"),
    }

    Ok(())
}

async fn cmd_inbox(settings: ConnectionSettings, mark_seen: bool, json: bool) -> anyhow::Result<()> {
    let mut reader = MailboxReader::new(settings)?;

    let inbox = reader
        .session(async |reader| {
            let inbox = reader.get_inbox().await?.to_vec();
            if mark_seen {
                for (id, _) in &inbox {
                    reader
                        .store(id.as_str(), StoreCommand::Add, &[Flag::Seen])
                        .await?;
                }
            }
            Ok(inbox)
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inbox)?);
    } else {
        print_inbox_table(&inbox);
    }

    Ok(())
}

async fn cmd_store(
    settings: ConnectionSettings,
    message_set: &str,
    command: StoreCommand,
    flags: &[Flag],
) -> anyhow::Result<()> {
    let mut reader = MailboxReader::new(settings)?;

    reader
        .session(async |reader| {
            reader.select(Folder::Inbox).await?;
            reader.store(message_set, command, flags).await
        })
        .await?;

    println!("{} {}", message_set, command.query(flags));
    Ok(())
}

fn print_inbox_table(inbox: &[(MessageId, ParsedMail)]) {
    if inbox.is_empty() {
        println!("No emails found.");
        return;
    }

    println!("{:<8} {:<20} {:<30} Subject", "ID", "Date", "From");
    println!("{}", "-".repeat(100));

    for (id, mail) in inbox {
        let date = mail
            .date
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string());
        let from = mail
            .from
            .first()
            .map_or_else(String::new, ToString::to_string);
        println!(
            "{:<8} {:<20} {:<30} {}",
            id.as_str(),
            date,
            truncate(&from, 28),
            truncate(mail.subject.as_deref().unwrap_or(""), 40),
        );
    }

    println!("\n{} email(s)", inbox.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
