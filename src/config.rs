//! Connection settings shared by the SMTP and IMAP pipelines

use crate::error::{Error, Result};
use std::{env, fmt};

/// Credentials, endpoint and mode for one mail server.
///
/// Settings are immutable once built. Both [`Transmitter`] and
/// [`MailboxReader`] borrow them.
///
/// [`Transmitter`]: crate::Transmitter
/// [`MailboxReader`]: crate::MailboxReader
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    username: String,
    password: String,
    host: String,
    port: u16,
    dev_mode: bool,
}

impl ConnectionSettings {
    /// Build settings from explicit values.
    ///
    /// `port` may be an integer or an integer-valued string.
    /// `dev_mode` accepts `true`, `1`, `"1"`, `"True"` and `"true"` as
    /// enabled; every other value disables it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the port is not a positive integer
    /// that fits in a `u16`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mail_facade::ConnectionSettings;
    ///
    /// let a = ConnectionSettings::new("me@example.com", "pw", "smtp.example.com", 587, "true")?;
    /// let b = ConnectionSettings::new("me@example.com", "pw", "smtp.example.com", "587", 1)?;
    /// assert_eq!(a, b);
    /// assert!(a.dev_mode());
    /// # Ok::<(), mail_facade::Error>(())
    /// ```
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: impl PortValue,
        dev_mode: impl DevModeValue,
    ) -> Result<Self> {
        Ok(Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            port: port.to_port()?,
            dev_mode: dev_mode.is_enabled(),
        })
    }

    /// Load settings from environment variables
    ///
    /// Reads from `.env` file if present. With `prefix = "SMTP"`:
    /// - `SMTP_USERNAME` (required)
    /// - `SMTP_PASSWORD` (required)
    /// - `SMTP_HOST` (default: `127.0.0.1`)
    /// - `SMTP_PORT` (default: `default_port`)
    /// - `SMTP_DEV_MODE` (default: disabled)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// the port is malformed.
    pub fn from_env(prefix: &str, default_port: u16) -> Result<Self> {
        dotenvy::dotenv().ok();

        let var = |name: &str| env::var(format!("{prefix}_{name}"));

        let port = match var("PORT") {
            Ok(raw) => raw
                .to_port()
                .map_err(|e| Error::Config(format!("Invalid {prefix}_PORT: {e}")))?,
            Err(_) => default_port,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            username: var("USERNAME")
                .map_err(|_| Error::Config(format!("{prefix}_USERNAME not set")))?,
            password: var("PASSWORD")
                .map_err(|_| Error::Config(format!("{prefix}_PASSWORD not set")))?,
            dev_mode: var("DEV_MODE").is_ok_and(|v| v.is_enabled()),
        })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// When set, sends are dry runs that never touch the network.
    #[must_use]
    pub const fn dev_mode(&self) -> bool {
        self.dev_mode
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

/// A value that can be coerced into a TCP port.
pub trait PortValue {
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless the value is an integer in
    /// `1..=65535`.
    fn to_port(&self) -> Result<u16>;
}

fn invalid_port(value: impl fmt::Display) -> Error {
    Error::Config(format!(
        "Port must be a positive integer or integer string, got '{value}'"
    ))
}

macro_rules! int_port_value {
    ($($t:ty),*) => {
        $(
            impl PortValue for $t {
                fn to_port(&self) -> Result<u16> {
                    u16::try_from(*self)
                        .ok()
                        .filter(|port| *port > 0)
                        .ok_or_else(|| invalid_port(self))
                }
            }
        )*
    };
}

int_port_value!(u16, u32, u64, usize, i32, i64);

impl PortValue for str {
    fn to_port(&self) -> Result<u16> {
        self.trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port > 0)
            .ok_or_else(|| invalid_port(self))
    }
}

impl PortValue for &str {
    fn to_port(&self) -> Result<u16> {
        (**self).to_port()
    }
}

impl PortValue for String {
    fn to_port(&self) -> Result<u16> {
        self.as_str().to_port()
    }
}

/// A value interpreted as the dev-mode switch.
///
/// Truthy values are `true`, the integer `1`, and the strings `"1"`,
/// `"True"` and `"true"`.
pub trait DevModeValue {
    fn is_enabled(&self) -> bool;
}

impl DevModeValue for bool {
    fn is_enabled(&self) -> bool {
        *self
    }
}

macro_rules! int_dev_mode_value {
    ($($t:ty),*) => {
        $(
            impl DevModeValue for $t {
                fn is_enabled(&self) -> bool {
                    *self == 1
                }
            }
        )*
    };
}

int_dev_mode_value!(u8, u16, u32, u64, usize, i32, i64);

impl DevModeValue for str {
    fn is_enabled(&self) -> bool {
        matches!(self, "1" | "True" | "true")
    }
}

impl DevModeValue for &str {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

impl DevModeValue for String {
    fn is_enabled(&self) -> bool {
        self.as_str().is_enabled()
    }
}
