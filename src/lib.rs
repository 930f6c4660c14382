/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! # quickmail
//!
//! _quickmail_ is an interactive command-line tool that collects sender credentials,
//! an SMTP endpoint and the fields of a message from the operator, then composes and
//! submits the message over an authenticated, encrypted SMTP session.
//!
//! - Simple Mail Transfer Protocol (**SMTP**; _RFC 5321_) submission.
//! - Mandatory upgrade with **STARTTLS** (_RFC 3207_). Servers that do not offer it are refused.
//! - SMTP Authentication (_RFC 4954_) with automatic mechanism negotiation:
//!   - CRAM-MD5 (_RFC 2195_)
//!   - LOGIN
//!   - PLAIN
//! - Messages generated with [`mail-builder`](https://crates.io/crates/mail-builder).
//!
//! ## Usage Example
//!
//! ```rust
//!     let config = Config::load(None).unwrap();
//!     let mut console = Console::default();
//!
//!     // Resolve credentials and endpoint, prompting for anything missing,
//!     // then connect, upgrade to TLS and authenticate.
//!     let session = SessionBootstrapper::new(config)
//!         .bootstrap(&mut console)
//!         .await
//!         .unwrap();
//!
//!     // Walk the operator through recipient, subject, body and final review
//!     // until they decline another message, then say QUIT.
//!     session.run(&mut console, Capabilities::default()).await.unwrap();
//! ```
//!

#![forbid(unsafe_code)]

pub mod address;
pub mod composer;
pub mod config;
pub mod session;
pub mod smtp;
pub mod terminal;

use std::{fmt::Display, hash::Hash, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

pub use mail_builder;
pub use smtp_proto;

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(Box<rustls::Error>),

    /// Base64 decode error
    Base64(base64::DecodeError),

    /// SMTP authentication error.
    Auth(smtp::auth::Error),

    /// Failure parsing SMTP reply
    UnparseableReply,

    /// Unexpected SMTP reply.
    UnexpectedReply(smtp_proto::Response<String>),

    /// SMTP authentication failure.
    AuthenticationFailed(smtp_proto::Response<String>),

    /// Invalid TLS name provided.
    InvalidTLSName,

    /// The server does not advertise STARTTLS.
    MissingStartTls,

    /// The server does no support any of the available authentication methods.
    UnsupportedAuthMechanism,

    /// Connection timeout.
    Timeout,

    /// Missing message sender.
    MissingMailFrom,

    /// Missing message recipients.
    MissingRcptTo,

    /// Missing or empty message subject.
    MissingSubject,

    /// The SMTP port is not a number between 1 and 65535.
    InvalidPort(String),

    /// Connecting, upgrading to TLS or authenticating failed.
    ConnectionFailed(Box<Error>),

    /// The server did not accept the message.
    TransmissionFailed(Box<Error>),

    /// Configuration file error.
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// SMTP client.
pub struct SmtpClient<T: AsyncRead + AsyncWrite, U = ()> {
    pub stream: T,
    pub timeout: Duration,
    pub capabilities: U,
}

/// Prepares an SMTP submission session against a single endpoint.
#[derive(Clone)]
pub struct SmtpClientBuilder<T: AsRef<str> + Clone> {
    pub timeout: Duration,
    pub tls_connector: TlsConnector,
    pub tls_hostname: T,
    pub addr: String,
    pub local_host: String,
}

/// Login credentials. The secret is never displayed.
#[derive(Clone)]
pub struct Credentials<T: AsRef<str> + PartialEq + Eq + Hash> {
    username: T,
    secret: SecretString,
}

impl<T: AsRef<str> + PartialEq + Eq + Hash> Credentials<T> {
    /// Creates a new `Credentials` instance.
    pub fn new(username: T, secret: SecretString) -> Credentials<T> {
        Credentials { username, secret }
    }

    pub fn username(&self) -> &str {
        self.username.as_ref()
    }

    pub(crate) fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

impl<T: AsRef<str> + PartialEq + Eq + Hash> std::fmt::Debug for Credentials<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username.as_ref())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Error {
    /// Whether the error was raised while setting up the session.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::ConnectionFailed(_))
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(ref err) => err.source(),
            Error::Tls(ref err) => err.source(),
            Error::Base64(ref err) => err.source(),
            Error::ConnectionFailed(ref err) | Error::TransmissionFailed(ref err) => {
                Some(err.as_ref())
            }
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Tls(e) => write!(f, "TLS error: {e}"),
            Error::Base64(e) => write!(f, "Base64 decode error: {e}"),
            Error::Auth(e) => write!(f, "SMTP authentication error: {e}"),
            Error::UnparseableReply => write!(f, "Unparseable SMTP reply"),
            Error::UnexpectedReply(e) => {
                write!(f, "Unexpected reply: {} {}", e.code(), e.message())
            }
            Error::AuthenticationFailed(e) => {
                write!(f, "Authentication failed: {} {}", e.code(), e.message())
            }
            Error::InvalidTLSName => write!(f, "Invalid TLS name provided"),
            Error::MissingStartTls => write!(f, "STARTTLS extension not supported by the server"),
            Error::UnsupportedAuthMechanism => write!(
                f,
                "The server does no support any of the available authentication methods"
            ),
            Error::Timeout => write!(f, "Connection timeout"),
            Error::MissingMailFrom => write!(f, "Missing message sender"),
            Error::MissingRcptTo => write!(f, "Missing message recipients"),
            Error::MissingSubject => write!(f, "Missing message subject"),
            Error::InvalidPort(port) => write!(f, "Invalid SMTP port {port:?}"),
            Error::ConnectionFailed(e) => write!(f, "Couldn't make SMTP connection: {e}"),
            Error::TransmissionFailed(e) => write!(f, "Message could not be sent: {e}"),
            Error::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::Base64(err)
    }
}

impl From<smtp::auth::Error> for Error {
    fn from(err: smtp::auth::Error) -> Self {
        Error::Auth(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
