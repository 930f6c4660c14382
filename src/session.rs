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

//! Session bootstrap: resolve credentials and the SMTP endpoint, either from
//! configuration or by asking the operator, then open one authenticated
//! STARTTLS connection.

use smtp_proto::EhloResponse;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

use crate::{
    address::is_valid_email,
    composer::{ask_send_another, MessageComposer},
    config::{Capabilities, Config},
    terminal::Terminal,
    Credentials, SmtpClient, SmtpClientBuilder,
};

pub type Connection = SmtpClient<TlsStream<TcpStream>, EhloResponse<String>>;

/// Where to submit messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parses a port given as text. Zero and non-numeric values are rejected.
    pub fn new(host: impl Into<String>, port: &str) -> crate::Result<Self> {
        match port.trim().parse::<u16>() {
            Ok(port) if port != 0 => Ok(Endpoint {
                host: host.into(),
                port,
            }),
            _ => Err(crate::Error::InvalidPort(port.to_string())),
        }
    }
}

/// An authenticated connection. [`Session::run`] and [`Session::close`]
/// both end it with QUIT.
pub struct Session<S: AsyncRead + AsyncWrite = TlsStream<TcpStream>> {
    client: SmtpClient<S, EhloResponse<String>>,
    username: String,
    endpoint: Endpoint,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Composes and sends messages until the operator declines another one.
    /// The connection is closed whether the loop ends normally or not.
    pub async fn run<T: Terminal + ?Sized>(
        mut self,
        term: &mut T,
        capabilities: Capabilities,
    ) -> crate::Result<()> {
        let composer = MessageComposer::new(self.username.as_str(), capabilities);
        let result = self.send_until_declined(term, &composer).await;
        self.close().await;
        result
    }

    async fn send_until_declined<T: Terminal + ?Sized>(
        &mut self,
        term: &mut T,
        composer: &MessageComposer,
    ) -> crate::Result<()> {
        loop {
            composer.compose_and_send(term, &mut self.client).await?;
            if !ask_send_another(term)? {
                return Ok(());
            }
        }
    }

    /// Says QUIT and drops the connection. Failures are only logged since
    /// the socket is released either way.
    pub async fn close(self) {
        match self.client.quit().await {
            Ok(()) => log::debug!("Closed connection to {}", self.endpoint.host),
            Err(err) => log::debug!(
                "Connection to {} closed uncleanly: {}",
                self.endpoint.host,
                err
            ),
        }
    }
}

pub struct SessionBootstrapper {
    config: Config,
}

impl SessionBootstrapper {
    pub fn new(config: Config) -> Self {
        SessionBootstrapper { config }
    }

    /// Resolves credentials and endpoint, connects and authenticates.
    pub async fn bootstrap<T: Terminal + ?Sized>(&self, term: &mut T) -> crate::Result<Session> {
        let credentials = self.resolve_credentials(term)?;
        let endpoint = self.resolve_endpoint(term)?;
        let client = self.connect(&endpoint).await?;
        self.login(term, client, &credentials, endpoint).await
    }

    /// Uses the configured username and password when both are present,
    /// otherwise asks for both.
    pub fn resolve_credentials<T: Terminal + ?Sized>(
        &self,
        term: &mut T,
    ) -> crate::Result<Credentials<String>> {
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            if !self.config.capabilities.validate_presupplied || is_valid_email(username) {
                log::debug!("Using configured credentials for {username}");
                return Ok(Credentials::new(username.clone(), password.clone()));
            }
            log::warn!("Configured username {username:?} is not a valid address");
            term.say(">>> The configured username is not a valid email address.")?;
        }

        let username = loop {
            let username = term.prompt(">>> Please enter your username: ")?;
            if is_valid_email(&username) {
                break username;
            }
            term.say(">>> Please use a valid email address.")?;
        };
        let password = term.prompt_secret(">>> Please enter your password: ")?;

        Ok(Credentials::new(username, password))
    }

    /// Uses the configured host and port when both are present, otherwise
    /// asks for both.
    pub fn resolve_endpoint<T: Terminal + ?Sized>(&self, term: &mut T) -> crate::Result<Endpoint> {
        if let (Some(host), Some(port)) = (&self.config.host, &self.config.port) {
            return Endpoint::new(host.as_str(), port);
        }

        let host = term.prompt(">>> Please enter the SMTP server address: ")?;
        let port = term.prompt(">>> Please enter the SMTP port: ")?;
        Endpoint::new(host, &port)
    }

    /// Connects and upgrades with STARTTLS. Failures are reported as
    /// [`crate::Error::ConnectionFailed`].
    pub async fn connect(&self, endpoint: &Endpoint) -> crate::Result<Connection> {
        let mut builder = SmtpClientBuilder::new(endpoint.host.as_str(), endpoint.port)
            .timeout(self.config.timeout);
        if let Some(helo_host) = &self.config.helo_host {
            builder = builder.helo_host(helo_host.as_str());
        }

        let client = builder
            .connect()
            .await
            .map_err(|err| connection_failed(endpoint, err))?;
        log::debug!(
            "Negotiated {:?} with {}",
            client.tls_connection().protocol_version(),
            endpoint.host
        );
        Ok(client)
    }

    /// Authenticates an established connection and announces it. A rejected
    /// login says QUIT before failing with [`crate::Error::ConnectionFailed`].
    pub async fn login<T: Terminal + ?Sized, S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        term: &mut T,
        mut client: SmtpClient<S, EhloResponse<String>>,
        credentials: &Credentials<String>,
        endpoint: Endpoint,
    ) -> crate::Result<Session<S>> {
        let auth = client.authenticate(credentials).await.map(|_| ());
        if let Err(err) = auth {
            if let Err(quit_err) = client.quit().await {
                log::debug!("QUIT after failed login to {}: {quit_err}", endpoint.host);
            }
            return Err(connection_failed(&endpoint, err));
        }

        term.say(&format!(">>> Connected to {}.", endpoint.host))?;
        Ok(Session {
            client,
            username: credentials.username().to_string(),
            endpoint,
        })
    }
}

fn connection_failed(endpoint: &Endpoint, err: crate::Error) -> crate::Error {
    log::debug!(
        "Connection to {}:{} failed: {err}",
        endpoint.host,
        endpoint.port
    );
    crate::Error::ConnectionFailed(Box::new(err))
}
