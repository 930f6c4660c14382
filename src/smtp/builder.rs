/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::time::Duration;

use smtp_proto::{EhloResponse, EXT_START_TLS};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::{SmtpClient, SmtpClientBuilder};

use super::{tls::build_tls_connector, AssertReply};

impl<T: AsRef<str> + Clone> SmtpClientBuilder<T> {
    pub fn new(hostname: T, port: u16) -> Self {
        SmtpClientBuilder {
            addr: format!("{}:{}", hostname.as_ref(), port),
            timeout: Duration::from_secs(60),
            tls_connector: build_tls_connector(),
            tls_hostname: hostname,
            local_host: gethostname::gethostname()
                .to_str()
                .unwrap_or("[127.0.0.1]")
                .to_string(),
        }
    }

    /// Set the EHLO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the SMTP connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Connects in clear text, says EHLO and upgrades with STARTTLS.
    /// A server that does not offer STARTTLS is rejected.
    pub async fn connect(
        &self,
    ) -> crate::Result<SmtpClient<TlsStream<TcpStream>, EhloResponse<String>>> {
        tokio::time::timeout(self.timeout, async {
            log::debug!("Connecting to {}", self.addr);
            let mut client = SmtpClient {
                stream: TcpStream::connect(&self.addr).await?,
                timeout: self.timeout,
                capabilities: (),
            };

            // Read greeting
            client.read().await?.assert_positive_completion()?;

            let mut client = self.starttls(client).await?;
            let capabilities = client.ehlo(&self.local_host).await?;

            Ok(client.with_capabilities(capabilities))
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    async fn starttls(
        &self,
        mut client: SmtpClient<TcpStream>,
    ) -> crate::Result<SmtpClient<TlsStream<TcpStream>>> {
        let response = client.ehlo(&self.local_host).await?;
        if response.has_capability(EXT_START_TLS) {
            client
                .start_tls(&self.tls_connector, self.tls_hostname.as_ref())
                .await
        } else {
            Err(crate::Error::MissingStartTls)
        }
    }
}
