/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use smtp_proto::{
    response::parser::{ResponseReceiver, MAX_RESPONSE_LENGTH},
    EhloResponse,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::SmtpClient;

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T> {
    /// Sends a EHLO command to the server.
    pub async fn ehlo(&mut self, hostname: &str) -> crate::Result<EhloResponse<String>> {
        tokio::time::timeout(self.timeout, async {
            log::trace!("C: EHLO {hostname}");
            self.stream
                .write_all(format!("EHLO {hostname}\r\n").as_bytes())
                .await?;
            self.stream.flush().await?;
            self.read_ehlo().await
        })
        .await
        .map_err(|_| crate::Error::Timeout)?
    }

    /// Upgrades this client into one that remembers the server capabilities.
    pub fn with_capabilities(
        self,
        capabilities: EhloResponse<String>,
    ) -> SmtpClient<T, EhloResponse<String>> {
        SmtpClient {
            stream: self.stream,
            timeout: self.timeout,
            capabilities,
        }
    }

    pub async fn read_ehlo(&mut self) -> crate::Result<EhloResponse<String>> {
        let mut buf = vec![0u8; 1024];
        let mut buf_concat = Vec::with_capacity(0);

        loop {
            let br = self.stream.read(&mut buf).await?;

            if br == 0 {
                return Err(crate::Error::UnparseableReply);
            }
            let mut iter = if buf_concat.is_empty() {
                buf[..br].iter()
            } else if br + buf_concat.len() < MAX_RESPONSE_LENGTH {
                buf_concat.extend_from_slice(&buf[..br]);
                buf_concat.iter()
            } else {
                return Err(crate::Error::UnparseableReply);
            };

            match EhloResponse::parse(&mut iter) {
                Ok(reply) => return Ok(reply),
                Err(err) => match err {
                    smtp_proto::Error::NeedsMoreData { .. } => {
                        if buf_concat.is_empty() {
                            buf_concat = buf[..br].to_vec();
                        }
                    }
                    smtp_proto::Error::InvalidResponse { code } => {
                        match ResponseReceiver::from_code(code).parse(&mut iter) {
                            Ok(response) => {
                                return Err(crate::Error::UnexpectedReply(response));
                            }
                            Err(smtp_proto::Error::NeedsMoreData { .. }) => {
                                if buf_concat.is_empty() {
                                    buf_concat = buf[..br].to_vec();
                                }
                            }
                            Err(_) => return Err(crate::Error::UnparseableReply),
                        }
                    }
                    _ => {
                        return Err(crate::Error::UnparseableReply);
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use smtp_proto::{AUTH_LOGIN, AUTH_PLAIN, EXT_START_TLS};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::SmtpClient;

    #[tokio::test]
    async fn ehlo_capabilities() {
        let (client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut buf = vec![0u8; 128];
            let n = server_io.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"EHLO client.test\r\n");
            server_io
                .write_all(
                    concat!(
                        "250-mx.example.com at your service\r\n",
                        "250-SIZE 35882577\r\n",
                        "250-STARTTLS\r\n",
                        "250 AUTH LOGIN PLAIN\r\n"
                    )
                    .as_bytes(),
                )
                .await
                .unwrap();
        });

        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
            capabilities: (),
        };
        let response = client.ehlo("client.test").await.unwrap();
        server.await.unwrap();

        assert!(response.has_capability(EXT_START_TLS));
        assert_ne!(response.auth_mechanisms & AUTH_LOGIN, 0);
        assert_ne!(response.auth_mechanisms & AUTH_PLAIN, 0);
    }

    #[tokio::test]
    async fn ehlo_rejected() {
        let (client_io, mut server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut buf = vec![0u8; 128];
            let _ = server_io.read(&mut buf).await.unwrap();
            server_io
                .write_all(b"554 5.7.1 Go away\r\n")
                .await
                .unwrap();
        });

        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
            capabilities: (),
        };
        match client.ehlo("client.test").await {
            Err(crate::Error::UnexpectedReply(reply)) => assert_eq!(reply.code(), 554),
            other => panic!("Unexpected result {:?}", other.map(|_| ())),
        }
        server.await.unwrap();
    }
}
