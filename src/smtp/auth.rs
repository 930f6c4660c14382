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

use std::{fmt::Display, hash::Hash};

use base64::{engine::general_purpose::STANDARD, Engine};
#[cfg(feature = "cram-md5")]
use smtp_proto::AUTH_CRAM_MD5;
use smtp_proto::{EhloResponse, AUTH_LOGIN, AUTH_PLAIN};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{Credentials, SmtpClient};

/// Mechanisms in order of preference, strongest first.
const MECHANISMS: &[u64] = &[
    #[cfg(feature = "cram-md5")]
    AUTH_CRAM_MD5,
    AUTH_LOGIN,
    AUTH_PLAIN,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    InvalidChallenge,
    UnsupportedMechanism,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidChallenge => write!(f, "Invalid challenge received."),
            Error::UnsupportedMechanism => write!(f, "Unsupported authentication mechanism."),
        }
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T, EhloResponse<String>> {
    /// Authenticates using the strongest mechanism both sides support.
    pub async fn authenticate<U: AsRef<str> + PartialEq + Eq + Hash>(
        &mut self,
        credentials: &Credentials<U>,
    ) -> crate::Result<&mut Self> {
        let available = self.capabilities.auth_mechanisms;
        let mut last_err = None;

        for &mechanism in MECHANISMS {
            if available & mechanism == 0 {
                continue;
            }
            log::debug!("Authenticating with {}", mechanism_name(mechanism));
            match self.auth(mechanism, credentials).await {
                Ok(_) => return Ok(self),
                // 504: the server refused this mechanism, try the next one.
                Err(crate::Error::AuthenticationFailed(reply)) if reply.code() == 504 => {
                    last_err = Some(crate::Error::AuthenticationFailed(reply));
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(crate::Error::UnsupportedAuthMechanism))
    }

    pub(crate) async fn auth<U: AsRef<str> + PartialEq + Eq + Hash>(
        &mut self,
        mechanism: u64,
        credentials: &Credentials<U>,
    ) -> crate::Result<()> {
        let mut reply = if mechanism == AUTH_PLAIN {
            self.cmd(
                format!(
                    "AUTH {} {}\r\n",
                    mechanism_name(mechanism),
                    credentials.encode(mechanism, "")?,
                )
                .as_bytes(),
            )
            .await?
        } else {
            self.cmd(format!("AUTH {}\r\n", mechanism_name(mechanism)).as_bytes())
                .await?
        };

        // LOGIN needs two round trips, the rest at most one.
        for _ in 0..3 {
            match reply.code() {
                334 => {
                    reply = self
                        .cmd(format!("{}\r\n", credentials.encode(mechanism, reply.message())?).as_bytes())
                        .await?;
                }
                235 => {
                    return Ok(());
                }
                _ => {
                    return Err(crate::Error::AuthenticationFailed(reply));
                }
            }
        }

        Err(crate::Error::UnexpectedReply(reply))
    }
}

fn mechanism_name(mechanism: u64) -> &'static str {
    match mechanism {
        AUTH_PLAIN => "PLAIN",
        AUTH_LOGIN => "LOGIN",
        #[cfg(feature = "cram-md5")]
        AUTH_CRAM_MD5 => "CRAM-MD5",
        _ => "UNKNOWN",
    }
}

impl<T: AsRef<str> + PartialEq + Eq + Hash> Credentials<T> {
    pub(crate) fn encode(&self, mechanism: u64, challenge: &str) -> crate::Result<String> {
        Ok(STANDARD.encode(
            match mechanism {
                AUTH_PLAIN => {
                    format!("\u{0}{}\u{0}{}", self.username(), self.secret())
                }

                AUTH_LOGIN => {
                    let challenge = STANDARD.decode(challenge.trim())?;

                    if b"user name"
                        .eq_ignore_ascii_case(challenge.get(0..9).ok_or(Error::InvalidChallenge)?)
                        || b"username".eq_ignore_ascii_case(
                            // Because Google makes its own standards
                            challenge.get(0..8).ok_or(Error::InvalidChallenge)?,
                        )
                    {
                        self.username()
                    } else if b"password"
                        .eq_ignore_ascii_case(challenge.get(0..8).ok_or(Error::InvalidChallenge)?)
                    {
                        self.secret()
                    } else {
                        return Err(Error::InvalidChallenge.into());
                    }
                    .to_string()
                }

                #[cfg(feature = "cram-md5")]
                AUTH_CRAM_MD5 => {
                    let secret = self.secret().as_bytes();
                    let mut secret_opad: Vec<u8> = vec![0x5c; 64];
                    let mut secret_ipad: Vec<u8> = vec![0x36; 64];

                    if secret.len() < 64 {
                        for (pos, byte) in secret.iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    } else {
                        for (pos, byte) in md5::compute(secret).iter().enumerate() {
                            secret_opad[pos] = *byte ^ 0x5c;
                            secret_ipad[pos] = *byte ^ 0x36;
                        }
                    }

                    secret_ipad.extend_from_slice(&STANDARD.decode(challenge.trim())?);
                    secret_opad.extend_from_slice(&md5::compute(&secret_ipad).0);

                    format!("{} {:x}", self.username(), md5::compute(&secret_opad))
                }

                _ => return Err(Error::UnsupportedMechanism.into()),
            }
            .as_bytes(),
        ))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use secrecy::SecretString;
    use smtp_proto::{EhloResponse, AUTH_LOGIN, AUTH_PLAIN};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::{Credentials, SmtpClient};

    fn credentials(username: &str, secret: &str) -> Credentials<String> {
        Credentials::new(username.to_string(), SecretString::new(secret.to_string()))
    }

    #[test]
    fn auth_encode() {
        // Challenge-Response Authentication Mechanism (CRAM)
        #[cfg(feature = "cram-md5")]
        assert_eq!(
            credentials("tim", "tanstaaftanstaaf")
                .encode(
                    smtp_proto::AUTH_CRAM_MD5,
                    "PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+",
                )
                .unwrap(),
            "dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw"
        );

        // Login
        assert_eq!(
            credentials("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "VXNlciBOYW1lAA==",)
                .unwrap(),
            "dGlt"
        );
        assert_eq!(
            credentials("tim", "tanstaaftanstaaf")
                .encode(AUTH_LOGIN, "UGFzc3dvcmQA",)
                .unwrap(),
            "dGFuc3RhYWZ0YW5zdGFhZg=="
        );
        assert!(credentials("tim", "tanstaaftanstaaf")
            .encode(AUTH_LOGIN, "SGVsbG8=")
            .is_err());

        // Plain
        assert_eq!(
            credentials("tim", "tanstaaftanstaaf")
                .encode(AUTH_PLAIN, "",)
                .unwrap(),
            "AHRpbQB0YW5zdGFhZnRhbnN0YWFm"
        );
    }

    fn client_with_mechanisms(
        stream: tokio::io::DuplexStream,
        mechanisms: u64,
    ) -> SmtpClient<tokio::io::DuplexStream, EhloResponse<String>> {
        let mut capabilities = EhloResponse::default();
        capabilities.auth_mechanisms = mechanisms;
        SmtpClient {
            stream,
            timeout: Duration::from_secs(5),
            capabilities,
        }
    }

    #[tokio::test]
    async fn login_exchange() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut server_io = BufReader::new(server_io);
            let mut line = String::new();
            let mut received = Vec::new();
            for reply in [
                "334 VXNlcm5hbWU6\r\n",
                "334 UGFzc3dvcmQ6\r\n",
                "235 2.7.0 Accepted\r\n",
            ] {
                line.clear();
                server_io.read_line(&mut line).await.unwrap();
                received.push(line.trim_end().to_string());
                server_io.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
            received
        });

        let mut client = client_with_mechanisms(client_io, AUTH_LOGIN | AUTH_PLAIN);
        client
            .authenticate(&credentials("tim", "tanstaaftanstaaf"))
            .await
            .unwrap();
        assert_eq!(
            server.await.unwrap(),
            vec!["AUTH LOGIN", "dGlt", "dGFuc3RhYWZ0YW5zdGFhZg=="]
        );
    }

    #[tokio::test]
    async fn rejected_credentials() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut server_io = BufReader::new(server_io);
            let mut line = String::new();
            server_io.read_line(&mut line).await.unwrap();
            server_io
                .get_mut()
                .write_all(b"535 5.7.8 Username and Password not accepted\r\n")
                .await
                .unwrap();
            line
        });

        let mut client = client_with_mechanisms(client_io, AUTH_PLAIN);
        match client.authenticate(&credentials("tim", "wrong")).await {
            Err(crate::Error::AuthenticationFailed(reply)) => assert_eq!(reply.code(), 535),
            other => panic!("Unexpected result {:?}", other.map(|_| ())),
        }
        assert_eq!(server.await.unwrap(), "AUTH PLAIN AHRpbQB3cm9uZw==\r\n");
    }

    #[tokio::test]
    async fn no_common_mechanism() {
        let (client_io, _server_io) = tokio::io::duplex(64);
        let mut client = client_with_mechanisms(client_io, 0);
        assert!(matches!(
            client.authenticate(&credentials("tim", "secret")).await,
            Err(crate::Error::UnsupportedAuthMechanism)
        ));
    }
}
