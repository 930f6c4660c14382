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

use std::borrow::Cow;

use smtp_proto::EhloResponse;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::SmtpClient;

/// A message ready for submission: the SMTP envelope plus the
/// serialized RFC 5322 message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Message<'x> {
    pub mail_from: Cow<'x, str>,
    pub rcpt_to: Vec<Cow<'x, str>>,
    pub body: Cow<'x, [u8]>,
}

impl<'x> Message<'x> {
    /// Create a new message
    pub fn new<T, U, V>(from: T, to: U, body: V) -> Self
    where
        T: Into<Cow<'x, str>>,
        U: IntoIterator<Item = T>,
        V: Into<Cow<'x, [u8]>>,
    {
        Message {
            mail_from: from.into(),
            rcpt_to: to.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }

    /// The serialized message as text, as shown to the operator for review.
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Something that can hand a finished message to a mail server.
#[allow(async_fn_in_trait)]
pub trait Transmit {
    async fn transmit(&mut self, message: &Message<'_>) -> crate::Result<()>;
}

impl<T: AsyncRead + AsyncWrite + Unpin> SmtpClient<T, EhloResponse<String>> {
    /// Sends a message to the server.
    pub async fn send(&mut self, message: &Message<'_>) -> crate::Result<()> {
        if message.mail_from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        } else if message.rcpt_to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }

        self.mail_from(message.mail_from.as_ref()).await?;
        for rcpt in &message.rcpt_to {
            self.rcpt_to(rcpt.as_ref()).await?;
        }
        self.data(message.body.as_ref()).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> Transmit for SmtpClient<T, EhloResponse<String>> {
    async fn transmit(&mut self, message: &Message<'_>) -> crate::Result<()> {
        self.send(message).await
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use smtp_proto::EhloResponse;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::SmtpClient;

    use super::{Message, Transmit};

    #[tokio::test]
    async fn submit_message() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut server_io = BufReader::new(server_io);
            let mut received = Vec::new();
            let mut in_data = false;
            let mut line = String::new();
            loop {
                line.clear();
                if server_io.read_line(&mut line).await.unwrap() == 0 {
                    break;
                }
                received.push(line.clone());
                let reply: &[u8] = if in_data {
                    if line == ".\r\n" {
                        in_data = false;
                        b"250 2.0.0 Queued\r\n"
                    } else {
                        continue;
                    }
                } else if line == "DATA\r\n" {
                    in_data = true;
                    b"354 Go ahead\r\n"
                } else {
                    b"250 2.1.0 OK\r\n"
                };
                server_io.get_mut().write_all(reply).await.unwrap();
            }
            received.concat()
        });

        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
            capabilities: EhloResponse::default(),
        };
        let message = Message::new(
            "me@example.com",
            ["alice@example.com", "bob@example.com"],
            &b"Subject: Hi\r\n\r\n.dot\r\n"[..],
        );
        client.transmit(&message).await.unwrap();
        drop(client);

        assert_eq!(
            server.await.unwrap(),
            concat!(
                "MAIL FROM:<me@example.com>\r\n",
                "RCPT TO:<alice@example.com>\r\n",
                "RCPT TO:<bob@example.com>\r\n",
                "DATA\r\n",
                "Subject: Hi\r\n",
                "\r\n",
                "..dot\r\n",
                ".\r\n"
            )
        );
    }

    #[tokio::test]
    async fn rejected_recipient() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let server = tokio::spawn(async move {
            let mut server_io = BufReader::new(server_io);
            let mut line = String::new();
            for reply in [&b"250 OK\r\n"[..], b"550 5.1.1 No such user\r\n"] {
                line.clear();
                server_io.read_line(&mut line).await.unwrap();
                server_io.get_mut().write_all(reply).await.unwrap();
            }
        });

        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
            capabilities: EhloResponse::default(),
        };
        let message = Message::new("me@example.com", ["nobody@example.com"], &b"Hi"[..]);
        match client.send(&message).await {
            Err(crate::Error::UnexpectedReply(reply)) => assert_eq!(reply.code(), 550),
            other => panic!("Unexpected result {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_envelope() {
        let (client_io, _server_io) = tokio::io::duplex(64);
        let mut client = SmtpClient {
            stream: client_io,
            timeout: Duration::from_secs(5),
            capabilities: EhloResponse::default(),
        };
        assert!(matches!(
            client
                .send(&Message::new("me@example.com", Vec::<&str>::new(), &b""[..]))
                .await,
            Err(crate::Error::MissingRcptTo)
        ));
    }
}
