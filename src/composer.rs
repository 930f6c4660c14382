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

//! Interactive message composition.
//!
//! A message is assembled in four stages (recipients, subject, body, final
//! review). Each stage asks for confirmation and, on rejection, clears only
//! the field it owns before asking again.

use mail_builder::{headers::raw::Raw, MessageBuilder};

use crate::{
    address::{is_valid_email, join_recipients, parse_recipients},
    config::Capabilities,
    smtp::message::{Message, Transmit},
    terminal::{ask_yes_no, is_affirmative, Terminal},
};

/// A message being assembled. Unset fields are empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DraftMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl DraftMessage {
    pub fn new(from: impl Into<String>) -> Self {
        DraftMessage {
            from: from.into(),
            ..Default::default()
        }
    }

    /// Value of the `To` header.
    pub fn to_header(&self) -> String {
        join_recipients(&self.to)
    }

    /// Serializes the draft. The body may be empty, the subject may not.
    pub fn build(&self) -> crate::Result<Message<'static>> {
        if self.from.is_empty() {
            return Err(crate::Error::MissingMailFrom);
        } else if self.to.is_empty() {
            return Err(crate::Error::MissingRcptTo);
        }
        let subject = self
            .subject
            .as_deref()
            .filter(|subject| !subject.is_empty())
            .ok_or(crate::Error::MissingSubject)?;
        let body = self
            .body
            .as_deref()
            .unwrap_or_default()
            .replace("\r\n", "\n")
            .replace('\n', "\r\n");

        let contents = MessageBuilder::new()
            .header("From", Raw::new(self.from.as_str()))
            .header("To", Raw::new(self.to_header()))
            .subject(subject)
            .text_body(body)
            .write_to_vec()?;

        Ok(Message::new(
            self.from.clone(),
            self.to.iter().cloned(),
            contents,
        ))
    }
}

/// Walks the operator through one message at a time.
pub struct MessageComposer {
    from: String,
    capabilities: Capabilities,
}

impl MessageComposer {
    pub fn new(from: impl Into<String>, capabilities: Capabilities) -> Self {
        MessageComposer {
            from: from.into(),
            capabilities,
        }
    }

    /// Composes a message, transmits it and reports success.
    ///
    /// Transmission failures are not retried, they are returned as
    /// [`crate::Error::TransmissionFailed`] for the caller to treat as fatal.
    pub async fn compose_and_send<T: Terminal + ?Sized, S: Transmit + ?Sized>(
        &self,
        term: &mut T,
        transport: &mut S,
    ) -> crate::Result<()> {
        let message = self.compose(term)?;

        log::debug!(
            "Submitting {} bytes to {} recipient(s)",
            message.body.len(),
            message.rcpt_to.len()
        );
        transport
            .transmit(&message)
            .await
            .map_err(|err| crate::Error::TransmissionFailed(Box::new(err)))?;

        term.say(">>> Message sent.")
    }

    /// Runs all four stages and returns the confirmed message.
    pub fn compose<T: Terminal + ?Sized>(&self, term: &mut T) -> crate::Result<Message<'static>> {
        let mut draft = DraftMessage::new(self.from.as_str());

        self.recipient_stage(term, &mut draft)?;
        self.subject_stage(term, &mut draft)?;
        self.body_stage(term, &mut draft)?;
        self.review_stage(term, &draft)
    }

    pub fn recipient_stage<T: Terminal + ?Sized>(
        &self,
        term: &mut T,
        draft: &mut DraftMessage,
    ) -> crate::Result<()> {
        loop {
            draft.to = self.read_recipients(term)?;
            if ask_yes_no(
                term,
                &format!(">>> Is this correct? (Y/n) {} ", draft.to_header()),
            )? {
                return Ok(());
            }
            draft.to.clear();
        }
    }

    pub fn subject_stage<T: Terminal + ?Sized>(
        &self,
        term: &mut T,
        draft: &mut DraftMessage,
    ) -> crate::Result<()> {
        loop {
            let subject = loop {
                let subject = term.prompt(">>> Please enter your subject: ")?;
                if !subject.is_empty() {
                    break subject;
                }
                term.say(">>> Please enter a valid subject.")?;
            };
            let confirmed = ask_yes_no(term, &format!(">>> Is this correct? (Y/n) {subject} "))?;
            draft.subject = Some(subject);
            if confirmed {
                return Ok(());
            }
            draft.subject = None;
        }
    }

    pub fn body_stage<T: Terminal + ?Sized>(
        &self,
        term: &mut T,
        draft: &mut DraftMessage,
    ) -> crate::Result<()> {
        loop {
            let body = if self.capabilities.multiline_body {
                read_multiline(term)?
            } else {
                term.prompt(">>> Please enter your message: ")?
            };
            let confirmed = ask_yes_no(
                term,
                &format!(">>> Here is your message: {body}. Okay? (Y/n) "),
            )?;
            draft.body = Some(body);
            if confirmed {
                return Ok(());
            }
            draft.body = None;
        }
    }

    /// Shows the message exactly as it will be transmitted until the operator
    /// accepts it. The rendering is produced once, so declining and accepting
    /// later yields the same bytes.
    pub fn review_stage<T: Terminal + ?Sized>(
        &self,
        term: &mut T,
        draft: &DraftMessage,
    ) -> crate::Result<Message<'static>> {
        let message = draft.build()?;
        let prompt = format!(
            ">>> Here is your message:\n {}\nIs this okay? (Y/n) ",
            message.as_text()
        );

        while !ask_yes_no(term, &prompt)? {}

        Ok(message)
    }

    fn read_recipients<T: Terminal + ?Sized>(&self, term: &mut T) -> crate::Result<Vec<String>> {
        loop {
            let input = term.prompt(">>> Please enter the recipient: ")?;
            let recipients = if self.capabilities.multiple_recipients {
                parse_recipients(&input)
            } else {
                vec![input.trim().to_string()]
            };

            if recipients.iter().all(|recipient| is_valid_email(recipient)) {
                return Ok(recipients);
            }
            term.say(">>> Invalid email address. Please try again.")?;
        }
    }
}

/// Reads lines until an empty one and joins them with `\n`.
fn read_multiline<T: Terminal + ?Sized>(term: &mut T) -> crate::Result<String> {
    term.say(">>> Please enter your message (press Enter twice to finish):")?;

    let mut lines = Vec::new();
    loop {
        let line = term.prompt("")?;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

/// Asks whether to compose another message. Only a clear yes or no ends
/// the question; any other answer asks again rather than starting another
/// message.
pub fn ask_send_another<T: Terminal + ?Sized>(term: &mut T) -> crate::Result<bool> {
    loop {
        let answer = term.prompt(">>> Would you like to send another? (Y/n) ")?;
        if is_affirmative(&answer) {
            return Ok(true);
        } else if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
            return Ok(false);
        }
    }
}
