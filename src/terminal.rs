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

use std::io::{self, BufRead, IsTerminal, Stdout, StdinLock, Write};

use secrecy::SecretString;

/// Line oriented operator I/O.
pub trait Terminal {
    /// Prints a line.
    fn say(&mut self, line: &str) -> crate::Result<()>;

    /// Prints `text` and reads one line, without its line terminator.
    fn prompt(&mut self, text: &str) -> crate::Result<String>;

    /// Like [`Terminal::prompt`], but the typed characters are not echoed.
    fn prompt_secret(&mut self, text: &str) -> crate::Result<SecretString>;
}

/// `y` or `yes` in any case confirms, anything else (empty included) does not.
pub fn is_affirmative(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

/// Asks a yes/no question, see [`is_affirmative`].
pub fn ask_yes_no<T: Terminal + ?Sized>(term: &mut T, text: &str) -> crate::Result<bool> {
    term.prompt(text).map(|answer| is_affirmative(&answer))
}

/// Prints a fatal error, falling back to stderr when the terminal cannot be
/// written to.
pub fn report<T: Terminal + ?Sized>(term: &mut T, text: &str) {
    if let Err(err) = term.say(text) {
        log::debug!("Failed to write to the terminal: {err}");
        eprintln!("{text}");
    }
}

/// A terminal over a reader and a writer, stdin and stdout by default.
pub struct Console<R: BufRead, W: Write> {
    reader: R,
    writer: W,
    hide_secrets: bool,
}

impl Default for Console<StdinLock<'static>, Stdout> {
    fn default() -> Self {
        Console {
            reader: io::stdin().lock(),
            writer: io::stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// A console that never touches terminal modes, for pipes and tests.
    pub fn new(reader: R, writer: W) -> Self {
        Console {
            reader,
            writer,
            hide_secrets: false,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn read_line(&mut self) -> crate::Result<String> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input").into());
        }
        let len = line.trim_end_matches(&['\r', '\n'][..]).len();
        line.truncate(len);
        Ok(line)
    }
}

impl<R: BufRead, W: Write> Terminal for Console<R, W> {
    fn say(&mut self, line: &str) -> crate::Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush().map_err(Into::into)
    }

    fn prompt(&mut self, text: &str) -> crate::Result<String> {
        write!(self.writer, "{text}")?;
        self.writer.flush()?;
        self.read_line()
    }

    fn prompt_secret(&mut self, text: &str) -> crate::Result<SecretString> {
        write!(self.writer, "{text}")?;
        self.writer.flush()?;

        if self.hide_secrets && io::stdin().is_terminal() {
            rpassword::read_password()
                .map(SecretString::new)
                .map_err(Into::into)
        } else {
            self.read_line().map(SecretString::new)
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use secrecy::ExposeSecret;

    use super::{ask_yes_no, is_affirmative, report, Console, Terminal};

    struct BrokenPipe;

    impl std::io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn affirmative_answers() {
        for answer in ["y", "Y", "yes", "YES", "yEs"] {
            assert!(is_affirmative(answer), "{answer:?}");
        }
        for answer in ["", "n", "no", "yess", " y", "ye", "sure"] {
            assert!(!is_affirmative(answer), "{answer:?}");
        }
    }

    #[test]
    fn prompts_and_lines() {
        let mut console = Console::new(Cursor::new(&b"first\r\nsecret\nY\n"[..]), Vec::new());

        assert_eq!(console.prompt(">>> One: ").unwrap(), "first");
        assert_eq!(
            console.prompt_secret(">>> Two: ").unwrap().expose_secret(),
            "secret"
        );
        assert!(ask_yes_no(&mut console, ">>> Three? ").unwrap());
        console.say(">>> Done.").unwrap();

        assert_eq!(
            String::from_utf8(console.writer().clone()).unwrap(),
            ">>> One: >>> Two: >>> Three? >>> Done.\n"
        );
    }

    #[test]
    fn secrets_from_scripted_input() {
        let mut console = Console::new(Cursor::new(&b"hunter2\r\n"[..]), Vec::new());

        let secret = console.prompt_secret(">>> Password: ").unwrap();
        assert_eq!(secret.expose_secret(), "hunter2");
        assert_eq!(console.writer().as_slice(), b">>> Password: ");
        assert!(console.prompt_secret("").is_err());
    }

    #[test]
    fn fatal_reports() {
        let mut console = Console::new(Cursor::new(&b""[..]), Vec::new());
        report(&mut console, ">>> Something failed");
        assert_eq!(console.writer().as_slice(), b">>> Something failed\n");

        let mut console = Console::new(Cursor::new(&b""[..]), BrokenPipe);
        assert!(console.say(">>> Something failed").is_err());
        report(&mut console, ">>> Something failed");
    }

    #[test]
    fn end_of_input() {
        let mut console = Console::new(Cursor::new(&b"last"[..]), Vec::new());
        assert_eq!(console.prompt("").unwrap(), "last");
        match console.prompt("") {
            Err(crate::Error::Io(err)) => {
                assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("Unexpected result {other:?}"),
        }
    }
}
