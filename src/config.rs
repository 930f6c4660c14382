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

//! Pre-supplied settings: an optional TOML file overlaid with command line
//! flags and environment variables. Anything left unset is asked for
//! interactively.
//!
//! ```toml
//! [Login]
//! Username = "john@example.com"
//! Password = "p4ssw0rd"
//!
//! [Server]
//! Host = "smtp.gmail.com"
//! Port = 587
//!
//! [Compose]
//! MultilineBody = true
//! MultipleRecipients = true
//! ValidatePresupplied = false
//! ```

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const GMAIL_HOST: &str = "smtp.gmail.com";
pub const GMAIL_PORT: &str = "587";

/// Optional composer behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Read the body line by line until an empty line, instead of a single line.
    pub multiline_body: bool,
    /// Accept `;` or `,` separated recipient lists.
    pub multiple_recipients: bool,
    /// Check a pre-supplied username against the address grammar.
    pub validate_presupplied: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            multiline_body: true,
            multiple_recipients: true,
            validate_presupplied: false,
        }
    }
}

/// Resolved configuration handed to the session bootstrapper.
#[derive(Debug, Clone)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub helo_host: Option<String>,
    pub timeout: Duration,
    pub capabilities: Capabilities,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            username: None,
            password: None,
            host: None,
            port: None,
            helo_host: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            capabilities: Capabilities::default(),
        }
    }
}

/// Command line interface.
#[derive(Parser, Debug, Default)]
#[command(name = "quickmail", version, about = "Compose and send e-mail from the terminal")]
pub struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Login username (an e-mail address)
    #[arg(short, long, env = "QUICKMAIL_USERNAME")]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "QUICKMAIL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SMTP server host name
    #[arg(long, env = "QUICKMAIL_HOST")]
    pub host: Option<String>,

    /// SMTP submission port
    #[arg(short, long, env = "QUICKMAIL_PORT")]
    pub port: Option<String>,

    /// Use smtp.gmail.com:587 unless a host and port are given
    #[arg(long)]
    pub gmail: bool,

    /// Name announced in EHLO (defaults to the local host name)
    #[arg(long)]
    pub helo_host: Option<String>,

    /// Network timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Read the message body as a single line
    #[arg(long)]
    pub single_line_body: bool,

    /// Accept exactly one recipient address
    #[arg(long)]
    pub single_recipient: bool,

    /// Validate a username supplied by configuration
    #[arg(long)]
    pub validate_presupplied: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(rename = "Login", default)]
    login: LoginSection,
    #[serde(rename = "Server", default)]
    server: ServerSection,
    #[serde(rename = "Compose", default)]
    compose: ComposeSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginSection {
    #[serde(rename = "Username")]
    username: Option<String>,
    #[serde(rename = "Password")]
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    #[serde(rename = "Host")]
    host: Option<String>,
    #[serde(rename = "Port")]
    port: Option<PortValue>,
    #[serde(rename = "Timeout")]
    timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ComposeSection {
    #[serde(rename = "MultilineBody")]
    multiline_body: Option<bool>,
    #[serde(rename = "MultipleRecipients")]
    multiple_recipients: Option<bool>,
    #[serde(rename = "ValidatePresupplied")]
    validate_presupplied: Option<bool>,
}

/// Ports may be written as numbers or strings; both are checked later.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(i64),
    Text(String),
}

impl From<PortValue> for String {
    fn from(value: PortValue) -> Self {
        match value {
            PortValue::Number(port) => port.to_string(),
            PortValue::Text(port) => port,
        }
    }
}

impl Config {
    /// Parses a TOML configuration document.
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: FileConfig = toml::from_str(contents)?;
        let defaults = Capabilities::default();

        Ok(Config {
            username: non_empty(file.login.username),
            password: non_empty(file.login.password).map(SecretString::new),
            host: non_empty(file.server.host),
            port: non_empty(file.server.port.map(String::from)),
            helo_host: None,
            timeout: Duration::from_secs(file.server.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            capabilities: Capabilities {
                multiline_body: file
                    .compose
                    .multiline_body
                    .unwrap_or(defaults.multiline_body),
                multiple_recipients: file
                    .compose
                    .multiple_recipients
                    .unwrap_or(defaults.multiple_recipients),
                validate_presupplied: file
                    .compose
                    .validate_presupplied
                    .unwrap_or(defaults.validate_presupplied),
            },
        })
    }

    /// Loads a configuration file. An explicitly named file must exist, while
    /// a missing file at the default location yields the defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => {
                log::debug!("Loaded configuration from {}", path.display());
                Config::parse(&contents).map_err(|err| match err {
                    crate::Error::Config(err) => {
                        crate::Error::Config(format!("{}: {}", path.display(), err))
                    }
                    err => err,
                })
            }
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No configuration file at {}", path.display());
                Ok(Config::default())
            }
            Err(err) => Err(crate::Error::Config(format!(
                "failed to read {}: {}",
                path.display(),
                err
            ))),
        }
    }

    /// Loads the configuration file named by `args` and overlays the flags.
    pub fn from_args(args: Args) -> crate::Result<Self> {
        Config::load(args.config.as_deref()).map(|config| config.with_args(args))
    }

    /// Overlays command line flags on top of this configuration.
    pub fn with_args(mut self, args: Args) -> Self {
        if let Some(username) = non_empty(args.username) {
            self.username = Some(username);
        }
        if let Some(password) = non_empty(args.password) {
            self.password = Some(SecretString::new(password));
        }
        if let Some(host) = non_empty(args.host) {
            self.host = Some(host);
        }
        if let Some(port) = non_empty(args.port) {
            self.port = Some(port);
        }
        if args.gmail {
            self.host.get_or_insert_with(|| GMAIL_HOST.to_string());
            self.port.get_or_insert_with(|| GMAIL_PORT.to_string());
        }
        if let Some(helo_host) = non_empty(args.helo_host) {
            self.helo_host = Some(helo_host);
        }
        if let Some(timeout) = args.timeout {
            self.timeout = Duration::from_secs(timeout);
        }
        if args.single_line_body {
            self.capabilities.multiline_body = false;
        }
        if args.single_recipient {
            self.capabilities.multiple_recipients = false;
        }
        if args.validate_presupplied {
            self.capabilities.validate_presupplied = true;
        }
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::{Args, Capabilities, Config};

    #[test]
    fn parse_login_section() {
        let config = Config::parse(concat!(
            "[Login]\n",
            "Username = \"john@example.com\"\n",
            "Password = \"p4ssw0rd\"\n",
        ))
        .unwrap();

        assert_eq!(config.username.as_deref(), Some("john@example.com"));
        assert_eq!(
            config.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("p4ssw0rd")
        );
        assert_eq!(config.host, None);
        assert_eq!(config.port, None);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.capabilities, Capabilities::default());
    }

    #[test]
    fn parse_server_and_compose_sections() {
        let config = Config::parse(concat!(
            "[Server]\n",
            "Host = \"smtp.example.com\"\n",
            "Port = 587\n",
            "Timeout = 10\n",
            "[Compose]\n",
            "MultilineBody = false\n",
        ))
        .unwrap();

        assert_eq!(config.host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.port.as_deref(), Some("587"));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.capabilities.multiline_body);
        assert!(config.capabilities.multiple_recipients);

        // Strings are kept verbatim and validated by the bootstrapper.
        let config = Config::parse("[Server]\nPort = \"abc\"\n").unwrap();
        assert_eq!(config.port.as_deref(), Some("abc"));
    }

    #[test]
    fn empty_values_are_absent() {
        let config = Config::parse("[Login]\nUsername = \"\"\nPassword = \"\"\n").unwrap();
        assert!(config.username.is_none());
        assert!(config.password.is_none());
    }

    #[test]
    fn malformed_file() {
        assert!(matches!(
            Config::parse("[Login]\nUsername = john"),
            Err(crate::Error::Config(_))
        ));
        assert!(matches!(
            Config::parse("[Login]\nUser = \"john\"\n"),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn missing_files() {
        assert!(matches!(
            Config::load(Some(std::path::Path::new("/nonexistent/quickmail.toml"))),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn flags_override_file() {
        let args = Args::try_parse_from([
            "quickmail",
            "--username",
            "jane@example.com",
            "--port",
            "2525",
            "--gmail",
            "--single-recipient",
            "--validate-presupplied",
            "--timeout",
            "5",
        ])
        .unwrap();
        let config = Config::parse("[Server]\nHost = \"mx.example.com\"\nPort = 25\n")
            .unwrap()
            .with_args(args);

        assert_eq!(config.username.as_deref(), Some("jane@example.com"));
        assert_eq!(config.host.as_deref(), Some("mx.example.com"));
        assert_eq!(config.port.as_deref(), Some("2525"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.capabilities.multiple_recipients);
        assert!(config.capabilities.multiline_body);
        assert!(config.capabilities.validate_presupplied);
    }

    #[test]
    fn gmail_preset() {
        let args = Args::try_parse_from(["quickmail", "--gmail"]).unwrap();
        let config = Config::default().with_args(args);
        assert_eq!(config.host.as_deref(), Some("smtp.gmail.com"));
        assert_eq!(config.port.as_deref(), Some("587"));
    }
}
