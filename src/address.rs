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

//! Address validation and recipient list parsing.
//!
//! The grammar accepts dot-atom and quoted-string local parts, and either a
//! domain name or a bracketed IPv4 (or tagged) literal as the domain. Letter
//! classes are lowercase only and matching is case-sensitive, so
//! `John@Example.com` is rejected.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r#"\A(?:"#,
        // local part: dot-atom or quoted string
        r#"(?:[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*"#,
        r#"|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21\x23-\x5b\x5d-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")"#,
        r#"@"#,
        // domain: labels or bracketed literal
        r#"(?:(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?"#,
        r#"|\[(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}"#,
        r#"(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?"#,
        r#"|[a-z0-9-]*[a-z0-9]:(?:[\x01-\x08\x0b\x0c\x0e-\x1f\x21-\x5a\x53-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])+)\])"#,
        r#")\z"#,
    ))
    .expect("address pattern is valid")
});

/// Returns `true` if the whole string is a syntactically valid address.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(address)
}

/// Splits operator input into recipients.
///
/// Only one delimiter kind is honored: `;` if present, otherwise `,`,
/// otherwise the input is a single recipient. Surrounding whitespace is
/// trimmed from each entry. Duplicates are kept.
pub fn parse_recipients(input: &str) -> Vec<String> {
    let delimiter = if input.contains(';') {
        ';'
    } else if input.contains(',') {
        ','
    } else {
        return vec![input.trim().to_string()];
    };

    input
        .split(delimiter)
        .map(|recipient| recipient.trim().to_string())
        .collect()
}

/// Serializes recipients for the `To` header.
pub fn join_recipients(recipients: &[String]) -> String {
    recipients.join(", ")
}
