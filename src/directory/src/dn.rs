// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Distinguished name parsing, as described by RFC 4514.

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

/// A parsed distinguished name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dn {
    /// Relative distinguished names, most specific first.
    pub rdns: Vec<Rdn>,
}

/// A relative distinguished name: one or more `type=value` pairs joined
/// by `+`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rdn {
    pub attributes: Vec<AttributeTypeAndValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
    pub type_: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DnError {
    #[error("missing '=' after attribute type {0:?}")]
    MissingEquals(String),
    #[error("empty attribute type")]
    EmptyType,
    #[error("invalid escape sequence in value of {0:?}")]
    InvalidEscape(String),
    #[error("value of {0:?} is not valid UTF-8")]
    InvalidUtf8(String),
}

impl Dn {
    /// Returns the value of the first RDN, in RDN order, whose leading
    /// attribute type is `type_`. Types are compared ignoring ASCII case.
    pub fn find(&self, type_: &str) -> Option<&str> {
        self.rdns
            .iter()
            .filter_map(|rdn| rdn.attributes.first())
            .find(|ava| ava.type_.eq_ignore_ascii_case(type_))
            .map(|ava| ava.value.as_str())
    }
}

impl FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Dn, DnError> {
        let mut rdns = vec![];
        if s.trim().is_empty() {
            return Ok(Dn { rdns });
        }

        let mut chars = s.chars().peekable();
        let mut rdn = Rdn::default();
        loop {
            let type_ = parse_type(&mut chars)?;
            let (value, separator) = parse_value(&mut chars, &type_)?;
            rdn.attributes.push(AttributeTypeAndValue { type_, value });
            match separator {
                Some('+') => continue,
                Some(_) => rdns.push(std::mem::take(&mut rdn)),
                None => {
                    rdns.push(rdn);
                    break;
                }
            }
        }
        Ok(Dn { rdns })
    }
}

fn parse_type(chars: &mut Peekable<Chars>) -> Result<String, DnError> {
    let mut type_ = String::new();
    loop {
        match chars.next() {
            Some('=') => break,
            Some(c) => type_.push(c),
            None => return Err(DnError::MissingEquals(type_.trim().to_string())),
        }
    }
    let type_ = type_.trim();
    if type_.is_empty() {
        return Err(DnError::EmptyType);
    }
    Ok(type_.to_string())
}

/// Parses an attribute value up to the next unescaped separator, which is
/// returned alongside the value. Leading and trailing unescaped spaces are
/// dropped.
fn parse_value(
    chars: &mut Peekable<Chars>,
    type_: &str,
) -> Result<(String, Option<char>), DnError> {
    while chars.next_if_eq(&' ').is_some() {}

    let mut bytes = vec![];
    let mut trailing_spaces = 0;
    let separator = loop {
        let c = match chars.next() {
            None => break None,
            Some(c @ (',' | ';' | '+')) => break Some(c),
            Some(c) => c,
        };
        if c == '\\' {
            trailing_spaces = 0;
            let escaped = chars
                .next()
                .ok_or_else(|| DnError::InvalidEscape(type_.to_string()))?;
            match (escaped.to_digit(16), chars.peek().and_then(|c| c.to_digit(16))) {
                (Some(high), Some(low)) => {
                    chars.next();
                    // Both digits are below 16.
                    bytes.push(u8::try_from(high * 16 + low).expect("hex pair fits in a byte"));
                }
                _ if "\\\"+,;<>=# ".contains(escaped) => push_char(&mut bytes, escaped),
                _ => return Err(DnError::InvalidEscape(type_.to_string())),
            }
            continue;
        }
        if c == ' ' {
            trailing_spaces += 1;
        } else {
            trailing_spaces = 0;
        }
        push_char(&mut bytes, c);
    };
    bytes.truncate(bytes.len() - trailing_spaces);

    let value = String::from_utf8(bytes).map_err(|_| DnError::InvalidUtf8(type_.to_string()))?;
    Ok((value, separator))
}

fn push_char(bytes: &mut Vec<u8>, c: char) {
    let mut buf = [0; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for (j, ava) in rdn.attributes.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{}=", ava.type_)?;
                for (k, c) in ava.value.chars().enumerate() {
                    let edge = k == 0 || k + 1 == ava.value.chars().count();
                    if "\\\"+,;<>=".contains(c) || (edge && c == ' ') || (k == 0 && c == '#') {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Dn, DnError};

    #[rolesync_ore::test]
    fn test_parse_simple() {
        let dn: Dn = "cn=alice,ou=users,dc=acme,dc=org".parse().unwrap();
        assert_eq!(dn.rdns.len(), 4);
        assert_eq!(dn.find("cn"), Some("alice"));
        assert_eq!(dn.find("OU"), Some("users"));
        // First match in RDN order wins.
        assert_eq!(dn.find("dc"), Some("acme"));
        assert_eq!(dn.find("uid"), None);
    }

    #[rolesync_ore::test]
    fn test_parse_escapes_and_spaces() {
        let dn: Dn = r"cn = Smith\, John ,ou=R\26D,o=caf\C3\A9\ ".parse().unwrap();
        assert_eq!(dn.find("cn"), Some("Smith, John"));
        assert_eq!(dn.find("ou"), Some("R&D"));
        assert_eq!(dn.find("o"), Some("café "));
    }

    #[rolesync_ore::test]
    fn test_parse_multivalued_rdn() {
        let dn: Dn = "cn=alice+uid=a1,dc=acme".parse().unwrap();
        assert_eq!(dn.rdns[0].attributes.len(), 2);
        assert_eq!(dn.rdns[0].attributes[1].value, "a1");
        // Only the leading type of an RDN is considered.
        assert_eq!(dn.find("uid"), None);
    }

    #[rolesync_ore::test]
    fn test_parse_errors() {
        assert_eq!(
            "alice".parse::<Dn>(),
            Err(DnError::MissingEquals("alice".into()))
        );
        assert_eq!("=alice".parse::<Dn>(), Err(DnError::EmptyType));
        assert_eq!(
            r"cn=a\z".parse::<Dn>(),
            Err(DnError::InvalidEscape("cn".into()))
        );
        assert_eq!("".parse::<Dn>(), Ok(Dn::default()));
    }

    #[rolesync_ore::test]
    fn test_display_escapes() {
        let dn: Dn = r"cn=Smith\, John,dc=acme".parse().unwrap();
        assert_eq!(dn.to_string(), r"cn=Smith\, John,dc=acme");
    }
}
