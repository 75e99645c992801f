// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Role attributes, as in `CREATE ROLE ... WITH <options>`.
///
/// An unset option is not managed: it is neither compared nor rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "OptionsRepr")]
pub struct RoleOptions {
    pub superuser: Option<bool>,
    pub create_db: Option<bool>,
    pub create_role: Option<bool>,
    pub inherit: Option<bool>,
    pub login: Option<bool>,
    pub replication: Option<bool>,
    pub bypass_rls: Option<bool>,
    pub connection_limit: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoleOptionsError {
    #[error("unknown role option {0:?}")]
    Unknown(String),
    #[error("role option {option} expects {expected}")]
    InvalidValue {
        option: String,
        expected: &'static str,
    },
}

const FLAGS: &[&str] = &[
    "SUPERUSER",
    "CREATEDB",
    "CREATEROLE",
    "INHERIT",
    "LOGIN",
    "REPLICATION",
    "BYPASSRLS",
];

impl RoleOptions {
    fn flag_mut(&mut self, name: &str) -> Option<&mut Option<bool>> {
        match name {
            "SUPERUSER" => Some(&mut self.superuser),
            "CREATEDB" => Some(&mut self.create_db),
            "CREATEROLE" => Some(&mut self.create_role),
            "INHERIT" => Some(&mut self.inherit),
            "LOGIN" => Some(&mut self.login),
            "REPLICATION" => Some(&mut self.replication),
            "BYPASSRLS" => Some(&mut self.bypass_rls),
            _ => None,
        }
    }

    fn flags(&self) -> [(&'static str, Option<bool>); 7] {
        [
            (FLAGS[0], self.superuser),
            (FLAGS[1], self.create_db),
            (FLAGS[2], self.create_role),
            (FLAGS[3], self.inherit),
            (FLAGS[4], self.login),
            (FLAGS[5], self.replication),
            (FLAGS[6], self.bypass_rls),
        ]
    }
}

impl fmt::Display for RoleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (name, value) in self.flags() {
            if let Some(value) = value {
                let no = if value { "" } else { "NO" };
                write!(f, "{sep}{no}{name}")?;
                sep = " ";
            }
        }
        if let Some(limit) = self.connection_limit {
            write!(f, "{sep}CONNECTION LIMIT {limit}")?;
        }
        Ok(())
    }
}

/// Parses the SQL form, e.g. `LOGIN NOSUPERUSER CONNECTION LIMIT 5`.
impl FromStr for RoleOptions {
    type Err = RoleOptionsError;

    fn from_str(s: &str) -> Result<RoleOptions, RoleOptionsError> {
        let mut options = RoleOptions::default();
        let mut words = s.split_whitespace().map(|w| w.to_ascii_uppercase());
        while let Some(word) = words.next() {
            if word == "CONNECTION" {
                let limit = match (words.next().as_deref(), words.next()) {
                    (Some("LIMIT"), Some(limit)) => limit.parse().ok(),
                    _ => None,
                };
                options.connection_limit = Some(limit.ok_or_else(limit_error)?);
                continue;
            }
            let (name, value) = match word.strip_prefix("NO") {
                Some(name) if FLAGS.contains(&name) => (name.to_string(), false),
                _ => (word, true),
            };
            match options.flag_mut(&name) {
                Some(flag) => *flag = Some(value),
                None => return Err(RoleOptionsError::Unknown(name)),
            }
        }
        Ok(options)
    }
}

fn limit_error() -> RoleOptionsError {
    RoleOptionsError::InvalidValue {
        option: "CONNECTION LIMIT".into(),
        expected: "an integer",
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionsRepr {
    Sql(String),
    Map(BTreeMap<String, Scalar>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
}

impl TryFrom<OptionsRepr> for RoleOptions {
    type Error = RoleOptionsError;

    fn try_from(repr: OptionsRepr) -> Result<RoleOptions, RoleOptionsError> {
        let map = match repr {
            OptionsRepr::Sql(sql) => return sql.parse(),
            OptionsRepr::Map(map) => map,
        };
        let mut options = RoleOptions::default();
        for (key, value) in map {
            let key = key.to_ascii_uppercase();
            if key.replace('_', " ") == "CONNECTION LIMIT" {
                let limit = match value {
                    Scalar::Int(limit) => i32::try_from(limit).ok(),
                    Scalar::Bool(_) => None,
                };
                options.connection_limit = Some(limit.ok_or_else(limit_error)?);
                continue;
            }
            let key = key.replace('_', "");
            let Some(flag) = options.flag_mut(&key) else {
                return Err(RoleOptionsError::Unknown(key));
            };
            match value {
                Scalar::Bool(value) => *flag = Some(value),
                Scalar::Int(_) => {
                    return Err(RoleOptionsError::InvalidValue {
                        option: key,
                        expected: "a boolean",
                    })
                }
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::{RoleOptions, RoleOptionsError};

    #[rolesync_ore::test]
    fn test_display() {
        let options = RoleOptions {
            login: Some(true),
            superuser: Some(false),
            connection_limit: Some(5),
            ..Default::default()
        };
        assert_eq!(options.to_string(), "NOSUPERUSER LOGIN CONNECTION LIMIT 5");
        assert_eq!(RoleOptions::default().to_string(), "");
    }

    #[rolesync_ore::test]
    fn test_parse_sql() {
        let options: RoleOptions = "login nosuperuser CONNECTION LIMIT -1".parse().unwrap();
        assert_eq!(options.login, Some(true));
        assert_eq!(options.superuser, Some(false));
        assert_eq!(options.connection_limit, Some(-1));
        assert_eq!(options.inherit, None);

        assert_eq!(
            "NOTHING".parse::<RoleOptions>(),
            Err(RoleOptionsError::Unknown("NOTHING".into()))
        );
        assert!("CONNECTION LIMIT x".parse::<RoleOptions>().is_err());
    }

    #[rolesync_ore::test]
    fn test_deserialize() {
        let options: RoleOptions =
            serde_yaml::from_str("{LOGIN: true, create_db: false, CONNECTION LIMIT: 10}").unwrap();
        assert_eq!(options.login, Some(true));
        assert_eq!(options.create_db, Some(false));
        assert_eq!(options.connection_limit, Some(10));

        let options: RoleOptions = serde_yaml::from_str("NOLOGIN").unwrap();
        assert_eq!(options.login, Some(false));

        assert!(serde_yaml::from_str::<RoleOptions>("{LOGIN: 3}").is_err());
        assert!(serde_yaml::from_str::<RoleOptions>("{FLY: true}").is_err());
    }
}
