// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! YAML configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rolesync_privilege::{PrivilegeError, RefMap};
use rolesync_wanted::Map;
use serde::Deserialize;
use tracing::debug;

/// The supported configuration format.
pub const VERSION: u64 = 6;

/// The configuration file, once loaded.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub version: u64,
    #[serde(default)]
    pub postgres: rolesync_inspect::Config,
    #[serde(default)]
    pub privileges: RefMap,
    #[serde(default)]
    pub rules: Map,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing configuration version")]
    MissingVersion,
    #[error("unsupported configuration version {version}, expected {expected}", expected = VERSION)]
    UnsupportedVersion { version: String },
    #[error("invalid privileges")]
    Privileges(#[from] PrivilegeError),
    #[error("rule {rule}: unknown privilege {privilege:?}")]
    UnknownPrivilege { rule: usize, privilege: String },
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        debug!(path = %path.display(), "loading YAML configuration");
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Config::parse(&yaml)
    }

    /// Parses and validates a configuration document.
    ///
    /// Static templates are split out of search-backed rules, and the
    /// attributes to request from the directory are inferred from the
    /// templates.
    pub fn parse(yaml: &str) -> Result<Config, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        match value.get("version") {
            None => return Err(ConfigError::MissingVersion),
            Some(version) if version.as_u64() == Some(VERSION) => (),
            Some(version) => {
                return Err(ConfigError::UnsupportedVersion {
                    version: describe(version),
                })
            }
        }

        let mut config: Config = serde_yaml::from_value(value)?;
        config.privileges.validate()?;
        for (i, item) in config.rules.0.iter().enumerate() {
            for rule in item.grants.iter().filter(|r| r.privilege.is_static()) {
                let privilege = rule.privilege.format(&BTreeMap::new());
                if config.privileges.get(&privilege).is_none() {
                    return Err(ConfigError::UnknownPrivilege { rule: i, privilege });
                }
            }
        }
        config.rules = std::mem::take(&mut config.rules).prepare();
        Ok(config)
    }
}

/// Renders a scalar the way it reads in the YAML document.
fn describe(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => format!("{s:?}"),
        other => match serde_yaml::to_string(other) {
            Ok(yaml) => yaml.trim_end().to_string(),
            Err(_) => format!("{other:?}"),
        },
    }
}

/// Returns the configuration file to use: `explicit` if set, else the first
/// existing file among the standard locations.
pub fn find_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    debug!("searching configuration file in standard locations");
    let mut candidates = vec![
        PathBuf::from("./rolesync.yml"),
        PathBuf::from("./rolesync.yaml"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        candidates.push(home.join(".config/rolesync.yml"));
        candidates.push(home.join(".config/rolesync.yaml"));
    }
    candidates.push(PathBuf::from("/etc/rolesync.yml"));
    candidates.push(PathBuf::from("/etc/rolesync.yaml"));

    for candidate in candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found configuration file");
            return Some(candidate);
        }
        debug!(path = %candidate.display(), "ignoring missing configuration file");
    }
    None
}
