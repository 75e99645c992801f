// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use globset::{Glob, GlobMatcher};
use serde::Deserialize;

/// Glob patterns of role names excluded from synchronization.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "Vec<String>")]
pub struct Blacklist {
    patterns: Vec<(String, GlobMatcher)>,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid blacklist pattern {pattern:?}")]
pub struct BlacklistError {
    pattern: String,
    #[source]
    source: globset::Error,
}

impl Blacklist {
    pub fn new<I, S>(patterns: I) -> Result<Blacklist, BlacklistError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.into();
                match Glob::new(&pattern) {
                    Ok(glob) => Ok((pattern, glob.compile_matcher())),
                    Err(source) => Err(BlacklistError { pattern, source }),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(Blacklist { patterns })
    }

    /// Returns the first pattern matching `name`, if any.
    pub fn match_str(&self, name: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|(_, matcher)| matcher.is_match(name))
            .map(|(pattern, _)| pattern.as_str())
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(pattern, _)| pattern.as_str())
    }
}

impl Default for Blacklist {
    /// Excludes the roles of PostgreSQL itself.
    fn default() -> Blacklist {
        Blacklist::new(["pg_*", "postgres"]).expect("valid default patterns")
    }
}

impl TryFrom<Vec<String>> for Blacklist {
    type Error = BlacklistError;

    fn try_from(patterns: Vec<String>) -> Result<Blacklist, BlacklistError> {
        Blacklist::new(patterns)
    }
}
