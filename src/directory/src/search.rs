// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Directory searches and the transport seam.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;

use crate::entry::Entry;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Base,
    #[serde(alias = "onelevel")]
    One,
    #[default]
    #[serde(alias = "subtree")]
    Sub,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Base => "base",
            Scope::One => "one",
            Scope::Sub => "sub",
        })
    }
}

fn default_filter() -> String {
    "(objectClass=*)".to_string()
}

/// A directory search backing a rule.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Search {
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Attributes to request. When empty, they are inferred from the
    /// templates of the rule.
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub subsearch: Option<Subsearch>,
}

/// A secondary search run once per value of `attribute` of each entry, using
/// the value as search base.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Subsearch {
    pub attribute: String,
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("error connecting to directory")]
    Connect(#[source] anyhow::Error),
    #[error("search failed: base={base:?} scope={scope} filter={filter:?}")]
    Search {
        base: String,
        scope: Scope,
        filter: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("error closing directory connection")]
    Close(#[source] anyhow::Error),
}

/// A connection to a directory.
#[async_trait]
pub trait Directory: Send {
    /// Returns the entries matching `filter` under `base`, with the requested
    /// `attributes`.
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<Entry>, DirectoryError>;

    /// Releases the connection.
    async fn close(&mut self) -> Result<(), DirectoryError>;
}

/// Opens directory connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Directory>, DirectoryError>;
}
