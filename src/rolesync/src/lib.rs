// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Synchronizes PostgreSQL roles and grants from a directory.
//!
//! This crate glues the configuration, the directory and the cluster
//! together: it inspects the actual state of the cluster, generates the
//! wanted state from the rules and reports how they compare.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use rolesync_ore::error::ErrorExt;
use rolesync_ore::stopwatch::StopWatch;
use rolesync_privilege::Grant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod config;
pub mod ldap;

use crate::config::Config;
use crate::ldap::LdapConnector;

/// Settings of one run, from the command line.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Explicit configuration file. Standard locations are searched if
    /// unset.
    pub config: Option<PathBuf>,
    pub real: bool,
    pub postgres_url: String,
    pub ldap: LdapConnector,
}

/// How the wanted and actual states compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InSync,
    Drift { missing: usize, spurious: usize },
}

pub async fn run(args: RunConfig, cancel: &CancellationToken) -> Result<Outcome, anyhow::Error> {
    let start = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "starting rolesync");

    let path = config::find_file(args.config.as_deref())
        .context("no configuration file found")?;
    info!(path = %path.display(), "using YAML configuration file");
    let yaml = Config::load(&path).with_context(|| format!("loading {}", path.display()))?;
    debug!(?yaml, "loaded configuration");

    let managed = yaml.privileges.managed_privileges();
    let mut postgres_watch = StopWatch::default();
    let instance = rolesync_inspect::inspect(
        &args.postgres_url,
        &yaml.postgres,
        &managed,
        &mut postgres_watch,
        cancel,
    )
    .await
    .context("inspecting PostgreSQL")?;

    let mut ldap_watch = StopWatch::default();
    let mut wanted = yaml
        .rules
        .run(
            &args.ldap,
            &instance.roles_blacklist,
            &yaml.privileges,
            &mut ldap_watch,
            cancel,
        )
        .await
        .context("generating wanted state")?;
    if let Some(e) = wanted.error.take() {
        // Never compare a partial wanted state.
        error!(error = %e.display_with_causes(), "aborting after search errors");
        return Err(e).context("generating wanted state");
    }

    if args.real {
        info!("real mode, PostgreSQL instance will be modified");
    } else {
        warn!("dry run, PostgreSQL instance will be untouched");
    }

    for role in wanted.roles.values() {
        debug!(name = %role.name, options = %role.options, parents = ?role.parents, "wanted role");
    }
    for role in instance.roles.values() {
        debug!(name = %role.name, options = %role.options, parents = ?role.parents, "actual role");
    }

    let diff = GrantDiff::compare(&wanted.grants, &instance.grants);
    for grant in &diff.missing {
        info!(%grant, "missing grant");
    }
    for grant in &diff.spurious {
        info!(%grant, "spurious grant");
    }

    info!(
        elapsed = ?start.elapsed(),
        postgres = %postgres_watch,
        searches = %ldap_watch,
        roles = wanted.roles.len(),
        grants = wanted.grants.len(),
        "comparison complete"
    );

    Ok(diff.outcome())
}

/// Grants found in only one of the wanted and actual states.
///
/// Both sides are expected normalized, and the actual side stripped of
/// blacklisted grantees, as inspection leaves them.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GrantDiff<'a> {
    pub missing: Vec<&'a Grant>,
    pub spurious: Vec<&'a Grant>,
}

impl<'a> GrantDiff<'a> {
    /// Compares `wanted` and `actual` as sets.
    pub fn compare(wanted: &'a [Grant], actual: &'a [Grant]) -> GrantDiff<'a> {
        let wanted: BTreeSet<&Grant> = wanted.iter().collect();
        let actual: BTreeSet<&Grant> = actual.iter().collect();
        GrantDiff {
            missing: wanted.difference(&actual).copied().collect(),
            spurious: actual.difference(&wanted).copied().collect(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        if self.missing.is_empty() && self.spurious.is_empty() {
            Outcome::InSync
        } else {
            Outcome::Drift {
                missing: self.missing.len(),
                spurious: self.spurious.len(),
            }
        }
    }
}
