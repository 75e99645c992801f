// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Generation of the wanted state from the rules.

use rolesync_directory::{Connector, Directory, DirectoryError, SearchResult};
use rolesync_ore::error::ErrorExt;
use rolesync_ore::stopwatch::StopWatch;
use rolesync_privilege::{Grant, RefMap};
use rolesync_role::{Blacklist, RoleMap};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::item::Item;
use crate::search::{self, Cancelled, SearchErrors};

/// The ordered rules generating the wanted state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Map(pub Vec<Item>);

#[derive(Debug, thiserror::Error)]
pub enum WantedError {
    #[error("directory unavailable")]
    Connect(#[source] DirectoryError),
    #[error("wanted state generation cancelled")]
    Cancelled,
    #[error("some directory searches failed")]
    Search(#[source] SearchErrors),
}

impl From<Cancelled> for WantedError {
    fn from(_: Cancelled) -> WantedError {
        WantedError::Cancelled
    }
}

/// The roles and grants generated by the rules.
#[derive(Debug, Default)]
pub struct Wanted {
    pub roles: RoleMap,
    pub grants: Vec<Grant>,
    /// Set if some searches failed. The roles and grants of the other
    /// searches are still there.
    pub error: Option<WantedError>,
}

impl Map {
    pub fn has_searches(&self) -> bool {
        self.0.iter().any(Item::has_search)
    }

    /// Splits static templates out of search-backed rules, and infers the
    /// attributes to request from the directory.
    pub fn prepare(self) -> Map {
        let mut items: Vec<Item> = self.0.into_iter().flat_map(Item::split_static).collect();
        for item in &mut items {
            item.infer_attributes();
        }
        Map(items)
    }

    /// Runs every rule in order.
    ///
    /// The directory is connected on the first rule with a search and
    /// released before returning. A failing search does not stop the run: it
    /// is reported in [`Wanted::error`]. Connection failure and cancellation
    /// do stop it.
    pub async fn run(
        &self,
        connector: &dyn Connector,
        blacklist: &Blacklist,
        privileges: &RefMap,
        watch: &mut StopWatch,
        cancel: &CancellationToken,
    ) -> Result<Wanted, WantedError> {
        let mut directory = None;
        let result = self
            .run_items(&mut directory, connector, blacklist, privileges, watch, cancel)
            .await;
        if let Some(mut directory) = directory {
            if let Err(e) = directory.close().await {
                warn!(error = %e.display_with_causes(), "failed to close directory connection");
            }
        }
        result
    }

    async fn run_items(
        &self,
        directory: &mut Option<Box<dyn Directory>>,
        connector: &dyn Connector,
        blacklist: &Blacklist,
        privileges: &RefMap,
        watch: &mut StopWatch,
        cancel: &CancellationToken,
    ) -> Result<Wanted, WantedError> {
        let mut wanted = Wanted::default();
        let mut errors = SearchErrors::default();

        for (i, item) in self.0.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(WantedError::Cancelled);
            }
            if item.description.is_empty() {
                debug!("processing rule {i}");
            } else {
                info!("{}", item.description);
            }

            let results = match &item.ldapsearch {
                None => vec![Ok(SearchResult::static_result())],
                Some(search) => {
                    let connection = match directory.take() {
                        Some(connection) => connection,
                        None => connector.connect().await.map_err(WantedError::Connect)?,
                    };
                    let connection = directory.insert(connection);
                    search::search_item(i, search, &mut **connection, watch, cancel).await?
                }
            };

            for result in results {
                match result {
                    Ok(result) => wanted.add(item, &result, blacklist, privileges),
                    Err(e) => {
                        error!(error = %e.display_with_causes(), "search error, continuing");
                        errors.0.push(e);
                    }
                }
            }
        }

        if !errors.is_empty() {
            wanted.error = Some(WantedError::Search(errors));
        }
        Ok(wanted)
    }
}

impl Wanted {
    fn add(
        &mut self,
        item: &Item,
        result: &SearchResult,
        blacklist: &Blacklist,
        privileges: &RefMap,
    ) {
        for rule in &item.roles {
            for role in rule.generate(result) {
                if role.name.is_empty() {
                    continue;
                }
                if let Some(pattern) = blacklist.match_str(&role.name) {
                    debug!(role = %role.name, pattern, "ignoring blacklisted wanted role");
                    continue;
                }
                if self.roles.contains_key(&role.name) {
                    warn!(role = %role.name, "duplicated wanted role");
                }
                debug!(
                    name = %role.name,
                    options = %role.options,
                    parents = ?role.parents,
                    comment = ?role.comment,
                    "wants role"
                );
                self.roles.insert(role.name.clone(), role);
            }
        }

        for rule in &item.grants {
            for grant in rule.generate(result, privileges) {
                if let Some(pattern) = blacklist.match_str(&grant.grantee) {
                    debug!(to = %grant.grantee, pattern, "ignoring grant to blacklisted role");
                    continue;
                }
                debug!(%grant, "wants grant");
                self.grants.push(grant);
            }
        }
    }
}
