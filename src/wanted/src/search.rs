// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Execution of the directory search of a rule.

use std::fmt;

use rolesync_directory::{Directory, DirectoryError, Entry, Search, SearchResult};
use rolesync_ore::error::ErrorExt;
use rolesync_ore::stopwatch::StopWatch;
use tokio_util::sync::CancellationToken;

/// A failed search attempt. The rest of the run goes on.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search of rule {rule} failed")]
    Search {
        rule: usize,
        #[source]
        source: DirectoryError,
    },
    #[error("sub-search of rule {rule} failed for entry {dn:?}")]
    Subsearch {
        rule: usize,
        dn: String,
        #[source]
        source: DirectoryError,
    },
}

/// The search errors of a whole run.
#[derive(Debug, Default)]
pub struct SearchErrors(pub Vec<SearchError>);

impl SearchErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SearchErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for error in &self.0 {
            write!(f, "{sep}{}", error.display_with_causes())?;
            sep = "\n";
        }
        Ok(())
    }
}

impl std::error::Error for SearchErrors {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Runs `search` and the sub-searches of each entry found.
///
/// Returns one outcome per entry, or a single error if the search itself
/// failed. Only cancellation interrupts the search.
pub(crate) async fn search_item(
    rule: usize,
    search: &Search,
    directory: &mut dyn Directory,
    watch: &mut StopWatch,
    cancel: &CancellationToken,
) -> Result<Vec<Result<SearchResult, SearchError>>, Cancelled> {
    tracing::debug!(
        base = %search.base,
        scope = %search.scope,
        filter = %search.filter,
        attributes = ?search.attributes,
        "searching directory"
    );
    let entries = match run_search(directory, search, watch, cancel).await? {
        Ok(entries) => entries,
        Err(source) => return Ok(vec![Err(SearchError::Search { rule, source })]),
    };

    let Some(subsearch) = &search.subsearch else {
        return Ok(entries.into_iter().map(|e| Ok(SearchResult::new(e))).collect());
    };

    let mut results = Vec::with_capacity(entries.len());
    'entries: for entry in entries {
        let mut sub_entries = vec![];
        for base in entry.attribute_values(&subsearch.attribute) {
            tracing::debug!(
                base = %base,
                scope = %subsearch.scope,
                filter = %subsearch.filter,
                "sub-searching directory"
            );
            let sub_search = Search {
                base: base.clone(),
                scope: subsearch.scope,
                filter: subsearch.filter.clone(),
                attributes: subsearch.attributes.clone(),
                subsearch: None,
            };
            match run_search(directory, &sub_search, watch, cancel).await? {
                Ok(found) => sub_entries.extend(found),
                Err(source) => {
                    results.push(Err(SearchError::Subsearch {
                        rule,
                        dn: entry.dn.clone(),
                        source,
                    }));
                    continue 'entries;
                }
            }
        }
        results.push(Ok(SearchResult::with_subsearch(
            entry,
            &subsearch.attribute,
            sub_entries,
        )));
    }
    Ok(results)
}

async fn run_search(
    directory: &mut dyn Directory,
    search: &Search,
    watch: &mut StopWatch,
    cancel: &CancellationToken,
) -> Result<Result<Vec<Entry>, DirectoryError>, Cancelled> {
    if cancel.is_cancelled() {
        return Err(Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        result = watch.time(directory.search(
            &search.base,
            search.scope,
            &search.filter,
            &search.attributes,
        )) => Ok(result),
    }
}
