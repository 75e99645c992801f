// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Wanted roles and grants.
//!
//! A [`Map`] is the ordered list of rules of the configuration. Running it
//! searches the directory, expands the role and grant templates of each rule
//! against every entry found, and merges the outcome into a [`Wanted`]
//! state. Search failures are accumulated rather than fatal, so that a
//! partial wanted state is still available to the caller.

mod item;
mod map;
mod rule;
mod search;

pub use item::Item;
pub use map::{Map, Wanted, WantedError};
pub use rule::{GrantRule, RoleRule};
pub use search::{SearchError, SearchErrors};
