// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Roles and the role blacklist.

mod blacklist;
mod options;

use std::collections::BTreeMap;

pub use blacklist::{Blacklist, BlacklistError};
pub use options::{RoleOptions, RoleOptionsError};

/// A database role, wanted or inspected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub options: RoleOptions,
    /// Roles this role is a member of, in declaration order.
    pub parents: Vec<String>,
    pub comment: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Role {
        Role {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Roles, by name.
pub type RoleMap = BTreeMap<String, Role>;
