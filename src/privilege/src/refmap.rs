// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Named privilege profiles referenced by grant rules.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

use crate::catalog;

/// A privilege type on a kind of object, like `SELECT` on `ALL TABLES`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivilegeRef {
    #[serde(rename = "type")]
    pub type_: String,
    pub on: String,
}

/// Privilege profiles, by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RefMap(pub BTreeMap<String, Vec<PrivilegeRef>>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrivilegeError {
    #[error("privilege {profile:?}: unknown object kind {on:?}")]
    UnknownObject { profile: String, on: String },
    #[error("privilege {profile:?}: {type_} is not a privilege of {on}")]
    UnknownType {
        profile: String,
        type_: String,
        on: String,
    },
}

impl RefMap {
    pub fn get(&self, profile: &str) -> Option<&[PrivilegeRef]> {
        self.0.get(profile).map(Vec::as_slice)
    }

    /// Checks that every reference names a known object kind and a type
    /// this kind accepts.
    pub fn validate(&self) -> Result<(), PrivilegeError> {
        for (profile, refs) in &self.0 {
            for privilege_ref in refs {
                let Some(privilege) = catalog::lookup(&privilege_ref.on) else {
                    return Err(PrivilegeError::UnknownObject {
                        profile: profile.clone(),
                        on: privilege_ref.on.clone(),
                    });
                };
                if !privilege.accepts(&privilege_ref.type_) {
                    return Err(PrivilegeError::UnknownType {
                        profile: profile.clone(),
                        type_: privilege_ref.type_.clone(),
                        on: privilege_ref.on.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns the privilege types in use, by object kind. Only these are
    /// inspected.
    pub fn managed_privileges(&self) -> BTreeMap<String, Vec<String>> {
        let mut managed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for privilege_ref in self.0.values().flatten() {
            managed
                .entry(privilege_ref.on.clone())
                .or_default()
                .insert(privilege_ref.type_.clone());
        }
        managed
            .into_iter()
            .map(|(on, types)| (on, types.into_iter().collect()))
            .collect()
    }
}
