// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Role and grant templates.

use rolesync_directory::{Format, SearchResult};
use rolesync_privilege::{Grant, RefMap};
use rolesync_role::{Role, RoleOptions};
use serde::Deserialize;

/// A template of roles.
///
/// One role is generated per combination of the values referenced by `name`
/// and `comment`. Parents are not combined: every value of every parent
/// template is a parent of each generated role.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleRule {
    pub name: Format,
    #[serde(default)]
    pub options: RoleOptions,
    #[serde(default)]
    pub parents: Vec<Format>,
    #[serde(default)]
    pub comment: Option<Format>,
}

impl RoleRule {
    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        std::iter::once(&self.name)
            .chain(&self.comment)
            .chain(&self.parents)
    }

    pub fn is_static(&self) -> bool {
        self.formats().all(Format::is_static)
    }

    pub fn generate(&self, result: &SearchResult) -> Vec<Role> {
        let mut parents: Vec<String> = vec![];
        for format in &self.parents {
            for values in result.generate_values([format]) {
                let parent = format.format(&values);
                if !parent.is_empty() && !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }

        result
            .generate_values(std::iter::once(&self.name).chain(&self.comment))
            .map(|values| Role {
                name: self.name.format(&values),
                options: self.options,
                parents: parents.clone(),
                comment: self.comment.as_ref().map(|c| c.format(&values)),
            })
            .collect()
    }
}

/// A template of grants, referencing a privilege profile by name.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantRule {
    pub privilege: Format,
    #[serde(default = "empty_format")]
    pub database: Format,
    #[serde(default = "empty_format")]
    pub schema: Format,
    #[serde(default = "empty_format")]
    pub object: Format,
    #[serde(alias = "role")]
    pub to: Format,
}

fn empty_format() -> Format {
    Format::parse("").expect("empty template is valid")
}

impl GrantRule {
    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        [
            &self.privilege,
            &self.database,
            &self.schema,
            &self.object,
            &self.to,
        ]
        .into_iter()
    }

    pub fn is_static(&self) -> bool {
        self.formats().all(Format::is_static)
    }

    /// Generates one normalized grant per privilege of the referenced
    /// profile, for each combination of values.
    pub fn generate(&self, result: &SearchResult, privileges: &RefMap) -> Vec<Grant> {
        let mut grants = vec![];
        for values in result.generate_values(self.formats()) {
            let profile = self.privilege.format(&values);
            let Some(refs) = privileges.get(&profile) else {
                tracing::warn!(privilege = %profile, "unknown privilege profile");
                continue;
            };
            let grantee = self.to.format(&values);
            let database = self.database.format(&values);
            let schema = self.schema.format(&values);
            let object = self.object.format(&values);
            for privilege_ref in refs {
                let grant = Grant {
                    target: privilege_ref.on.clone(),
                    grantee: grantee.clone(),
                    type_: privilege_ref.type_.clone(),
                    database: database.clone(),
                    schema: schema.clone(),
                    object: object.clone(),
                    ..Default::default()
                };
                grants.push(grant.normalized());
            }
        }
        grants
    }
}
