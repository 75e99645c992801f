// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rolesync_directory::{list_expressions, list_variables, Format, Search};
use serde::Deserialize;

use crate::rule::{GrantRule, RoleRule};

/// A rule: an optional directory search, and the templates of the roles and
/// grants to generate from each entry found.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Item {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ldapsearch: Option<Search>,
    #[serde(default)]
    pub roles: Vec<RoleRule>,
    #[serde(default)]
    pub grants: Vec<GrantRule>,
}

impl Item {
    pub fn has_search(&self) -> bool {
        self.ldapsearch.is_some()
    }

    pub fn formats(&self) -> impl Iterator<Item = &Format> {
        self.roles
            .iter()
            .flat_map(RoleRule::formats)
            .chain(self.grants.iter().flat_map(GrantRule::formats))
    }

    /// Moves templates that reference no attribute into a rule of their
    /// own, without search, following this one.
    ///
    /// Static templates would otherwise generate the same role or grant once
    /// per entry.
    pub fn split_static(self) -> Vec<Item> {
        if !self.has_search() {
            return vec![self];
        }
        let (static_roles, roles): (Vec<_>, Vec<_>) =
            self.roles.into_iter().partition(RoleRule::is_static);
        let (static_grants, grants): (Vec<_>, Vec<_>) =
            self.grants.into_iter().partition(GrantRule::is_static);

        let mut items = vec![];
        if !roles.is_empty() || !grants.is_empty() {
            items.push(Item {
                description: self.description.clone(),
                ldapsearch: self.ldapsearch,
                roles,
                grants,
            });
        }
        if !static_roles.is_empty() || !static_grants.is_empty() {
            let description = if items.is_empty() {
                self.description
            } else {
                String::new()
            };
            items.push(Item {
                description,
                ldapsearch: None,
                roles: static_roles,
                grants: static_grants,
            });
        }
        items
    }

    /// Fills in the attributes requested by the search and the sub-search
    /// from the templates, unless they are set explicitly.
    pub fn infer_attributes(&mut self) {
        let expressions = list_expressions(self.formats());
        let Some(search) = &mut self.ldapsearch else {
            return;
        };

        if search.attributes.is_empty() {
            search.attributes = list_variables(&expressions)
                .into_iter()
                .filter(|attribute| !attribute.eq_ignore_ascii_case("dn"))
                .collect();
        }

        let Some(subsearch) = &mut search.subsearch else {
            return;
        };
        if subsearch.attributes.is_empty() {
            let sub_expressions: Vec<&str> = expressions
                .iter()
                .filter_map(|e| {
                    let (attribute, field) = e.split_once('.')?;
                    attribute
                        .eq_ignore_ascii_case(&subsearch.attribute)
                        .then_some(field)
                })
                .collect();
            subsearch.attributes = list_variables(&sub_expressions)
                .into_iter()
                .filter(|attribute| !attribute.eq_ignore_ascii_case("dn"))
                .collect();
        }
    }
}
