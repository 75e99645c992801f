// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use crate::catalog::{self, Privilege, Scope};

/// A privilege granted on an object to a role.
///
/// Not to be confused with [`Privilege`]: a grant references a privilege, an
/// object and roles, much like a PostgreSQL `aclitem`. The same type
/// describes both wanted and inspected grants.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grant {
    /// Kind of the target object: `DATABASE`, `ALL TABLES`, etc.
    pub target: String,
    pub grantor: String,
    /// Empty for a default privilege.
    pub grantee: String,
    pub type_: String,
    /// Empty for an instance grant.
    pub database: String,
    /// Empty for a database grant.
    pub schema: String,
    /// Empty for both schema and database grants.
    pub object: String,
    /// Set when the privilege covers only part of the target, like some but
    /// not all tables of a schema.
    pub partial: bool,
}

impl Grant {
    /// Returns the catalog entry of the target, if known.
    pub fn privilege(&self) -> Option<&'static Privilege> {
        catalog::lookup(&self.target)
    }

    /// Makes the grant comparable with other normalized grants, whether they
    /// come from rules or from inspection.
    pub fn normalize(&mut self) {
        // Grantor is not part of the comparison yet.
        self.grantor.clear();

        // Instance objects are named by `object`, even when the grant was
        // written with the database name.
        if self.privilege().map(|p| p.scope) == Some(Scope::Instance) && self.object.is_empty() {
            self.object = std::mem::take(&mut self.database);
        }

        // Schema is not part of the comparison yet either.
        self.schema.clear();
    }

    pub fn normalized(mut self) -> Grant {
        self.normalize();
        self
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.partial {
            f.write_str("PARTIAL ")?;
        }
        if self.grantee.is_empty() {
            f.write_str("DEFAULT ")?;
        }
        write!(f, "{} ON {} ", self.type_, self.target)?;

        let path = [&self.database, &self.schema, &self.object];
        let mut first = true;
        for part in path.into_iter().filter(|part| !part.is_empty()) {
            if !first {
                f.write_str(".")?;
            }
            f.write_str(part)?;
            first = false;
        }

        if !self.grantee.is_empty() {
            write!(f, " TO {}", self.grantee)?;
        }
        if !self.grantor.is_empty() {
            write!(f, " GRANTED BY {}", self.grantor)?;
        }
        Ok(())
    }
}
