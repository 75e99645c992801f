// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The static catalog of privileges that can be inspected.
//!
//! Every inspection query takes the list of managed privilege types as its
//! only parameter and returns rows of exactly seven columns, in order:
//! grantor, grantee, type, database, schema, object and partial.

use std::fmt;

/// The level at which a privilege is granted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Cluster-wide objects, like databases.
    Instance,
    /// Objects living in a database, like schemas.
    Database,
    /// Objects living in a schema, like tables.
    Schema,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Instance => "instance",
            Scope::Database => "database",
            Scope::Schema => "schema",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A kind of privilege, and how to inspect its grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Privilege {
    /// Object kind, like `DATABASE` or `ALL TABLES`.
    pub object: &'static str,
    pub scope: Scope,
    /// Privilege types accepted on this kind of object.
    pub types: &'static [&'static str],
    /// Query returning the current grants of this privilege.
    pub inspect: &'static str,
}

impl Privilege {
    pub fn accepts(&self, type_: &str) -> bool {
        self.types.contains(&type_)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.scope, self.object)
    }
}

/// Returns the catalog entry of `object`.
pub fn lookup(object: &str) -> Option<&'static Privilege> {
    CATALOG.iter().find(|p| p.object == object)
}

/// Inspectable privileges, in inspection order.
pub static CATALOG: &[Privilege] = &[
    Privilege {
        object: "DATABASE",
        scope: Scope::Instance,
        types: &["CONNECT", "CREATE", "TEMPORARY"],
        inspect: INSPECT_DATABASE,
    },
    Privilege {
        object: "SCHEMA",
        scope: Scope::Database,
        types: &["CREATE", "USAGE"],
        inspect: INSPECT_SCHEMA,
    },
    Privilege {
        object: "ALL TABLES",
        scope: Scope::Schema,
        types: &[
            "DELETE",
            "INSERT",
            "REFERENCES",
            "SELECT",
            "TRIGGER",
            "TRUNCATE",
            "UPDATE",
        ],
        inspect: INSPECT_ALL_TABLES,
    },
    Privilege {
        object: "ALL SEQUENCES",
        scope: Scope::Schema,
        types: &["SELECT", "UPDATE", "USAGE"],
        inspect: INSPECT_ALL_SEQUENCES,
    },
    Privilege {
        object: "ALL FUNCTIONS",
        scope: Scope::Schema,
        types: &["EXECUTE"],
        inspect: INSPECT_ALL_FUNCTIONS,
    },
];

static INSPECT_DATABASE: &str = "
WITH grants AS (
    SELECT datname, (aclexplode(COALESCE(datacl, acldefault('d', datdba)))).*
    FROM pg_catalog.pg_database
)
SELECT
    COALESCE(grantor.rolname, '')::text AS grantor,
    COALESCE(grantee.rolname, 'public')::text AS grantee,
    grants.privilege_type AS type,
    grants.datname::text AS database,
    '' AS schema,
    '' AS object,
    FALSE AS partial
FROM grants
LEFT OUTER JOIN pg_catalog.pg_roles AS grantor ON grantor.oid = grants.grantor
LEFT OUTER JOIN pg_catalog.pg_roles AS grantee ON grantee.oid = grants.grantee
WHERE grants.privilege_type = ANY ($1)
ORDER BY 2, 4, 3";

static INSPECT_SCHEMA: &str = "
WITH grants AS (
    SELECT nspname, (aclexplode(COALESCE(nspacl, acldefault('n', nspowner)))).*
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema'
)
SELECT
    COALESCE(grantor.rolname, '')::text AS grantor,
    COALESCE(grantee.rolname, 'public')::text AS grantee,
    grants.privilege_type AS type,
    current_database()::text AS database,
    '' AS schema,
    grants.nspname::text AS object,
    FALSE AS partial
FROM grants
LEFT OUTER JOIN pg_catalog.pg_roles AS grantor ON grantor.oid = grants.grantor
LEFT OUTER JOIN pg_catalog.pg_roles AS grantee ON grantee.oid = grants.grantee
WHERE grants.privilege_type = ANY ($1)
ORDER BY 2, 6, 3";

// A grant on ALL TABLES is partial when some tables of the schema lack it.
static INSPECT_ALL_TABLES: &str = "
WITH namespaces AS (
    SELECT oid, nspname
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema'
), relations AS (
    SELECT c.oid, c.relnamespace, c.relacl, c.relowner
    FROM pg_catalog.pg_class AS c
    JOIN namespaces ON namespaces.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'v', 'm', 'f', 'p')
), totals AS (
    SELECT relnamespace, COUNT(*) AS total FROM relations GROUP BY 1
), grants AS (
    SELECT oid, relnamespace, (aclexplode(COALESCE(relacl, acldefault('r', relowner)))).*
    FROM relations
)
SELECT
    '' AS grantor,
    COALESCE(grantee.rolname, 'public')::text AS grantee,
    grants.privilege_type AS type,
    current_database()::text AS database,
    namespaces.nspname::text AS schema,
    '' AS object,
    COUNT(DISTINCT grants.oid) < totals.total AS partial
FROM grants
JOIN namespaces ON namespaces.oid = grants.relnamespace
JOIN totals ON totals.relnamespace = grants.relnamespace
LEFT OUTER JOIN pg_catalog.pg_roles AS grantee ON grantee.oid = grants.grantee
WHERE grants.privilege_type = ANY ($1)
GROUP BY grantee.rolname, grants.privilege_type, namespaces.nspname, totals.total
ORDER BY 2, 5, 3";

static INSPECT_ALL_SEQUENCES: &str = "
WITH namespaces AS (
    SELECT oid, nspname
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema'
), relations AS (
    SELECT c.oid, c.relnamespace, c.relacl, c.relowner
    FROM pg_catalog.pg_class AS c
    JOIN namespaces ON namespaces.oid = c.relnamespace
    WHERE c.relkind = 'S'
), totals AS (
    SELECT relnamespace, COUNT(*) AS total FROM relations GROUP BY 1
), grants AS (
    SELECT oid, relnamespace, (aclexplode(COALESCE(relacl, acldefault('s', relowner)))).*
    FROM relations
)
SELECT
    '' AS grantor,
    COALESCE(grantee.rolname, 'public')::text AS grantee,
    grants.privilege_type AS type,
    current_database()::text AS database,
    namespaces.nspname::text AS schema,
    '' AS object,
    COUNT(DISTINCT grants.oid) < totals.total AS partial
FROM grants
JOIN namespaces ON namespaces.oid = grants.relnamespace
JOIN totals ON totals.relnamespace = grants.relnamespace
LEFT OUTER JOIN pg_catalog.pg_roles AS grantee ON grantee.oid = grants.grantee
WHERE grants.privilege_type = ANY ($1)
GROUP BY grantee.rolname, grants.privilege_type, namespaces.nspname, totals.total
ORDER BY 2, 5, 3";

static INSPECT_ALL_FUNCTIONS: &str = "
WITH namespaces AS (
    SELECT oid, nspname
    FROM pg_catalog.pg_namespace
    WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema'
), functions AS (
    SELECT p.oid, p.pronamespace, p.proacl, p.proowner
    FROM pg_catalog.pg_proc AS p
    JOIN namespaces ON namespaces.oid = p.pronamespace
), totals AS (
    SELECT pronamespace, COUNT(*) AS total FROM functions GROUP BY 1
), grants AS (
    SELECT oid, pronamespace, (aclexplode(COALESCE(proacl, acldefault('f', proowner)))).*
    FROM functions
)
SELECT
    '' AS grantor,
    COALESCE(grantee.rolname, 'public')::text AS grantee,
    grants.privilege_type AS type,
    current_database()::text AS database,
    namespaces.nspname::text AS schema,
    '' AS object,
    COUNT(DISTINCT grants.oid) < totals.total AS partial
FROM grants
JOIN namespaces ON namespaces.oid = grants.pronamespace
JOIN totals ON totals.pronamespace = grants.pronamespace
LEFT OUTER JOIN pg_catalog.pg_roles AS grantee ON grantee.oid = grants.grantee
WHERE grants.privilege_type = ANY ($1)
GROUP BY grantee.rolname, grants.privilege_type, namespaces.nspname, totals.total
ORDER BY 2, 5, 3";
