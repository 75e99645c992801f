// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Access to the PostgreSQL catalog.

use async_trait::async_trait;
use rolesync_privilege::Grant;
use rolesync_role::{Role, RoleOptions};
use tokio_postgres::Row;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("query failed")]
    Query(#[source] anyhow::Error),
    #[error("unexpected row")]
    Decode(#[source] anyhow::Error),
}

/// Queries the catalog of a cluster, decoding rows into model values.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Runs a query returning a single text column.
    async fn query_strings(&self, query: &str) -> Result<Vec<String>, ClientError>;

    /// Runs a grant inspection query, taking the privilege types to inspect
    /// as sole parameter.
    async fn query_grants(&self, query: &str, types: &[String])
        -> Result<Vec<Grant>, ClientError>;

    async fn query_roles(&self, query: &str) -> Result<Vec<Role>, ClientError>;
}

#[async_trait]
impl CatalogClient for tokio_postgres::Client {
    async fn query_strings(&self, query: &str) -> Result<Vec<String>, ClientError> {
        let rows = self
            .query(query, &[])
            .await
            .map_err(|e| ClientError::Query(e.into()))?;
        rows.iter()
            .map(|row| row.try_get(0).map_err(|e| ClientError::Decode(e.into())))
            .collect()
    }

    async fn query_grants(
        &self,
        query: &str,
        types: &[String],
    ) -> Result<Vec<Grant>, ClientError> {
        let rows = self
            .query(query, &[&types])
            .await
            .map_err(|e| ClientError::Query(e.into()))?;
        rows.iter()
            .map(|row| grant_from_row(row).map_err(|e| ClientError::Decode(e.into())))
            .collect()
    }

    async fn query_roles(&self, query: &str) -> Result<Vec<Role>, ClientError> {
        let rows = self
            .query(query, &[])
            .await
            .map_err(|e| ClientError::Query(e.into()))?;
        rows.iter()
            .map(|row| role_from_row(row).map_err(|e| ClientError::Decode(e.into())))
            .collect()
    }
}

/// Decodes the columns of a grant inspection query: grantor, grantee, type,
/// database, schema, object and partial.
fn grant_from_row(row: &Row) -> Result<Grant, tokio_postgres::Error> {
    let text = |idx: usize| -> Result<String, tokio_postgres::Error> {
        Ok(row.try_get::<_, Option<String>>(idx)?.unwrap_or_default())
    };
    Ok(Grant {
        grantor: text(0)?,
        grantee: text(1)?,
        type_: text(2)?,
        database: text(3)?,
        schema: text(4)?,
        object: text(5)?,
        partial: row.try_get(6)?,
        ..Default::default()
    })
}

fn role_from_row(row: &Row) -> Result<Role, tokio_postgres::Error> {
    Ok(Role {
        name: row.try_get("rolname")?,
        options: RoleOptions {
            superuser: Some(row.try_get("rolsuper")?),
            create_db: Some(row.try_get("rolcreatedb")?),
            create_role: Some(row.try_get("rolcreaterole")?),
            inherit: Some(row.try_get("rolinherit")?),
            login: Some(row.try_get("rolcanlogin")?),
            replication: Some(row.try_get("rolreplication")?),
            bypass_rls: Some(row.try_get("rolbypassrls")?),
            connection_limit: Some(row.try_get("rolconnlimit")?),
        },
        parents: row.try_get("parents")?,
        comment: row.try_get("comment")?,
    })
}
