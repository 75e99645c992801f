// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Inspection of the roles and grants of a PostgreSQL cluster.
//!
//! Inspection builds the actual state of the cluster, in the same shape as
//! the wanted state, so that both can be compared. Unlike directory searches,
//! any failure here aborts the inspection: a partial actual state cannot be
//! compared safely.

use std::collections::BTreeMap;
use std::future::Future;

use rolesync_ore::error::ErrorExt;
use rolesync_ore::stopwatch::StopWatch;
use rolesync_privilege::{Grant, Privilege, CATALOG};
use rolesync_role::{Blacklist, BlacklistError, RoleMap};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod client;

pub use client::{CatalogClient, ClientError};

/// Connectable databases.
pub const DEFAULT_DATABASES_QUERY: &str = "
SELECT datname::text
FROM pg_catalog.pg_database
WHERE datallowconn IS TRUE
ORDER BY 1";

/// Roles with their options, parents and comment.
pub const DEFAULT_ROLES_QUERY: &str = "
SELECT
    rol.rolname::text AS rolname,
    rol.rolsuper,
    rol.rolcreatedb,
    rol.rolcreaterole,
    rol.rolinherit,
    rol.rolcanlogin,
    rol.rolreplication,
    rol.rolbypassrls,
    rol.rolconnlimit,
    COALESCE(
        array_agg(par.rolname::text ORDER BY par.rolname) FILTER (WHERE par.rolname IS NOT NULL),
        ARRAY[]::text[]
    ) AS parents,
    pg_catalog.shobj_description(rol.oid, 'pg_authid') AS comment
FROM pg_catalog.pg_roles AS rol
LEFT OUTER JOIN pg_catalog.pg_auth_members AS ms ON ms.member = rol.oid
LEFT OUTER JOIN pg_catalog.pg_roles AS par ON par.oid = ms.roleid
GROUP BY rol.oid, rol.rolname, rol.rolsuper, rol.rolcreatedb, rol.rolcreaterole,
    rol.rolinherit, rol.rolcanlogin, rol.rolreplication, rol.rolbypassrls, rol.rolconnlimit
ORDER BY 1";

/// Queries describing what to inspect.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_databases_query")]
    pub databases_query: String,
    #[serde(default)]
    pub roles_blacklist_query: BlacklistQuery,
    #[serde(default = "default_roles_query")]
    pub roles_query: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            databases_query: default_databases_query(),
            roles_blacklist_query: BlacklistQuery::default(),
            roles_query: default_roles_query(),
        }
    }
}

fn default_databases_query() -> String {
    DEFAULT_DATABASES_QUERY.to_string()
}

fn default_roles_query() -> String {
    DEFAULT_ROLES_QUERY.to_string()
}

/// Either a static list of patterns, or a query returning them.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum BlacklistQuery {
    Patterns(Blacklist),
    Sql(String),
}

impl Default for BlacklistQuery {
    fn default() -> BlacklistQuery {
        BlacklistQuery::Patterns(Blacklist::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("error connecting to PostgreSQL")]
    Connect(#[source] tokio_postgres::Error),
    #[error("inspection cancelled")]
    Cancelled,
    #[error("{query} query failed")]
    Query {
        query: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("bad row from {query} query")]
    Decode {
        query: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("bad roles blacklist")]
    Blacklist(#[from] BlacklistError),
}

impl InspectError {
    fn from_client(query: &str, error: ClientError) -> InspectError {
        let query = query.to_string();
        match error {
            ClientError::Query(source) => InspectError::Query { query, source },
            ClientError::Decode(source) => InspectError::Decode { query, source },
        }
    }
}

/// The actual state of a cluster.
#[derive(Debug, Default)]
pub struct Instance {
    /// Databases visible to the connection.
    pub databases: Vec<String>,
    pub roles_blacklist: Blacklist,
    pub roles: RoleMap,
    pub grants: Vec<Grant>,
}

/// Connects to `url` and inspects the cluster.
///
/// `managed` lists the privilege types to inspect, by object kind. The
/// connection is closed before returning.
pub async fn inspect(
    url: &str,
    config: &Config,
    managed: &BTreeMap<String, Vec<String>>,
    watch: &mut StopWatch,
    cancel: &CancellationToken,
) -> Result<Instance, InspectError> {
    let (client, connection) = tokio_postgres::connect(url, tokio_postgres::NoTls)
        .await
        .map_err(InspectError::Connect)?;
    let connection = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e.display_with_causes(), "PostgreSQL connection error");
        }
    });

    let result = Instance::inspect(&client, config, managed, watch, cancel).await;
    drop(client);
    // The connection task ends once the client is gone.
    join_connection(connection).await;
    result
}

async fn join_connection(connection: JoinHandle<()>) {
    if let Err(e) = connection.await {
        tracing::warn!(error = %e.display_with_causes(), "PostgreSQL connection task failed");
    }
}

impl Instance {
    /// Inspects databases, blacklist, roles and grants, in that order.
    pub async fn inspect(
        client: &dyn CatalogClient,
        config: &Config,
        managed: &BTreeMap<String, Vec<String>>,
        watch: &mut StopWatch,
        cancel: &CancellationToken,
    ) -> Result<Instance, InspectError> {
        let mut instance = Instance::default();

        debug!(query = %config.databases_query, "inspecting databases");
        instance.databases = run_query(
            "databases",
            cancel,
            watch.time(client.query_strings(&config.databases_query)),
        )
        .await?;

        instance.roles_blacklist = match &config.roles_blacklist_query {
            BlacklistQuery::Patterns(blacklist) => blacklist.clone(),
            BlacklistQuery::Sql(query) => {
                debug!(query = %query, "inspecting roles blacklist");
                let patterns = run_query(
                    "roles blacklist",
                    cancel,
                    watch.time(client.query_strings(query)),
                )
                .await?;
                Blacklist::new(patterns)?
            }
        };

        instance
            .inspect_roles(client, &config.roles_query, watch, cancel)
            .await?;
        instance
            .inspect_grants_with(CATALOG, client, managed, watch, cancel)
            .await?;
        Ok(instance)
    }

    async fn inspect_roles(
        &mut self,
        client: &dyn CatalogClient,
        query: &str,
        watch: &mut StopWatch,
        cancel: &CancellationToken,
    ) -> Result<(), InspectError> {
        debug!(query = %query, "inspecting roles");
        let roles = run_query("roles", cancel, watch.time(client.query_roles(query))).await?;
        for role in roles {
            if let Some(pattern) = self.roles_blacklist.match_str(&role.name) {
                debug!(role = %role.name, pattern, "ignoring blacklisted role");
                continue;
            }
            debug!(
                name = %role.name,
                options = %role.options,
                parents = ?role.parents,
                "found role"
            );
            self.roles.insert(role.name.clone(), role);
        }
        Ok(())
    }

    /// Inspects the grants of every privilege of `catalog` with managed
    /// types, in catalog order.
    pub async fn inspect_grants_with(
        &mut self,
        catalog: &[Privilege],
        client: &dyn CatalogClient,
        managed: &BTreeMap<String, Vec<String>>,
        watch: &mut StopWatch,
        cancel: &CancellationToken,
    ) -> Result<(), InspectError> {
        for privilege in catalog {
            let Some(types) = managed.get(privilege.object).filter(|t| !t.is_empty()) else {
                continue;
            };

            debug!(
                scope = %privilege.scope,
                object = privilege.object,
                types = ?types,
                "inspecting grants"
            );
            let query = format!("{privilege} grants");
            let grants = run_query(
                &query,
                cancel,
                watch.time(client.query_grants(privilege.inspect, types)),
            )
            .await?;
            for mut grant in grants {
                // Queries span all databases, only keep the visible ones.
                if !grant.database.is_empty() && !self.databases.contains(&grant.database) {
                    continue;
                }
                if let Some(pattern) = self.roles_blacklist.match_str(&grant.grantee) {
                    debug!(grantee = %grant.grantee, pattern, "ignoring grant to blacklisted role");
                    continue;
                }
                grant.target = privilege.object.to_string();
                grant.normalize();
                debug!(%grant, "found grant");
                self.grants.push(grant);
            }
        }
        Ok(())
    }
}

async fn run_query<T, F>(query: &str, cancel: &CancellationToken, future: F) -> Result<T, InspectError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    if cancel.is_cancelled() {
        return Err(InspectError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InspectError::Cancelled),
        result = future => result.map_err(|e| InspectError::from_client(query, e)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use rolesync_ore::stopwatch::StopWatch;
    use rolesync_ore::test::capture_warnings;
    use rolesync_privilege::{Grant, CATALOG};
    use rolesync_role::{Role, RoleOptions};
    use tokio_util::sync::CancellationToken;

    use super::{BlacklistQuery, CatalogClient, ClientError, Config, InspectError, Instance};

    /// Answers queries by their text, recording them.
    #[derive(Default)]
    struct MockClient {
        strings: BTreeMap<String, Vec<String>>,
        grants: BTreeMap<String, Result<Vec<Grant>, &'static str>>,
        roles: Vec<Role>,
        executed: Mutex<Vec<String>>,
        /// Cancelled when grants are queried, then never answers.
        cancel_on_grants: Option<CancellationToken>,
    }

    impl MockClient {
        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogClient for MockClient {
        async fn query_strings(&self, query: &str) -> Result<Vec<String>, ClientError> {
            self.executed.lock().unwrap().push(query.to_string());
            Ok(self.strings.get(query).cloned().unwrap_or_default())
        }

        async fn query_grants(
            &self,
            query: &str,
            types: &[String],
        ) -> Result<Vec<Grant>, ClientError> {
            self.executed.lock().unwrap().push(query.to_string());
            if let Some(cancel) = &self.cancel_on_grants {
                cancel.cancel();
                std::future::pending::<()>().await;
            }
            match self.grants.get(query) {
                Some(Ok(grants)) => Ok(grants
                    .iter()
                    .filter(|g| types.contains(&g.type_))
                    .cloned()
                    .collect()),
                Some(Err(message)) if message.starts_with("decode") => {
                    Err(ClientError::Decode(anyhow::anyhow!("{message}")))
                }
                Some(Err(message)) => Err(ClientError::Query(anyhow::anyhow!("{message}"))),
                None => Ok(vec![]),
            }
        }

        async fn query_roles(&self, query: &str) -> Result<Vec<Role>, ClientError> {
            self.executed.lock().unwrap().push(query.to_string());
            Ok(self.roles.clone())
        }
    }

    fn grant(type_: &str, grantee: &str, database: &str) -> Grant {
        Grant {
            grantor: "postgres".into(),
            grantee: grantee.into(),
            type_: type_.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    fn managed(yaml: &str) -> BTreeMap<String, Vec<String>> {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn instance() -> Instance {
        Instance {
            databases: vec!["app".into(), "postgres".into()],
            ..Default::default()
        }
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_only_managed_privileges_are_inspected() {
        let (database, schema) = (&CATALOG[0], &CATALOG[1]);
        assert_eq!((database.object, schema.object), ("DATABASE", "SCHEMA"));
        let client = MockClient {
            grants: BTreeMap::from([(
                database.inspect.to_string(),
                Ok(vec![
                    grant("CONNECT", "alice", "app"),
                    grant("TEMPORARY", "alice", "app"),
                    grant("CONNECT", "bob", "template0"),
                ]),
            )]),
            ..Default::default()
        };

        let mut instance = instance();
        instance
            .inspect_grants_with(
                &CATALOG[..2],
                &client,
                &managed("{DATABASE: [CONNECT], SCHEMA: []}"),
                &mut StopWatch::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(client.executed(), vec![database.inspect]);
        assert_eq!(
            instance.grants,
            vec![Grant {
                target: "DATABASE".into(),
                grantee: "alice".into(),
                type_: "CONNECT".into(),
                object: "app".into(),
                ..Default::default()
            }]
        );
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_query_error_is_fatal() {
        let client = MockClient {
            grants: BTreeMap::from([
                (CATALOG[0].inspect.to_string(), Err("permission denied")),
                (CATALOG[1].inspect.to_string(), Ok(vec![grant("USAGE", "alice", "app")])),
            ]),
            ..Default::default()
        };
        let mut instance = instance();
        let err = instance
            .inspect_grants_with(
                CATALOG,
                &client,
                &managed("{DATABASE: [CONNECT], SCHEMA: [USAGE]}"),
                &mut StopWatch::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(&err, InspectError::Query { query, .. } if query == "instance DATABASE grants")
        );
        assert_eq!(client.executed().len(), 1);
        assert!(instance.grants.is_empty());
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_decode_error_is_fatal() {
        let client = MockClient {
            grants: BTreeMap::from([(CATALOG[1].inspect.to_string(), Err("decode: bad column"))]),
            ..Default::default()
        };
        let err = instance()
            .inspect_grants_with(
                CATALOG,
                &client,
                &managed("{SCHEMA: [USAGE]}"),
                &mut StopWatch::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(&err, InspectError::Decode { query, .. } if query == "database SCHEMA grants")
        );
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_cancelled() {
        let client = MockClient::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Instance::inspect(
            &client,
            &Config::default(),
            &managed("{DATABASE: [CONNECT]}"),
            &mut StopWatch::default(),
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, InspectError::Cancelled));
        assert!(client.executed().is_empty());
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_cancelled_while_querying() {
        let cancel = CancellationToken::new();
        let client = MockClient {
            strings: BTreeMap::from([("databases".to_string(), vec!["app".to_string()])]),
            grants: BTreeMap::from([(
                CATALOG[0].inspect.to_string(),
                Ok(vec![grant("CONNECT", "alice", "app")]),
            )]),
            cancel_on_grants: Some(cancel.clone()),
            ..Default::default()
        };
        let config = Config {
            databases_query: "databases".into(),
            roles_query: "roles".into(),
            ..Default::default()
        };
        let mut watch = StopWatch::default();

        let err = Instance::inspect(
            &client,
            &config,
            &managed("{DATABASE: [CONNECT], SCHEMA: [USAGE]}"),
            &mut watch,
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, InspectError::Cancelled));
        // The pending grants query is abandoned, the next one never runs.
        assert_eq!(
            client.executed(),
            vec!["databases", "roles", CATALOG[0].inspect]
        );
        assert_eq!(watch.count, 2);
    }

    #[rolesync_ore::test(tokio::test)]
    async fn test_inspect() {
        let config = Config {
            databases_query: "databases".into(),
            roles_blacklist_query: BlacklistQuery::Sql("blacklist".into()),
            roles_query: "roles".into(),
        };
        let role = |name: &str| Role {
            name: name.into(),
            options: "LOGIN".parse::<RoleOptions>().unwrap(),
            ..Default::default()
        };
        let client = MockClient {
            strings: BTreeMap::from([
                ("databases".to_string(), vec!["app".to_string()]),
                ("blacklist".to_string(), vec!["pg_*".to_string(), "rds*".to_string()]),
            ]),
            grants: BTreeMap::from([(
                CATALOG[1].inspect.to_string(),
                Ok(vec![
                    grant("USAGE", "alice", "app"),
                    grant("USAGE", "alice", "other"),
                    grant("USAGE", "pg_monitor", "app"),
                    grant("USAGE", "rdsadmin", "app"),
                ]),
            )]),
            roles: vec![role("alice"), role("rdsadmin"), role("pg_monitor")],
            ..Default::default()
        };
        let mut watch = StopWatch::default();

        let instance = Instance::inspect(
            &client,
            &config,
            &managed("{SCHEMA: [USAGE]}"),
            &mut watch,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(instance.databases, vec!["app"]);
        assert_eq!(instance.roles_blacklist.match_str("rdsadmin"), Some("rds*"));
        assert_eq!(instance.roles.keys().collect::<Vec<_>>(), vec!["alice"]);
        assert_eq!(
            instance.grants,
            vec![Grant {
                target: "SCHEMA".into(),
                grantee: "alice".into(),
                type_: "USAGE".into(),
                database: "app".into(),
                ..Default::default()
            }]
        );
        assert_eq!(
            client.executed(),
            vec!["databases", "blacklist", "roles", CATALOG[1].inspect]
        );
        assert_eq!(watch.count, 4);
    }

    #[rolesync_ore::test]
    fn test_connection_task_failure_is_logged() {
        let ((), warnings) = capture_warnings(|| {
            tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap()
                .block_on(async {
                    let connection = tokio::spawn(async { panic!("connection lost") });
                    super::join_connection(connection).await;
                })
        });
        assert_eq!(warnings, vec!["PostgreSQL connection task failed"]);
    }

    #[rolesync_ore::test]
    fn test_config_deserialize() {
        let config: Config = serde_yaml::from_str("roles_blacklist_query: [pg_*, rds*]").unwrap();
        assert!(matches!(config.roles_blacklist_query, BlacklistQuery::Patterns(_)));
        assert_eq!(config.roles_query, super::DEFAULT_ROLES_QUERY);

        let config: Config =
            serde_yaml::from_str("roles_blacklist_query: SELECT 'pg_*'").unwrap();
        assert!(matches!(config.roles_blacklist_query, BlacklistQuery::Sql(sql) if sql == "SELECT 'pg_*'"));
    }
}
