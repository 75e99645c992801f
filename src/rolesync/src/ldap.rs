// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! LDAP transport for directory searches.

use std::collections::BTreeMap;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, SearchEntry};
use rolesync_directory::{Connector, Directory, DirectoryError, Entry, Scope};
use rolesync_ore::error::ErrorExt;

/// Connects to an LDAP server, binding with `bind_dn` if set.
#[derive(Debug, Clone, Default)]
pub struct LdapConnector {
    pub uri: Option<String>,
    pub bind_dn: Option<String>,
    pub password: Option<String>,
}

struct LdapDirectory {
    ldap: Ldap,
}

#[async_trait]
impl Connector for LdapConnector {
    async fn connect(&self) -> Result<Box<dyn Directory>, DirectoryError> {
        let Some(uri) = &self.uri else {
            return Err(DirectoryError::Connect(anyhow::anyhow!(
                "LDAP URI not configured"
            )));
        };
        tracing::debug!(uri = %uri, "connecting to LDAP server");
        let (conn, mut ldap) = LdapConnAsync::new(uri)
            .await
            .map_err(|e| DirectoryError::Connect(e.into()))?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e.display_with_causes(), "LDAP connection error");
            }
        });

        if let Some(bind_dn) = &self.bind_dn {
            tracing::debug!(bind_dn = %bind_dn, "binding to LDAP server");
            let password = self.password.as_deref().unwrap_or_default();
            ldap.simple_bind(bind_dn, password)
                .await
                .and_then(|result| result.success())
                .map_err(|e| DirectoryError::Connect(e.into()))?;
        }
        Ok(Box::new(LdapDirectory { ldap }))
    }
}

#[async_trait]
impl Directory for LdapDirectory {
    async fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attributes: &[String],
    ) -> Result<Vec<Entry>, DirectoryError> {
        let ldap_scope = match scope {
            Scope::Base => ldap3::Scope::Base,
            Scope::One => ldap3::Scope::OneLevel,
            Scope::Sub => ldap3::Scope::Subtree,
        };
        let (entries, _result) = self
            .ldap
            .search(base, ldap_scope, filter, attributes)
            .await
            .and_then(|result| result.success())
            .map_err(|e| DirectoryError::Search {
                base: base.to_string(),
                scope,
                filter: filter.to_string(),
                source: e.into(),
            })?;
        let entries: Vec<Entry> = entries
            .into_iter()
            .map(|entry| {
                let entry = SearchEntry::construct(entry);
                Entry {
                    dn: entry.dn,
                    attributes: entry.attrs.into_iter().collect::<BTreeMap<_, _>>(),
                }
            })
            .collect();
        tracing::debug!(base, count = entries.len(), "search done");
        Ok(entries)
    }

    async fn close(&mut self) -> Result<(), DirectoryError> {
        self.ldap
            .unbind()
            .await
            .map_err(|e| DirectoryError::Close(e.into()))
    }
}
