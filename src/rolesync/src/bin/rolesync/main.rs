// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Synchronizes PostgreSQL roles and grants from a directory.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use rolesync::ldap::LdapConnector;
use rolesync::{Outcome, RunConfig};
use rolesync_ore::cli;
use rolesync_ore::tracing::{StderrLogConfig, TracingConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::filter::Targets;

#[derive(Parser, Debug)]
#[clap(name = "rolesync", next_line_help = true, version)]
struct Args {
    /// Path to the YAML configuration file.
    #[clap(long, short = 'c', env = "ROLESYNC_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Report changes as if they were applied.
    #[clap(long, short = 'R')]
    real: bool,
    /// Exit with status 1 if the cluster is not in sync.
    #[clap(long, short = 'C')]
    check: bool,
    /// Which log messages to emit.
    #[clap(
        long,
        env = "ROLESYNC_LOG_FILTER",
        value_name = "FILTER",
        default_value = "info"
    )]
    log_filter: Targets,

    // === PostgreSQL options. ===
    /// PostgreSQL connection string.
    #[clap(
        long,
        env = "PGURL",
        value_name = "URL",
        default_value = "postgres://postgres@localhost/postgres"
    )]
    postgres_url: String,

    // === LDAP options. ===
    #[clap(long, env = "LDAPURI", value_name = "URI")]
    ldap_uri: Option<String>,
    #[clap(long, env = "LDAPBINDDN", value_name = "DN")]
    ldap_bind_dn: Option<String>,
    #[clap(long, env = "LDAPPASSWORD", value_name = "PASSWORD", hide_env_values = true)]
    ldap_password: Option<String>,
}

#[tokio::main]
async fn main() {
    let args: Args = cli::parse_args();

    if let Err(err) = rolesync_ore::tracing::configure(TracingConfig {
        stderr_log: StderrLogConfig {
            prefix: None,
            filter: args.log_filter.clone(),
        },
    }) {
        eprintln!("rolesync: {:#}", err);
        process::exit(1);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    let check = args.check;
    let config = RunConfig {
        config: args.config,
        real: args.real,
        postgres_url: args.postgres_url,
        ldap: LdapConnector {
            uri: args.ldap_uri,
            bind_dn: args.ldap_bind_dn,
            password: args.ldap_password,
        },
    };
    match rolesync::run(config, &cancel).await {
        Ok(Outcome::InSync) => tracing::info!("nothing to do"),
        Ok(Outcome::Drift { missing, spurious }) => {
            tracing::info!(missing, spurious, "cluster not in sync");
            if check {
                process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("rolesync: {:#}", err);
            process::exit(1);
        }
    }
}
