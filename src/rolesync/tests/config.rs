// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::io::Write;

use rolesync::config::{self, Config, ConfigError};
use rolesync_inspect::BlacklistQuery;

const CONFIG: &str = r#"
version: 6

postgres:
  roles_blacklist_query: [pg_*, postgres, rds*]

privileges:
  ro:
  - {type: CONNECT, on: DATABASE}
  - {type: USAGE, on: SCHEMA}
  - {type: SELECT, on: ALL TABLES}

rules:
- description: Static roles
  roles:
  - name: readers
    options: NOLOGIN
- description: Members of the DBA group
  ldapsearch:
    base: cn=dba,ou=groups,dc=acme,dc=tld
    scope: base
    subsearch:
      attribute: member
      scope: base
  roles:
  - name: "{member.cn}"
    options: {LOGIN: true}
    parents: [readers]
  - name: dba
  grants:
  - privilege: ro
    database: app
    to: "{member.cn}"
"#;

#[rolesync_ore::test]
fn test_parse() {
    let config = Config::parse(CONFIG).unwrap();
    assert_eq!(config.version, 6);
    assert!(matches!(
        config.postgres.roles_blacklist_query,
        BlacklistQuery::Patterns(ref blacklist) if blacklist.match_str("rdsadmin") == Some("rds*")
    ));

    let managed = config.privileges.managed_privileges();
    assert_eq!(managed["ALL TABLES"], vec!["SELECT"]);

    // The static `dba` role is split into a rule of its own.
    let rules = &config.rules.0;
    assert_eq!(rules.len(), 3);
    assert!(!rules[0].has_search());
    let search = rules[1].ldapsearch.as_ref().unwrap();
    assert_eq!(search.attributes, vec!["member"]);
    assert_eq!(search.subsearch.as_ref().unwrap().attributes, vec!["cn"]);
    assert!(!rules[2].has_search());
    assert_eq!(rules[2].roles[0].name.input(), "dba");
}

#[rolesync_ore::test]
fn test_version() {
    assert!(matches!(
        Config::parse("rules: []"),
        Err(ConfigError::MissingVersion)
    ));
    assert!(matches!(
        Config::parse("version: 5"),
        Err(ConfigError::UnsupportedVersion { ref version }) if version == "5"
    ));
    assert_eq!(
        Config::parse("version: 5").unwrap_err().to_string(),
        "unsupported configuration version 5, expected 6"
    );
    // A quoted version is not a number.
    assert_eq!(
        Config::parse("version: '6'").unwrap_err().to_string(),
        "unsupported configuration version \"6\", expected 6"
    );
    assert_eq!(
        Config::parse("version: 6.1").unwrap_err().to_string(),
        "unsupported configuration version 6.1, expected 6"
    );
    let config = Config::parse("version: 6").unwrap();
    assert!(config.rules.0.is_empty());
    assert!(matches!(
        config.postgres.roles_blacklist_query,
        BlacklistQuery::Patterns(_)
    ));
}

#[rolesync_ore::test]
fn test_invalid() {
    let err = Config::parse(
        "
version: 6
privileges:
  ro: [{type: EXECUTE, on: DATABASE}]
",
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid privileges"
    );

    let err = Config::parse(
        "
version: 6
rules:
- grants: [{privilege: rw, to: alice}]
",
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "rule 0: unknown privilege \"rw\"");

    assert!(matches!(
        Config::parse("version: 6\nrules: [{roles: [{name: '{cn'}]}]"),
        Err(ConfigError::Yaml(_))
    ));
    assert!(matches!(
        Config::parse("version: 6\nsync_map: []"),
        Err(ConfigError::Yaml(_))
    ));
}

#[rolesync_ore::test]
fn test_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let path = config::find_file(Some(file.path())).unwrap();
    assert_eq!(path, file.path());
    let config = Config::load(&path).unwrap();
    assert_eq!(config.rules.0.len(), 3);

    let err = Config::load(&file.path().with_extension("missing")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
