// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Expansion of templates against a directory entry.

use std::collections::BTreeMap;

use rolesync_ore::iter;

use crate::dn::Dn;
use crate::entry::Entry;
use crate::format::{self, Format};

/// Resolved values, indexed by expression.
pub type Values = BTreeMap<String, String>;

/// A consistent set of entry and sub-search entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` for static rules, which have no search.
    pub entry: Option<Entry>,
    /// Empty if there is no sub-search.
    pub subsearch_attribute: String,
    pub subsearch_entries: Vec<Entry>,
}

/// Values of sub-entry expressions, indexed by a synthetic key of the form
/// `subentry{i}-comb{j}`. Keys are kept in generation order.
#[derive(Debug, Default)]
struct SubValues {
    keys: Vec<String>,
    values: BTreeMap<String, Values>,
}

impl SearchResult {
    /// A result with no entry, used for rules without a search.
    pub fn static_result() -> SearchResult {
        SearchResult::default()
    }

    pub fn new(entry: Entry) -> SearchResult {
        SearchResult {
            entry: Some(entry),
            ..Default::default()
        }
    }

    pub fn with_subsearch(entry: Entry, attribute: &str, entries: Vec<Entry>) -> SearchResult {
        SearchResult {
            entry: Some(entry),
            subsearch_attribute: attribute.to_string(),
            subsearch_entries: entries,
        }
    }

    /// Generates one map of expression values per combination of the values
    /// of the attributes referenced by `formats`.
    ///
    /// Combinations are produced lazily in a deterministic order: entry
    /// attribute values, then sub-entries, in cartesian index order. An
    /// attribute without any value yields no combination at all. An
    /// expression that cannot be resolved for a combination, like a
    /// malformed DN, is logged and left out of that combination's map.
    pub fn generate_values<'a, I>(&'a self, formats: I) -> impl Iterator<Item = Values> + 'a
    where
        I: IntoIterator<Item = &'a Format>,
    {
        let expressions = format::list_expressions(formats);
        let attributes = format::list_variables(&expressions);

        // With a sub-search, parent values are combined with every
        // combination of every sub-entry at once. Sub-entry combinations are
        // resolved first and referenced by their key, so that they combine
        // like any other list of attribute values.
        let sub_values = if self.subsearch_attribute.is_empty() {
            SubValues::default()
        } else {
            self.generate_subsearch_values(&expressions)
        };

        let resolver = Resolver {
            entry: self.entry.as_ref(),
            subsearch_attribute: &self.subsearch_attribute,
        };
        let combinations = resolver.generate_combinations(attributes, &sub_values.keys);
        combinations
            .map(move |values| resolver.resolve_expressions(&expressions, &values, &sub_values.values))
    }

    fn generate_subsearch_values(&self, parent_expressions: &[String]) -> SubValues {
        // {member.sAMAccountName} becomes {sAMAccountName} in the scope of
        // the sub-entry.
        let expressions: Vec<String> = parent_expressions
            .iter()
            .filter_map(|e| strip_attribute_prefix(e, &self.subsearch_attribute))
            .map(str::to_string)
            .collect();
        let attributes = format::list_variables(&expressions);

        let mut sub_values = SubValues::default();
        for (i, sub_entry) in self.subsearch_entries.iter().enumerate() {
            let resolver = Resolver {
                entry: Some(sub_entry),
                subsearch_attribute: "",
            };
            let combinations = resolver.generate_combinations(attributes.clone(), &[]);
            for (j, values) in combinations.enumerate() {
                let key = format!("subentry{}-comb{}", i, j);
                let values = resolver.resolve_expressions(&expressions, &values, &BTreeMap::new());
                sub_values.keys.push(key.clone());
                sub_values.values.insert(key, values);
            }
        }
        sub_values
    }
}

/// Returns `field` if `expression` is `attribute.field`, ignoring the case
/// of `attribute`.
fn strip_attribute_prefix<'a>(expression: &'a str, attribute: &str) -> Option<&'a str> {
    let (prefix, field) = expression.split_once('.')?;
    prefix.eq_ignore_ascii_case(attribute).then_some(field)
}

/// Returns the raw value of `variable`, whatever its spelling in `values`.
fn lookup<'v>(values: &'v Values, variable: &str) -> Option<&'v String> {
    values.get(variable).or_else(|| {
        values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(variable))
            .map(|(_, value)| value)
    })
}

#[derive(Clone, Copy)]
struct Resolver<'a> {
    entry: Option<&'a Entry>,
    subsearch_attribute: &'a str,
}

impl<'a> Resolver<'a> {
    fn is_subsearch_attribute(&self, attribute: &str) -> bool {
        !self.subsearch_attribute.is_empty() && attribute.eq_ignore_ascii_case(self.subsearch_attribute)
    }

    /// Generates the cartesian product of raw values of `attributes`, as maps
    /// of attribute to value.
    fn generate_combinations(
        &self,
        attributes: Vec<String>,
        sub_keys: &[String],
    ) -> impl Iterator<Item = Values> + 'a {
        let lists = attributes
            .iter()
            .map(|attribute| {
                if attribute.eq_ignore_ascii_case("dn") {
                    self.entry.map(|e| vec![e.dn.clone()]).unwrap_or_default()
                } else if self.is_subsearch_attribute(attribute) {
                    sub_keys.to_vec()
                } else {
                    self.entry
                        .map(|e| e.attribute_values(attribute).to_vec())
                        .unwrap_or_default()
                }
            })
            .collect();

        iter::product(lists).map(move |item| attributes.iter().cloned().zip(item).collect())
    }

    /// Resolves `expressions` from raw attribute values, or from pre-resolved
    /// sub-entry values.
    fn resolve_expressions(
        &self,
        expressions: &[String],
        values: &Values,
        sub_values: &BTreeMap<String, Values>,
    ) -> Values {
        let mut resolved = Values::new();
        for expression in expressions {
            let Some((attribute, field)) = expression.split_once('.') else {
                // Case: {cn}
                if let Some(value) = lookup(values, expression) {
                    resolved.insert(expression.clone(), value.clone());
                }
                continue;
            };
            let Some(value) = lookup(values, attribute) else {
                continue;
            };

            // Case: {member.sAMAccountName}
            if self.is_subsearch_attribute(attribute) {
                match sub_values.get(value).and_then(|v| v.get(field)) {
                    Some(sub_value) => {
                        resolved.insert(expression.clone(), sub_value.clone());
                    }
                    None => tracing::warn!(
                        expression = %expression,
                        key = %value,
                        "unresolved sub-search expression"
                    ),
                }
                continue;
            }

            // Case: {member.cn}
            let dn: Dn = match value.parse() {
                Ok(dn) => dn,
                Err(err) => {
                    tracing::warn!(dn = %value, rdn = %field, error = %err, "bad DN");
                    continue;
                }
            };
            match dn.find(field) {
                Some(rdn_value) => {
                    resolved.insert(expression.clone(), rdn_value.to_string());
                }
                None => tracing::warn!(dn = %value, rdn = %field, "unexpected DN"),
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rolesync_ore::test::capture_warnings;

    use super::{SearchResult, Values};
    use crate::entry::Entry;
    use crate::format::Format;

    fn formats(inputs: &[&str]) -> Vec<Format> {
        inputs.iter().map(|i| Format::parse(i).unwrap()).collect()
    }

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[rolesync_ore::test]
    fn test_static_result_yields_one_binding() {
        let result = SearchResult::static_result();
        let formats = formats(&["alice"]);
        let generated: Vec<_> = result.generate_values(&formats).collect();
        assert_eq!(generated, vec![Values::new()]);
    }

    #[rolesync_ore::test]
    fn test_multi_valued_attributes_combine() {
        let entry = Entry::new("cn=dba,ou=groups")
            .with_attribute("cn", ["dba"])
            .with_attribute("mail", ["a@acme", "b@acme"]);
        let result = SearchResult::new(entry);
        let formats = formats(&["{cn}", "{mail}"]);
        let generated: Vec<_> = result.generate_values(&formats).collect();
        assert_eq!(
            generated,
            vec![
                values(&[("cn", "dba"), ("mail", "a@acme")]),
                values(&[("cn", "dba"), ("mail", "b@acme")]),
            ]
        );
    }

    #[rolesync_ore::test]
    fn test_missing_attribute_suppresses_expansion() {
        let entry = Entry::new("cn=dba,ou=groups").with_attribute("cn", ["dba"]);
        let result = SearchResult::new(entry);
        let formats = formats(&["{cn}_{description}"]);
        assert_eq!(result.generate_values(&formats).count(), 0);
    }

    #[rolesync_ore::test]
    fn test_dn_rdn_field() {
        let result = SearchResult::new(Entry::new("cn=alice,ou=users"));
        let formats = formats(&["{dn.cn}", "{dn}"]);
        let generated: Vec<_> = result.generate_values(&formats).collect();
        assert_eq!(
            generated,
            vec![values(&[("dn", "cn=alice,ou=users"), ("dn.cn", "alice")])]
        );
    }

    #[rolesync_ore::test]
    fn test_member_rdn_field() {
        let entry = Entry::new("cn=dba,ou=groups").with_attribute(
            "member",
            ["cn=alice,ou=users", "uid=bob,ou=users", "not a dn"],
        );
        let result = SearchResult::new(entry);
        let formats = formats(&["{member.cn}"]);
        let (generated, warnings) = capture_warnings(|| result.generate_values(&formats).collect::<Vec<_>>());
        // One binding per value, unresolved expressions are left unset.
        assert_eq!(
            generated,
            vec![values(&[("member.cn", "alice")]), Values::new(), Values::new()]
        );
        assert_eq!(warnings, vec!["unexpected DN", "bad DN"]);
    }

    #[rolesync_ore::test]
    fn test_subsearch() {
        let entry = Entry::new("cn=dba,ou=groups")
            .with_attribute("cn", ["dba"])
            .with_attribute("member", ["cn=alice,ou=users", "cn=bob,ou=users"]);
        let sub_entries = vec![
            Entry::new("cn=alice,ou=users").with_attribute("sAMAccountName", ["ALICE"]),
            Entry::new("cn=bob,ou=users").with_attribute("sAMAccountName", ["BOB"]),
        ];
        let result = SearchResult::with_subsearch(entry, "member", sub_entries);
        let formats = formats(&["{cn}", "{member.sAMAccountName}"]);

        let sub_values = result.generate_subsearch_values(&[
            "cn".to_string(),
            "member.sAMAccountName".to_string(),
        ]);
        assert_eq!(sub_values.keys, vec!["subentry0-comb0", "subentry1-comb0"]);
        assert_eq!(
            sub_values.values["subentry1-comb0"],
            values(&[("sAMAccountName", "BOB")])
        );

        let generated: Vec<_> = result.generate_values(&formats).collect();
        assert_eq!(
            generated,
            vec![
                values(&[("cn", "dba"), ("member.sAMAccountName", "ALICE")]),
                values(&[("cn", "dba"), ("member.sAMAccountName", "BOB")]),
            ]
        );
    }

    #[rolesync_ore::test]
    fn test_subsearch_attribute_spellings_share_sub_entries() {
        let entry = Entry::new("cn=staff").with_attribute("member", ["cn=a", "cn=b"]);
        let sub_entries = vec![
            Entry::new("cn=a").with_attribute("cn", ["a"]).with_attribute("mail", ["a@x"]),
            Entry::new("cn=b").with_attribute("cn", ["b"]).with_attribute("mail", ["b@x"]),
        ];
        let result = SearchResult::with_subsearch(entry, "member", sub_entries);
        let formats = formats(&["{member.cn} {Member.mail}"]);
        let generated: Vec<String> = result
            .generate_values(&formats)
            .map(|values| formats[0].format(&values))
            .collect();
        assert_eq!(generated, vec!["a a@x", "b b@x"]);
    }

    #[rolesync_ore::test]
    fn test_attribute_spellings_share_values() {
        let entry = Entry::new("cn=dba")
            .with_attribute("cn", ["dba"])
            .with_attribute("mail", ["a@acme", "b@acme"]);
        let result = SearchResult::new(entry);
        let formats = formats(&["{mail}/{MAIL}"]);
        let generated: Vec<String> = result
            .generate_values(&formats)
            .map(|values| formats[0].format(&values))
            .collect();
        assert_eq!(generated, vec!["a@acme/a@acme", "b@acme/b@acme"]);
    }

    #[rolesync_ore::test]
    fn test_subsearch_keys_follow_entry_order() {
        // More than ten sub-entries, so that lexicographic key order would
        // differ from sub-entry order.
        let names: Vec<String> = (0..12).map(|i| format!("user{}", i)).collect();
        let sub_entries = names
            .iter()
            .map(|name| Entry::new(format!("cn={}", name)).with_attribute("cn", [name.as_str()]))
            .collect();
        let entry = Entry::new("cn=dba").with_attribute("member", names.iter().map(|n| format!("cn={}", n)));
        let result = SearchResult::with_subsearch(entry, "member", sub_entries);
        let formats = formats(&["{member.cn}"]);
        let generated: Vec<String> = result
            .generate_values(&formats)
            .map(|v| v["member.cn"].clone())
            .collect();
        assert_eq!(generated, names);
    }

    #[rolesync_ore::test]
    fn test_subsearch_without_entries_yields_nothing() {
        let entry = Entry::new("cn=dba").with_attribute("member", ["cn=alice"]);
        let result = SearchResult::with_subsearch(entry, "member", vec![]);
        let formats = formats(&["{member.cn}"]);
        assert_eq!(result.generate_values(&formats).count(), 0);
    }

    #[rolesync_ore::test]
    fn test_unrelated_attribute_expressions_are_not_in_sub_scope() {
        let result = SearchResult::with_subsearch(Entry::new("cn=dba"), "member", vec![]);
        let sub_values = result.generate_subsearch_values(&["manager.cn".to_string()]);
        assert!(sub_values.keys.is_empty());
        assert_eq!(sub_values.values, BTreeMap::new());
    }
}
