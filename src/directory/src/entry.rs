// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;

/// A directory entry: a distinguished name and its multi-valued attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: impl Into<String>) -> Entry {
        Entry {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds `values` to the attribute `name`, builder style.
    pub fn with_attribute<I, S>(mut self, name: &str, values: I) -> Entry
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(name.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Returns the values of attribute `name`, or an empty slice if the entry
    /// has no such attribute. Attribute names are compared ignoring ASCII
    /// case.
    pub fn attribute_values(&self, name: &str) -> &[String] {
        if let Some(values) = self.attributes.get(name) {
            return values;
        }
        self.attributes
            .iter()
            .find(|(attribute, _)| attribute.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::Entry;

    #[rolesync_ore::test]
    fn test_attribute_values_ignore_case() {
        let entry = Entry::new("cn=alice,ou=people,dc=acme").with_attribute("sAMAccountName", ["alice"]);
        assert_eq!(entry.attribute_values("samaccountname"), ["alice"]);
        assert_eq!(entry.attribute_values("sAMAccountName"), ["alice"]);
        assert!(entry.attribute_values("mail").is_empty());
    }
}
