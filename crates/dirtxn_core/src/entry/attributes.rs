//! Directory entries.

use crate::entry::modification::Modification;
use crate::entry::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A directory entry: a distinguished name and its attributes.
///
/// Each attribute holds a set of distinct values. An attribute with no
/// values does not exist; removing the last value removes the attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    dn: String,
    attributes: BTreeMap<String, BTreeSet<Value>>,
}

impl Entry {
    /// Creates an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds `values` to `attribute` and returns the entry.
    #[must_use]
    pub fn with<I, V>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_values(attribute, values.into_iter().map(Into::into));
        self
    }

    /// Returns the distinguished name.
    #[must_use]
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Changes the distinguished name.
    pub fn set_dn(&mut self, dn: impl Into<String>) {
        self.dn = dn.into();
    }

    /// Returns the values of `attribute`.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&BTreeSet<Value>> {
        self.attributes.get(attribute)
    }

    /// Returns true if `attribute` holds `value`.
    #[must_use]
    pub fn contains(&self, attribute: &str, value: &Value) -> bool {
        self.attributes
            .get(attribute)
            .is_some_and(|values| values.contains(value))
    }

    /// Iterates attribute names in order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Iterates `(attribute, values)` pairs in attribute order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &BTreeSet<Value>)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns true if the entry has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Adds values to an attribute, creating it if needed.
    pub fn add_values(&mut self, attribute: &str, values: impl IntoIterator<Item = Value>) {
        let set = self.attributes.entry(attribute.to_owned()).or_default();
        set.extend(values);
        if set.is_empty() {
            self.attributes.remove(attribute);
        }
    }

    /// Removes the given values; an empty list removes the whole attribute.
    pub fn remove_values(&mut self, attribute: &str, values: &[Value]) {
        if values.is_empty() {
            self.attributes.remove(attribute);
            return;
        }
        if let Some(set) = self.attributes.get_mut(attribute) {
            for value in values {
                set.remove(value);
            }
            if set.is_empty() {
                self.attributes.remove(attribute);
            }
        }
    }

    /// Replaces all values of an attribute; an empty list removes it.
    pub fn replace_values(&mut self, attribute: &str, values: impl IntoIterator<Item = Value>) {
        let set: BTreeSet<Value> = values.into_iter().collect();
        if set.is_empty() {
            self.attributes.remove(attribute);
        } else {
            self.attributes.insert(attribute.to_owned(), set);
        }
    }

    /// Applies a modification in place.
    pub fn apply(&mut self, modification: &Modification) {
        match modification {
            Modification::Add { attribute, values } => {
                self.add_values(attribute, values.iter().cloned());
            }
            Modification::Remove { attribute, values } => {
                self.remove_values(attribute, values);
            }
            Modification::Replace { attribute, values } => {
                self.replace_values(attribute, values.iter().cloned());
            }
            Modification::Rename { dn } => self.set_dn(dn.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Entry {
        Entry::new("cn=foo,ou=people,dc=example")
            .with("cn", ["foo"])
            .with("sn", ["orig"])
    }

    #[test]
    fn builder_and_lookup() {
        let entry = person();
        assert_eq!(entry.dn(), "cn=foo,ou=people,dc=example");
        assert!(entry.contains("cn", &Value::text("foo")));
        assert_eq!(entry.len(), 2);
        assert_eq!(entry.attribute_names().collect::<Vec<_>>(), vec!["cn", "sn"]);
    }

    #[test]
    fn add_is_set_like() {
        let mut entry = person();
        entry.add_values("sn", [Value::text("orig"), Value::text("extra")]);
        assert_eq!(entry.get("sn").unwrap().len(), 2);
    }

    #[test]
    fn removing_last_value_drops_attribute() {
        let mut entry = person();
        entry.remove_values("sn", &[Value::text("orig")]);
        assert!(entry.get("sn").is_none());
    }

    #[test]
    fn remove_with_no_values_drops_attribute() {
        let mut entry = person().with("sn", ["extra"]);
        entry.remove_values("sn", &[]);
        assert!(entry.get("sn").is_none());
    }

    #[test]
    fn replace_with_empty_drops_attribute() {
        let mut entry = person();
        entry.replace_values("cn", Vec::new());
        assert!(entry.get("cn").is_none());
        entry.replace_values("cn", [Value::text("bar")]);
        assert!(entry.contains("cn", &Value::text("bar")));
    }

    #[test]
    fn rename_changes_dn_only() {
        let mut entry = person();
        entry.apply(&Modification::Rename {
            dn: "cn=foo,ou=moved,dc=example".into(),
        });
        assert_eq!(entry.dn(), "cn=foo,ou=moved,dc=example");
        assert!(entry.contains("sn", &Value::text("orig")));
    }
}
