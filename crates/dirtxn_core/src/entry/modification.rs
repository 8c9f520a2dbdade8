//! Attribute modifications.

use crate::entry::attributes::Entry;
use crate::entry::value::Value;
use serde::{Deserialize, Serialize};

/// A single change to an entry.
///
/// `Rename` covers both renames and moves: the distinguished name changes,
/// the entry identifier does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modification {
    /// Add values to an attribute.
    Add {
        /// Attribute name.
        attribute: String,
        /// Values to add.
        values: Vec<Value>,
    },
    /// Remove values from an attribute; no values removes the attribute.
    Remove {
        /// Attribute name.
        attribute: String,
        /// Values to remove.
        values: Vec<Value>,
    },
    /// Replace every value of an attribute; no values removes the attribute.
    Replace {
        /// Attribute name.
        attribute: String,
        /// New values.
        values: Vec<Value>,
    },
    /// Change the entry's distinguished name.
    Rename {
        /// New distinguished name.
        dn: String,
    },
}

impl Modification {
    /// Creates an `Add`.
    pub fn add<I, V>(attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Add {
            attribute: attribute.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a `Remove`.
    pub fn remove<I, V>(attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Remove {
            attribute: attribute.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a `Replace`.
    pub fn replace<I, V>(attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Replace {
            attribute: attribute.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a `Rename`.
    pub fn rename(dn: impl Into<String>) -> Self {
        Self::Rename { dn: dn.into() }
    }

    /// Returns the attribute this modification touches, if any.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Add { attribute, .. }
            | Self::Remove { attribute, .. }
            | Self::Replace { attribute, .. } => Some(attribute),
            Self::Rename { .. } => None,
        }
    }

    /// Computes the modification that undoes `self` when applied to the
    /// result of applying `self` to `before`.
    #[must_use]
    pub fn undo_for(&self, before: &Entry) -> Self {
        let prior = |attribute: &str| -> Vec<Value> {
            before
                .get(attribute)
                .map(|set| set.iter().cloned().collect())
                .unwrap_or_default()
        };

        match self {
            Self::Add { attribute, values } => Self::Remove {
                attribute: attribute.clone(),
                values: values
                    .iter()
                    .filter(|v| !before.contains(attribute, v))
                    .cloned()
                    .collect(),
            },
            Self::Remove { attribute, values } if values.is_empty() => Self::Replace {
                attribute: attribute.clone(),
                values: prior(attribute),
            },
            Self::Remove { attribute, values } => Self::Add {
                attribute: attribute.clone(),
                values: values
                    .iter()
                    .filter(|v| before.contains(attribute, v))
                    .cloned()
                    .collect(),
            },
            Self::Replace { attribute, .. } => Self::Replace {
                attribute: attribute.clone(),
                values: prior(attribute),
            },
            Self::Rename { .. } => Self::Rename {
                dn: before.dn().to_owned(),
            },
        }
    }
}
