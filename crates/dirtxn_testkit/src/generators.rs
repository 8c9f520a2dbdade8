//! Property-based test generators using proptest.
//!
//! Values and ids are drawn from small domains on purpose so generated
//! changes collide with each other and with base data often.

use dirtxn_core::{Entry, IndexChange, Modification, Value};
use proptest::prelude::*;

/// Attributes generated entries and modifications use.
pub const ATTRIBUTES: [&str; 3] = ["cn", "sn", "mail"];

/// Strategy for attribute values.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => (0_i64..20).prop_map(Value::Integer),
        3 => prop::string::string_regex("[a-e]{1,2}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
        1 => prop::collection::vec(any::<u8>(), 1..3).prop_map(Value::Binary),
    ]
}

/// Strategy for entry ids.
pub fn arb_entry_id() -> impl Strategy<Value = u64> {
    0_u64..16
}

/// Strategy for `(value, id)` index pairs.
pub fn arb_index_pair() -> impl Strategy<Value = (Value, u64)> {
    (arb_value(), arb_entry_id())
}

/// Strategy for one change of the index of `attribute_oid`.
pub fn arb_index_change(attribute_oid: &'static str) -> impl Strategy<Value = IndexChange<u64>> {
    (arb_index_pair(), prop::bool::weighted(0.6)).prop_map(move |((value, id), add)| {
        if add {
            IndexChange::add(attribute_oid, value, id)
        } else {
            IndexChange::delete(attribute_oid, value, id)
        }
    })
}

/// Strategy for up to `max` changes of the index of `attribute_oid`.
pub fn arb_index_changes(
    attribute_oid: &'static str,
    max: usize,
) -> impl Strategy<Value = Vec<IndexChange<u64>>> {
    prop::collection::vec(arb_index_change(attribute_oid), 0..=max)
}

/// Strategy for base-store index contents.
pub fn arb_base_pairs(max: usize) -> impl Strategy<Value = Vec<(Value, u64)>> {
    prop::collection::btree_set(arb_index_pair(), 0..=max)
        .prop_map(|pairs| pairs.into_iter().collect())
}

fn arb_attribute() -> impl Strategy<Value = &'static str> {
    prop::sample::select(ATTRIBUTES.to_vec())
}

/// Strategy for attribute modifications, renames included.
pub fn arb_modification() -> impl Strategy<Value = Modification> {
    let values = || prop::collection::vec(arb_value(), 0..3);
    prop_oneof![
        3 => (arb_attribute(), values()).prop_map(|(a, v)| Modification::add(a, v)),
        2 => (arb_attribute(), values()).prop_map(|(a, v)| Modification::remove(a, v)),
        2 => (arb_attribute(), values()).prop_map(|(a, v)| Modification::replace(a, v)),
        1 => arb_entry_id().prop_map(|n| Modification::rename(format!("cn=renamed{n}"))),
    ]
}

/// Strategy for entries with a few attributes.
pub fn arb_entry() -> impl Strategy<Value = Entry> {
    (
        arb_entry_id(),
        prop::collection::vec((arb_attribute(), prop::collection::vec(arb_value(), 1..3)), 0..3),
    )
        .prop_map(|(n, attributes)| {
            attributes
                .into_iter()
                .fold(Entry::new(format!("cn=entry{n}")), |entry, (a, v)| entry.with(a, v))
        })
}

/// One thing a generated transaction does to an entry.
#[derive(Debug, Clone)]
pub enum EntryOperation {
    /// Add the entry if it does not exist.
    Add {
        /// Entry id.
        id: u64,
        /// Entry contents.
        entry: Entry,
    },
    /// Modify the entry if it exists.
    Modify {
        /// Entry id.
        id: u64,
        /// The change.
        modification: Modification,
    },
    /// Delete the entry if it exists.
    Delete {
        /// Entry id.
        id: u64,
    },
}

impl EntryOperation {
    /// The entry the operation targets.
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Self::Add { id, .. } | Self::Modify { id, .. } | Self::Delete { id } => *id,
        }
    }
}

/// Strategy for entry operations over a small id range.
pub fn entry_operation_strategy() -> impl Strategy<Value = EntryOperation> {
    let id = || 0_u64..6;
    prop_oneof![
        3 => (id(), arb_entry()).prop_map(|(id, entry)| EntryOperation::Add { id, entry }),
        4 => (id(), arb_modification())
            .prop_map(|(id, modification)| EntryOperation::Modify { id, modification }),
        1 => id().prop_map(|id| EntryOperation::Delete { id }),
    ]
}

/// Strategy for a sequence of transactions, each a short list of
/// operations.
pub fn transaction_sequence_strategy(
    max_txns: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<Vec<EntryOperation>>> {
    prop::collection::vec(
        prop::collection::vec(entry_operation_strategy(), 1..=max_ops),
        1..=max_txns,
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn index_changes_target_requested_attribute(changes in arb_index_changes("cn", 8)) {
            prop_assert!(changes.len() <= 8);
            for change in &changes {
                prop_assert_eq!(change.attribute_oid.as_str(), "cn");
                prop_assert!(change.id < 16);
            }
        }

        #[test]
        fn base_pairs_are_sorted_and_unique(pairs in arb_base_pairs(10)) {
            for window in pairs.windows(2) {
                prop_assert!(window[0] < window[1]);
            }
        }

        #[test]
        fn generated_entries_have_values(entry in arb_entry()) {
            for (_, values) in entry.attributes() {
                prop_assert!(!values.is_empty());
            }
        }

        #[test]
        fn operations_stay_in_range(op in entry_operation_strategy()) {
            prop_assert!(op.id() < 6);
        }
    }

    #[test]
    fn config_presets() {
        assert_eq!(PropTestConfig::default().cases, 256);
        assert!(PropTestConfig::quick().cases < PropTestConfig::thorough().cases);
        assert_eq!(PropTestConfig::quick().to_proptest_config().cases, 32);
    }
}
