//! Entries, identifiers, values and modifications.

mod attributes;
mod id;
mod modification;
mod value;

pub use attributes::Entry;
pub use id::{EntryId, EntryKey};
pub use modification::Modification;
pub use value::Value;
