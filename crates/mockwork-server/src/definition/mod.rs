//! Mock endpoint definitions.
//!
//! A [`Definition`] is the unit the management side persists and the route table
//! compiles. It is replaced wholesale on every save.

mod types;

pub use types::{
    group_by_collection, BodyKind, Collection, Definition, FileRef, KvField, KvFields, MockBody,
    RawType,
};
