//! Media hierarchy model
//!
//! - `item`: immutable catalog tree of groups and playable leaves
//! - `parser`: JSON hierarchy description decoding
//! - `loader`: asynchronous load with supersession of stale requests

pub mod item;
pub mod loader;
pub mod parser;

pub use item::{ItemId, ItemKind, ItemRef, MediaItem, MediaTree, MediaTreeBuilder};
pub use loader::{
    CatalogDelegate, CatalogFetch, LoadError, LoadErrorKind, LoadOutcome, MediaHierarchyLoader,
    RequestId,
};
pub use parser::{parse_catalog, Catalog};
