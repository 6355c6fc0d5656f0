//! Hierarchical path keys for streaming telemetry.
//!
//! A [`Path`] is an ordered sequence of typed [`Element`]s. Registered
//! paths may contain [`Element::Wildcard`], which matches any single
//! element at its depth; the [`PathTrie`] indexes values by such paths
//! and answers exact, wildcard, prefix, and subtree queries.

pub mod key;
pub mod keymap;
pub mod path;
pub mod trie;

pub use key::{CustomKey, Element};
pub use keymap::KeyMap;
pub use path::Path;
pub use trie::PathTrie;
