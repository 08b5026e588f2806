//! Carton - The shared toolbox for Reflet.
//!
//! This crate provides the foundational data structures every other Reflet
//! crate builds on:
//!
//! - **[`Value`]**: the dynamic value model a store holds and expressions
//!   evaluate to (objects keep insertion order, functions compare by
//!   identity).
//! - **[`KeyPath`]**: dot-joined addressing of nested store data, with
//!   bracket-index normalization so `a[0].b` and `a.0.b` collide.
//! - **[`FacetFlags`]**: a compact record of which facets of a node a
//!   patch touched.

mod flags;
mod path;
mod value;

pub use flags::FacetFlags;
pub use path::KeyPath;
pub use value::{format_number, FuncValue, NativeFn, Value};

// Re-export shared collection types for convenience
pub use compact_str::CompactString;
pub use indexmap::IndexMap;
pub use rustc_hash::{FxHashMap, FxHashSet};
