//! Reflet - A reactive template runtime.
//!
//! Reflet turns a plain data record into an observable store, compiles a
//! declarative element tree into an internal node representation, binds
//! it to live data through string expressions, and keeps a rendered
//! output tree synchronized with data changes via incremental
//! diff/patch.
//!
//! # Architecture
//!
//! ```text
//! Store mutation → TreeCompiler (compile → expand loops → init)
//!                → ComponentExpander
//!                → Reconciler (diff against committed tree, patch Renderer)
//!                → committed tree becomes the new baseline
//! ```
//!
//! The display surface stays behind the [`Renderer`] trait;
//! [`TreeRenderer`] is the in-memory implementation used by tests and
//! headless hosts.
//!
//! # Example
//!
//! ```
//! use reflet::{create_store, Value};
//!
//! let store = create_store(Value::from(serde_json::json!({
//!     "items": [1, 2]
//! }))).unwrap();
//! store.mount(r#"<ul><li @for="n in items">{{n}}</li></ul>"#).unwrap();
//! store.set("items", Value::from(serde_json::json!([1, 2, 3]))).unwrap();
//! ```
//!
//! # Template syntax
//!
//! - `@name`, `@name:modifier`, `@name.modifier` — directive attributes
//! - `#name.mod1.mod2` — event attributes
//! - `{{ expression }}` — interpolation in text, attributes, classes
//! - `@if` / `@else-if` / `@else` — conditional chains
//! - `@for="(item, index) in source"` — loop expansion (arrays, keyed
//!   mappings with a third `key` alias, or plain counts)

mod builtins;
mod compile;
mod errors;
mod expand;
mod observe;
mod options;
mod reconcile;
mod registry;
mod render;
mod store;

pub use errors::StoreError;
pub use observe::ObservedNode;
pub use options::StoreOptions;
pub use registry::{
    ComponentSpec, DirectiveCtx, DirectiveHook, DirectiveHooks, HookPhase, Props, RenderOutput,
};
pub use render::{RenderedKind, RenderedNode, Renderer, TreeRenderer};
pub use store::{
    create_store, create_store_with_renderer, ListenerFn, Store, UpdateEvent, WatchFn,
};

// The tree and value surface, re-exported for hosts
pub use reflet_carton::{FacetFlags, FuncValue, KeyPath, Value};
pub use reflet_relief::{
    CompileError, ConditionalRole, DirectiveBinding, EventBinding, EventHandler, LoopFrame,
    NodeKind, NodeSpec, OutputHandle, TemplateNode, VNode,
};

pub use reflet_armature::{parse as parse_markup, parse_root, ParseError};
pub use reflet_croquis::ExpressionError;
