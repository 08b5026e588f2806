//! Relief - The sculptured node-tree surface for Reflet templates.
//!
//! This crate defines the tree every other layer works against:
//!
//! - [`TemplateNode`]: the raw source element tree a template parses into,
//!   before any compilation.
//! - [`VNode`]: one position in the compiled tree, from its uninitialized
//!   form (raw attribute strings) through init (resolved values) to the
//!   committed tree mirrored by the rendered output.
//! - [`NodeSpec`]: the structured, pre-resolved node description a
//!   component render function may return instead of markup.
//! - [`CompileError`]: the fatal error taxonomy for compile-time failures.

pub mod errors;
pub mod node;
pub mod spec;
pub mod template;

pub use errors::CompileError;
pub use node::{
    ConditionalRole, DirectiveBinding, EventBinding, EventHandler, LoopFrame, NodeKind,
    OutputHandle, VNode,
};
pub use spec::NodeSpec;
pub use template::TemplateNode;
