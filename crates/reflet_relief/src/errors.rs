//! Compile-time error taxonomy.
//!
//! Every variant is fatal: it aborts the mount or update cycle that
//! triggered it and surfaces to the host application unrecovered.

use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The `@for` expression does not match `<bindings> (in|of) <source>`.
    #[error("invalid @for expression: {0}")]
    InvalidFor(String),

    /// The `@for` source evaluated to something that cannot be iterated.
    #[error("cannot iterate @for source `{0}`")]
    NotIterable(String),

    /// `@if` combined with `@else-if`/`@else` on one node, or `@else-if`
    /// combined with `@else`.
    #[error("\"@{0}\" and \"@{1}\" cannot be used on the same node")]
    ConflictingConditionals(CompactString, CompactString),

    /// `@else-if`/`@else` without the required preceding branch.
    #[error("\"@{0}\" cannot be used alone")]
    DanglingConditional(CompactString),

    /// A directive attribute names no registered directive.
    #[error("the @{0} directive is undefined")]
    UnknownDirective(CompactString),

    /// An event attribute carries no expression.
    #[error("the value of #{0} should not be empty")]
    EmptyEventExpression(CompactString),

    /// A component render function returned nothing, or a markup root
    /// that is not a single element.
    #[error("the template for component \"{0}\" is invalid")]
    InvalidComponentTemplate(CompactString),
}
