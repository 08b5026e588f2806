//! Runtime error taxonomy.
//!
//! Validation and compile errors are fatal to the triggering mount or
//! update cycle and surface to the host unrecovered. There is no
//! partial-success mode: a cycle either commits or aborts whole.

use thiserror::Error;

use reflet_armature::ParseError;
use reflet_croquis::ExpressionError;
use reflet_relief::CompileError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Bad arguments to a public entry point.
    #[error("{0}")]
    Validation(String),

    /// A watcher is already registered for the normalized path.
    #[error("the watcher for \"{0}\" is already defined")]
    DuplicateWatcher(String),

    #[error("the directive named \"{0}\" is already defined")]
    DuplicateDirective(String),

    #[error("the component named \"{0}\" is already defined")]
    DuplicateComponent(String),

    /// No node of the committed tree owns the given output handle or uid.
    #[error("no rendered node matches {0}")]
    UnknownNode(String),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
