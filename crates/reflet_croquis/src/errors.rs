//! Expression failures.
//!
//! Malformed expression text surfaces as a thrown error from evaluation;
//! the store's write-back path catches it to retry against the root
//! record before giving up.

use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character `{0}` in expression")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),

    #[error("`{0}` is not defined")]
    UnknownIdentifier(CompactString),

    #[error("cannot read `{key}` of {kind}")]
    NotAnObject { key: String, kind: &'static str },

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("invalid assignment target")]
    InvalidAssignTarget,
}
