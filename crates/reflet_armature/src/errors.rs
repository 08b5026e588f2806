//! Markup parse failures.

use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected end of template (unclosed <{0}>)")]
    UnclosedElement(CompactString),

    #[error("mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedClosingTag {
        expected: CompactString,
        found: CompactString,
    },

    #[error("malformed tag at byte {0}")]
    MalformedTag(usize),

    #[error("unterminated comment")]
    UnterminatedComment,

    #[error("unterminated attribute value for `{0}`")]
    UnterminatedAttribute(CompactString),

    #[error("template must have a single element root")]
    ExpectedSingleRoot,
}
