//! Armature - The structural markup parser for Reflet templates.
//!
//! Turns template markup into the raw [`TemplateNode`] tree the compiler
//! consumes. Directive/event prefixes and `{{ }}` interpolation are left
//! as plain attribute and text content here; only structure is parsed.
//!
//! The grammar is deliberately small: elements with quoted, unquoted or
//! valueless attributes, self-closing and void tags, comments, and text.
//! Entities, CDATA and doctype handling are out of scope — templates are
//! authored application markup, not arbitrary documents.

mod errors;
mod options;
mod parser;

pub use errors::ParseError;
pub use options::{ParserOptions, WhitespaceStrategy};
pub use parser::Parser;

use reflet_relief::TemplateNode;

/// Parse markup into its top-level nodes.
pub fn parse(source: &str) -> Result<Vec<TemplateNode>, ParseError> {
    Parser::new(source).parse()
}

/// Parse markup that must contain exactly one element root (the shape a
/// mount target or component template requires).
pub fn parse_root(source: &str) -> Result<TemplateNode, ParseError> {
    let nodes = Parser::new(source).parse()?;
    let mut elements = nodes.into_iter().filter(TemplateNode::is_element);
    match (elements.next(), elements.next()) {
        (Some(root), None) => Ok(root),
        _ => Err(ParseError::ExpectedSingleRoot),
    }
}
