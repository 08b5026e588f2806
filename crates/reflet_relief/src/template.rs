//! The raw source element tree.
//!
//! A [`TemplateNode`] is what a markup string parses into: tags with their
//! attributes in source order, text runs, and comments. Interpolation
//! markers and directive prefixes are left untouched here; the compiler
//! gives them meaning.

use compact_str::CompactString;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Element {
        tag: CompactString,
        /// Attributes in source order; a valueless attribute carries an
        /// empty string.
        attributes: Vec<(CompactString, String)>,
        children: Vec<TemplateNode>,
    },
    Text(String),
    Comment(String),
}

impl TemplateNode {
    pub fn element(tag: impl Into<CompactString>) -> Self {
        TemplateNode::Element {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, TemplateNode::Element { .. })
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            TemplateNode::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }
}
