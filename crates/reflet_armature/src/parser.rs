//! Recursive-descent markup parser.

use compact_str::CompactString;

use reflet_relief::TemplateNode;

use crate::errors::ParseError;
use crate::options::{ParserOptions, WhitespaceStrategy};

/// Tags that never have children and need no closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub struct Parser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    options: ParserOptions,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, ParserOptions::default())
    }

    pub fn with_options(source: &'a str, options: ParserOptions) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            options,
        }
    }

    /// Parse the whole input as a sequence of top-level nodes.
    pub fn parse(mut self) -> Result<Vec<TemplateNode>, ParseError> {
        let nodes = self.parse_children(None)?;
        Ok(nodes)
    }

    /// Parse sibling nodes until EOF or the closing tag of `parent`.
    fn parse_children(
        &mut self,
        parent: Option<&str>,
    ) -> Result<Vec<TemplateNode>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.pos >= self.bytes.len() {
                match parent {
                    Some(tag) => return Err(ParseError::UnclosedElement(tag.into())),
                    None => return Ok(nodes),
                }
            }
            if self.starts_with("</") {
                let Some(tag) = parent else {
                    return Err(ParseError::MalformedTag(self.pos));
                };
                let found = self.parse_closing_tag()?;
                if found != tag {
                    return Err(ParseError::MismatchedClosingTag {
                        expected: tag.into(),
                        found,
                    });
                }
                return Ok(nodes);
            }
            if self.starts_with("<!--") {
                nodes.push(self.parse_comment()?);
            } else if self.starts_with("<") {
                nodes.push(self.parse_element()?);
            } else {
                let text = self.parse_text();
                match self.options.whitespace {
                    WhitespaceStrategy::Preserve => nodes.push(TemplateNode::Text(text)),
                    WhitespaceStrategy::Condense => {
                        if !text.trim().is_empty() {
                            nodes.push(TemplateNode::Text(condense(&text)));
                        }
                    }
                }
            }
        }
    }

    fn parse_element(&mut self) -> Result<TemplateNode, ParseError> {
        let open_pos = self.pos;
        self.pos += 1; // consume '<'
        let tag = self.parse_name();
        if tag.is_empty() {
            return Err(ParseError::MalformedTag(open_pos));
        }
        let tag = CompactString::from(tag.to_lowercase());

        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(ParseError::UnclosedElement(tag)),
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.starts_with("/>") => {
                    self.pos += 2;
                    return Ok(TemplateNode::Element {
                        tag,
                        attributes,
                        children: Vec::new(),
                    });
                }
                _ => attributes.push(self.parse_attribute()?),
            }
        }

        if VOID_TAGS.contains(&tag.as_str()) {
            return Ok(TemplateNode::Element {
                tag,
                attributes,
                children: Vec::new(),
            });
        }

        let children = self.parse_children(Some(tag.as_str()))?;
        Ok(TemplateNode::Element {
            tag,
            attributes,
            children,
        })
    }

    fn parse_attribute(&mut self) -> Result<(CompactString, String), ParseError> {
        let name = self.parse_attr_name();
        if name.is_empty() {
            return Err(ParseError::MalformedTag(self.pos));
        }
        let name = CompactString::from(name);
        self.skip_whitespace();
        if self.peek() != Some(b'=') {
            // Valueless attribute
            return Ok((name, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek() != Some(quote) {
                    if self.pos >= self.bytes.len() {
                        return Err(ParseError::UnterminatedAttribute(name));
                    }
                    self.pos += 1;
                }
                let value = self.source[start..self.pos].to_string();
                self.pos += 1;
                value
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_ascii_whitespace() || c == b'>' || c == b'/' {
                        break;
                    }
                    self.pos += 1;
                }
                self.source[start..self.pos].to_string()
            }
        };
        Ok((name, value))
    }

    fn parse_closing_tag(&mut self) -> Result<CompactString, ParseError> {
        self.pos += 2; // consume '</'
        let name = self.parse_name().to_lowercase();
        self.skip_whitespace();
        if self.peek() != Some(b'>') {
            return Err(ParseError::MalformedTag(self.pos));
        }
        self.pos += 1;
        Ok(CompactString::from(name))
    }

    fn parse_comment(&mut self) -> Result<TemplateNode, ParseError> {
        self.pos += 4; // consume '<!--'
        let start = self.pos;
        match self.source[start..].find("-->") {
            Some(offset) => {
                let text = self.source[start..start + offset].to_string();
                self.pos = start + offset + 3;
                Ok(TemplateNode::Comment(text))
            }
            None => Err(ParseError::UnterminatedComment),
        }
    }

    fn parse_text(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'<' {
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    /// Tag names: letters, digits, `-`, `_`.
    fn parse_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'-' || c == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    /// Attribute names additionally allow the directive/event markers and
    /// their modifier punctuation (`@if`, `#click.stop`, `@name:mod`).
    fn parse_attr_name(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, b'-' | b'_' | b'@' | b'#' | b':' | b'.') {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.source[self.pos..].starts_with(prefix)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }
}

fn condense(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = true;
        } else {
            out.push(c);
            in_ws = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}
