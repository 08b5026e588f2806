//! Parser options.

/// How text runs between elements are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhitespaceStrategy {
    /// Drop whitespace-only text nodes and collapse internal runs of
    /// whitespace to a single space. Keeps positional uids stable against
    /// formatting-only template edits.
    #[default]
    Condense,
    /// Keep text exactly as written.
    Preserve,
}

#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    pub whitespace: WhitespaceStrategy,
}
