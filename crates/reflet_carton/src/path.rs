//! Key paths into nested store data.
//!
//! Watchers and writes address nested locations with dot-joined paths.
//! Bracket-indexed segments (`a[0].b["c"]`) normalize to the equivalent
//! dot form (`a.0.b.c`) so both spellings of a location share one slot.

use compact_str::CompactString;
use once_cell::sync::Lazy;
use regex::Regex;

static BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\[\s*['"]?([^'"\]]+?)['"]?\s*\]"#).expect("bracket regex"));

/// An ordered sequence of key segments from the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath(Vec<CompactString>);

impl KeyPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a path string, normalizing bracket indices into segments.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                continue;
            }
            let head = BRACKET.replace_all(part, "");
            if !head.is_empty() {
                segments.push(CompactString::from(head.as_ref()));
            }
            for cap in BRACKET.captures_iter(part) {
                segments.push(CompactString::from(&cap[1]));
            }
        }
        Self(segments)
    }

    pub fn from_segments(segments: impl IntoIterator<Item = impl Into<CompactString>>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[CompactString] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The final segment (the written property).
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(|s| s.as_str())
    }

    /// Everything but the final segment (the container's path).
    pub fn container(&self) -> KeyPath {
        let mut segs = self.0.clone();
        segs.pop();
        Self(segs)
    }

    pub fn child(&self, segment: impl Into<CompactString>) -> KeyPath {
        let mut segs = self.0.clone();
        segs.push(segment.into());
        Self(segs)
    }

    /// The normalized dot-joined form used as a watcher key.
    pub fn join(&self) -> String {
        self.0.join(".")
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.join())
    }
}
