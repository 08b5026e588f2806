//! Store configuration.

use compact_str::CompactString;

/// Template-syntax configuration. The defaults match the documented
/// syntax; hosts embedding templates in markup with conflicting prefixes
/// can remap the markers.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Leading marker of directive attributes (`@if`, `@for`, `@show`).
    pub directive_marker: char,
    /// Leading marker of event attributes (`#click.stop`).
    pub event_marker: char,
    /// Attribute dropped by the compiler; lets stylesheets hide
    /// uncompiled templates until mount.
    pub cloak_attribute: CompactString,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            directive_marker: '@',
            event_marker: '#',
            cloak_attribute: CompactString::const_new("reflet-cloak"),
        }
    }
}
