//! Facet flags for patch reporting.

use bitflags::bitflags;

bitflags! {
    /// Which facets of a node a patch pass touched. The reconciler
    /// aggregates these per node for diagnostics and for tests that pin
    /// down minimal-mutation behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FacetFlags: u8 {
        const ATTRIBUTES = 1 << 0;
        const CLASSES    = 1 << 1;
        const DIRECTIVES = 1 << 2;
        const EVENTS     = 1 << 3;
        const TEXT       = 1 << 4;
        const CHILDREN   = 1 << 5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accumulate() {
        let mut flags = FacetFlags::default();
        assert!(flags.is_empty());
        flags |= FacetFlags::ATTRIBUTES;
        flags |= FacetFlags::TEXT;
        assert!(flags.contains(FacetFlags::ATTRIBUTES | FacetFlags::TEXT));
        assert!(!flags.contains(FacetFlags::CHILDREN));
    }
}
