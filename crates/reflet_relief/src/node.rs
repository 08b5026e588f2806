//! Compiled tree node types.

use compact_str::CompactString;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use reflet_carton::Value;

/// Node kind discriminant. The values echo the source runtime's node
/// types so uids and diagnostics line up with the original trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeKind {
    Element = 1,
    Text = 3,
    Comment = 8,
}

/// A node's place in an `@if` / `@else-if` / `@else` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConditionalRole {
    #[default]
    None = 0,
    If = 1,
    ElseIf = 2,
    Else = 3,
}

/// Opaque reference to a rendered output artifact, issued by the renderer.
/// Only nodes of the committed tree carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputHandle(pub u32);

/// Modifier list for directives and events (`@name.mod`, `#name.mod1.mod2`).
pub type Modifiers = SmallVec<[CompactString; 2]>;

/// One directive attached to a node: the raw expression, its modifiers,
/// and the value the expression resolved to at init.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectiveBinding {
    pub expression: String,
    pub modifiers: Modifiers,
    pub value: Value,
}

/// How an event binding fires.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventHandler {
    /// Not yet resolved (pre-init).
    #[default]
    Unresolved,
    /// The expression resolved to a callable at init.
    Func(reflet_carton::FuncValue),
    /// The expression did not resolve to a callable; it runs as a
    /// statement (with scope write-back) at fire time.
    Statement(String),
}

/// One event attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventBinding {
    pub expression: String,
    pub modifiers: Modifiers,
    pub handler: EventHandler,
    /// Arguments evaluated at init from a `name(a, b)` form; appended
    /// after the event payload when the handler fires.
    pub bound_args: Vec<Value>,
}

/// One enclosing `@for` expansion, recorded on every clone it produced.
/// Ordered outer→inner on the node, these frames let the write-back path
/// redirect an aliased assignment into the loop's source container.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopFrame {
    /// The source expression text (`items` in `"x in items"`).
    pub source: String,
    pub item_alias: CompactString,
    pub index_alias: CompactString,
    pub key_alias: Option<CompactString>,
    /// This clone's iteration index.
    pub index: usize,
    /// This clone's mapping key, for keyed sources.
    pub key: Option<String>,
}

/// One position in the compiled template tree.
///
/// A `VNode` starts uninitialized (raw attribute/class strings straight
/// from the template), is resolved in place by the init pass, and is then
/// either committed (mirrored by rendered output) or discarded after
/// losing a diff.
#[derive(Debug, Clone, PartialEq)]
pub struct VNode {
    /// Stable path-derived identity: `parent_uid + "_" + child_index`,
    /// with `"_copy_" + i` appended throughout a loop clone's subtree.
    pub uid: CompactString,
    pub tag: CompactString,
    pub kind: NodeKind,

    /// Raw attribute strings from the template; drained by init.
    pub raw_attributes: IndexMap<CompactString, String>,
    /// Attribute values after init.
    pub attributes: IndexMap<CompactString, Value>,
    /// Raw `class` attribute string; drained by init.
    pub raw_classes: String,
    /// Class name → enabled, after init.
    pub classes: IndexMap<CompactString, bool>,
    pub directives: IndexMap<CompactString, DirectiveBinding>,
    pub events: IndexMap<CompactString, EventBinding>,
    /// Text content for Text and Comment nodes.
    pub text: Option<String>,

    pub children: Vec<VNode>,

    /// Result of conditional evaluation; an invisible node still occupies
    /// its tree position (rendered as a placeholder comment).
    pub visible: bool,
    pub conditional_role: ConditionalRole,
    /// Loop aliases in scope at this node (own iteration's bindings merged
    /// over the ancestors', closest binding winning).
    pub loop_bindings: FxHashMap<CompactString, Value>,
    pub loop_frames: Vec<LoopFrame>,
    pub is_loop_clone: bool,

    /// Rendered output, committed tree only.
    pub output: Option<OutputHandle>,
}

impl VNode {
    fn base(uid: impl Into<CompactString>, tag: impl Into<CompactString>, kind: NodeKind) -> Self {
        Self {
            uid: uid.into(),
            tag: tag.into(),
            kind,
            raw_attributes: IndexMap::new(),
            attributes: IndexMap::new(),
            raw_classes: String::new(),
            classes: IndexMap::new(),
            directives: IndexMap::new(),
            events: IndexMap::new(),
            text: None,
            children: Vec::new(),
            visible: true,
            conditional_role: ConditionalRole::None,
            loop_bindings: FxHashMap::default(),
            loop_frames: Vec::new(),
            is_loop_clone: false,
            output: None,
        }
    }

    pub fn element(uid: impl Into<CompactString>, tag: impl Into<CompactString>) -> Self {
        Self::base(uid, tag, NodeKind::Element)
    }

    pub fn text_node(uid: impl Into<CompactString>, text: impl Into<String>) -> Self {
        let mut node = Self::base(uid, "#text", NodeKind::Text);
        node.text = Some(text.into());
        node
    }

    pub fn comment(uid: impl Into<CompactString>, text: impl Into<String>) -> Self {
        let mut node = Self::base(uid, "#comment", NodeKind::Comment);
        node.text = Some(text.into());
        node
    }

    /// Whether two tree positions are eligible for an in-place patch
    /// rather than wholesale replacement.
    pub fn comparable(&self, old: &VNode) -> bool {
        self.tag == old.tag
            && self.kind == old.kind
            && self.visible == old.visible
            && self.conditional_role == old.conditional_role
    }

    /// Deep equality over every resolved facet, uid included. Children
    /// compare pairwise in order; any length difference is inequality.
    pub fn deep_equal(&self, old: &VNode) -> bool {
        if self.uid != old.uid
            || self.tag != old.tag
            || self.kind != old.kind
            || self.visible != old.visible
            || self.conditional_role != old.conditional_role
            || self.is_loop_clone != old.is_loop_clone
        {
            return false;
        }
        if self.kind == NodeKind::Element {
            self.attributes == old.attributes
                && self.classes == old.classes
                && self.directives == old.directives
                && self.events == old.events
                && self.children.len() == old.children.len()
                && self
                    .children
                    .iter()
                    .zip(&old.children)
                    .all(|(new, old)| new.deep_equal(old))
        } else {
            self.text == old.text
        }
    }

    /// Copy this node out of a candidate tree to own it going forward.
    /// Output handles never travel with the copy.
    pub fn detach_copy(&self) -> VNode {
        let mut copy = self.clone();
        copy.clear_outputs();
        copy
    }

    fn clear_outputs(&mut self) {
        self.output = None;
        for child in &mut self.children {
            child.clear_outputs();
        }
    }

    /// Find a direct child by uid.
    pub fn child_by_uid(&self, uid: &str) -> Option<&VNode> {
        self.children.iter().find(|c| c.uid == uid)
    }

    /// Depth-first search of the subtree rooted here.
    pub fn find(&self, uid: &str) -> Option<&VNode> {
        if self.uid == uid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(uid))
    }

    pub fn find_by_output(&self, handle: OutputHandle) -> Option<&VNode> {
        if self.output == Some(handle) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_output(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparability_ignores_content_fields() {
        let mut a = VNode::element("vnode_0", "div");
        let mut b = VNode::element("vnode_0", "div");
        a.attributes.insert("id".into(), Value::Str("x".into()));
        assert!(a.comparable(&b));
        b.visible = false;
        assert!(!a.comparable(&b));
    }

    #[test]
    fn deep_equal_includes_uid_and_children() {
        let mut a = VNode::element("vnode_0", "div");
        let mut b = VNode::element("vnode_0", "div");
        assert!(a.deep_equal(&b));
        b.uid = "vnode_1".into();
        assert!(!a.deep_equal(&b));
        b.uid = "vnode_0".into();
        a.children.push(VNode::text_node("vnode_0_0", "hi"));
        b.children.push(VNode::text_node("vnode_0_0", "ho"));
        assert!(!a.deep_equal(&b));
    }

    #[test]
    fn detach_copy_drops_output_handles() {
        let mut a = VNode::element("vnode_0", "div");
        let mut child = VNode::text_node("vnode_0_0", "hi");
        child.output = Some(OutputHandle(7));
        a.children.push(child);
        a.output = Some(OutputHandle(3));
        let copy = a.detach_copy();
        assert!(copy.output.is_none());
        assert!(copy.children[0].output.is_none());
        assert!(a.deep_equal(&copy));
    }
}
