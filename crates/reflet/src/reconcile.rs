//! Tree reconciliation: diff a freshly compiled candidate tree against
//! the committed tree and patch the rendered output with minimal
//! mutation, firing directive lifecycle hooks in the contract order.

use std::rc::Rc;

use compact_str::CompactString;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use reflet_carton::{FacetFlags, Value};
use reflet_relief::{NodeKind, VNode};

use crate::registry::{DirectiveCtx, DirectiveHooks, HookPhase};
use crate::store::Store;

pub(crate) struct Reconciler<'a> {
    store: &'a Store,
    /// Registry snapshot for the whole pass; hooks registered mid-pass
    /// take effect on the next cycle.
    directives: FxHashMap<CompactString, Rc<DirectiveHooks>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a Store, directives: FxHashMap<CompactString, Rc<DirectiveHooks>>) -> Self {
        Self { store, directives }
    }

    /// Compare one tree position and either patch the committed node in
    /// place (comparable) or replace the subtree wholesale.
    pub fn reconcile(&self, new: &VNode, old: &mut VNode) {
        if !new.comparable(old) {
            self.replace(new, old);
            return;
        }

        let changed = !new.deep_equal(old);
        if changed {
            self.fire_hooks(old, HookPhase::BeforeUpdate, false);
        }
        if old.kind == NodeKind::Element && old.visible {
            let mut flags = FacetFlags::default();
            flags |= self.patch_directives(new, old);
            flags |= self.patch_attributes(new, old);
            flags |= self.patch_classes(new, old);
            flags |= self.patch_events(new, old);
            flags |= self.reconcile_children(new, old);
            if !flags.is_empty() {
                trace!(uid = %old.uid, ?flags, "patched node");
            }
        } else if old.kind == NodeKind::Text {
            if new.text != old.text {
                old.text = new.text.clone();
                if let (Some(handle), Some(text)) = (old.output, old.text.as_deref()) {
                    self.store.with_renderer(|r| r.set_text(handle, text));
                }
            }
        }
        if changed {
            self.fire_hooks(old, HookPhase::Updated, false);
        }
    }

    /// Wholesale subtree replacement. The ordering is load-bearing:
    /// `before_unmount(old)` → `before_mount(new)` → render(new) →
    /// insert(new) → remove(old) → `unmounted(old)` → `mounted(new)`.
    fn replace(&self, new: &VNode, old: &mut VNode) {
        trace!(old = %old.uid, new = %new.uid, "replacing subtree");
        let mut copy = new.detach_copy();
        self.fire_hooks(old, HookPhase::BeforeUnmount, true);
        self.fire_hooks(&copy, HookPhase::BeforeMount, true);
        self.render(&mut copy);
        if let (Some(new_handle), Some(old_handle)) = (copy.output, old.output) {
            self.store.with_renderer(|r| {
                r.insert_before(new_handle, old_handle);
                r.remove(old_handle);
            });
        }
        self.fire_hooks(old, HookPhase::Unmounted, true);
        self.fire_hooks(&copy, HookPhase::Mounted, true);
        *old = copy;
    }

    fn patch_directives(&self, new: &VNode, old: &mut VNode) -> FacetFlags {
        let (updated, added, removed) = diff_keys(&new.directives, &old.directives);
        let mut flags = FacetFlags::default();
        for name in updated.iter().chain(&added) {
            if let Some(binding) = new.directives.get(name) {
                old.directives.insert(name.clone(), binding.clone());
                flags |= FacetFlags::DIRECTIVES;
            }
        }
        for name in &removed {
            old.directives.shift_remove(name);
            flags |= FacetFlags::DIRECTIVES;
        }
        flags
    }

    fn patch_attributes(&self, new: &VNode, old: &mut VNode) -> FacetFlags {
        let (updated, added, removed) = diff_keys(&new.attributes, &old.attributes);
        let mut flags = FacetFlags::default();
        let handle = old.output;
        for name in updated.iter().chain(&added) {
            let Some(value) = new.attributes.get(name) else {
                continue;
            };
            old.attributes.insert(name.clone(), value.clone());
            flags |= FacetFlags::ATTRIBUTES;
            if let Some(handle) = handle {
                match attribute_text(value) {
                    Some(text) => {
                        self.store
                            .with_renderer(|r| r.set_attribute(handle, name, &text));
                    }
                    None => {
                        self.store.with_renderer(|r| r.remove_attribute(handle, name));
                    }
                }
            }
        }
        for name in &removed {
            old.attributes.shift_remove(name);
            flags |= FacetFlags::ATTRIBUTES;
            if let Some(handle) = handle {
                self.store.with_renderer(|r| r.remove_attribute(handle, name));
            }
        }
        flags
    }

    fn patch_classes(&self, new: &VNode, old: &mut VNode) -> FacetFlags {
        if new.classes == old.classes {
            return FacetFlags::default();
        }
        old.classes = new.classes.clone();
        if let Some(handle) = old.output {
            let joined = enabled_classes(&old.classes);
            self.store.with_renderer(|r| r.set_classes(handle, &joined));
        }
        FacetFlags::CLASSES
    }

    fn patch_events(&self, new: &VNode, old: &mut VNode) -> FacetFlags {
        let (updated, added, removed) = diff_keys(&new.events, &old.events);
        let mut flags = FacetFlags::default();
        for name in updated.iter().chain(&added) {
            if let Some(binding) = new.events.get(name) {
                old.events.insert(name.clone(), binding.clone());
                flags |= FacetFlags::EVENTS;
            }
        }
        for name in &removed {
            old.events.shift_remove(name);
            flags |= FacetFlags::EVENTS;
        }
        flags
    }

    /// Equal child counts pair children by uid and recurse. A differing
    /// count runs a uid-keyed diff: children whose uid survives recurse
    /// in place, removed children tear down (every `before_unmount`
    /// before any `unmounted`), and added children mount in new-tree
    /// order — so appending to a loop source never disturbs the
    /// identity of the existing clones.
    fn reconcile_children(&self, new: &VNode, old: &mut VNode) -> FacetFlags {
        if new.children.len() == old.children.len() {
            for new_child in &new.children {
                if let Some(old_child) = old
                    .children
                    .iter_mut()
                    .find(|child| child.uid == new_child.uid)
                {
                    self.reconcile(new_child, old_child);
                }
            }
            return FacetFlags::default();
        }

        trace!(uid = %old.uid, from = old.children.len(), to = new.children.len(),
               "diffing child list");
        let parent_handle = old.output;
        let new_uids: rustc_hash::FxHashSet<&str> =
            new.children.iter().map(|c| c.uid.as_str()).collect();

        let mut kept: FxHashMap<CompactString, VNode> = FxHashMap::default();
        let mut removed = Vec::new();
        for child in old.children.drain(..) {
            if new_uids.contains(child.uid.as_str()) {
                kept.insert(child.uid.clone(), child);
            } else {
                removed.push(child);
            }
        }
        for child in &removed {
            self.fire_hooks(child, HookPhase::BeforeUnmount, true);
        }
        for child in &removed {
            self.fire_hooks(child, HookPhase::Unmounted, true);
            if let Some(handle) = child.output {
                self.store.with_renderer(|r| r.remove(handle));
            }
        }

        // For each new position, the output of the nearest surviving
        // later sibling anchors fresh insertions
        let mut anchors: Vec<Option<reflet_relief::OutputHandle>> =
            vec![None; new.children.len()];
        let mut next_anchor = None;
        for (i, new_child) in new.children.iter().enumerate().rev() {
            anchors[i] = next_anchor;
            if let Some(existing) = kept.get(&new_child.uid) {
                if existing.output.is_some() {
                    next_anchor = existing.output;
                }
            }
        }

        let mut rebuilt = Vec::with_capacity(new.children.len());
        for (i, new_child) in new.children.iter().enumerate() {
            match kept.remove(&new_child.uid) {
                Some(mut existing) => {
                    self.reconcile(new_child, &mut existing);
                    rebuilt.push(existing);
                }
                None => {
                    let mut copy = new_child.detach_copy();
                    self.fire_hooks(&copy, HookPhase::BeforeMount, true);
                    self.render(&mut copy);
                    if let Some(output) = copy.output {
                        self.store.with_renderer(|r| match anchors[i] {
                            Some(anchor) => r.insert_before(output, anchor),
                            None => {
                                if let Some(parent) = parent_handle {
                                    r.append_child(parent, output);
                                }
                            }
                        });
                    }
                    self.fire_hooks(&copy, HookPhase::Mounted, true);
                    rebuilt.push(copy);
                }
            }
        }
        old.children = rebuilt;
        FacetFlags::CHILDREN
    }

    /// Produce rendered output for a node and its subtree. An invisible
    /// node renders as a placeholder comment and its children not at all.
    pub fn render(&self, node: &mut VNode) {
        if !node.visible {
            node.output = Some(self.store.with_renderer(|r| r.create_comment("@if")));
            return;
        }
        match node.kind {
            NodeKind::Element => {
                let handle = self
                    .store
                    .with_renderer(|r| r.create_element(node.tag.as_str()));
                let joined = enabled_classes(&node.classes);
                if !joined.is_empty() {
                    self.store.with_renderer(|r| r.set_classes(handle, &joined));
                }
                for (name, value) in &node.attributes {
                    if let Some(text) = attribute_text(value) {
                        self.store
                            .with_renderer(|r| r.set_attribute(handle, name, &text));
                    }
                }
                for child in &mut node.children {
                    self.render(child);
                    if let Some(child_handle) = child.output {
                        self.store
                            .with_renderer(|r| r.append_child(handle, child_handle));
                    }
                }
                node.output = Some(handle);
            }
            NodeKind::Text => {
                let text = node.text.clone().unwrap_or_default();
                node.output = Some(self.store.with_renderer(|r| r.create_text(&text)));
            }
            NodeKind::Comment => {
                let text = node.text.clone().unwrap_or_default();
                node.output = Some(self.store.with_renderer(|r| r.create_comment(&text)));
            }
        }
    }

    /// Fire one lifecycle phase over a node's directives. Hooks fire only
    /// on visible element nodes; traversal is top-down, parent first.
    pub fn fire_hooks(&self, node: &VNode, phase: HookPhase, recurse: bool) {
        // Hidden nodes fire nothing and prune their subtree; text and
        // comment nodes carry no directives
        if !node.visible || node.kind != NodeKind::Element {
            return;
        }
        for (name, binding) in &node.directives {
            let Some(hook) = self.directives.get(name).and_then(|h| h.hook(phase)) else {
                continue;
            };
            // The two mount-boundary phases run without an output
            let output = match phase {
                HookPhase::BeforeMount | HookPhase::Unmounted => None,
                _ => node.output,
            };
            hook(DirectiveCtx {
                store: self.store,
                output,
                value: &binding.value,
                modifiers: &binding.modifiers,
                expression: &binding.expression,
                node,
            });
        }
        if recurse {
            for child in &node.children {
                self.fire_hooks(child, phase, true);
            }
        }
    }
}

/// Classify map keys into updated / added / removed relative to `old`.
fn diff_keys<T: PartialEq>(
    new: &IndexMap<CompactString, T>,
    old: &IndexMap<CompactString, T>,
) -> (Vec<CompactString>, Vec<CompactString>, Vec<CompactString>) {
    let mut updated = Vec::new();
    let mut added = Vec::new();
    for (name, value) in new {
        match old.get(name) {
            Some(existing) if existing != value => updated.push(name.clone()),
            None => added.push(name.clone()),
            _ => {}
        }
    }
    let removed = old
        .keys()
        .filter(|name| !new.contains_key(*name))
        .cloned()
        .collect();
    (updated, added, removed)
}

/// Serialized attribute form, or `None` when the value unsets the
/// attribute (`false`, `null`, absence). `true` is a presence-only
/// attribute; containers keep their textual form.
fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(false) | Value::Null | Value::Undefined => None,
        Value::Bool(true) => Some(String::new()),
        other => Some(other.render_text()),
    }
}

fn enabled_classes(classes: &IndexMap<CompactString, bool>) -> String {
    classes
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
