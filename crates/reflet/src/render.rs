//! The rendered-output capability.
//!
//! The core never touches a display surface directly: everything it needs
//! from one is the [`Renderer`] trait. Handles are opaque; the renderer
//! owns what they point at. [`TreeRenderer`] is the in-memory
//! implementation used by tests and headless hosts — a cheap mock surface
//! whose state can be inspected and serialized back to markup.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use reflet_relief::OutputHandle;

pub trait Renderer {
    fn create_element(&mut self, tag: &str) -> OutputHandle;
    fn create_text(&mut self, text: &str) -> OutputHandle;
    fn create_comment(&mut self, text: &str) -> OutputHandle;

    fn set_attribute(&mut self, handle: OutputHandle, name: &str, value: &str);
    fn remove_attribute(&mut self, handle: OutputHandle, name: &str);
    /// Space-joined class list; empty clears the class attribute.
    fn set_classes(&mut self, handle: OutputHandle, classes: &str);
    fn set_style(&mut self, handle: OutputHandle, property: &str, value: &str);
    fn set_text(&mut self, handle: OutputHandle, text: &str);

    fn append_child(&mut self, parent: OutputHandle, child: OutputHandle);
    /// Insert `new` as a sibling immediately before `reference`.
    fn insert_before(&mut self, new: OutputHandle, reference: OutputHandle);
    fn remove(&mut self, handle: OutputHandle);
    fn clear_children(&mut self, handle: OutputHandle);
    /// Attach a tree as (one of) the surface's roots.
    fn set_root(&mut self, handle: OutputHandle);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedKind {
    Element,
    Text,
    Comment,
}

/// One node of the in-memory surface.
#[derive(Debug, Clone)]
pub struct RenderedNode {
    pub kind: RenderedKind,
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub classes: Option<String>,
    pub styles: IndexMap<String, String>,
    pub text: String,
    pub children: Vec<OutputHandle>,
    pub parent: Option<OutputHandle>,
    pub detached: bool,
}

impl RenderedNode {
    fn new(kind: RenderedKind, tag: &str, text: &str) -> Self {
        Self {
            kind,
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            classes: None,
            styles: IndexMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            parent: None,
            detached: false,
        }
    }
}

#[derive(Default)]
struct TreeSurface {
    nodes: Vec<RenderedNode>,
    roots: Vec<OutputHandle>,
}

/// Shared-handle in-memory renderer. Clones view the same surface, so a
/// test can keep one handle while the store drives another.
#[derive(Clone, Default)]
pub struct TreeRenderer {
    surface: Rc<RefCell<TreeSurface>>,
}

impl TreeRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, node: RenderedNode) -> OutputHandle {
        let mut surface = self.surface.borrow_mut();
        surface.nodes.push(node);
        OutputHandle(surface.nodes.len() as u32 - 1)
    }

    /// Snapshot of one node; panics in tests if the handle was never
    /// issued.
    pub fn node(&self, handle: OutputHandle) -> RenderedNode {
        self.surface.borrow().nodes[handle.0 as usize].clone()
    }

    pub fn roots(&self) -> Vec<OutputHandle> {
        self.surface.borrow().roots.clone()
    }

    pub fn first_root(&self) -> Option<OutputHandle> {
        self.surface.borrow().roots.first().copied()
    }

    /// Serialize a subtree back to markup, for end-to-end assertions.
    pub fn to_markup(&self, handle: OutputHandle) -> String {
        let surface = self.surface.borrow();
        let mut out = String::new();
        write_markup(&surface, handle, &mut out);
        out
    }

    fn detach(&self, surface: &mut TreeSurface, handle: OutputHandle) {
        if let Some(parent) = surface.nodes[handle.0 as usize].parent.take() {
            surface.nodes[parent.0 as usize]
                .children
                .retain(|c| *c != handle);
        }
        surface.roots.retain(|r| *r != handle);
    }
}

fn write_markup(surface: &TreeSurface, handle: OutputHandle, out: &mut String) {
    let node = &surface.nodes[handle.0 as usize];
    match node.kind {
        RenderedKind::Text => out.push_str(&node.text),
        RenderedKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text);
            out.push_str("-->");
        }
        RenderedKind::Element => {
            out.push('<');
            out.push_str(&node.tag);
            if let Some(classes) = &node.classes {
                out.push_str(&format!(" class=\"{classes}\""));
            }
            for (name, value) in &node.attributes {
                if value.is_empty() {
                    out.push_str(&format!(" {name}"));
                } else {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
            }
            for (property, value) in &node.styles {
                if !value.is_empty() {
                    out.push_str(&format!(" style:{property}=\"{value}\""));
                }
            }
            out.push('>');
            for child in &node.children {
                write_markup(surface, *child, out);
            }
            out.push_str(&format!("</{}>", node.tag));
        }
    }
}

impl Renderer for TreeRenderer {
    fn create_element(&mut self, tag: &str) -> OutputHandle {
        self.alloc(RenderedNode::new(RenderedKind::Element, tag, ""))
    }

    fn create_text(&mut self, text: &str) -> OutputHandle {
        self.alloc(RenderedNode::new(RenderedKind::Text, "#text", text))
    }

    fn create_comment(&mut self, text: &str) -> OutputHandle {
        self.alloc(RenderedNode::new(RenderedKind::Comment, "#comment", text))
    }

    fn set_attribute(&mut self, handle: OutputHandle, name: &str, value: &str) {
        let mut surface = self.surface.borrow_mut();
        surface.nodes[handle.0 as usize]
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    fn remove_attribute(&mut self, handle: OutputHandle, name: &str) {
        let mut surface = self.surface.borrow_mut();
        surface.nodes[handle.0 as usize].attributes.shift_remove(name);
    }

    fn set_classes(&mut self, handle: OutputHandle, classes: &str) {
        let mut surface = self.surface.borrow_mut();
        surface.nodes[handle.0 as usize].classes = if classes.is_empty() {
            None
        } else {
            Some(classes.to_string())
        };
    }

    fn set_style(&mut self, handle: OutputHandle, property: &str, value: &str) {
        let mut surface = self.surface.borrow_mut();
        surface.nodes[handle.0 as usize]
            .styles
            .insert(property.to_string(), value.to_string());
    }

    fn set_text(&mut self, handle: OutputHandle, text: &str) {
        let mut surface = self.surface.borrow_mut();
        surface.nodes[handle.0 as usize].text = text.to_string();
    }

    fn append_child(&mut self, parent: OutputHandle, child: OutputHandle) {
        let mut surface = self.surface.borrow_mut();
        self.detach(&mut surface, child);
        surface.nodes[child.0 as usize].parent = Some(parent);
        surface.nodes[parent.0 as usize].children.push(child);
    }

    fn insert_before(&mut self, new: OutputHandle, reference: OutputHandle) {
        let mut surface = self.surface.borrow_mut();
        self.detach(&mut surface, new);
        match surface.nodes[reference.0 as usize].parent {
            Some(parent) => {
                let index = surface.nodes[parent.0 as usize]
                    .children
                    .iter()
                    .position(|c| *c == reference)
                    .unwrap_or(0);
                surface.nodes[parent.0 as usize].children.insert(index, new);
                surface.nodes[new.0 as usize].parent = Some(parent);
            }
            None => {
                let index = surface
                    .roots
                    .iter()
                    .position(|r| *r == reference)
                    .unwrap_or(0);
                surface.roots.insert(index, new);
            }
        }
    }

    fn remove(&mut self, handle: OutputHandle) {
        let mut surface = self.surface.borrow_mut();
        self.detach(&mut surface, handle);
        surface.nodes[handle.0 as usize].detached = true;
    }

    fn clear_children(&mut self, handle: OutputHandle) {
        let mut surface = self.surface.borrow_mut();
        let children = std::mem::take(&mut surface.nodes[handle.0 as usize].children);
        for child in children {
            surface.nodes[child.0 as usize].parent = None;
            surface.nodes[child.0 as usize].detached = true;
        }
    }

    fn set_root(&mut self, handle: OutputHandle) {
        let mut surface = self.surface.borrow_mut();
        surface.roots.push(handle);
    }
}
