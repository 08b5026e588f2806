//! Structured node descriptions.
//!
//! A [`NodeSpec`] is the builder-form equivalent of a markup template: a
//! component render function may return one instead of a markup string.
//! Everything in a spec is already resolved — no expression evaluation
//! happens on this path.

use compact_str::CompactString;
use indexmap::IndexMap;

use reflet_carton::{FuncValue, Value};

use crate::node::{DirectiveBinding, EventBinding, EventHandler, Modifiers, VNode};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub tag: CompactString,
    pub attrs: IndexMap<CompactString, Value>,
    pub classes: IndexMap<CompactString, bool>,
    pub directives: IndexMap<CompactString, DirectiveBinding>,
    pub events: IndexMap<CompactString, EventBinding>,
    /// When set, the node gets a single text child and `slots` is ignored.
    pub text: Option<String>,
    pub slots: Vec<NodeSpec>,
    pub visible: bool,
}

impl NodeSpec {
    /// Start a spec for `tag`. Tag names are lowercased, as the source
    /// runtime did for every created element.
    pub fn new(tag: impl AsRef<str>) -> Self {
        Self {
            tag: CompactString::from(tag.as_ref().to_lowercase()),
            attrs: IndexMap::new(),
            classes: IndexMap::new(),
            directives: IndexMap::new(),
            events: IndexMap::new(),
            text: None,
            slots: Vec::new(),
            visible: true,
        }
    }

    pub fn attr(mut self, name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Accepts the three class shapes the source runtime accepted:
    /// an array of names, a name→bool object, or a plain string.
    pub fn classes(mut self, value: &Value) -> Self {
        self.classes = normalize_classes(value);
        self
    }

    pub fn class(mut self, name: impl Into<CompactString>) -> Self {
        self.classes.insert(name.into(), true);
        self
    }

    pub fn directive(
        mut self,
        name: impl Into<CompactString>,
        value: Value,
        modifiers: Modifiers,
    ) -> Self {
        self.directives.insert(
            name.into(),
            DirectiveBinding {
                expression: String::new(),
                modifiers,
                value,
            },
        );
        self
    }

    pub fn event(mut self, name: impl Into<CompactString>, handler: FuncValue) -> Self {
        self.events.insert(
            name.into(),
            EventBinding {
                expression: String::new(),
                modifiers: Modifiers::new(),
                handler: EventHandler::Func(handler),
                bound_args: Vec::new(),
            },
        );
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn child(mut self, spec: NodeSpec) -> Self {
        self.slots.push(spec);
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Materialize the spec as an already-initialized node rooted at
    /// `uid`. A `text` spec produces a single text child; otherwise each
    /// slot becomes a child with a positional uid.
    pub fn to_vnode(&self, uid: &str) -> VNode {
        let mut node = VNode::element(uid, self.tag.clone());
        node.attributes = self.attrs.clone();
        node.classes = self.classes.clone();
        node.directives = self.directives.clone();
        node.events = self.events.clone();
        node.visible = self.visible;
        match &self.text {
            Some(text) => {
                node.children = vec![VNode::text_node(format!("{uid}_0"), text.clone())];
            }
            None => {
                node.children = self
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(i, slot)| slot.to_vnode(&format!("{uid}_{i}")))
                    .collect();
            }
        }
        node
    }
}

/// Normalize a class value into a name→enabled mapping: arrays switch each
/// named class on, objects pass through with their truthiness, strings
/// name a single class.
pub fn normalize_classes(value: &Value) -> IndexMap<CompactString, bool> {
    let mut classes = IndexMap::new();
    match value {
        Value::Array(items) => {
            for item in items {
                let name = item.render_text();
                if !name.is_empty() {
                    classes.insert(CompactString::from(name), true);
                }
            }
        }
        Value::Object(map) => {
            for (name, enabled) in map {
                classes.insert(CompactString::from(name.as_str()), enabled.is_truthy());
            }
        }
        Value::Str(s) if !s.is_empty() => {
            classes.insert(CompactString::from(s.as_str()), true);
        }
        _ => {}
    }
    classes
}
