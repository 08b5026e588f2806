//! Store-owned registries: directives and components.
//!
//! Registrant maps are constructed per store and seeded with the
//! built-ins at store construction, so multiple stores never interfere.

use std::rc::Rc;

use compact_str::CompactString;
use indexmap::IndexMap;

use reflet_carton::Value;
use reflet_relief::{NodeSpec, OutputHandle, VNode};

use crate::store::Store;

/// Everything a directive hook receives. `output` is absent for the two
/// hooks that run while no rendered artifact exists (`before_mount`,
/// `unmounted`).
pub struct DirectiveCtx<'a> {
    pub store: &'a Store,
    pub output: Option<OutputHandle>,
    pub value: &'a Value,
    pub modifiers: &'a [CompactString],
    pub expression: &'a str,
    pub node: &'a VNode,
}

pub type DirectiveHook = Rc<dyn Fn(DirectiveCtx<'_>)>;

/// The directive lifecycle phases, in firing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

/// The six-hook record a directive registers. Any subset may be present.
#[derive(Clone, Default)]
pub struct DirectiveHooks {
    pub before_mount: Option<DirectiveHook>,
    pub mounted: Option<DirectiveHook>,
    pub before_update: Option<DirectiveHook>,
    pub updated: Option<DirectiveHook>,
    pub before_unmount: Option<DirectiveHook>,
    pub unmounted: Option<DirectiveHook>,
}

impl DirectiveHooks {
    /// A bare function registers as the `mounted` hook.
    pub fn from_fn(f: impl Fn(DirectiveCtx<'_>) + 'static) -> Self {
        Self {
            mounted: Some(Rc::new(f)),
            ..Default::default()
        }
    }

    pub fn hook(&self, phase: HookPhase) -> Option<&DirectiveHook> {
        match phase {
            HookPhase::BeforeMount => self.before_mount.as_ref(),
            HookPhase::Mounted => self.mounted.as_ref(),
            HookPhase::BeforeUpdate => self.before_update.as_ref(),
            HookPhase::Updated => self.updated.as_ref(),
            HookPhase::BeforeUnmount => self.before_unmount.as_ref(),
            HookPhase::Unmounted => self.unmounted.as_ref(),
        }
    }
}

/// What a component render function may produce.
pub enum RenderOutput {
    /// Markup, recompiled and initialized rooted at the component node's
    /// uid.
    Markup(String),
    /// A structured, already-resolved node description.
    Spec(NodeSpec),
}

impl From<&str> for RenderOutput {
    fn from(markup: &str) -> Self {
        RenderOutput::Markup(markup.to_string())
    }
}

impl From<String> for RenderOutput {
    fn from(markup: String) -> Self {
        RenderOutput::Markup(markup)
    }
}

impl From<NodeSpec> for RenderOutput {
    fn from(spec: NodeSpec) -> Self {
        RenderOutput::Spec(spec)
    }
}

pub type Props = IndexMap<CompactString, Value>;
pub type ComponentRenderFn = Rc<dyn Fn(&Props) -> Option<RenderOutput>>;

/// A registered component: the attribute names it claims as props, and
/// the render function those props are handed to.
#[derive(Clone)]
pub struct ComponentSpec {
    pub accepted_props: Vec<CompactString>,
    pub render: ComponentRenderFn,
}

impl ComponentSpec {
    pub fn new(
        accepted_props: impl IntoIterator<Item = impl Into<CompactString>>,
        render: impl Fn(&Props) -> Option<RenderOutput> + 'static,
    ) -> Self {
        Self {
            accepted_props: accepted_props.into_iter().map(Into::into).collect(),
            render: Rc::new(render),
        }
    }

    /// A component with no declared props.
    pub fn from_fn(render: impl Fn(&Props) -> Option<RenderOutput> + 'static) -> Self {
        Self::new(Vec::<CompactString>::new(), render)
    }
}
