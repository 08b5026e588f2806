//! The reactive store: observable data, watchers, registries, lifecycle
//! hooks, the committed tree and the synchronous update cycle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use tracing::debug;

use reflet_carton::{KeyPath, Value};
use reflet_croquis::{evaluate, evaluate_expr, Expr, ExpressionError, Scope};
use reflet_relief::{CompileError, EventHandler, LoopFrame, OutputHandle, TemplateNode, VNode};

use crate::compile::{compile, expand_loops, init_tree, no_locals, CompileCtx};
use crate::errors::StoreError;
use crate::expand::expand_components;
use crate::observe::ObservedNode;
use crate::options::StoreOptions;
use crate::reconcile::Reconciler;
use crate::registry::{ComponentSpec, DirectiveHooks, HookPhase};
use crate::render::{Renderer, TreeRenderer};

pub type WatchFn = Rc<dyn Fn(&Value, &Value)>;
pub type LifecycleFn = Rc<dyn Fn(&Store)>;
pub type UpdateLifecycleFn = Rc<dyn Fn(&Store, &UpdateEvent)>;
pub type ListenerFn = Rc<dyn Fn(&Store, &Value)>;

/// What the `before_update`/`updated` lifecycle hooks observe about one
/// store write.
pub struct UpdateEvent {
    pub property: String,
    pub value: Value,
    pub old_value: Value,
    /// The written property's container, after the write.
    pub container: Value,
}

struct StoreInner {
    data: Value,
    watchers: FxHashMap<String, WatchFn>,
    directives: FxHashMap<CompactString, Rc<DirectiveHooks>>,
    components: FxHashMap<CompactString, Rc<ComponentSpec>>,
    before_mount: Option<LifecycleFn>,
    mounted: Option<LifecycleFn>,
    before_update: Option<UpdateLifecycleFn>,
    updated: Option<UpdateLifecycleFn>,
    /// The original, uncompiled template captured at mount.
    template: Option<TemplateNode>,
    /// The node tree currently reflected in the rendered output.
    committed: Option<VNode>,
    /// Host-facing listeners keyed by output handle and event name,
    /// registered by directives such as `model`.
    listeners: FxHashMap<(OutputHandle, CompactString), Vec<ListenerFn>>,
    options: StoreOptions,
    /// An update cycle is in flight; writes queue instead of reentering.
    updating: bool,
    queue: VecDeque<(KeyPath, Value)>,
}

/// A cheap-clone handle over the store state. The runtime is
/// single-threaded and fully synchronous: every `set` runs compile,
/// reconcile and watcher delivery to completion before it returns.
#[derive(Clone)]
pub struct Store {
    inner: Rc<RefCell<StoreInner>>,
    renderer: Rc<RefCell<dyn Renderer>>,
}

/// Build a store over an initial data record.
pub fn create_store(initial: Value) -> Result<Store, StoreError> {
    create_store_with_renderer(initial, Rc::new(RefCell::new(TreeRenderer::new())))
}

/// Build a store that renders onto a host-provided surface.
pub fn create_store_with_renderer(
    initial: Value,
    renderer: Rc<RefCell<dyn Renderer>>,
) -> Result<Store, StoreError> {
    if !matches!(initial, Value::Object(_)) {
        return Err(StoreError::Validation(
            "the initial data must be an object".to_string(),
        ));
    }
    let store = Store {
        inner: Rc::new(RefCell::new(StoreInner {
            data: initial,
            watchers: FxHashMap::default(),
            directives: FxHashMap::default(),
            components: FxHashMap::default(),
            before_mount: None,
            mounted: None,
            before_update: None,
            updated: None,
            template: None,
            committed: None,
            listeners: FxHashMap::default(),
            options: StoreOptions::default(),
            updating: false,
            queue: VecDeque::new(),
        })),
        renderer,
    };
    crate::builtins::register_builtins(&store)?;
    Ok(store)
}

impl Store {
    // -- data access --------------------------------------------------------

    /// Snapshot of the value at `path` (`Undefined` when absent).
    pub fn get(&self, path: &str) -> Value {
        let path = KeyPath::parse(path);
        self.inner
            .borrow()
            .data
            .get_path(path.segments())
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the whole data record.
    pub fn data(&self) -> Value {
        self.inner.borrow().data.clone()
    }

    /// Observation handle for a nested container.
    pub fn wrap(&self, path: &str) -> ObservedNode {
        ObservedNode::new(self.clone(), KeyPath::parse(path))
    }

    /// Write `value` at `path`. Writing a value equal to the existing one
    /// is a complete no-op: no recompilation, no watchers, no hooks.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        self.set_path(KeyPath::parse(path), value.into())
    }

    /// Remove the value at `path` (the source runtime's delete trap wrote
    /// `undefined` in place).
    pub fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.set_path(KeyPath::parse(path), Value::Undefined)
    }

    pub(crate) fn set_path(&self, path: KeyPath, value: Value) -> Result<(), StoreError> {
        if path.is_root() {
            return Err(StoreError::Validation(
                "cannot write the root record".to_string(),
            ));
        }

        let property = path.leaf().unwrap_or_default().to_string();
        let (old_value, old_container, new_container, hooks);
        {
            let mut inner = self.inner.borrow_mut();
            if inner.updating {
                // Reentrant write observed mid-cycle: drain after commit
                inner.queue.push_back((path, value));
                return Ok(());
            }
            let container = inner
                .data
                .get_path_mut(path.container().segments())
                .ok_or_else(|| {
                    StoreError::Validation(format!("no container exists at `{}`", path.container()))
                })?;
            let existing = container.get_key(&property).cloned().unwrap_or_default();
            if existing == value {
                return Ok(());
            }
            old_container = container.clone();
            if !container.set_key(&property, value.clone()) {
                return Err(StoreError::Validation(format!(
                    "cannot write `{path}`: the container is not an object or array"
                )));
            }
            new_container = container.clone();
            old_value = existing;
            inner.updating = true;
            hooks = (
                inner.before_update.clone(),
                inner.updated.clone(),
                inner.watchers.get(&path.container().join()).cloned(),
                inner.watchers.get(&path.join()).cloned(),
            );
        }
        debug!(path = %path, "store write");

        let (before_update, updated, container_watcher, leaf_watcher) = hooks;
        let event = UpdateEvent {
            property,
            value: value.clone(),
            old_value: old_value.clone(),
            container: new_container.clone(),
        };
        if let Some(hook) = &before_update {
            hook(self, &event);
        }

        let cycle = self.update_cycle();
        self.inner.borrow_mut().updating = false;
        cycle?;

        if path.depth() > 1 {
            if let Some(watcher) = container_watcher {
                watcher(&new_container, &old_container);
            }
        }
        if let Some(watcher) = leaf_watcher {
            watcher(&value, &old_value);
        }
        if let Some(hook) = &updated {
            hook(self, &event);
        }

        self.drain_queue()
    }

    fn drain_queue(&self) -> Result<(), StoreError> {
        loop {
            let next = self.inner.borrow_mut().queue.pop_front();
            match next {
                Some((path, value)) => self.set_path(path, value)?,
                None => return Ok(()),
            }
        }
    }

    // -- watchers -----------------------------------------------------------

    /// Register exactly one handler for a normalized path. Bracket and
    /// dot addressing collide into the same slot.
    pub fn watch(
        &self,
        path: &str,
        handler: impl Fn(&Value, &Value) + 'static,
    ) -> Result<(), StoreError> {
        if path.is_empty() {
            return Err(StoreError::Validation(
                "you must specify a property to watch".to_string(),
            ));
        }
        let key = KeyPath::parse(path).join();
        let mut inner = self.inner.borrow_mut();
        if inner.watchers.contains_key(&key) {
            return Err(StoreError::DuplicateWatcher(path.to_string()));
        }
        inner.watchers.insert(key, Rc::new(handler));
        Ok(())
    }

    /// Remove the handler at `path`; with `None`, remove them all.
    pub fn unwatch(&self, path: Option<&str>) {
        let mut inner = self.inner.borrow_mut();
        match path {
            Some(path) => {
                inner.watchers.remove(&KeyPath::parse(path).join());
            }
            None => inner.watchers.clear(),
        }
    }

    // -- registries ---------------------------------------------------------

    /// Register a directive under `name`. Duplicate names are an error.
    pub fn directive(&self, name: &str, hooks: DirectiveHooks) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::Validation(
                "you need to give the directive a name".to_string(),
            ));
        }
        let mut inner = self.inner.borrow_mut();
        if inner.directives.contains_key(name) {
            return Err(StoreError::DuplicateDirective(name.to_string()));
        }
        inner
            .directives
            .insert(CompactString::from(name), Rc::new(hooks));
        Ok(())
    }

    /// Register a component under `name`. Duplicate names are an error.
    pub fn component(&self, name: &str, spec: ComponentSpec) -> Result<(), StoreError> {
        if name.is_empty() {
            return Err(StoreError::Validation(
                "you need to give the component a name".to_string(),
            ));
        }
        let mut inner = self.inner.borrow_mut();
        if inner.components.contains_key(name) {
            return Err(StoreError::DuplicateComponent(name.to_string()));
        }
        inner
            .components
            .insert(CompactString::from(name), Rc::new(spec));
        Ok(())
    }

    // -- lifecycle hooks ----------------------------------------------------

    pub fn on_before_mount(&self, hook: impl Fn(&Store) + 'static) {
        self.inner.borrow_mut().before_mount = Some(Rc::new(hook));
    }

    pub fn on_mounted(&self, hook: impl Fn(&Store) + 'static) {
        self.inner.borrow_mut().mounted = Some(Rc::new(hook));
    }

    pub fn on_before_update(&self, hook: impl Fn(&Store, &UpdateEvent) + 'static) {
        self.inner.borrow_mut().before_update = Some(Rc::new(hook));
    }

    pub fn on_updated(&self, hook: impl Fn(&Store, &UpdateEvent) + 'static) {
        self.inner.borrow_mut().updated = Some(Rc::new(hook));
    }

    // -- mount and update ---------------------------------------------------

    /// Parse `markup` and mount its single element root.
    pub fn mount(&self, markup: &str) -> Result<(), StoreError> {
        let template = reflet_armature::parse_root(markup)?;
        self.mount_template(template)
    }

    /// Mount a prebuilt template tree: capture it as the snapshot, run
    /// the full pipeline, render, and commit.
    pub fn mount_template(&self, template: TemplateNode) -> Result<(), StoreError> {
        if !template.is_element() {
            return Err(StoreError::Validation(
                "the mount target must be an element".to_string(),
            ));
        }
        {
            let mut inner = self.inner.borrow_mut();
            if inner.template.is_some() {
                return Err(StoreError::Validation(
                    "the store is already mounted".to_string(),
                ));
            }
            inner.template = Some(template);
            inner.updating = true;
        }
        debug!("mounting template");

        let before_mount = self.inner.borrow().before_mount.clone();
        if let Some(hook) = &before_mount {
            hook(self);
        }

        let result = (|| {
            let mut tree = self.build_tree()?;
            let reconciler = Reconciler::new(self, self.directives_snapshot());
            reconciler.fire_hooks(&tree, HookPhase::BeforeMount, true);
            reconciler.render(&mut tree);
            if let Some(handle) = tree.output {
                self.with_renderer(|r| r.set_root(handle));
            }
            reconciler.fire_hooks(&tree, HookPhase::Mounted, true);
            Ok::<VNode, StoreError>(tree)
        })();

        match result {
            Ok(tree) => {
                let mounted = {
                    let mut inner = self.inner.borrow_mut();
                    inner.committed = Some(tree);
                    inner.updating = false;
                    inner.mounted.clone()
                };
                if let Some(hook) = &mounted {
                    hook(self);
                }
                self.drain_queue()
            }
            Err(err) => {
                let mut inner = self.inner.borrow_mut();
                inner.template = None;
                inner.updating = false;
                Err(err)
            }
        }
    }

    /// Rebuild a candidate tree from the template snapshot and diff it
    /// against the committed tree.
    fn update_cycle(&self) -> Result<(), StoreError> {
        if self.inner.borrow().template.is_none() {
            // Not mounted: data updates and watchers still work
            return Ok(());
        }
        let candidate = self.build_tree()?;
        let Some(mut committed) = self.inner.borrow_mut().committed.take() else {
            return Ok(());
        };
        let reconciler = Reconciler::new(self, self.directives_snapshot());
        reconciler.reconcile(&candidate, &mut committed);
        self.inner.borrow_mut().committed = Some(committed);
        Ok(())
    }

    /// compile → expand loops → init → expand components, against a
    /// snapshot of data and registries. No store borrow is held while
    /// user render functions run.
    fn build_tree(&self) -> Result<VNode, StoreError> {
        let (template, data, directives, components, options) = {
            let inner = self.inner.borrow();
            (
                inner.template.clone().ok_or_else(|| {
                    StoreError::Validation("the store is not mounted".to_string())
                })?,
                inner.data.clone(),
                inner.directives.clone(),
                inner.components.clone(),
                inner.options.clone(),
            )
        };
        let ctx = CompileCtx {
            data: &data,
            directives: &directives,
            components: &components,
            options: &options,
        };
        let mut root = compile(&options, &template, "vnode");
        if root.directives.contains_key("for") {
            return Err(CompileError::InvalidFor(
                "the template root cannot carry @for".to_string(),
            )
            .into());
        }
        expand_loops(&ctx, &mut root, no_locals(), &[])?;
        init_tree(&ctx, &mut root, no_locals())?;
        expand_components(&ctx, &mut root)?;
        Ok(root)
    }

    fn directives_snapshot(&self) -> FxHashMap<CompactString, Rc<DirectiveHooks>> {
        self.inner.borrow().directives.clone()
    }

    pub(crate) fn with_renderer<R>(&self, f: impl FnOnce(&mut dyn Renderer) -> R) -> R {
        f(&mut *self.renderer.borrow_mut())
    }

    /// The renderer handle, for hosts that need direct surface access.
    pub fn renderer(&self) -> Rc<RefCell<dyn Renderer>> {
        self.renderer.clone()
    }

    // -- committed-tree queries ---------------------------------------------

    /// The output handle of the committed node with `uid`.
    pub fn output_of(&self, uid: &str) -> Option<OutputHandle> {
        let inner = self.inner.borrow();
        inner
            .committed
            .as_ref()
            .and_then(|tree| tree.find(uid))
            .and_then(|node| node.output)
    }

    /// Evaluate `expression` in the merged scope of the committed node
    /// with `uid` (store data overlaid with that node's loop bindings).
    pub fn eval_in(&self, uid: &str, expression: &str) -> Result<Value, StoreError> {
        let (data, locals) = {
            let inner = self.inner.borrow();
            let node = inner
                .committed
                .as_ref()
                .and_then(|tree| tree.find(uid))
                .ok_or_else(|| StoreError::UnknownNode(uid.to_string()))?;
            (inner.data.clone(), node.loop_bindings.clone())
        };
        Ok(evaluate(Scope::new(&data, &locals), expression)?)
    }

    // -- events -------------------------------------------------------------

    /// Register a host-facing listener on a rendered node. Directives use
    /// this to observe surface events (`model` listens for `change`).
    pub fn add_native_listener(
        &self,
        handle: OutputHandle,
        event: &str,
        listener: impl Fn(&Store, &Value) + 'static,
    ) {
        self.inner
            .borrow_mut()
            .listeners
            .entry((handle, CompactString::from(event)))
            .or_default()
            .push(Rc::new(listener));
    }

    /// Deliver a surface event to the committed node owning `handle`:
    /// run its template binding (function handler, or raw statement with
    /// write-back), honor the `once` modifier, then run native listeners.
    pub fn trigger(&self, handle: OutputHandle, event: &str, payload: Value) -> Result<(), StoreError> {
        let (binding, bindings, frames) = {
            let inner = self.inner.borrow();
            let node = inner
                .committed
                .as_ref()
                .and_then(|tree| tree.find_by_output(handle))
                .ok_or_else(|| StoreError::UnknownNode(format!("output {}", handle.0)))?;
            (
                node.events.get(event).cloned(),
                node.loop_bindings.clone(),
                node.loop_frames.clone(),
            )
        };

        if let Some(binding) = &binding {
            match &binding.handler {
                EventHandler::Func(f) => {
                    let mut args = Vec::with_capacity(1 + binding.bound_args.len());
                    args.push(payload.clone());
                    args.extend(binding.bound_args.iter().cloned());
                    f.call(&args);
                }
                EventHandler::Statement(statement) => {
                    self.execute_statement(statement, &bindings, &frames)?;
                }
                EventHandler::Unresolved => {}
            }
            if binding.modifiers.iter().any(|m| m == "once") {
                let mut inner = self.inner.borrow_mut();
                if let Some(node) = inner
                    .committed
                    .as_mut()
                    .and_then(|tree| tree.find_by_output_mut(handle))
                {
                    node.events.shift_remove(event);
                }
            }
        }

        let listeners = self
            .inner
            .borrow()
            .listeners
            .get(&(handle, CompactString::from(event)))
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(self, &payload);
        }
        Ok(())
    }

    // -- write-back ---------------------------------------------------------

    /// Run a statement binding (`done = !done`) against the merged scope
    /// and write changed roots back into the store — redirecting writes
    /// that land on a loop alias into the loop's source container.
    pub(crate) fn execute_statement(
        &self,
        statement: &str,
        bindings: &FxHashMap<CompactString, Value>,
        frames: &[LoopFrame],
    ) -> Result<(), StoreError> {
        let assignment = reflet_croquis::compile_assignment(statement)?;
        let mut env = self.merged_env(bindings);
        let changed = assignment.run(&mut env)?;
        self.apply_changed(env, changed, bindings, frames)
    }

    /// Write `value` through the expression `target` (the `model`
    /// write-back entry point): primary path against the merged scope,
    /// loop-alias redirection per the innermost enclosing frame, fallback
    /// against the unmerged root record.
    pub fn write_back(
        &self,
        target: &str,
        value: Value,
        bindings: &FxHashMap<CompactString, Value>,
        frames: &[LoopFrame],
    ) -> Result<(), StoreError> {
        let mut env = self.merged_env(bindings);
        match reflet_croquis::assign_value(&mut env, target, value.clone()) {
            Ok(changed) => self.apply_changed(env, changed, bindings, frames),
            Err(_) => {
                // Evaluation against the merged scope failed; retry the
                // assignment directly against the root record
                let mut env = self.merged_env(no_locals());
                let changed = reflet_croquis::assign_value(&mut env, target, value)?;
                self.apply_changed(env, changed, bindings, frames)
            }
        }
    }

    /// The writable environment a statement executes in: every top-level
    /// data key, overlaid with the loop-binding aliases.
    fn merged_env(&self, bindings: &FxHashMap<CompactString, Value>) -> FxHashMap<CompactString, Value> {
        let inner = self.inner.borrow();
        let mut env = FxHashMap::default();
        if let Value::Object(map) = &inner.data {
            for (key, value) in map {
                env.insert(CompactString::from(key.as_str()), value.clone());
            }
        }
        for (alias, value) in bindings {
            env.insert(alias.clone(), value.clone());
        }
        env
    }

    /// Propagate changed environment roots into the store. A changed
    /// data key writes straight back; a changed loop alias is rewritten
    /// as an indexed write into the innermost enclosing loop source that
    /// contains the bound value.
    fn apply_changed(
        &self,
        env: FxHashMap<CompactString, Value>,
        changed: Vec<CompactString>,
        bindings: &FxHashMap<CompactString, Value>,
        frames: &[LoopFrame],
    ) -> Result<(), StoreError> {
        for root in changed {
            let new_value = env.get(&root).cloned().unwrap_or_default();
            if bindings.contains_key(&root) {
                let path = self.alias_write_path(&root, bindings, frames)?;
                self.set_path(path, new_value)?;
            } else {
                self.set_path(KeyPath::from_segments([root.as_str()]), new_value)?;
            }
        }
        Ok(())
    }

    /// Locate the innermost enclosing loop frame binding `alias` whose
    /// evaluated source contains the currently bound value, and produce
    /// the indexed/keyed path into that source.
    fn alias_write_path(
        &self,
        alias: &str,
        bindings: &FxHashMap<CompactString, Value>,
        frames: &[LoopFrame],
    ) -> Result<KeyPath, StoreError> {
        let data = self.data();
        let scope = Scope::new(&data, bindings);
        let bound = bindings.get(alias).cloned().unwrap_or_default();
        let mut fallback = None;
        for frame in frames.iter().rev().filter(|f| f.item_alias == alias) {
            let source_path = match chain_path(scope, &frame.source) {
                Ok(path) => path,
                Err(_) => continue,
            };
            let element_key = match (&frame.key, frame.key_alias.as_ref()) {
                (Some(key), Some(_)) => key.clone(),
                _ => frame.index.to_string(),
            };
            let path = source_path.child(element_key.as_str());
            if fallback.is_none() {
                fallback = Some(path.clone());
            }
            let source_value = evaluate(scope, &frame.source).unwrap_or_default();
            if source_value.get_key(&element_key) == Some(&bound) {
                return Ok(path);
            }
        }
        fallback.ok_or_else(|| {
            StoreError::Expression(ExpressionError::UnknownIdentifier(CompactString::from(alias)))
        })
    }
}

/// Resolve an identifier / member / index chain expression into a key
/// path, evaluating index expressions against `scope`.
fn chain_path(scope: Scope<'_>, expression: &str) -> Result<KeyPath, ExpressionError> {
    let expr = reflet_croquis::parse_expression(expression)?;
    let mut segments: Vec<CompactString> = Vec::new();
    let mut cur = &expr;
    loop {
        match cur {
            Expr::Ident(name) => {
                segments.push(name.clone());
                segments.reverse();
                return Ok(KeyPath::from_segments(segments));
            }
            Expr::Member(base, key) => {
                segments.push(key.clone());
                cur = base.as_ref();
            }
            Expr::Index(base, index) => {
                segments.push(CompactString::from(
                    evaluate_expr(scope, index)?.render_text(),
                ));
                cur = base.as_ref();
            }
            _ => return Err(ExpressionError::InvalidAssignTarget),
        }
    }
}

/// Extension used by `trigger` to locate a committed node mutably.
trait FindByOutputMut {
    fn find_by_output_mut(&mut self, handle: OutputHandle) -> Option<&mut VNode>;
}

impl FindByOutputMut for VNode {
    fn find_by_output_mut(&mut self, handle: OutputHandle) -> Option<&mut VNode> {
        if self.output == Some(handle) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.find_by_output_mut(handle))
    }
}

impl Store {
    /// Snapshot of the committed node with `uid`, for hosts and tests
    /// inspecting render state.
    pub fn committed_node(&self, uid: &str) -> Option<VNode> {
        self.inner
            .borrow()
            .committed
            .as_ref()
            .and_then(|tree| tree.find(uid))
            .cloned()
    }

    /// Snapshot of the whole committed tree.
    pub fn committed_root(&self) -> Option<VNode> {
        self.inner.borrow().committed.clone()
    }
}
