//! Template compilation: raw tree construction, loop expansion, and the
//! init pass that resolves every binding against the current scope.

use std::rc::Rc;

use compact_str::CompactString;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use reflet_carton::Value;
use reflet_croquis::{evaluate, evaluate_callable, evaluate_expr, Expr, ExpressionError, Scope};
use reflet_relief::{
    spec::normalize_classes, CompileError, ConditionalRole, DirectiveBinding, EventBinding,
    EventHandler, LoopFrame, NodeKind, TemplateNode, VNode,
};

use crate::errors::StoreError;
use crate::options::StoreOptions;
use crate::registry::{ComponentSpec, DirectiveHooks};

/// Everything the compile passes read: a snapshot of the store's data and
/// registries, detached from the store so user callbacks running during a
/// pass can freely call back into it.
pub(crate) struct CompileCtx<'a> {
    pub data: &'a Value,
    pub directives: &'a FxHashMap<CompactString, Rc<DirectiveHooks>>,
    pub components: &'a FxHashMap<CompactString, Rc<ComponentSpec>>,
    pub options: &'a StoreOptions,
}

impl CompileCtx<'_> {
    pub fn scope<'s>(&'s self, locals: &'s FxHashMap<CompactString, Value>) -> Scope<'s> {
        Scope::new(self.data, locals)
    }
}

thread_local! {
    static EMPTY_LOCALS: &'static FxHashMap<CompactString, Value> =
        Box::leak(Box::new(FxHashMap::default()));
}

pub(crate) fn no_locals() -> &'static FxHashMap<CompactString, Value> {
    EMPTY_LOCALS.with(|m| *m)
}

// ---------------------------------------------------------------------------
// compile: raw template tree -> uninitialized node tree
// ---------------------------------------------------------------------------

/// Build the uninitialized node tree for `template`, assigning positional
/// uids below `uid`.
pub(crate) fn compile(options: &StoreOptions, template: &TemplateNode, uid: &str) -> VNode {
    match template {
        TemplateNode::Text(text) => VNode::text_node(uid, text.clone()),
        TemplateNode::Comment(text) => VNode::comment(uid, text.clone()),
        TemplateNode::Element {
            tag,
            attributes,
            children,
        } => {
            let mut node = VNode::element(uid, tag.clone());
            for (name, value) in attributes {
                if let Some(rest) = name.strip_prefix(options.directive_marker) {
                    let (dir_name, modifiers) = split_directive_name(rest);
                    if dir_name.is_empty() {
                        continue;
                    }
                    node.directives.insert(
                        dir_name,
                        DirectiveBinding {
                            expression: value.clone(),
                            modifiers,
                            value: Value::Undefined,
                        },
                    );
                } else if let Some(rest) = name.strip_prefix(options.event_marker) {
                    let mut parts = rest.split('.');
                    let event_name = CompactString::from(parts.next().unwrap_or_default());
                    if event_name.is_empty() {
                        continue;
                    }
                    node.events.insert(
                        event_name,
                        EventBinding {
                            expression: value.clone(),
                            modifiers: parts.map(CompactString::from).collect(),
                            handler: EventHandler::Unresolved,
                            bound_args: Vec::new(),
                        },
                    );
                } else if name == "class" {
                    node.raw_classes = value.trim().to_string();
                } else if *name != options.cloak_attribute {
                    node.raw_attributes.insert(name.clone(), value.clone());
                }
            }
            node.children = children
                .iter()
                .enumerate()
                .map(|(i, child)| compile(options, child, &format!("{uid}_{i}")))
                .collect();
            node
        }
    }
}

/// `@name:modifier` keeps everything after the colon as one modifier;
/// `@name.mod1.mod2` splits on dots.
fn split_directive_name(rest: &str) -> (CompactString, smallvec::SmallVec<[CompactString; 2]>) {
    if let Some((name, modifier)) = rest.split_once(':') {
        let mut modifiers = smallvec::SmallVec::new();
        if !modifier.is_empty() {
            modifiers.push(CompactString::from(modifier));
        }
        return (CompactString::from(name), modifiers);
    }
    let mut parts = rest.split('.');
    let name = CompactString::from(parts.next().unwrap_or_default());
    (name, parts.map(CompactString::from).collect())
}

// ---------------------------------------------------------------------------
// expand_loops: clone @for positions once per iterated element
// ---------------------------------------------------------------------------

static FOR_BINDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*(.*?)\s+(?:in|of)\s+(.*?)\s*$").expect("for regex"));

struct ForSpec {
    item_alias: CompactString,
    index_alias: CompactString,
    key_alias: CompactString,
    source: String,
}

fn parse_for(expression: &str) -> Result<ForSpec, CompileError> {
    let caps = FOR_BINDING
        .captures(expression)
        .ok_or_else(|| CompileError::InvalidFor(expression.to_string()))?;
    let bindings = caps[1].replace(['(', ')'], "");
    let mut aliases = bindings.split(',').map(str::trim);
    let item = aliases.next().unwrap_or_default();
    if item.is_empty() {
        return Err(CompileError::InvalidFor(expression.to_string()));
    }
    let index = aliases.next().filter(|a| !a.is_empty()).unwrap_or("index");
    let key = aliases.next().filter(|a| !a.is_empty()).unwrap_or("key");
    Ok(ForSpec {
        item_alias: item.into(),
        index_alias: index.into(),
        key_alias: key.into(),
        source: caps[2].trim().to_string(),
    })
}

/// One iteration of a loop source: the element value, its index, and the
/// mapping key for keyed sources.
fn iterations(source: &Value, expression: &str) -> Result<Vec<(Value, Option<String>)>, CompileError> {
    match source {
        Value::Array(items) => Ok(items.iter().cloned().map(|v| (v, None)).collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (v.clone(), Some(k.clone())))
            .collect()),
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
            Ok((0..*n as usize).map(|_| (Value::Undefined, None)).collect())
        }
        _ => Err(CompileError::NotIterable(expression.to_string())),
    }
}

/// Expand every `@for` directive in the subtree below `node`, depth-first
/// so nested loops see their ancestors' bindings. Clones replace the
/// template position in the parent's child list.
pub(crate) fn expand_loops(
    ctx: &CompileCtx<'_>,
    node: &mut VNode,
    locals: &FxHashMap<CompactString, Value>,
    frames: &[LoopFrame],
) -> Result<(), StoreError> {
    let children = std::mem::take(&mut node.children);
    let mut expanded = Vec::with_capacity(children.len());
    for mut child in children {
        let Some(binding) = child.directives.shift_remove("for") else {
            expand_loops(ctx, &mut child, locals, frames)?;
            expanded.push(child);
            continue;
        };
        let spec = parse_for(&binding.expression)?;
        let source = evaluate(ctx.scope(locals), &spec.source)?;
        for (i, (item, key)) in iterations(&source, &binding.expression)?.into_iter().enumerate() {
            let mut clone = clone_with_suffix(&child, &format!("_copy_{i}"));
            clone.is_loop_clone = true;

            let mut bindings = locals.clone();
            bindings.insert(spec.item_alias.clone(), item);
            bindings.insert(spec.index_alias.clone(), Value::Number(i as f64));
            if let Some(key) = &key {
                bindings.insert(spec.key_alias.clone(), Value::Str(key.clone()));
            }
            let mut clone_frames = frames.to_vec();
            clone_frames.push(LoopFrame {
                source: spec.source.clone(),
                item_alias: spec.item_alias.clone(),
                index_alias: spec.index_alias.clone(),
                key_alias: key.as_ref().map(|_| spec.key_alias.clone()),
                index: i,
                key,
            });
            attach_loop_info(&mut clone, &bindings, &clone_frames);

            expand_loops(ctx, &mut clone, &bindings, &clone_frames)?;
            expanded.push(clone);
        }
    }
    node.children = expanded;
    Ok(())
}

fn clone_with_suffix(node: &VNode, suffix: &str) -> VNode {
    let mut clone = node.clone();
    append_suffix(&mut clone, suffix);
    clone
}

fn append_suffix(node: &mut VNode, suffix: &str) {
    node.uid = CompactString::from(format!("{}{}", node.uid, suffix));
    for child in &mut node.children {
        append_suffix(child, suffix);
    }
}

/// Record the loop bindings and frames on every node of a cloned subtree,
/// so committed nodes can rebuild their scope at event-fire time without
/// a parent chain.
fn attach_loop_info(
    node: &mut VNode,
    bindings: &FxHashMap<CompactString, Value>,
    frames: &[LoopFrame],
) {
    node.loop_bindings = bindings.clone();
    node.loop_frames = frames.to_vec();
    for child in &mut node.children {
        attach_loop_info(child, bindings, frames);
    }
}

// ---------------------------------------------------------------------------
// init: resolve conditionals, directives, attributes, classes and events
// ---------------------------------------------------------------------------

static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(?s)(.*?)\}\}").expect("interpolation regex"));
static WHOLE_INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\{\{(?s)(.*?)\}\}$").expect("whole interpolation regex"));

/// Initialize a compiled (and loop-expanded) tree in place.
pub(crate) fn init_tree(
    ctx: &CompileCtx<'_>,
    root: &mut VNode,
    locals: &FxHashMap<CompactString, Value>,
) -> Result<(), StoreError> {
    init_siblings(ctx, std::slice::from_mut(root), locals)
}

fn init_siblings(
    ctx: &CompileCtx<'_>,
    nodes: &mut [VNode],
    locals: &FxHashMap<CompactString, Value>,
) -> Result<(), StoreError> {
    for i in 0..nodes.len() {
        let (prior, rest) = nodes.split_at_mut(i);
        let node = &mut rest[0];
        let node_locals = if node.loop_bindings.is_empty() {
            locals.clone()
        } else {
            // Cumulative: a clone's bindings already include its ancestors'
            node.loop_bindings.clone()
        };
        if node.kind == NodeKind::Element {
            resolve_conditional(ctx, prior, node, &node_locals)?;
        }
        init_node(ctx, node, &node_locals)?;
    }
    Ok(())
}

/// Resolve this node's place in an `@if`/`@else-if`/`@else` chain, using
/// the already-initialized prior siblings. Chain violations are fatal.
fn resolve_conditional(
    ctx: &CompileCtx<'_>,
    prior: &[VNode],
    node: &mut VNode,
    locals: &FxHashMap<CompactString, Value>,
) -> Result<(), StoreError> {
    let has_if = node.directives.contains_key("if");
    let has_else_if = node.directives.contains_key("else-if");
    let has_else = node.directives.contains_key("else");
    if has_if && (has_else_if || has_else) {
        let other = if has_else_if { "else-if" } else { "else" };
        return Err(CompileError::ConflictingConditionals("if".into(), other.into()).into());
    }
    if has_else_if && has_else {
        return Err(CompileError::ConflictingConditionals("else-if".into(), "else".into()).into());
    }

    if let Some(binding) = node.directives.shift_remove("if") {
        node.visible = evaluate(ctx.scope(locals), &binding.expression)?.is_truthy();
        node.conditional_role = ConditionalRole::If;
    } else if let Some(binding) = node.directives.shift_remove("else-if") {
        let Some(prev) = prev_element(prior, prior.len()) else {
            return Err(CompileError::DanglingConditional("else-if".into()).into());
        };
        if prev.conditional_role != ConditionalRole::If {
            return Err(CompileError::DanglingConditional("else-if".into()).into());
        }
        node.visible = if prev.visible {
            false
        } else {
            evaluate(ctx.scope(locals), &binding.expression)?.is_truthy()
        };
        node.conditional_role = ConditionalRole::ElseIf;
    } else if node.directives.shift_remove("else").is_some() {
        let Some((prev_index, prev)) = prev_element_indexed(prior, prior.len()) else {
            return Err(CompileError::DanglingConditional("else".into()).into());
        };
        node.visible = match prev.conditional_role {
            ConditionalRole::If => !prev.visible,
            ConditionalRole::ElseIf => {
                let Some(first) = prev_element(prior, prev_index) else {
                    return Err(CompileError::DanglingConditional("else".into()).into());
                };
                if first.conditional_role != ConditionalRole::If {
                    return Err(CompileError::DanglingConditional("else".into()).into());
                }
                !(prev.visible || first.visible)
            }
            _ => return Err(CompileError::DanglingConditional("else".into()).into()),
        };
        node.conditional_role = ConditionalRole::Else;
    }
    Ok(())
}

fn prev_element(nodes: &[VNode], before: usize) -> Option<&VNode> {
    prev_element_indexed(nodes, before).map(|(_, node)| node)
}

fn prev_element_indexed(nodes: &[VNode], before: usize) -> Option<(usize, &VNode)> {
    nodes[..before]
        .iter()
        .enumerate()
        .rev()
        .find(|(_, n)| n.kind == NodeKind::Element)
}

fn init_node(
    ctx: &CompileCtx<'_>,
    node: &mut VNode,
    locals: &FxHashMap<CompactString, Value>,
) -> Result<(), StoreError> {
    let scope = ctx.scope(locals);
    match node.kind {
        NodeKind::Element => {
            // Remaining directives must be registered; resolve their values
            for (name, binding) in node.directives.iter_mut() {
                if !ctx.directives.contains_key(name) {
                    return Err(CompileError::UnknownDirective(name.clone()).into());
                }
                binding.value = evaluate_callable(scope, &binding.expression)?;
            }

            // Attributes: a value that is exactly one interpolation keeps
            // its type; anything else resolves as mixed text
            let raw_attributes = std::mem::take(&mut node.raw_attributes);
            for (raw_name, raw_value) in raw_attributes {
                let name = parse_text(scope, &raw_name)?;
                let mut value = match whole_expression(&raw_value) {
                    Some(expression) => evaluate_callable(scope, expression)?,
                    None => Value::Str(parse_text(scope, &raw_value)?),
                };
                // Presence-only attribute
                if value == Value::Str(String::new()) {
                    value = Value::Bool(true);
                }
                node.attributes.insert(CompactString::from(name), value);
            }

            let raw_classes = std::mem::take(&mut node.raw_classes);
            if !raw_classes.is_empty() {
                node.classes = match whole_expression(&raw_classes) {
                    Some(expression) => {
                        normalize_classes(&evaluate_callable(scope, expression)?)
                    }
                    None => parse_text(scope, &raw_classes)?
                        .split_whitespace()
                        .map(|name| (CompactString::from(name), true))
                        .collect(),
                };
            }

            for (name, binding) in node.events.iter_mut() {
                resolve_event(scope, name, binding)?;
            }
        }
        NodeKind::Text => {
            if let Some(text) = &node.text {
                node.text = Some(parse_text(scope, text)?);
            }
        }
        NodeKind::Comment => {}
    }

    init_siblings(ctx, &mut node.children, locals)
}

/// The expression inside a value that is exactly one `{{ }}` pair.
fn whole_expression(raw: &str) -> Option<&str> {
    WHOLE_INTERPOLATION
        .captures(raw.trim())
        .map(|_| raw.trim()[2..raw.trim().len() - 2].trim())
}

/// Resolve mixed text: each `{{expr}}` evaluates independently and
/// stringifies into place.
pub(crate) fn parse_text(scope: Scope<'_>, text: &str) -> Result<String, ExpressionError> {
    let mut out = String::new();
    let mut last = 0;
    for m in INTERPOLATION.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        let expression = &text[m.start() + 2..m.end() - 2];
        out.push_str(&evaluate_callable(scope, expression.trim())?.render_text());
        last = m.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Resolve an event binding with the call-or-bare-reference rule. An
/// expression that does not parse or does not resolve to a callable is
/// kept as a raw statement, executed with write-back at fire time.
fn resolve_event(
    scope: Scope<'_>,
    name: &str,
    binding: &mut EventBinding,
) -> Result<(), StoreError> {
    let expression = binding.expression.trim();
    if expression.is_empty() {
        return Err(CompileError::EmptyEventExpression(name.into()).into());
    }
    binding.handler = match reflet_croquis::parse_expression(expression) {
        Ok(Expr::Call(callee, args)) => match evaluate_expr(scope, &callee) {
            Ok(Value::Func(f)) => {
                binding.bound_args = args
                    .iter()
                    .map(|arg| evaluate_expr(scope, arg))
                    .collect::<Result<_, _>>()?;
                EventHandler::Func(f)
            }
            _ => EventHandler::Statement(expression.to_string()),
        },
        Ok(expr) => match evaluate_expr(scope, &expr) {
            Ok(Value::Func(f)) => EventHandler::Func(f),
            _ => EventHandler::Statement(expression.to_string()),
        },
        Err(_) => EventHandler::Statement(expression.to_string()),
    };
    Ok(())
}
