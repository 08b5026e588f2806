//! Component expansion.
//!
//! After init, tags matching a registered component are replaced with the
//! subtree their render function produces. The original node's bindings
//! are merged onto the produced root so a component tag can still carry
//! events, directives, classes and extra attributes.

use reflet_relief::{CompileError, TemplateNode, VNode};

use crate::compile::{compile, expand_loops, init_tree, no_locals, CompileCtx};
use crate::errors::StoreError;
use crate::registry::{Props, RenderOutput};

/// Recursively expand registered component tags in the subtree at `node`.
pub(crate) fn expand_components(ctx: &CompileCtx<'_>, node: &mut VNode) -> Result<(), StoreError> {
    let Some(spec) = ctx.components.get(node.tag.as_str()).cloned() else {
        for child in &mut node.children {
            expand_components(ctx, child)?;
        }
        return Ok(());
    };

    // Declared props move off the node and into the render call
    let mut props = Props::new();
    for name in &spec.accepted_props {
        if let Some(value) = node.attributes.shift_remove(name) {
            props.insert(name.clone(), value);
        }
    }

    let name = node.tag.clone();
    let rendered = (spec.render)(&props)
        .ok_or_else(|| CompileError::InvalidComponentTemplate(name.clone()))?;

    let mut produced = match rendered {
        RenderOutput::Markup(markup) => {
            let template = reflet_armature::parse_root(markup.trim())
                .map_err(|_| CompileError::InvalidComponentTemplate(name.clone()))?;
            markup_subtree(ctx, &template, &node.uid)?
        }
        RenderOutput::Spec(spec) => {
            if spec.tag.is_empty() {
                return Err(CompileError::InvalidComponentTemplate(name).into());
            }
            spec.to_vnode(&node.uid)
        }
    };

    // A component's root can itself be another component
    expand_components(ctx, &mut produced)?;

    merge_original(node, &mut produced);
    *node = produced;
    Ok(())
}

/// Compile, expand and init a markup template rooted at the component
/// node's uid.
fn markup_subtree(
    ctx: &CompileCtx<'_>,
    template: &TemplateNode,
    uid: &str,
) -> Result<VNode, StoreError> {
    let mut root = compile(ctx.options, template, uid);
    expand_loops(ctx, &mut root, no_locals(), &[])?;
    init_tree(ctx, &mut root, no_locals())?;
    Ok(root)
}

/// Merge the component tag's own bindings onto the produced root. The
/// original node's entries win on key collision; each map merges under
/// its own key space so handler identity stays independent per source.
fn merge_original(original: &mut VNode, produced: &mut VNode) {
    for (name, binding) in std::mem::take(&mut original.events) {
        produced.events.insert(name, binding);
    }
    for (name, binding) in std::mem::take(&mut original.directives) {
        produced.directives.insert(name, binding);
    }
    for (name, enabled) in std::mem::take(&mut original.classes) {
        produced.classes.insert(name, enabled);
    }
    for (name, value) in std::mem::take(&mut original.attributes) {
        produced.attributes.insert(name, value);
    }
    // The tag position keeps its place in any conditional chain, and its
    // loop scope travels with the produced root for event-time lookups
    produced.visible = produced.visible && original.visible;
    produced.conditional_role = original.conditional_role;
    produced.is_loop_clone = original.is_loop_clone;
    if produced.loop_bindings.is_empty() {
        produced.loop_bindings = std::mem::take(&mut original.loop_bindings);
        produced.loop_frames = std::mem::take(&mut original.loop_frames);
    }
}
