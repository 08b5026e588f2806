//! Built-in directives.
//!
//! `show` and `model` are ordinary consumers of the directive-hook
//! contract — nothing here touches reconciler internals. Every store gets
//! them seeded at construction; hosts register their own directives the
//! same way.

use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use tracing::warn;

use reflet_carton::Value;
use reflet_croquis::{evaluate, Scope};
use reflet_relief::OutputHandle;

use crate::errors::StoreError;
use crate::registry::{DirectiveCtx, DirectiveHooks};
use crate::store::Store;

pub(crate) fn register_builtins(store: &Store) -> Result<(), StoreError> {
    store.directive("show", show_hooks())?;
    store.directive("model", model_hooks())?;
    Ok(())
}

/// `@show`: toggle the element's display without removing it from the
/// tree (unlike `@if`, which compiles the node away).
fn show_hooks() -> DirectiveHooks {
    DirectiveHooks {
        mounted: Some(Rc::new(|ctx: DirectiveCtx<'_>| {
            if !ctx.value.is_truthy() {
                set_display(ctx.store, ctx.output, "none");
            }
        })),
        updated: Some(Rc::new(|ctx: DirectiveCtx<'_>| {
            let display = if ctx.value.is_truthy() { "" } else { "none" };
            set_display(ctx.store, ctx.output, display);
        })),
        ..Default::default()
    }
}

fn set_display(store: &Store, output: Option<OutputHandle>, display: &str) {
    if let Some(handle) = output {
        store.with_renderer(|r| r.set_style(handle, "display", display));
    }
}

/// `@model`: two-way binding for checkbox inputs. A boolean binding
/// mirrors the checked state; an array binding adds or removes the
/// element's `value` attribute on toggle. Writes route through the
/// store's write-back policy, so loop-scoped bindings land in the loop's
/// source container.
fn model_hooks() -> DirectiveHooks {
    DirectiveHooks {
        mounted: Some(Rc::new(|ctx: DirectiveCtx<'_>| {
            if !is_checkbox(&ctx) {
                return;
            }
            reflect_checked(&ctx);
            let Some(handle) = ctx.output else {
                return;
            };
            let expression = ctx.expression.to_string();
            let bindings = ctx.node.loop_bindings.clone();
            let frames = ctx.node.loop_frames.clone();
            let own_value = ctx
                .node
                .attributes
                .get("value")
                .cloned()
                .unwrap_or_default();
            ctx.store.add_native_listener(handle, "change", move |store, payload| {
                let outcome = on_change(store, payload, &expression, &bindings, &frames, &own_value);
                if let Err(err) = outcome {
                    warn!(%expression, %err, "model write-back failed");
                }
            });
        })),
        updated: Some(Rc::new(|ctx: DirectiveCtx<'_>| {
            if is_checkbox(&ctx) {
                reflect_checked(&ctx);
            }
        })),
        ..Default::default()
    }
}

fn on_change(
    store: &Store,
    payload: &Value,
    expression: &str,
    bindings: &FxHashMap<CompactString, Value>,
    frames: &[reflet_relief::LoopFrame],
    own_value: &Value,
) -> Result<(), StoreError> {
    let checked = payload
        .get_key("checked")
        .cloned()
        .unwrap_or_else(|| payload.clone())
        .is_truthy();
    // The binding may have changed since mount; resolve it now
    let data = store.data();
    let current = evaluate(Scope::new(&data, bindings), expression)?;
    match current {
        Value::Bool(_) => store.write_back(expression, Value::Bool(checked), bindings, frames),
        Value::Array(mut items) => {
            if checked {
                items.push(own_value.clone());
            } else {
                items.retain(|item| item != own_value);
            }
            store.write_back(expression, Value::Array(items), bindings, frames)
        }
        _ => Ok(()),
    }
}

fn is_checkbox(ctx: &DirectiveCtx<'_>) -> bool {
    ctx.node.tag == "input"
        && ctx.node.attributes.get("type") == Some(&Value::Str("checkbox".to_string()))
}

/// Mirror the bound value into the `checked` presence attribute.
fn reflect_checked(ctx: &DirectiveCtx<'_>) {
    let Some(handle) = ctx.output else {
        return;
    };
    let checked = match ctx.value {
        Value::Bool(b) => *b,
        Value::Array(items) => {
            let own = ctx
                .node
                .attributes
                .get("value")
                .cloned()
                .unwrap_or_default();
            items.contains(&own)
        }
        _ => false,
    };
    ctx.store.with_renderer(|r| {
        if checked {
            r.set_attribute(handle, "checked", "");
        } else {
            r.remove_attribute(handle, "checked");
        }
    });
}
