//! End-to-end runtime behavior: mount, loop expansion, conditionals,
//! reconciliation identity, watchers and events.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reflet::{
    create_store, create_store_with_renderer, DirectiveHooks, Store, StoreError, TreeRenderer,
    Value,
};

fn store_with_renderer(data: serde_json::Value) -> (Store, TreeRenderer) {
    let renderer = TreeRenderer::new();
    let store =
        create_store_with_renderer(Value::from(data), Rc::new(RefCell::new(renderer.clone())))
            .expect("store");
    (store, renderer)
}

fn root_markup(store: &Store, renderer: &TreeRenderer) -> String {
    let root = store.committed_root().and_then(|n| n.output).expect("root output");
    renderer.to_markup(root)
}

#[test]
fn mount_renders_template() {
    let (store, renderer) = store_with_renderer(serde_json::json!({
        "title": "hi",
        "n": 2
    }));
    store
        .mount(r#"<div id="app"><h1>{{title}}</h1><p data-n="{{n}}">count {{n}}</p></div>"#)
        .unwrap();
    assert_eq!(
        root_markup(&store, &renderer),
        r#"<div id="app"><h1>hi</h1><p data-n="2">count 2</p></div>"#
    );
}

#[test]
fn compiling_the_same_snapshot_twice_is_idempotent() {
    let template = r#"<ul><li @for="(v, i) in items" data-i="{{i}}">{{v}}</li></ul>"#;
    let data = serde_json::json!({ "items": [10, 20, 30] });
    let (a, _) = store_with_renderer(data.clone());
    let (b, _) = store_with_renderer(data);
    a.mount(template).unwrap();
    b.mount(template).unwrap();
    let ta = a.committed_root().unwrap();
    let tb = b.committed_root().unwrap();
    // Identical uids, shapes and resolved values at every position
    // (output handles are renderer-specific, so compare detached copies)
    assert!(ta.detach_copy().deep_equal(&tb.detach_copy()));
}

#[test]
fn loop_expansion_produces_one_clone_per_element() {
    let (store, renderer) = store_with_renderer(serde_json::json!({
        "source": [10, 20, 30]
    }));
    store
        .mount(r#"<ul><li @for="(v, i) in source">{{v}}</li></ul>"#)
        .unwrap();
    let root = store.committed_root().unwrap();
    assert_eq!(root.children.len(), 3);
    for (i, child) in root.children.iter().enumerate() {
        assert_eq!(child.uid, format!("vnode_0_copy_{i}"));
        assert!(child.is_loop_clone);
        assert_eq!(
            child.loop_bindings.get("v"),
            Some(&Value::Number([10.0, 20.0, 30.0][i]))
        );
        assert_eq!(child.loop_bindings.get("i"), Some(&Value::Number(i as f64)));
        assert_eq!(child.children.len(), 1);
    }
    assert_eq!(
        root_markup(&store, &renderer),
        "<ul><li>10</li><li>20</li><li>30</li></ul>"
    );
}

#[test]
fn loop_over_keyed_mapping_binds_key_alias() {
    let (store, renderer) = store_with_renderer(serde_json::json!({
        "pts": { "a": 1, "b": 2 }
    }));
    store
        .mount(r#"<ul><li @for="(v, i, k) in pts">{{k}}={{v}}@{{i}}</li></ul>"#)
        .unwrap();
    assert_eq!(
        root_markup(&store, &renderer),
        "<ul><li>a=1@0</li><li>b=2@1</li></ul>"
    );
}

#[test]
fn loop_over_count_iterates_by_index() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "n": 3 }));
    store
        .mount(r#"<ul><li @for="x in n">{{index}}</li></ul>"#)
        .unwrap();
    assert_eq!(
        root_markup(&store, &renderer),
        "<ul><li>0</li><li>1</li><li>2</li></ul>"
    );
}

#[test]
fn malformed_loop_syntax_is_fatal() {
    let (store, _) = store_with_renderer(serde_json::json!({ "items": [1] }));
    let err = store
        .mount(r#"<ul><li @for="items">x</li></ul>"#)
        .unwrap_err();
    assert!(matches!(err, StoreError::Compile(_)));
}

#[test]
fn conditional_chain_keeps_exactly_one_branch_visible() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "x": 5 }));
    store
        .mount(
            r#"<div><p @if="x > 0">pos</p><p @else-if="x < 0">neg</p><p @else>zero</p></div>"#,
        )
        .unwrap();

    let visibility = |store: &Store| -> Vec<bool> {
        store
            .committed_root()
            .unwrap()
            .children
            .iter()
            .map(|c| c.visible)
            .collect()
    };
    assert_eq!(visibility(&store), vec![true, false, false]);
    assert_eq!(
        root_markup(&store, &renderer),
        "<div><p>pos</p><!--@if--><!--@if--></div>"
    );

    store.set("x", Value::Number(-5.0)).unwrap();
    assert_eq!(visibility(&store), vec![false, true, false]);

    store.set("x", Value::Number(0.0)).unwrap();
    assert_eq!(visibility(&store), vec![false, false, true]);
    assert_eq!(
        root_markup(&store, &renderer),
        "<div><!--@if--><!--@if--><p>zero</p></div>"
    );
}

#[test]
fn dangling_and_conflicting_conditionals_are_fatal() {
    let (store, _) = store_with_renderer(serde_json::json!({}));
    assert!(store.mount(r#"<div><p @else>x</p></div>"#).is_err());

    let (store, _) = store_with_renderer(serde_json::json!({ "c": true }));
    assert!(store
        .mount(r#"<div><p @if="c" @else>x</p></div>"#)
        .is_err());

    let (store, _) = store_with_renderer(serde_json::json!({ "c": true }));
    assert!(store
        .mount(r#"<div><span>t</span><p @else-if="c">x</p></div>"#)
        .is_err());
}

#[test]
fn leaf_attribute_change_patches_only_that_node() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "x": 1 }));
    let before_updates = Rc::new(Cell::new(0u32));
    let updates = Rc::new(Cell::new(0u32));
    store
        .directive("mark", {
            let before_updates = before_updates.clone();
            let updates = updates.clone();
            DirectiveHooks {
                before_update: Some(Rc::new(move |_| before_updates.set(before_updates.get() + 1))),
                updated: Some(Rc::new(move |_| updates.set(updates.get() + 1))),
                ..Default::default()
            }
        })
        .unwrap();
    store
        .mount(r#"<div><span data-x="{{x}}" @mark="x"></span><span>stable</span></div>"#)
        .unwrap();

    let marked = store.output_of("vnode_0").unwrap();
    let sibling = store.output_of("vnode_1").unwrap();

    store.set("x", Value::Number(2.0)).unwrap();
    // The sibling's output identity is untouched; only the attribute moved
    assert_eq!(store.output_of("vnode_0"), Some(marked));
    assert_eq!(store.output_of("vnode_1"), Some(sibling));
    assert_eq!(
        renderer.node(marked).attributes.get("data-x").map(String::as_str),
        Some("2")
    );
    assert_eq!(before_updates.get(), 1);
    assert_eq!(updates.get(), 1);
}

#[test]
fn writing_an_equal_value_is_a_complete_noop() {
    let (store, _) = store_with_renderer(serde_json::json!({ "a": { "b": 1 } }));
    let watcher_calls = Rc::new(Cell::new(0u32));
    let update_hooks = Rc::new(Cell::new(0u32));
    {
        let watcher_calls = watcher_calls.clone();
        store.watch("a.b", move |_, _| watcher_calls.set(watcher_calls.get() + 1)).unwrap();
    }
    {
        let update_hooks = update_hooks.clone();
        store.on_updated(move |_, _| update_hooks.set(update_hooks.get() + 1));
    }
    store.mount(r#"<p>{{a.b}}</p>"#).unwrap();
    let committed = store.committed_root();

    store.set("a.b", Value::Number(1.0)).unwrap();
    assert_eq!(watcher_calls.get(), 0);
    assert_eq!(update_hooks.get(), 0);
    // No recompilation happened: the committed tree is bit-identical,
    // output handles included
    assert_eq!(store.committed_root(), committed);
}

#[test]
fn watcher_paths_normalize_bracket_addressing() {
    let (store, _) = store_with_renderer(serde_json::json!({ "a": [{ "b": 1 }] }));
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        store
            .watch("a[0].b", move |value, old| {
                seen.borrow_mut().push((value.clone(), old.clone()));
            })
            .unwrap();
    }
    // Bracket and dot addressing collide into the same watcher slot
    assert!(matches!(
        store.watch("a.0.b", |_, _| {}),
        Err(StoreError::DuplicateWatcher(_))
    ));

    store.set("a.0.b", Value::Number(9.0)).unwrap();
    assert_eq!(
        seen.borrow().as_slice(),
        &[(Value::Number(9.0), Value::Number(1.0))]
    );
}

#[test]
fn container_watcher_fires_for_nested_writes() {
    let (store, _) = store_with_renderer(serde_json::json!({ "list": [1, 2] }));
    let containers = Rc::new(RefCell::new(Vec::new()));
    {
        let containers = containers.clone();
        store
            .watch("list", move |new_list, old_list| {
                containers.borrow_mut().push((new_list.clone(), old_list.clone()));
            })
            .unwrap();
    }
    store.set("list.0", Value::Number(5.0)).unwrap();
    let calls = containers.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        Value::from(serde_json::json!([5, 2]))
    );
    assert_eq!(calls[0].1, Value::from(serde_json::json!([1, 2])));
}

#[test]
fn appending_a_loop_element_mounts_only_the_new_clone() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "items": [1, 2] }));
    let mounted = Rc::new(Cell::new(0u32));
    let unmounted = Rc::new(Cell::new(0u32));
    store
        .directive("mark", {
            let mounted = mounted.clone();
            let unmounted = unmounted.clone();
            DirectiveHooks {
                mounted: Some(Rc::new(move |_| mounted.set(mounted.get() + 1))),
                unmounted: Some(Rc::new(move |_| unmounted.set(unmounted.get() + 1))),
                ..Default::default()
            }
        })
        .unwrap();
    store
        .mount(r#"<ul><li @for="n in items" @mark="n">{{n}}</li></ul>"#)
        .unwrap();
    assert_eq!(mounted.get(), 2);

    let first = store.output_of("vnode_0_copy_0").unwrap();
    let second = store.output_of("vnode_0_copy_1").unwrap();

    store
        .set("items", Value::from(serde_json::json!([1, 2, 3])))
        .unwrap();
    assert_eq!(
        root_markup(&store, &renderer),
        "<ul><li>1</li><li>2</li><li>3</li></ul>"
    );
    // The existing clones kept their identity: no unmounts, exactly one
    // extra mount, same output handles
    assert_eq!(store.output_of("vnode_0_copy_0"), Some(first));
    assert_eq!(store.output_of("vnode_0_copy_1"), Some(second));
    assert_eq!(mounted.get(), 3);
    assert_eq!(unmounted.get(), 0);
}

#[test]
fn removing_a_loop_element_unmounts_only_that_clone() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "items": [1, 2, 3] }));
    let unmounted = Rc::new(Cell::new(0u32));
    store
        .directive("mark", {
            let unmounted = unmounted.clone();
            DirectiveHooks {
                unmounted: Some(Rc::new(move |_| unmounted.set(unmounted.get() + 1))),
                ..Default::default()
            }
        })
        .unwrap();
    store
        .mount(r#"<ul><li @for="n in items" @mark="n">{{n}}</li></ul>"#)
        .unwrap();
    let first = store.output_of("vnode_0_copy_0").unwrap();

    store
        .set("items", Value::from(serde_json::json!([1, 2])))
        .unwrap();
    assert_eq!(root_markup(&store, &renderer), "<ul><li>1</li><li>2</li></ul>");
    assert_eq!(store.output_of("vnode_0_copy_0"), Some(first));
    assert_eq!(unmounted.get(), 1);
}

#[test]
fn statement_event_executes_with_write_back() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "count": 0 }));
    store
        .mount(r#"<button #click="count = count + 1">{{count}}</button>"#)
        .unwrap();
    let button = store.output_of("vnode").unwrap();

    store.trigger(button, "click", Value::Null).unwrap();
    assert_eq!(store.get("count"), Value::Number(1.0));
    store.trigger(button, "click", Value::Null).unwrap();
    assert_eq!(store.get("count"), Value::Number(2.0));
    assert_eq!(root_markup(&store, &renderer), "<button>2</button>");
}

#[test]
fn function_event_handler_receives_payload_and_bound_args() {
    let (store, _) = store_with_renderer(serde_json::json!({ "count": 0, "step": 5 }));
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        let writer = store.clone();
        store
            .set(
                "bump",
                Value::func(move |args| {
                    seen.borrow_mut().push(args.to_vec());
                    let step = args.get(1).and_then(Value::as_number).unwrap_or(0.0);
                    let current = writer.get("count").as_number().unwrap_or(0.0);
                    writer.set("count", Value::Number(current + step)).unwrap();
                    Value::Undefined
                }),
            )
            .unwrap();
    }
    store
        .mount(r#"<button #click="bump(step)">go</button>"#)
        .unwrap();
    let button = store.output_of("vnode").unwrap();
    store.trigger(button, "click", Value::Str("evt".into())).unwrap();

    assert_eq!(store.get("count"), Value::Number(5.0));
    let calls = seen.borrow();
    // Payload first, then the args bound at init
    assert_eq!(calls[0][0], Value::Str("evt".into()));
    assert_eq!(calls[0][1], Value::Number(5.0));
}

#[test]
fn once_modifier_removes_the_binding_after_first_fire() {
    let (store, _) = store_with_renderer(serde_json::json!({ "count": 0 }));
    store
        .mount(r#"<button #click.once="count = count + 1">go</button>"#)
        .unwrap();
    let button = store.output_of("vnode").unwrap();
    store.trigger(button, "click", Value::Null).unwrap();
    store.trigger(button, "click", Value::Null).unwrap();
    assert_eq!(store.get("count"), Value::Number(1.0));
}

#[test]
fn reentrant_write_during_update_drains_after_commit() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "x": 1, "echo": 0 }));
    store
        .directive("sync", {
            DirectiveHooks {
                updated: Some(Rc::new(|ctx| {
                    // A hook mutating the store mid-reconciliation queues
                    // instead of reentering
                    ctx.store.set("echo", ctx.value.clone()).unwrap();
                })),
                ..Default::default()
            }
        })
        .unwrap();
    store
        .mount(r#"<div @sync="x"><p>{{echo}}</p></div>"#)
        .unwrap();

    store.set("x", Value::Number(7.0)).unwrap();
    assert_eq!(store.get("echo"), Value::Number(7.0));
    assert_eq!(root_markup(&store, &renderer), "<div><p>7</p></div>");
}

#[test]
fn delete_leaves_undefined_behind() {
    let (store, _) = store_with_renderer(serde_json::json!({ "user": { "name": "ada" } }));
    store.delete("user.name").unwrap();
    assert_eq!(store.get("user.name"), Value::Undefined);
}

#[test]
fn eval_in_resolves_against_a_clone_scope() {
    let (store, _) = store_with_renderer(serde_json::json!({ "source": [10, 20, 30] }));
    store
        .mount(r#"<ul><li @for="(v, i) in source">{{v}}</li></ul>"#)
        .unwrap();
    assert_eq!(
        store.eval_in("vnode_0_copy_1", "v + i").unwrap(),
        Value::Number(21.0)
    );
}

#[test]
fn create_store_rejects_non_object_data() {
    assert!(matches!(
        create_store(Value::Number(1.0)),
        Err(StoreError::Validation(_))
    ));
}

#[test]
fn unknown_directive_reference_is_fatal() {
    let (store, _) = store_with_renderer(serde_json::json!({ "x": 1 }));
    let err = store.mount(r#"<div @nope="x">x</div>"#).unwrap_err();
    assert!(matches!(err, StoreError::Compile(_)));
}

#[test]
fn duplicate_registrations_are_errors() {
    let (store, _) = store_with_renderer(serde_json::json!({}));
    // `show` and `model` are seeded at construction
    assert!(matches!(
        store.directive("show", DirectiveHooks::default()),
        Err(StoreError::DuplicateDirective(_))
    ));
}

#[test]
fn presence_and_typed_attributes_serialize() {
    let (store, renderer) = store_with_renderer(serde_json::json!({
        "cfg": { "a": 1 },
        "on": true,
        "off": false
    }));
    store
        .mount(r#"<div data-cfg="{{cfg}}" data-on="{{on}}" data-off="{{off}}" plain></div>"#)
        .unwrap();
    let root = store.output_of("vnode").unwrap();
    let attrs = renderer.node(root).attributes;
    assert_eq!(attrs.get("data-cfg").map(String::as_str), Some(r#"{"a":1}"#));
    // `true` renders as a presence-only attribute, `false` unsets it
    assert_eq!(attrs.get("data-on").map(String::as_str), Some(""));
    assert!(!attrs.contains_key("data-off"));
    assert_eq!(attrs.get("plain").map(String::as_str), Some(""));
}

#[test]
fn class_bindings_normalize_to_enabled_names() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "active": true }));
    store
        .mount(r#"<div class="{{ ['a', active ? 'b' : 'c'] }}"></div>"#)
        .unwrap();
    let root = store.output_of("vnode").unwrap();
    assert_eq!(renderer.node(root).classes.as_deref(), Some("a b"));

    store.set("active", Value::Bool(false)).unwrap();
    assert_eq!(renderer.node(root).classes.as_deref(), Some("a c"));
}

#[test]
fn observed_node_routes_through_the_store() {
    let (store, _) = store_with_renderer(serde_json::json!({ "user": { "name": "ada" } }));
    let fired = Rc::new(Cell::new(0u32));
    {
        let fired = fired.clone();
        store
            .watch("user.name", move |_, _| fired.set(fired.get() + 1))
            .unwrap();
    }
    let user = store.wrap("user");
    assert_eq!(user.get("name"), Value::Str("ada".into()));
    user.set("name", "grace").unwrap();
    assert_eq!(store.get("user.name"), Value::Str("grace".into()));
    assert_eq!(fired.get(), 1);
    // Wrapping is idempotent: a second handle addresses the same slot
    assert_eq!(store.wrap("user").get("name"), Value::Str("grace".into()));
}

#[test]
fn lifecycle_hooks_observe_writes() {
    let (store, _) = store_with_renderer(serde_json::json!({ "x": 1 }));
    let log = Rc::new(RefCell::new(Vec::new()));
    {
        let log = log.clone();
        store.on_before_update(move |_, event| {
            log.borrow_mut().push(format!(
                "before {}: {} -> {}",
                event.property,
                event.old_value.render_text(),
                event.value.render_text()
            ));
        });
    }
    {
        let log = log.clone();
        store.on_updated(move |_, event| {
            log.borrow_mut().push(format!("after {}", event.property));
        });
    }
    store.set("x", Value::Number(2.0)).unwrap();
    assert_eq!(
        log.borrow().as_slice(),
        &["before x: 1 -> 2".to_string(), "after x".to_string()]
    );
}
