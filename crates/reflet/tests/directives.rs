//! Built-in directive behavior: `show`, `model`, and the loop-scoped
//! write-back redirection.

use std::cell::RefCell;
use std::rc::Rc;

use reflet::{create_store_with_renderer, Store, TreeRenderer, Value};

fn store_with_renderer(data: serde_json::Value) -> (Store, TreeRenderer) {
    let renderer = TreeRenderer::new();
    let store =
        create_store_with_renderer(Value::from(data), Rc::new(RefCell::new(renderer.clone())))
            .expect("store");
    (store, renderer)
}

#[test]
fn show_toggles_display_without_unmounting() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "vis": false }));
    store.mount(r#"<div @show="vis">content</div>"#).unwrap();
    let root = store.output_of("vnode").unwrap();
    assert_eq!(
        renderer.node(root).styles.get("display").map(String::as_str),
        Some("none")
    );

    store.set("vis", Value::Bool(true)).unwrap();
    // Same output node, display restored
    assert_eq!(store.output_of("vnode"), Some(root));
    assert_eq!(
        renderer.node(root).styles.get("display").map(String::as_str),
        Some("")
    );

    store.set("vis", Value::Bool(false)).unwrap();
    assert_eq!(
        renderer.node(root).styles.get("display").map(String::as_str),
        Some("none")
    );
}

#[test]
fn model_mirrors_a_boolean_binding() {
    let (store, renderer) = store_with_renderer(serde_json::json!({ "done": false }));
    store
        .mount(r#"<input type="checkbox" @model="done">"#)
        .unwrap();
    let input = store.output_of("vnode").unwrap();
    assert!(!renderer.node(input).attributes.contains_key("checked"));

    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": true })))
        .unwrap();
    assert_eq!(store.get("done"), Value::Bool(true));
    assert!(renderer.node(input).attributes.contains_key("checked"));

    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": false })))
        .unwrap();
    assert_eq!(store.get("done"), Value::Bool(false));
    assert!(!renderer.node(input).attributes.contains_key("checked"));
}

#[test]
fn model_toggles_membership_for_array_bindings() {
    let (store, _) = store_with_renderer(serde_json::json!({
        "picked": ["red"]
    }));
    store
        .mount(r#"<input type="checkbox" value="green" @model="picked">"#)
        .unwrap();
    let input = store.output_of("vnode").unwrap();

    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": true })))
        .unwrap();
    assert_eq!(
        store.get("picked"),
        Value::from(serde_json::json!(["red", "green"]))
    );

    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": false })))
        .unwrap();
    assert_eq!(store.get("picked"), Value::from(serde_json::json!(["red"])));
}

#[test]
fn loop_scoped_write_back_lands_in_the_source_container() {
    let (store, _) = store_with_renderer(serde_json::json!({
        "todos": [
            { "label": "a", "done": false },
            { "label": "b", "done": false }
        ]
    }));
    store
        .mount(
            r#"<ul><li @for="todo in todos"><input type="checkbox" value="x" @model="todo.done"></li></ul>"#,
        )
        .unwrap();

    // The second clone's input
    let input = store.output_of("vnode_0_0_copy_1").unwrap();
    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": true })))
        .unwrap();

    // The aliased write was redirected into todos[1], not a shadowed copy
    assert_eq!(store.get("todos.1.done"), Value::Bool(true));
    assert_eq!(store.get("todos.0.done"), Value::Bool(false));
}

#[test]
fn loop_scoped_statement_events_redirect_too() {
    let (store, renderer) = store_with_renderer(serde_json::json!({
        "items": [1, 10, 100]
    }));
    store
        .mount(r#"<ul><li @for="n in items" #click="n = n * 2">{{n}}</li></ul>"#)
        .unwrap();

    let second = store.output_of("vnode_0_copy_1").unwrap();
    store.trigger(second, "click", Value::Null).unwrap();
    assert_eq!(store.get("items"), Value::from(serde_json::json!([1, 20, 100])));

    let root = store.committed_root().and_then(|n| n.output).unwrap();
    assert_eq!(
        renderer.to_markup(root),
        "<ul><li>1</li><li>20</li><li>100</li></ul>"
    );
}

#[test]
fn watcher_observes_redirected_writes() {
    let (store, _) = store_with_renderer(serde_json::json!({
        "todos": [{ "done": false }]
    }));
    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        store
            .watch("todos[0]", move |value, _| {
                seen.borrow_mut().push(value.clone());
            })
            .unwrap();
    }
    store
        .mount(
            r#"<ul><li @for="t in todos"><input type="checkbox" value="x" @model="t.done"></li></ul>"#,
        )
        .unwrap();
    let input = store.output_of("vnode_0_0_copy_0").unwrap();
    store
        .trigger(input, "change", Value::from(serde_json::json!({ "checked": true })))
        .unwrap();
    assert_eq!(
        seen.borrow().as_slice(),
        &[Value::from(serde_json::json!({ "done": true }))]
    );
}
