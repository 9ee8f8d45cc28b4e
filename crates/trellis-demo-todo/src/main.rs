#![forbid(unsafe_code)]

//! Example app: a todo list bound through the framework.
//!
//! This repository has no display surface, so the demo drives the binding
//! engine against the deterministic in-memory backend and prints the tree
//! after each interaction. Everything else is the real stack: records and
//! an ordered store as the model, a binder for the app frame, a list
//! binder for the rows, markdown for the help panel, and file storage so
//! the list survives across runs.

use std::rc::Rc;

use serde_json::Value;

use trellis_bind::{AttrMap, Binder, DesiredState, ListBinder};
use trellis_core::{Attrs, OrderedStore, Record, attrs};
use trellis_extras::markdown;
use trellis_extras::storage::{FileStorage, RecordStorage};
use trellis_harness::{TestTree, el};

const STORE_KEY: &str = "todos";

const HELP: &str = "\
# Todos

Click a row to toggle it.

- saved between runs
- rendered incrementally
";

fn remaining(todos: &OrderedStore) -> i64 {
    todos
        .items()
        .iter()
        .filter(|item| item.get("done") != Some(&Value::Bool(true)))
        .count() as i64
}

fn row_state(model: &Record, store: &OrderedStore) -> DesiredState {
    let title = model
        .get("title")
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_default();
    let done = model.get("done") == Some(Value::Bool(true));
    let id = model.key().unwrap_or(Value::Null);

    let store = store.clone();
    DesiredState::new()
        .node("label", AttrMap::new().text(title).class("done", done))
        .node("check", AttrMap::new().checked(done))
        .node(
            "view",
            AttrMap::new().on("click", move |_| {
                let mut patch = Attrs::new();
                patch.insert("id".to_string(), id.clone());
                patch.insert("done".to_string(), Value::Bool(!done));
                store.merge(patch);
                false
            }),
        )
}

fn main() {
    tracing_subscriber::fmt::init();

    let tree = Rc::new(TestTree::new());
    let storage = FileStorage::new(std::env::temp_dir().join("trellis-demo"));

    let saved = storage.load(STORE_KEY).unwrap_or_else(|err| {
        tracing::warn!(%err, "ignoring unreadable saved state");
        None
    });
    let todos = OrderedStore::from_items(saved.unwrap_or_else(|| {
        vec![
            attrs! { "id": 1, "title": "ship the binder", "done": true },
            attrs! { "id": 2, "title": "wire the list", "done": false },
            attrs! { "id": 3, "title": "write the demo", "done": false },
        ]
    }));

    let root = el("main")
        .child(el("section").marker("help"))
        .child(el("ul").marker("list"))
        .child(el("footer").marker("count"))
        .build(&tree);

    let app = Binder::new(
        tree.clone(),
        Record::from_attrs(attrs! { "remaining": remaining(&todos) }),
        |model: &Record| {
            let remaining = model.get("remaining").and_then(|v| v.as_i64()).unwrap_or(0);
            DesiredState::new()
                .node("help", AttrMap::new().markup(markdown::to_markup(HELP)))
                .node(
                    "count",
                    AttrMap::new()
                        .text(format!("{remaining} left"))
                        .class("all-done", remaining == 0),
                )
        },
    );
    app.set_view(root);

    // Keep the footer in sync: store changes update the app model, and the
    // app re-renders from its own change subscription.
    {
        let model = app.model();
        let counted = todos.clone();
        app.listen_to(todos.events(), "change", move |_, _| {
            model.set(attrs! { "remaining": remaining(&counted) });
        });
    }

    let row_tree = Rc::clone(&tree);
    let row_store = todos.clone();
    let list = ListBinder::new(tree.clone(), todos.clone(), move |item: &Attrs| {
        let view = el("li")
            .child(el("input").attr("type", "checkbox").marker("check"))
            .child(el("span").marker("label"))
            .build(&row_tree);
        let store = row_store.clone();
        Binder::with_view(
            row_tree.clone(),
            Record::from_attrs(item.clone()),
            move |model: &Record| row_state(model, &store),
            view,
        )
    });
    list.set_view(app.node("list").expect("list ref"));

    tree.run_frames();
    println!("— initial —\n{}", tree.dump(root));

    // Toggle the second todo by clicking its row.
    let row = list.child(1).expect("second row").view().expect("row view");
    tree.fire(row, "click");
    tree.run_frames();
    println!("— after toggling —\n{}", tree.dump(root));

    // Append once, then reconcile a bulk rename of the first item.
    if todos.find_index(&attrs! { "id": 4 }).is_none() {
        todos.push(attrs! { "id": 4, "title": "persist on exit", "done": false });
    }
    let mut renamed = todos.items();
    renamed[0].insert("title".to_string(), Value::from("ship the binder engine"));
    todos.set_items(renamed);
    tree.run_frames();
    println!("— after push + bulk rename —\n{}", tree.dump(root));

    match storage.save(STORE_KEY, &todos.items()) {
        Ok(()) => println!(
            "saved {} todos under {}",
            todos.len(),
            storage.dir().display()
        ),
        Err(err) => tracing::warn!(%err, "could not persist todos"),
    }
}
