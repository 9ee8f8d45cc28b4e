#![forbid(unsafe_code)]

//! Integration tests: store events translated into child-binder lifecycle
//! and positional node operations.

use std::rc::Rc;

use trellis_bind::{AttrMap, Binder, Component, DesiredState, ListBinder};
use trellis_core::{Attrs, OrderedStore, Record, attrs};
use trellis_harness::{TestTree, ViewTree, el};

/// Renders an item's `title` into the row's `label` sub-node.
struct Row;

impl Component for Row {
    fn render(&self, model: &Record) -> DesiredState {
        let title = model
            .get("title")
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        DesiredState::new().node("label", AttrMap::new().text(title))
    }
}

fn row_view(tree: &TestTree) -> trellis_bind::NodeRef {
    el("li").child(el("span").marker("label")).build(tree)
}

/// Direct-factory list binder over a `ul` container.
fn direct_list(tree: &Rc<TestTree>, store: &OrderedStore) -> (ListBinder, trellis_bind::NodeRef) {
    let container = el("ul").build(tree);
    let factory_tree = Rc::clone(tree);
    let list = ListBinder::new(tree.clone(), store.clone(), move |item: &Attrs| {
        let view = row_view(&factory_tree);
        Binder::with_view(
            factory_tree.clone(),
            Record::from_attrs(item.clone()),
            Row,
            view,
        )
    });
    list.set_view(container);
    (list, container)
}

fn labels(tree: &TestTree, container: trellis_bind::NodeRef) -> Vec<String> {
    tree.children(container)
        .into_iter()
        .map(|row| {
            let label = tree
                .query_by_marker(row, "ref")
                .into_iter()
                .map(|(_, node)| node)
                .next()
                .expect("row has a label");
            tree.text_of(label)
        })
        .collect()
}

fn assert_aligned(list: &ListBinder) {
    let store = list.store();
    assert_eq!(list.children_len(), store.len());
    for index in 0..store.len() {
        let child = list.child(index).expect("aligned child");
        assert_eq!(
            child.model().to_object(),
            store.get(index).unwrap(),
            "child {index} bound to the item at the same index"
        );
    }
}

#[test]
fn initial_build_creates_one_child_per_item() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![
        attrs! { "id": 1, "title": "one" },
        attrs! { "id": 2, "title": "two" },
    ]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["one", "two"]);
}

#[test]
fn push_inserts_at_the_end() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![attrs! { "id": 1, "title": "one" }]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    store.push(attrs! { "id": 2, "title": "two" });
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["one", "two"]);
}

#[test]
fn splice_inserts_before_the_occupant_of_the_slot() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![
        attrs! { "id": 1, "title": "one" },
        attrs! { "id": 3, "title": "three" },
    ]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    store.splice(1, 0, vec![attrs! { "id": 2, "title": "two" }]);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["one", "two", "three"]);
}

#[test]
fn splice_removal_destroys_exactly_the_named_children() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![
        attrs! { "id": 1, "title": "one" },
        attrs! { "id": 2, "title": "two" },
        attrs! { "id": 3, "title": "three" },
    ]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    let survivor_head = list.child(0).unwrap();
    let survivor_tail = list.child(2).unwrap();
    store.splice(1, 1, Vec::new());
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["one", "three"]);
    assert!(Binder::ptr_eq(&survivor_head, &list.child(0).unwrap()));
    assert!(Binder::ptr_eq(&survivor_tail, &list.child(1).unwrap()));
}

#[test]
fn updated_event_forwards_to_the_existing_child() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![attrs! { "id": 1, "title": "one" }]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    let child_before = list.child(0).unwrap();
    store.set_at(0, attrs! { "id": 1, "title": "ONE" });
    tree.run_frames();

    assert!(
        Binder::ptr_eq(&child_before, &list.child(0).unwrap()),
        "update reuses the child, no rebuild"
    );
    assert_eq!(labels(&tree, container), vec!["ONE"]);
}

#[test]
fn reconcile_touches_only_the_delta() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![
        attrs! { "id": 1, "title": "one" },
        attrs! { "id": 2, "title": "two" },
        attrs! { "id": 3, "title": "three" },
    ]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    let kept_a = list.child(1).unwrap();
    let kept_b = list.child(2).unwrap();

    list.set(vec![
        attrs! { "id": 2, "title": "two" },
        attrs! { "id": 3, "title": "three" },
        attrs! { "id": 4, "title": "four" },
    ]);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["two", "three", "four"]);
    assert!(
        Binder::ptr_eq(&kept_a, &list.child(0).unwrap()),
        "retained items keep their child binders"
    );
    assert!(Binder::ptr_eq(&kept_b, &list.child(1).unwrap()));
}

#[test]
fn reset_rebuilds_everything() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![attrs! { "id": 1, "title": "one" }]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    let old_child = list.child(0).unwrap();
    store.reset(vec![
        attrs! { "id": 1, "title": "uno" },
        attrs! { "id": 2, "title": "dos" },
    ]);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["uno", "dos"]);
    assert!(
        !Binder::ptr_eq(&old_child, &list.child(0).unwrap()),
        "reset builds fresh children"
    );
}

#[test]
fn alignment_survives_a_mixed_edit_sequence() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::new();
    let (list, container) = direct_list(&tree, &store);

    store.reset(vec![attrs! { "id": 0, "title": "a" }]);
    store.push(attrs! { "id": 1, "title": "b" });
    store.splice(1, 0, vec![attrs! { "id": 2, "title": "c" }, attrs! { "id": 3, "title": "d" }]);
    store.set_at(2, attrs! { "id": 3, "title": "D" });
    store.remove_at(0);
    store.set_items(vec![
        attrs! { "id": 3, "title": "D" },
        attrs! { "id": 9, "title": "z" },
    ]);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["D", "z"]);
}

#[test]
fn remove_destroys_children_and_stops_listening() {
    let tree = Rc::new(TestTree::new());
    let store = OrderedStore::from_items(vec![attrs! { "id": 1, "title": "one" }]);
    let (list, container) = direct_list(&tree, &store);
    tree.run_frames();

    list.remove();
    assert_eq!(list.children_len(), 0);
    assert!(tree.children(container).is_empty(), "child views detached");

    store.push(attrs! { "id": 2, "title": "two" });
    tree.run_frames();
    assert_eq!(list.children_len(), 0, "store events no longer handled");
}

#[test]
fn component_factory_clones_the_template_per_item() {
    let tree = Rc::new(TestTree::new());
    let container = el("ul")
        .child(el("li").child(el("span").marker("label")))
        .build(&tree);
    let store = OrderedStore::from_items(vec![
        attrs! { "id": 1, "title": "one" },
        attrs! { "id": 2, "title": "two" },
    ]);

    let list = ListBinder::from_component(tree.clone(), store.clone(), || Row);
    list.set_view(container);
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["one", "two"]);
    assert_eq!(
        tree.children(container).len(),
        2,
        "the template itself is replaced by the built rows"
    );
    for row in tree.children(container) {
        assert_eq!(tree.tag_of(row), "li");
    }
}

mod alignment_props {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug)]
    enum Op {
        Push(u8),
        RemoveAt(usize),
        Insert(usize, u8),
        SetItems(Vec<u8>),
        Reset(Vec<u8>),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Push),
            (0usize..8).prop_map(Op::RemoveAt),
            (0usize..8, 0u8..8).prop_map(|(index, id)| Op::Insert(index, id)),
            prop::collection::vec(0u8..8, 0..8).prop_map(Op::SetItems),
            prop::collection::vec(0u8..8, 0..8).prop_map(Op::Reset),
        ]
    }

    fn unique_items(ids: &[u8]) -> Vec<Attrs> {
        let mut seen = std::collections::BTreeSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .map(|id| attrs! { "id": id, "title": format!("t{id}") })
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // The index-alignment invariant holds after every settled event,
        // whatever the edit sequence.
        #[test]
        fn children_stay_aligned(ops in prop::collection::vec(arb_op(), 0..12)) {
            let tree = Rc::new(TestTree::new());
            let store = OrderedStore::new();
            let (list, _container) = direct_list(&tree, &store);

            for op in ops {
                match op {
                    Op::Push(id) => store.push(attrs! { "id": id, "title": format!("t{id}") }),
                    Op::RemoveAt(index) => {
                        store.remove_at(index);
                    }
                    Op::Insert(index, id) => {
                        store.splice(index, 0, vec![attrs! { "id": id, "title": format!("t{id}") }]);
                    }
                    Op::SetItems(ids) => store.set_items(unique_items(&ids)),
                    Op::Reset(ids) => store.reset(unique_items(&ids)),
                }
                prop_assert_eq!(list.children_len(), store.len());
            }
            tree.run_frames();
            prop_assert_eq!(list.children_len(), store.len());
        }
    }
}

#[test]
fn component_factory_children_track_item_updates() {
    let tree = Rc::new(TestTree::new());
    let container = el("ul")
        .child(el("li").child(el("span").marker("label")))
        .build(&tree);
    let store = OrderedStore::from_items(vec![attrs! { "id": 1, "title": "one" }]);

    let list = ListBinder::from_component(tree.clone(), store.clone(), || Row);
    list.set_view(container);
    tree.run_frames();

    store.merge(attrs! { "id": 1, "title": "first" });
    tree.run_frames();

    assert_aligned(&list);
    assert_eq!(labels(&tree, container), vec!["first"]);
}
