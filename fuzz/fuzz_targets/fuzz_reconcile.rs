#![no_main]

//! Fuzz the reconciling bulk-set: arbitrary keyed sequences must never
//! panic, and duplicate-free inputs must land exactly on the target.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use trellis_core::{Attrs, OrderedStore, attrs};

#[derive(Arbitrary, Debug)]
struct Plan {
    current: Vec<(u8, u8)>,
    target: Vec<(u8, u8)>,
}

fn to_items(pairs: &[(u8, u8)]) -> Vec<Attrs> {
    pairs
        .iter()
        .map(|(key, value)| attrs! { "id": key, "value": value })
        .collect()
}

fn key_of(item: &Attrs) -> String {
    item.get("id").map(ToString::to_string).unwrap_or_default()
}

fn dedup_by_key(items: Vec<Attrs>) -> Vec<Attrs> {
    let mut seen = std::collections::BTreeSet::new();
    items.into_iter().filter(|item| seen.insert(key_of(item))).collect()
}

fn has_unique_keys(items: &[Attrs]) -> bool {
    let mut seen = std::collections::BTreeSet::new();
    items.iter().all(|item| seen.insert(key_of(item)))
}

fuzz_target!(|plan: Plan| {
    let current = to_items(&plan.current);
    // Target keys must be unique per the store's contract; the current
    // sequence may carry duplicates (the store tolerates them).
    let target = dedup_by_key(to_items(&plan.target));

    let store = OrderedStore::from_items(current.clone());
    store.set_items(target.clone());

    if has_unique_keys(&current) {
        assert_eq!(store.items(), target);
    }
});
