#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use modal_core::{ModalParams, ParamsPatch, PropObject, PropValue, Props, identity_hash};

#[derive(Debug, Arbitrary)]
enum Leaf {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Arbitrary)]
struct Input {
    entries: Vec<(String, Leaf)>,
    /// Object indices (mod object count) to wire into each other.
    links: Vec<(u8, u8)>,
    layer: i32,
    id: i64,
}

fn leaf(value: &Leaf) -> PropValue {
    match value {
        Leaf::Null => PropValue::Null,
        Leaf::Bool(b) => PropValue::Bool(*b),
        Leaf::Int(n) => PropValue::Int(*n),
        Leaf::Float(x) => PropValue::Float(*x),
        Leaf::Str(s) => PropValue::Str(s.clone()),
    }
}

fuzz_target!(|input: Input| {
    let objects: Vec<PropObject> = (0..4).map(|_| PropObject::new()).collect();
    for (i, (key, value)) in input.entries.iter().enumerate() {
        objects[i % objects.len()].insert(key.clone(), leaf(value));
    }
    // Arbitrary links may form cycles; canonicalization must still terminate.
    for (n, &(from, to)) in input.links.iter().take(16).enumerate() {
        let from = &objects[usize::from(from) % objects.len()];
        let to = objects[usize::from(to) % objects.len()].clone();
        from.insert(format!("link{n}"), to);
    }

    let forward: Props = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (format!("o{i}"), o.clone()))
        .collect();
    let backward: Props = objects
        .iter()
        .enumerate()
        .rev()
        .map(|(i, o)| (format!("o{i}"), o.clone()))
        .collect();

    let build = |props: Props| {
        let mut params = ModalParams::default();
        params.apply(&ParamsPatch::from(props).layer(input.layer).id(input.id));
        params.canonical()
    };
    let a = build(forward);
    let b = build(backward);
    assert_eq!(a, b);
    assert_eq!(identity_hash(7, &a), identity_hash(7, &b));
});
