use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use ferry_core::host::{EncodeConfig, Encoder, HostValue, encode};
use ferry_core::{
    ClassId, DecodeConfig, Error, ForeignClass, ForeignHandle, Node, Result, Serialization,
    StructureError, Tree, Value,
};

struct Doc<'a> {
    name: &'a str,
    terms: Vec<i64>,
}

impl HostValue for Doc<'_> {
    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.open()?;
        enc.name(Value::str("name"))?;
        enc.item(Value::str(self.name))?;
        enc.name(Value::str("terms"))?;
        enc.value(&self.terms)?;
        enc.close()
    }
}

#[test]
fn document_encodes_to_the_expected_stream() {
    let doc = Doc {
        name: "doc1",
        terms: vec![1, 2, 3],
    };
    let s = encode(&doc, EncodeConfig::default()).unwrap();
    let nodes: Vec<Node<'_>> = s.nodes().collect();
    assert_eq!(
        nodes,
        vec![
            Node::Open,
            Node::Name(Value::str("name")),
            Node::Item(Value::str("doc1")),
            Node::Name(Value::str("terms")),
            Node::Open,
            Node::Item(Value::Int(1)),
            Node::Item(Value::Int(2)),
            Node::Item(Value::Int(3)),
            Node::Close,
            Node::Close,
        ]
    );

    let mut c = s.cursor();
    c.expect_open().unwrap();
    assert!(c.is_container_labeled());
    assert!(c.find(&Value::str("terms")).unwrap());
    c.expect_open().unwrap();
    assert!(c.is_container_positional());
    let mut count = 0;
    while c.peek() != Some(Node::Close) {
        c.skip_value().unwrap();
        count += 1;
    }
    assert_eq!(count, 3);

    let tree = Tree::decode(&s, DecodeConfig::default()).unwrap();
    assert_eq!(tree.get("terms").and_then(Tree::len), Some(3));
}

#[test]
fn skipping_a_very_deep_stream_is_iterative() {
    const DEPTH: usize = 100_000;
    let mut s = Serialization::with_capacity(DEPTH * 2 + 1);
    for _ in 0..DEPTH {
        s.open().unwrap();
    }
    s.push_item(Value::Int(7)).unwrap();
    for _ in 0..DEPTH {
        s.close().unwrap();
    }
    let mut c = s.cursor();
    c.skip_value().unwrap();
    assert!(c.is_at_end());
    assert_eq!(c.depth(), 0);

    let err = Tree::decode(&s, DecodeConfig::default()).unwrap_err();
    assert_eq!(err, Error::from(StructureError::TooDeep { limit: 256 }));
}

/// A host list that may contain itself, like a script table.
struct Shared(Rc<RefCell<Vec<Entry>>>);

enum Entry {
    Num(i64),
    List(Shared),
}

impl HostValue for Shared {
    fn identity(&self) -> Option<usize> {
        Some(Rc::as_ptr(&self.0) as usize)
    }

    fn encode(&self, enc: &mut Encoder<'_, '_>) -> Result<()> {
        enc.open()?;
        for e in self.0.borrow().iter() {
            match e {
                Entry::Num(n) => enc.item(Value::Int(*n))?,
                Entry::List(l) => enc.value(l)?,
            }
        }
        enc.close()
    }
}

#[test]
fn cyclic_host_structures_are_rejected() {
    let root = Rc::new(RefCell::new(vec![Entry::Num(1)]));
    root.borrow_mut().push(Entry::List(Shared(root.clone())));
    let host = Shared(root.clone());

    let err = encode(&host, EncodeConfig::default()).unwrap_err();
    assert_eq!(err, Error::from(StructureError::Cycle));

    // Without identity tracking the depth limit still stops the walk.
    let config = EncodeConfig {
        detect_cycles: false,
        ..EncodeConfig::default()
    };
    let err = encode(&host, config).unwrap_err();
    assert_eq!(err, Error::from(StructureError::TooDeep { limit: 32 }));

    // Break the cycle so the Rc can be freed.
    root.borrow_mut().pop();
}

#[test]
fn shared_but_acyclic_structures_are_fine() {
    let leaf = Rc::new(RefCell::new(vec![Entry::Num(5)]));
    let root = Shared(Rc::new(RefCell::new(vec![
        Entry::List(Shared(leaf.clone())),
        Entry::List(Shared(leaf)),
    ])));
    let s = encode(&root, EncodeConfig::default()).unwrap();
    assert_eq!(s.nodes().filter(|n| *n == Node::Open).count(), 3);
}

#[test]
fn default_depth_limit_is_enforced() {
    fn nested(levels: usize) -> Tree {
        (0..levels).fold(Tree::Int(0), |t, _| Tree::Positional(vec![t]))
    }
    assert!(encode(&nested(32), EncodeConfig::default()).is_ok());
    assert_eq!(
        encode(&nested(33), EncodeConfig::default()).unwrap_err(),
        Error::from(StructureError::TooDeep { limit: 32 })
    );
}

static CONCURRENT_DROPS: AtomicUsize = AtomicUsize::new(0);

struct Engine;

impl ForeignClass for Engine {
    const CLASS_ID: ClassId = ClassId(42);
    const CLASS_NAME: &'static str = "Engine";
}

impl Drop for Engine {
    fn drop(&mut self) {
        CONCURRENT_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn concurrent_clone_and_drop_destroys_once() {
    let h = ForeignHandle::owning(Box::new(Engine));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let mine = h.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let c = mine.clone();
                    assert!(c.get::<Engine>().unwrap().is_some());
                    drop(c);
                }
            })
        })
        .collect();
    drop(h);
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(CONCURRENT_DROPS.load(Ordering::SeqCst), 1);
}

struct Static;

impl ForeignClass for Static {
    const CLASS_ID: ClassId = ClassId(43);
    const CLASS_NAME: &'static str = "Static";
}

impl Drop for Static {
    fn drop(&mut self) {
        panic!("borrowed object must never be dropped by a handle");
    }
}

static STATIC_OBJECT: Static = Static;

#[test]
fn borrowed_handles_never_destroy() {
    let h = ForeignHandle::borrowed(&STATIC_OBJECT);
    let clones: Vec<_> = (0..4).map(|_| h.clone()).collect();
    assert!(!h.is_owning());
    drop(clones);
    drop(h);
}

struct Probe;

impl ForeignClass for Probe {
    const CLASS_ID: ClassId = ClassId(44);
    const CLASS_NAME: &'static str = "Probe";
}

#[test]
fn handles_travel_inside_streams() {
    let h = ForeignHandle::owning(Box::new(Probe));
    let s: Serialization<'static> = {
        let mut s = Serialization::new();
        s.open().unwrap();
        s.push_item_copied(Value::handle(&h)).unwrap();
        s.close().unwrap();
        s
    };
    assert_eq!(h.ref_count(), 2);
    let t = Tree::decode(&s, DecodeConfig::default()).unwrap();
    match &t {
        Tree::Positional(items) => assert_eq!(items[0], Tree::Handle(h.clone())),
        other => panic!("unexpected {other:?}"),
    }
    drop(t);
    drop(s);
    assert_eq!(h.ref_count(), 1);
}
