use ferry_core::host::{EncodeConfig, encode};
use ferry_core::{DecodeConfig, Error, Node, Serialization, StructureError, Tree, Value};
use proptest::prelude::*;

fn arb_key() -> impl Strategy<Value = Tree> {
    prop_oneof![
        "[a-z]{0,6}".prop_map(|s| Tree::str(&s)),
        any::<u32>().prop_map(|u| Tree::UInt(u as u64)),
    ]
}

fn arb_tree() -> impl Strategy<Value = Tree> {
    let leaf = prop_oneof![
        Just(Tree::Void),
        any::<i64>().prop_map(Tree::Int),
        any::<u64>().prop_map(Tree::UInt),
        (-1.0e15f64..1.0e15).prop_map(Tree::Double),
        // Arbitrary bytes, embedded NULs included.
        prop::collection::vec(any::<u8>(), 0..12).prop_map(Tree::String),
        prop::collection::vec(any::<u16>(), 0..6).prop_map(Tree::WideString),
    ];
    leaf.prop_recursive(8, 96, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Tree::Positional),
            // An empty labeled container is indistinguishable from an empty positional one.
            prop::collection::vec((arb_key(), inner), 1..6).prop_map(Tree::Labeled),
        ]
    })
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Open,
    Close,
    Name(u8),
    Item(i64),
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            Just(Op::Open),
            Just(Op::Close),
            any::<u8>().prop_map(Op::Name),
            any::<i64>().prop_map(Op::Item),
        ],
        0..64,
    )
}

proptest! {
    #[test]
    fn decode_of_encode_is_identity(t in arb_tree()) {
        let config = EncodeConfig { max_depth: 16, ..EncodeConfig::default() };
        let s = encode(&t, config).unwrap();
        let back = Tree::decode(&s, DecodeConfig::default()).unwrap();
        prop_assert_eq!(back, t);
    }
}

/// Reference model of the producer rules: one frame per open container
/// holding its labeling (once known) and whether a name awaits its value.
#[derive(Default)]
struct Model {
    frames: Vec<(Option<bool>, bool)>,
    root_started: bool,
}

impl Model {
    fn value_allowed(&self) -> bool {
        match self.frames.last() {
            None => !self.root_started,
            Some(&(_, true)) => true,
            Some(&(labeled, false)) => labeled != Some(true),
        }
    }

    fn begin_value(&mut self) {
        match self.frames.last_mut() {
            Some(f) if f.1 => f.1 = false,
            Some(f) => f.0 = Some(false),
            None => self.root_started = true,
        }
    }

    fn apply(&mut self, op: Op) -> bool {
        match op {
            Op::Open | Op::Item(_) => {
                if !self.value_allowed() {
                    return false;
                }
                self.begin_value();
                if matches!(op, Op::Open) {
                    self.frames.push((None, false));
                }
                true
            }
            Op::Close => match self.frames.last() {
                Some(&(_, false)) => {
                    self.frames.pop();
                    true
                }
                _ => false,
            },
            Op::Name(_) => match self.frames.last_mut() {
                Some(f) if !f.1 && f.0 != Some(false) => {
                    *f = (Some(true), true);
                    true
                }
                _ => false,
            },
        }
    }
}

proptest! {
    #[test]
    fn accepted_nodes_keep_the_stream_balanced(ops in arb_ops()) {
        let mut s = Serialization::new();
        let mut model = Model::default();
        for op in &ops {
            let before = s.len();
            let res = match op {
                Op::Open => s.open(),
                Op::Close => s.close(),
                Op::Name(n) => s.push_name(Value::UInt(*n as u64)),
                Op::Item(i) => s.push_item(Value::Int(*i)),
            };
            prop_assert_eq!(res.is_ok(), model.apply(*op), "{:?} after {:?}", op, s);
            // A rejected call leaves the stream untouched.
            prop_assert_eq!(s.len(), before + usize::from(res.is_ok()));
        }

        let mut depth = 0i64;
        let mut prev_was_name = false;
        for node in s.nodes() {
            match node {
                Node::Open => depth += 1,
                Node::Close => {
                    prop_assert!(!prev_was_name);
                    depth -= 1;
                }
                Node::Name(_) => prop_assert!(!prev_was_name),
                Node::Item(_) => {}
            }
            prop_assert!(depth >= 0);
            prev_was_name = matches!(node, Node::Name(_));
        }
        prop_assert_eq!(depth as usize, s.depth());
        if s.is_complete() {
            prop_assert_eq!(depth, 0);
            prop_assert!(Tree::decode(&s, DecodeConfig::default()).is_ok());
        }
    }
}

proptest! {
    #[test]
    fn first_child_fixes_container_labeling(
        labeled in any::<bool>(),
        nested in any::<bool>(),
        extra in 1usize..5,
    ) {
        let mut s = Serialization::new();
        s.open().unwrap();
        if labeled {
            s.push_name("k".into()).unwrap();
        }
        if nested {
            s.open().unwrap();
            s.push_item(Value::Int(0)).unwrap();
            s.close().unwrap();
        } else {
            s.push_item(Value::Int(0)).unwrap();
        }
        for i in 0..extra {
            let err = match (labeled, i % 2 == 0) {
                (true, true) => s.push_item(Value::Int(1)).unwrap_err(),
                (true, false) => s.open().unwrap_err(),
                (false, _) => s.push_name("k".into()).unwrap_err(),
            };
            prop_assert_eq!(
                err,
                Error::from(StructureError::MixedChildren { labeled_first: labeled })
            );
        }
        // Siblings of the matching kind are still accepted.
        if labeled {
            s.push_name("k2".into()).unwrap();
        }
        s.push_item(Value::Int(2)).unwrap();
        s.close().unwrap();
        prop_assert!(s.is_complete());
    }
}

proptest! {
    #[test]
    fn equal_streams_compare_equal_as_values(t in arb_tree()) {
        let a = encode(&t, EncodeConfig { max_depth: 16, ..EncodeConfig::default() }).unwrap();
        let b = a.clone();
        prop_assert_eq!(Value::serialization(&a), Value::serialization(&b));
    }
}
