use std::sync::atomic::{AtomicUsize, Ordering};

use ferry_bridge::registry::{self, ClassRegistry, RegistryError};
use ferry_bridge::{Args, CallOutcome, MAX_ERROR_MESSAGE_SIZE, Owned, call_function, call_method};
use ferry_core::{ClassId, DecodeConfig, Error, ForeignClass, ForeignHandle, Result, Tree, Value};
use proptest::prelude::*;

static INDEX_DROPS: AtomicUsize = AtomicUsize::new(0);

struct Index {
    docs: Vec<String>,
}

impl ForeignClass for Index {
    const CLASS_ID: ClassId = ClassId(1);
    const CLASS_NAME: &'static str = "Index";
}

impl Drop for Index {
    fn drop(&mut self) {
        INDEX_DROPS.fetch_add(1, Ordering::SeqCst);
    }
}

struct Query;

impl ForeignClass for Query {
    const CLASS_ID: ClassId = ClassId(2);
    const CLASS_NAME: &'static str = "Query";
}

fn open_index(args: Args<'_, '_>) -> Result<Owned<Index>> {
    args.expect(1, 1)?;
    let doc = args.serialization(0)?;
    let tree = Tree::decode(doc, DecodeConfig::default())?;
    let docs = match tree {
        Tree::Positional(items) => items
            .iter()
            .map(|t| t.as_value().ok_or(Error::type_mismatch("string", "structure"))?.to_text())
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(Error::type_mismatch("positional container", "labeled container")),
    };
    Ok(Owned(Index { docs }))
}

fn describe(index: &Index, args: Args<'_, '_>) -> Result<Tree> {
    args.expect(0, 0)?;
    Ok(Tree::Labeled(vec![
        (Tree::str("count"), Tree::UInt(index.docs.len() as u64)),
        (
            Tree::str("docs"),
            Tree::Positional(index.docs.iter().map(|d| Tree::str(d)).collect()),
        ),
    ]))
}

#[test]
fn full_round_trip_through_the_boundary() {
    let mut registry = ClassRegistry::builder();
    registry.register::<Index>().unwrap().register::<Query>().unwrap();
    let installed = registry.build().install().unwrap();
    assert_eq!(installed.name_of(ClassId(2)), Some("Query"));
    assert_eq!(
        ClassRegistry::builder().build().install().unwrap_err(),
        RegistryError::AlreadyInstalled
    );
    assert_eq!(registry::class_name(ClassId(1)), "Index");

    // Host side: build the structured argument.
    let mut arg = ferry_core::Serialization::new();
    arg.open().unwrap();
    arg.push_item(Value::str("doc1")).unwrap();
    arg.push_item(Value::str("doc2")).unwrap();
    arg.close().unwrap();

    let created = call_function("open_index", &[Value::serialization(&arg)], open_index);
    let handle = created.value().unwrap().as_handle().unwrap().clone();
    drop(created);

    let out = call_method::<Index, _, _>("describe", Some(&handle), &[], describe);
    let stream = out.value().unwrap().as_serialization().unwrap();
    let tree = Tree::decode(stream, DecodeConfig::default()).unwrap();
    assert_eq!(tree.get("count"), Some(&Tree::UInt(2)));
    assert_eq!(tree.get("docs").and_then(Tree::len), Some(2));

    // A handle of another class names the registered class in the message.
    let q = ForeignHandle::owning(Box::new(Query));
    let out = call_method::<Index, _, _>("describe", Some(&q), &[], describe);
    assert_eq!(out.last_error(), "type mismatch: expected Index, got Query");

    // The index is destroyed once, after the last handle goes away.
    let copy = handle.clone();
    drop(handle);
    assert_eq!(INDEX_DROPS.load(Ordering::SeqCst), 0);
    drop(copy);
    assert_eq!(INDEX_DROPS.load(Ordering::SeqCst), 1);
}

#[test]
fn ten_thousand_byte_message_is_bounded() {
    #[repr(C)]
    struct Harness {
        outcome: ferry_bridge::ErrorBuffer,
        guard: u8,
    }
    let mut h = Harness {
        outcome: ferry_bridge::ErrorBuffer::new(),
        guard: 0x5A,
    };
    h.outcome.report_error(format_args!("{}", "e".repeat(10_000)));
    assert_eq!(h.outcome.last_error().len(), MAX_ERROR_MESSAGE_SIZE - 1);
    assert_eq!(h.outcome.last_error_cstr().to_bytes_with_nul().len(), MAX_ERROR_MESSAGE_SIZE);
    assert_eq!(h.guard, 0x5A);
}

proptest! {
    #[test]
    fn any_message_stays_in_bounds(msg in ".{0,3000}") {
        let mut out = CallOutcome::new();
        out.report_error(format_args!("{msg}"));
        prop_assert!(out.has_error());
        prop_assert!(out.last_error().len() < MAX_ERROR_MESSAGE_SIZE);
        prop_assert!(msg.replace('\0', " ").starts_with(out.last_error()) || msg.is_empty());
    }
}
