#![allow(missing_docs)]

mod common;

use common::session_lock;
use scribe::{
    active_session, shared, Archive, Exposable, LookMode, Phase, Reader, Referenceable,
    ScribeError, SessionKind, Shared, Writer, MAX_NESTING,
};

fn is_protocol<T>(result: &scribe::Result<T>) -> bool {
    matches!(result, Err(ScribeError::Protocol(_)))
}

/// Session guard
/// A second session of either kind is refused while one is active.
#[test]
fn test_second_session_is_refused() -> scribe::Result<()> {
    let _lock = session_lock();
    let writer = Writer::begin()?;
    assert_eq!(active_session(), Some(SessionKind::Writer));

    assert!(is_protocol(&Writer::begin()));
    assert!(is_protocol(&Reader::start(b"<root/>")));
    assert!(is_protocol(&Archive::save_bytes("x", &mut Crate::default())));

    drop(writer);
    assert_eq!(active_session(), None);
    let reader = Reader::start(b"<root/>")?;
    assert_eq!(active_session(), Some(SessionKind::Reader));
    drop(reader);
    Ok(())
}

/// Dropping an unfinished writer ends its session.
#[test]
fn test_guard_released_on_drop() -> scribe::Result<()> {
    let _lock = session_lock();
    {
        let mut writer = Writer::begin()?;
        writer.enter("left")?;
        writer.enter("open")?;
    }
    assert_eq!(active_session(), None);
    Writer::begin()?.finish()?;
    Ok(())
}

/// `exit` at the root is misuse, in both sessions.
#[test]
fn test_exit_at_root() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut writer = Writer::begin()?;
    assert!(is_protocol(&writer.exit()));
    drop(writer);

    let mut reader = Reader::start(b"<root><a>1</a></root>")?;
    let result = reader.run(|s| s.exit());
    assert!(is_protocol(&result));
    Ok(())
}

/// Unclosed nodes fail `finish` and a phase that leaves a node entered fails.
#[test]
fn test_unbalanced_navigation() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut writer = Writer::begin()?;
    writer.enter("a")?;
    writer.enter("b")?;
    writer.exit()?;
    match writer.finish() {
        Err(ScribeError::Protocol(msg)) => assert!(msg.contains("1 unclosed")),
        other => panic!("expected protocol error, got {other:?}"),
    }

    let mut reader = Reader::start(b"<root><a>1</a></root>")?;
    let result = reader.run(|s| {
        assert!(s.enter("a")?);
        Ok(())
    });
    assert!(is_protocol(&result));
    Ok(())
}

/// A missing node is not entered, so there is nothing to exit.
#[test]
fn test_enter_absent_node_while_loading() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut reader = Reader::start(b"<root><a>1</a></root>")?;
    reader.run(|s| {
        assert!(!s.enter("missing")?);
        assert_eq!(s.depth(), 0);
        assert_eq!(s.read_scalar("a"), Some("1"));
        Ok(())
    })?;
    Ok(())
}

/// Every phase runs once; a fourth run is misuse.
#[test]
fn test_run_after_every_phase() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut reader = Reader::start(b"<root/>")?;
    for expected in Phase::ORDER {
        assert_eq!(reader.phase(), Some(expected));
        assert_eq!(reader.run(|s| {
            assert_eq!(s.phase(), Some(expected));
            Ok(())
        })?, expected);
    }
    assert_eq!(reader.phase(), None);
    assert!(is_protocol(&reader.run(|_| Ok(()))));
    Ok(())
}

/// Malformed documents fail before any phase and release the guard.
#[test]
fn test_malformed_document_is_format_error() -> scribe::Result<()> {
    let _lock = session_lock();
    let inputs: [&[u8]; 4] = [
        b"<root><a></root>",
        b"",
        b"<root>text<a/></root>",
        b"<a/><b/>",
    ];
    for input in inputs {
        let result = Reader::start(input);
        assert!(
            matches!(result, Err(ScribeError::Format(_))),
            "{:?} should not parse",
            String::from_utf8_lossy(input)
        );
        assert_eq!(active_session(), None);
    }
    Ok(())
}

/// Hostile nesting is refused as a format error instead of exhausting the stack.
#[test]
fn test_deep_nesting_is_format_error() -> scribe::Result<()> {
    let _lock = session_lock();
    let depth = 200_000;
    let input = format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));
    match Reader::start(input.as_bytes()) {
        Err(ScribeError::Format(msg)) => assert!(msg.contains(&MAX_NESTING.to_string())),
        other => panic!("expected format error, got {other:?}"),
    }
    assert_eq!(active_session(), None);
    Ok(())
}

/// Labels that cannot be written are refused.
#[test]
fn test_invalid_label_is_refused() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut writer = Writer::begin()?;
    assert!(is_protocol(&writer.enter("two words")));
    assert!(is_protocol(&writer.write_scalar("", "x")));
    assert_eq!(writer.depth(), 0);
    Ok(())
}

#[derive(Debug, Default, Exposable)]
struct Crate {
    label: String,
}

/// Asking a type for a look mode it does not support is misuse.
#[test]
fn test_unsupported_look_mode() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut writer = Writer::begin()?;
    let mut numbers = Some(vec![1u32, 2]);
    let result = writer
        .scribe()
        .look_list(&mut numbers, "numbers", LookMode::Reference);
    assert!(is_protocol(&result));

    let mut crates = Some(vec![Crate::default()]);
    let result = writer
        .scribe()
        .look_list(&mut crates, "crates", LookMode::Value);
    assert!(is_protocol(&result));
    Ok(())
}

#[derive(Debug, Default, Exposable)]
struct Node {
    name: String,
    #[scribe(shared)]
    child: Option<Shared<Node>>,
}

impl Referenceable for Node {
    fn load_id(&self) -> String {
        format!("Node_{}", self.name)
    }
}

#[derive(Debug, Default, Exposable)]
struct Tree {
    #[scribe(shared)]
    root: Option<Shared<Node>>,
}

/// Deep ownership must form a tree; owning an ancestor fails instead of panicking.
#[test]
fn test_owning_cycle_is_protocol_error() -> scribe::Result<()> {
    let _lock = session_lock();
    let node = shared(Node {
        name: "loop".into(),
        child: None,
    });
    node.borrow_mut().child = Some(node.clone());
    let mut tree = Tree {
        root: Some(node.clone()),
    };

    let result = Archive::save_bytes("tree", &mut tree);
    node.borrow_mut().child = None;
    assert!(is_protocol(&result));
    assert_eq!(active_session(), None);
    Ok(())
}

/// Shared objects nest and register under their own identifiers.
#[test]
fn test_shared_objects_register() -> scribe::Result<()> {
    let _lock = session_lock();
    let leaf = shared(Node {
        name: "leaf".into(),
        child: None,
    });
    let mut tree = Tree {
        root: Some(shared(Node {
            name: "top".into(),
            child: Some(leaf),
        })),
    };
    let bytes = Archive::save_bytes("tree", &mut tree)?;
    let loaded = Archive::load_bytes::<Tree>(&bytes, "tree")?;

    assert_eq!(loaded.report.registered_objects, 2);
    let top = loaded.value.root.expect("root node");
    let child = top.borrow().child.clone().expect("child node");
    assert_eq!(child.borrow().name, "leaf");
    Ok(())
}
