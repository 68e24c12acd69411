#![allow(missing_docs)]

mod common;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use common::{pawn, pawns_of, session_lock, Colony};
use scribe::{
    Archive, Diagnostic, Document, DocumentInspector, Exposable, Reader, Ref, ScribeError,
    WriteOptions,
};
use tempfile::NamedTempFile;

#[derive(Debug, Default, PartialEq, Exposable)]
struct Warehouse {
    name: String,
    #[scribe(map(key = "value", value = "value"))]
    shelves: Option<BTreeMap<String, u32>>,
    #[scribe(list = "value")]
    log: Option<Vec<Option<String>>>,
}

fn warehouse() -> Warehouse {
    Warehouse {
        name: "North".into(),
        shelves: Some(BTreeMap::from([("a1".to_string(), 4), ("b2".to_string(), 0)])),
        log: Some(vec![Some("opened".into()), None]),
    }
}

/// Basic file save and load, including references between pawns.
#[test]
fn test_file_roundtrip() -> scribe::Result<()> {
    let _lock = session_lock();
    let file = NamedTempFile::new()?;
    let ada = pawn("Ada", 31);
    let mut colony = Colony {
        name: "Disk".into(),
        pawns: Some(vec![ada.clone(), pawn("Bo", 27)]),
        leader: Ref::to(&ada),
    };

    Archive::save(file.path(), "colony", &mut colony)?;
    let loaded = Archive::load::<Colony, _>(file.path(), "colony")?;
    let pawns = pawns_of(&loaded.value);

    assert_eq!(loaded.value.name, "Disk");
    assert_eq!(pawns[1].borrow().age, 27);
    assert!(loaded.value.leader.points_to(&pawns[0]));
    Ok(())
}

/// Saving twice to the same path replaces the file.
#[test]
fn test_save_overwrites() -> scribe::Result<()> {
    let _lock = session_lock();
    let file = NamedTempFile::new()?;
    Archive::save(file.path(), "warehouse", &mut warehouse())?;
    let mut small = Warehouse {
        name: "Tiny".into(),
        ..Warehouse::default()
    };
    Archive::save(file.path(), "warehouse", &mut small)?;

    let loaded = Archive::load::<Warehouse, _>(file.path(), "warehouse")?;
    assert_eq!(loaded.value, small);
    Ok(())
}

/// Empty files and missing root labels are format errors.
#[test]
fn test_load_format_errors() -> scribe::Result<()> {
    let _lock = session_lock();
    let empty = NamedTempFile::new()?;
    assert!(matches!(
        Archive::load::<Warehouse, _>(empty.path(), "warehouse"),
        Err(ScribeError::Format(_))
    ));

    let bytes = Archive::save_bytes("warehouse", &mut warehouse())?;
    match Archive::load_bytes::<Warehouse>(&bytes, "depot") {
        Err(ScribeError::Format(msg)) => assert!(msg.contains("depot")),
        other => panic!("expected format error, got {other:?}"),
    }
    Ok(())
}

/// A missing file surfaces as an I/O error.
#[test]
fn test_missing_file_is_io_error() -> scribe::Result<()> {
    let _lock = session_lock();
    let dir = tempfile::tempdir()?;
    let result = Archive::load::<Warehouse, _>(dir.path().join("absent.xml"), "warehouse");
    assert!(matches!(result, Err(ScribeError::Io(_))));
    Ok(())
}

/// Output options change the layout, not the content.
#[test]
fn test_write_options() -> scribe::Result<()> {
    let _lock = session_lock();
    let options = WriteOptions::default().root_label("savegame").indent(b' ', 4);
    let bytes = Archive::save_bytes_with("warehouse", &mut warehouse(), options)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    assert!(text.starts_with("<savegame>\n    <warehouse>"));

    let loaded = Archive::load_bytes::<Warehouse>(&bytes, "warehouse")?;
    assert_eq!(loaded.value, warehouse());
    Ok(())
}

/// Null slots are written with the null attribute.
#[test]
fn test_null_marker_on_the_wire() -> scribe::Result<()> {
    let _lock = session_lock();
    let bytes = Archive::save_bytes("warehouse", &mut warehouse())?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    assert!(text.contains(r#"<li IsNull="True"/>"#));
    Ok(())
}

/// Inspector output describes shapes and serializes to JSON.
#[test]
fn test_inspector_report() -> scribe::Result<()> {
    let _lock = session_lock();
    let bytes = Archive::save_bytes("warehouse", &mut warehouse())?;
    let report = DocumentInspector::inspect(&bytes)?;

    assert_eq!(report.byte_size, Some(bytes.len()));
    assert_eq!(report.null_nodes, 1);
    let body = &report.tree.children[0];
    assert_eq!(body.label, "warehouse");

    let shelves = body.children.iter().find(|n| n.label == "shelves").unwrap();
    assert_eq!(shelves.shape_hint, "Mapping");
    assert_eq!(shelves.detail.as_deref(), Some("2 entries"));
    let log = body.children.iter().find(|n| n.label == "log").unwrap();
    assert_eq!(log.shape_hint, "Sequence");
    assert_eq!(log.detail.as_deref(), Some("2 items, 1 null"));

    let printed = report.to_string();
    assert!(printed.starts_with("=== SCRIBE INSPECTOR REPORT ==="));
    assert!(printed.contains("shelves (Mapping) [2 entries]"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["tree"]["label"], "root");
    assert_eq!(json["node_count"], report.node_count);
    Ok(())
}

/// The inspector flags damaged mappings.
#[test]
fn test_inspector_flags_mismatch() -> scribe::Result<()> {
    let _lock = session_lock();
    let bytes = Archive::save_bytes("warehouse", &mut warehouse())?;
    let mut document = Document::from_bytes(&bytes)?;
    if let Some(values) = document
        .root_mut()
        .child_mut("warehouse")
        .and_then(|w| w.child_mut("shelves"))
        .and_then(|s| s.child_mut("values"))
    {
        values.children_mut().pop();
    }

    let report = DocumentInspector::inspect_document(&document);
    assert_eq!(report.byte_size, None);
    let shelves = &report.tree.children[0].children[1];
    assert_eq!(shelves.detail.as_deref(), Some("2 keys / 1 values (mismatch)"));
    Ok(())
}

/// Load reports serialize with a `kind` tag per diagnostic.
#[test]
fn test_report_serializes() -> scribe::Result<()> {
    let _lock = session_lock();
    let bytes = Archive::save_bytes("warehouse", &mut warehouse())?;
    let mut document = Document::from_bytes(&bytes)?;
    if let Some(keys) = document
        .root_mut()
        .child_mut("warehouse")
        .and_then(|w| w.child_mut("shelves"))
        .and_then(|s| s.child_mut("keys"))
    {
        keys.children_mut().pop();
    }

    let loaded = Archive::load_bytes::<Warehouse>(&document.to_bytes()?, "warehouse")?;
    let json = serde_json::to_value(&loaded.report).unwrap();
    assert_eq!(json["diagnostics"][0]["kind"], "length_mismatch");
    assert_eq!(json["diagnostics"][0]["keys"], 1);
    assert_eq!(json["diagnostics"][0]["values"], 2);
    assert_eq!(json["registered_objects"], 0);
    Ok(())
}

/// A sink sees every diagnostic as it is reported.
#[test]
fn test_diagnostic_sink() -> scribe::Result<()> {
    let _lock = session_lock();
    let ghost = pawn("Ghost", 1);
    let mut colony = Colony {
        name: "Watched".into(),
        pawns: Some(vec![pawn("Ada", 31)]),
        leader: Ref::to(&ghost),
    };
    let bytes = Archive::save_bytes("colony", &mut colony)?;

    let seen: Rc<RefCell<Vec<Diagnostic>>> = Rc::default();
    let mut loaded = Colony::default();
    let mut reader = Reader::start(&bytes)?;
    let sink = Rc::clone(&seen);
    reader.set_sink(move |d| sink.borrow_mut().push(d.clone()));
    let report = reader.finish(|s| s.look_deep(&mut loaded, "colony"))?;

    assert_eq!(*seen.borrow(), report.diagnostics);
    assert_eq!(seen.borrow().len(), 1);
    Ok(())
}
