#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;

use common::session_lock;
use scribe::{Archive, Document, Exposable, Phase, Reader};

#[derive(Debug, Default, PartialEq, Exposable)]
#[scribe(post_load = "count_post_load")]
struct Outpost {
    #[scribe(label = "callsign")]
    name: String,
    #[scribe(default = 100)]
    power: u32,
    #[scribe(default = String::from("temperate"))]
    biome: String,
    #[scribe(skip)]
    cache: Vec<u8>,
    #[scribe(map(key = "value", value = "value"))]
    stockpile: Option<BTreeMap<String, i64>>,
    r#type: String,
    #[scribe(skip)]
    post_loads: u32,
}

impl Outpost {
    fn count_post_load(&mut self) {
        self.post_loads += 1;
    }
}

fn text_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Field attributes
/// `label` renames the node and raw identifiers lose their prefix.
#[test]
fn test_labels() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut outpost = Outpost {
        name: "Kilo".into(),
        r#type: "relay".into(),
        ..Outpost::default()
    };
    let text = text_of(&Archive::save_bytes("outpost", &mut outpost)?);
    assert!(text.contains("<callsign>Kilo</callsign>"));
    assert!(text.contains("<type>relay</type>"));
    assert!(!text.contains("<name>"));
    Ok(())
}

/// `default` values are omitted when saving and restored when absent.
#[test]
fn test_defaults() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut outpost = Outpost {
        name: "Kilo".into(),
        power: 100,
        biome: "tundra".into(),
        ..Outpost::default()
    };
    let bytes = Archive::save_bytes("outpost", &mut outpost)?;
    let text = text_of(&bytes);
    assert!(!text.contains("<power>"));
    assert!(text.contains("<biome>tundra</biome>"));

    let loaded = Archive::load_bytes::<Outpost>(&bytes, "outpost")?.value;
    assert_eq!(loaded.power, 100);
    assert_eq!(loaded.biome, "tundra");

    let bare = Document::from_bytes(b"<root><outpost/></root>")?.to_bytes()?;
    let loaded = Archive::load_bytes::<Outpost>(&bare, "outpost")?.value;
    assert_eq!(loaded.power, 100);
    assert_eq!(loaded.biome, "temperate");
    Ok(())
}

/// Skipped fields are never written and keep their default on load.
#[test]
fn test_skip() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut outpost = Outpost {
        cache: vec![1, 2, 3],
        ..Outpost::default()
    };
    let bytes = Archive::save_bytes("outpost", &mut outpost)?;
    assert!(!text_of(&bytes).contains("cache"));

    let loaded = Archive::load_bytes::<Outpost>(&bytes, "outpost")?.value;
    assert!(loaded.cache.is_empty());
    Ok(())
}

/// The post-load hook runs exactly once per load, and never while saving.
#[test]
fn test_post_load_runs_once() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut outpost = Outpost::default();
    let bytes = Archive::save_bytes("outpost", &mut outpost)?;
    assert_eq!(outpost.post_loads, 0);

    let mut loaded = Outpost::default();
    let mut reader = Reader::start(&bytes)?;
    reader.run(|s| s.look_deep(&mut loaded, "outpost"))?;
    reader.run(|s| s.look_deep(&mut loaded, "outpost"))?;
    assert_eq!(loaded.post_loads, 0);
    assert_eq!(reader.phase(), Some(Phase::PostLoadInit));
    reader.finish(|s| s.look_deep(&mut loaded, "outpost"))?;
    assert_eq!(loaded.post_loads, 1);
    Ok(())
}

/// Maps declared through the derive round trip like hand-written ones.
#[test]
fn test_derived_map() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut outpost = Outpost {
        stockpile: Some(BTreeMap::from([("fuel".to_string(), -5), ("ore".to_string(), 12)])),
        ..Outpost::default()
    };
    let bytes = Archive::save_bytes("outpost", &mut outpost)?;
    let loaded = Archive::load_bytes::<Outpost>(&bytes, "outpost")?;
    assert_eq!(loaded.value.stockpile, outpost.stockpile);
    assert!(loaded.report.is_clean());
    Ok(())
}

/// A struct without `Default`; it is only ever loaded into an existing value.
#[derive(Debug, PartialEq, Exposable)]
#[scribe(no_lookable)]
struct Relay {
    frequency: u32,
    owner: String,
}

impl Relay {
    fn tuned(frequency: u32) -> Self {
        Relay {
            frequency,
            owner: String::from("colony"),
        }
    }
}

/// `no_lookable` drops the deep `Lookable`, so `Default` is not required.
#[test]
fn test_no_lookable_without_default() -> scribe::Result<()> {
    let _lock = session_lock();
    let mut relay = Relay {
        frequency: 915,
        owner: "Ada".into(),
    };
    let bytes = Archive::save_bytes("relay", &mut relay)?;

    let mut loaded = Relay::tuned(0);
    let reader = Reader::start(&bytes)?;
    reader.finish(|s| s.node("relay", |s| loaded.expose(s)).map(|_| ()))?;
    assert_eq!(loaded, relay);
    Ok(())
}
