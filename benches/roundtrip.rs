#![allow(missing_docs)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scribe::{shared, Archive, Exposable, Ref, Referenceable, Shared};
use std::collections::{BTreeMap, HashMap};
use std::hint::black_box;

#[derive(Default, Exposable)]
struct Pawn {
    id: u64,
    name: String,
    #[scribe(reference)]
    friend: Ref<Pawn>,
    #[scribe(map(key = "value", value = "value"))]
    skills: Option<BTreeMap<String, u32>>,
}

impl Referenceable for Pawn {
    fn load_id(&self) -> String {
        format!("Pawn_{}", self.id)
    }
}

#[derive(Default, Exposable)]
struct Colony {
    #[scribe(list = "deep")]
    pawns: Option<Vec<Shared<Pawn>>>,
    #[scribe(map(key = "reference", value = "value"))]
    wages: Option<HashMap<Ref<Pawn>, u32>>,
}

fn generate_colony(count: u64) -> Colony {
    let pawns: Vec<Shared<Pawn>> = (0..count)
        .map(|id| {
            shared(Pawn {
                id,
                name: format!("pawn-{id}"),
                skills: Some(BTreeMap::from([
                    ("mining".to_string(), (id % 20) as u32),
                    ("cooking".to_string(), (id % 7) as u32),
                ])),
                ..Pawn::default()
            })
        })
        .collect();
    // Every pawn befriends the next one, closing a ring.
    for (i, pawn) in pawns.iter().enumerate() {
        let next = &pawns[(i + 1) % pawns.len()];
        pawn.borrow_mut().friend = Ref::to(next);
    }
    let wages = pawns
        .iter()
        .step_by(10)
        .map(|pawn| (Ref::to(pawn), 100 + pawn.borrow().id as u32))
        .collect();
    Colony {
        pawns: Some(pawns),
        wages: Some(wages),
    }
}

fn bench_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("Colony Roundtrip");

    for count in [100u64, 1_000, 10_000] {
        let mut colony = generate_colony(count);
        let bytes = Archive::save_bytes("colony", &mut colony).expect("save failed");
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_with_input(BenchmarkId::new("save", count), &count, |b, _| {
            b.iter(|| Archive::save_bytes("colony", black_box(&mut colony)).expect("save failed"));
        });

        group.bench_with_input(BenchmarkId::new("load", count), &bytes, |b, bytes| {
            b.iter(|| {
                let loaded = Archive::load_bytes::<Colony>(black_box(bytes), "colony")
                    .expect("load failed");
                assert!(loaded.report.is_clean());
                loaded
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_roundtrip);
criterion_main!(benches);
