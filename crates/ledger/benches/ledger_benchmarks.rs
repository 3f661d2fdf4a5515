use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use stockroom_core::ProductId;
use stockroom_ledger::{InventoryLedger, PostingLeg};
use stockroom_locations::{Address, LocationRegistry, LocationSpec};

fn seeded_ledger(locations: u32) -> (Arc<InventoryLedger>, Vec<(ProductId, stockroom_core::LocationId)>) {
    let registry = Arc::new(LocationRegistry::new());
    let ledger = Arc::new(InventoryLedger::new(Arc::clone(&registry)));
    let mut keys = Vec::new();
    for bin in 0..locations {
        let loc = registry
            .register(LocationSpec {
                address: Address {
                    zone: "B".to_string(),
                    aisle: 1,
                    rack: 1,
                    bin,
                },
                capacity: u64::MAX / 2,
            })
            .unwrap()
            .id;
        let product = ProductId::new();
        ledger.receive(product, loc, 1_000_000).unwrap();
        keys.push((product, loc));
    }
    (ledger, keys)
}

/// Single-key posting throughput: reserve then release, the hottest pair in
/// an allocation-heavy workload.
fn bench_single_key_postings(c: &mut Criterion) {
    let (ledger, keys) = seeded_ledger(1);
    let (product, loc) = keys[0];

    let mut group = c.benchmark_group("single_key_postings");
    group.throughput(Throughput::Elements(2));
    group.bench_function("reserve_release", |b| {
        b.iter(|| {
            ledger.reserve(black_box(product), black_box(loc), 1).unwrap();
            ledger.release(black_box(product), black_box(loc), 1).unwrap();
        })
    });
    group.finish();
}

/// Multi-key batch reserve across a growing number of locations, the shape
/// `allocate` produces for split orders.
fn bench_multi_key_reserve(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_key_reserve");
    for locations in [2u32, 4, 8] {
        let (ledger, keys) = seeded_ledger(locations);
        let legs: Vec<PostingLeg> = keys
            .iter()
            .map(|(product, loc)| PostingLeg {
                product_id: *product,
                location_id: *loc,
                qty: 1,
            })
            .collect();
        let release_legs = legs.clone();

        group.throughput(Throughput::Elements(locations as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(locations),
            &locations,
            |b, _| {
                b.iter(|| {
                    ledger.reserve_many(black_box(&legs)).unwrap();
                    for leg in &release_legs {
                        ledger.release(leg.product_id, leg.location_id, leg.qty).unwrap();
                    }
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_single_key_postings, bench_multi_key_reserve);
criterion_main!(benches);
