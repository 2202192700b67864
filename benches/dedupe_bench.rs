use std::sync::Arc;

use chrono::Utc;
use citycare::config::EngineConfig;
use citycare::directory::StaticWorkerDirectory;
use citycare::geo::haversine_m;
use citycare::{Actor, Collaborators, ComplaintService, Coordinates, Submission};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CENTER: Coordinates = Coordinates { lat: 11.0168, lon: 76.9558 };

fn report(coordinates: Coordinates) -> Submission {
    Submission {
        complainant_name: None,
        coordinates,
        address: None,
        photo_before: vec![0xff, 0xd8, 0xff],
    }
}

/// A city-sized store with `count` complaints scattered around the center.
fn populated(count: usize) -> ComplaintService {
    let settings = EngineConfig {
        spam_limit: 0,
        ..EngineConfig::default()
    };
    let collaborators = Collaborators::in_memory(Arc::new(StaticWorkerDirectory::new([])));
    let service = ComplaintService::in_memory(settings, collaborators).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    for i in 0..count {
        let coords = Coordinates::new(
            CENTER.lat + rng.gen_range(-0.1..0.1),
            CENTER.lon + rng.gen_range(-0.1..0.1),
        );
        service.submit(&Actor::citizen(1000 + i as u64), report(coords)).unwrap();
    }
    service
}

fn bench_haversine(c: &mut Criterion) {
    let other = Coordinates::new(11.0045, 76.9616);
    c.bench_function("haversine", |b| {
        b.iter(|| haversine_m(black_box(CENTER), black_box(other)))
    });
}

fn bench_duplicate_check(c: &mut Criterion) {
    let service = populated(5_000);
    let detector = service.lifecycle().detector();
    let now = Utc::now();

    c.bench_function("duplicate_check_5k", |b| {
        b.iter(|| {
            detector
                .check(service.store(), black_box(CENTER), now)
                .unwrap()
        })
    });
}

fn bench_submit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("submit_into_1k", |b| {
        b.iter_batched(
            || populated(1_000),
            |service| {
                let coords = Coordinates::new(
                    CENTER.lat + rng.gen_range(-0.1..0.1),
                    CENTER.lon + rng.gen_range(-0.1..0.1),
                );
                service.submit(&Actor::citizen(1), report(coords)).unwrap()
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_haversine, bench_duplicate_check, bench_submit);
criterion_main!(benches);
