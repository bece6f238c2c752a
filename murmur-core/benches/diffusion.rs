//! Iteration throughput of the diffusion loop.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use murmur_core::mechanism::selection::Quota;
use murmur_core::simulator::MaxIterations;
use murmur_core::{
    CorpusBuilder, EdgeKind, EdgeOrientation, InformationCorpus, SimulationConfig, Simulator,
    presets,
};

fn ring_corpus(users: u32, seeders: u32) -> Arc<InformationCorpus> {
    let mut builder = CorpusBuilder::new();
    for i in 0..users {
        builder = builder.user(format!("u{i}"));
    }
    for i in 0..seeders {
        let author = format!("u{i}");
        builder = builder.piece(format!("p{i}"), i as i64, &[author.as_str()]);
    }
    for i in 0..users {
        builder = builder.edge(
            format!("u{i}"),
            format!("u{}", (i + 1) % users),
            1.0,
            EdgeKind::Original,
        );
        builder = builder.edge(
            format!("u{i}"),
            format!("u{}", (i + 7) % users),
            1.0,
            EdgeKind::Original,
        );
    }
    Arc::new(builder.build().unwrap())
}

fn bench_simple_protocol(c: &mut Criterion) {
    let corpus = ring_corpus(500, 20);

    c.bench_function("simple_protocol_20_iterations", |b| {
        b.iter(|| {
            let protocol =
                presets::simple(Quota::Limit(1), Quota::Limit(2), EdgeOrientation::Out, 42)
                    .build(&corpus)
                    .unwrap();
            let mut sim = Simulator::new(
                Arc::clone(&corpus),
                protocol,
                MaxIterations(20),
                SimulationConfig::default(),
            );
            sim.run().unwrap()
        })
    });
}

fn bench_cascade_protocol(c: &mut Criterion) {
    let corpus = ring_corpus(500, 20);

    c.bench_function("cascade_protocol_20_iterations", |b| {
        b.iter(|| {
            let protocol =
                presets::independent_cascade(0.5, Quota::All, EdgeOrientation::Out, 42)
                    .build(&corpus)
                    .unwrap();
            let mut sim = Simulator::new(
                Arc::clone(&corpus),
                protocol,
                MaxIterations(20),
                SimulationConfig::default(),
            );
            sim.run().unwrap()
        })
    });
}

criterion_group!(benches, bench_simple_protocol, bench_cascade_protocol);
criterion_main!(benches);
