use corelib::hash::HashAlgorithm;
use corelib::node::{Node, NodeId};
use corelib::ring::{FailureMode, KetamaRing, NodeLocator};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

fn nodes(count: usize) -> Vec<Node> {
    (0..count)
        .map(|i| Node::new(NodeId(i), format!("10.0.{}.{}", i / 250, i % 250 + 1), 11211))
        .collect()
}

fn bench_ring_build(c: &mut Criterion) {
    let nodes = nodes(16);
    c.bench_function("ketama_build_16_nodes", |b| {
        b.iter(|| {
            std::hint::black_box(KetamaRing::build(
                &nodes,
                HashAlgorithm::Fnv1_32,
                FailureMode::Redistribute,
            ))
        })
    });
}

fn bench_ring_route(c: &mut Criterion) {
    let ring = KetamaRing::build(&nodes(16), HashAlgorithm::Fnv1_32, FailureMode::Redistribute);
    let keys: Vec<String> = (0..1024).map(|i| format!("user:{}", i)).collect();

    c.bench_function("ketama_route_1024_keys", |b| {
        b.iter(|| {
            for key in &keys {
                let _ = std::hint::black_box(ring.route(key, &|_: NodeId| true));
            }
        })
    });
}

fn bench_ring_failover(c: &mut Criterion) {
    let ring = KetamaRing::build(&nodes(16), HashAlgorithm::Fnv1_32, FailureMode::Redistribute);

    c.bench_function("ketama_route_with_dead_node", |b| {
        b.iter_batched(
            || (0..256).map(|i| format!("session:{}", i)).collect::<Vec<_>>(),
            |keys| {
                for key in &keys {
                    let _ = std::hint::black_box(ring.route(key, &|id: NodeId| id.0 != 3));
                }
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_hash_algorithms(c: &mut Criterion) {
    for alg in HashAlgorithm::ALL {
        c.bench_function(&format!("hash_{}", alg), |b| {
            b.iter(|| std::hint::black_box(alg.hash(std::hint::black_box("user:1234567890"))))
        });
    }
}

criterion_group!(
    benches,
    bench_ring_build,
    bench_ring_route,
    bench_ring_failover,
    bench_hash_algorithms
);
criterion_main!(benches);
