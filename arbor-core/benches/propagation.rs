//! Benchmarks for arbor-core propagation
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use arbor_core::reactive::{bind, listen, Channel, Node};
use arbor_core::tree::{Reconciler, Renderer, Tree};

// =============================================================================
// NODE BENCHMARKS
// =============================================================================

fn bench_node_write(c: &mut Criterion) {
    let node = Node::new(0i64);
    let mut next = 0i64;
    c.bench_function("node_write", |b| {
        b.iter(|| {
            next += 1;
            node.write(black_box(next))
        })
    });
}

fn bench_node_write_equal(c: &mut Criterion) {
    let node = Node::new(vec![1i64, 2, 3]);
    c.bench_function("node_write_equal", |b| {
        b.iter(|| node.write(black_box(vec![1, 2, 3])))
    });
}

fn bench_write_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_fan_out");
    for count in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("transitions", count), &count, |b, &count| {
            let node = Node::new(0i64);
            for _ in 0..count {
                let input = node.clone();
                bind(&[&node], move || {
                    black_box(input.read());
                });
            }
            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                node.write(next)
            })
        });
    }
    group.finish();
}

fn bench_derive_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_chain");
    for depth in [1usize, 10, 50] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            let source = Node::new(0i64);
            let mut tail = source.map(|v| v.unwrap_or(0) + 1);
            for _ in 1..depth {
                tail = tail.map(|v| v.unwrap_or(0) + 1);
            }
            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                source.write(next);
                black_box(tail.read())
            })
        });
    }
    group.finish();
}

// =============================================================================
// CHANNEL BENCHMARKS
// =============================================================================

fn bench_channel_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_fan_out");
    for count in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, &count| {
            let chan = Channel::<u32>::new();
            for _ in 0..count {
                let input = chan.clone();
                listen(&[&chan], move || {
                    black_box(input.current());
                });
            }
            b.iter(|| chan.put(black_box(1u32)))
        });
    }
    group.finish();
}

// =============================================================================
// RECONCILER BENCHMARKS
// =============================================================================

struct Counting;

impl Renderer<u32> for Counting {
    type Context = u32;

    fn on_create(&self, value: &u32, parent: &u32) -> u32 {
        black_box(value + parent)
    }

    fn on_destroy(&self, context: u32) {
        black_box(context);
    }
}

fn bench_reconcile_growing_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_growing_list");
    for count in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("children", count), &count, |b, &count| {
            b.iter(|| {
                let reconciler = Reconciler::<u32, _>::new(Counting);
                let root = reconciler.mount(&Tree::leaf(0u32), 0).expect("mount");
                let mut children = Vec::with_capacity(count);
                for i in 0..count {
                    children.push(Tree::leaf(i as u32));
                    root.set_children(children.clone());
                }
                black_box(reconciler.mounted_count())
            })
        });
    }
    group.finish();
}

criterion_group!(
    node_benches,
    bench_node_write,
    bench_node_write_equal,
    bench_write_fan_out,
    bench_derive_chain,
);

criterion_group!(channel_benches, bench_channel_fan_out);

criterion_group!(reconciler_benches, bench_reconcile_growing_list);

criterion_main!(node_benches, channel_benches, reconciler_benches);
