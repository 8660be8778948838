use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use halo_heat::algs::communicator::LocalComm;
use halo_heat::algs::diffuse::{DiffusionKernel, FieldPair, diffuse};
use halo_heat::algs::halo::{HaloReady, exchange_halo};
use halo_heat::data::grid::GridBuffer;
use halo_heat::sim::step;
use halo_heat::topology::cart::CartTopology;

fn seeded(n: usize) -> GridBuffer {
    let samples = (0..n * n).map(|i| ((i * 7919) % 1000) as f64).collect();
    GridBuffer::from_samples(n, n, samples)
        .and_then(|g| g.with_padding(1))
        .unwrap()
}

// 1) stencil alone, halo assumed valid
fn bench_stencil(c: &mut Criterion) {
    let kernel = DiffusionKernel::default();
    let mut group = c.benchmark_group("stencil");
    for &n in &[64usize, 256, 1024] {
        let cur = seeded(n);
        let mut next = GridBuffer::new(n, n, 1).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                diffuse(&kernel, HaloReady::assume_valid(&cur, 0), &mut next).unwrap();
                black_box(next.get(0, 0))
            })
        });
    }
    group.finish();
}

// 2) self-wrapping halo exchange on one rank
fn bench_exchange(c: &mut Criterion) {
    let comm = LocalComm::universe(1).remove(0);
    let topo = CartTopology::new(1, 1, 1, 0).unwrap();
    let mut group = c.benchmark_group("halo_exchange");
    for &n in &[64usize, 256, 1024] {
        let mut grid = seeded(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            let mut it = 0;
            b.iter(|| {
                let ready = exchange_halo(&comm, &topo, &mut grid, it).unwrap();
                it += 1;
                black_box(ready.iteration())
            })
        });
    }
    group.finish();
}

// 3) full clamp / exchange / diffuse / swap step
fn bench_step(c: &mut Criterion) {
    let comm = LocalComm::universe(1).remove(0);
    let topo = CartTopology::new(1, 1, 1, 0).unwrap();
    let kernel = DiffusionKernel::default();
    let source = seeded(256);
    let mut pair = FieldPair::new(source.clone());
    let mut it = 0;
    c.bench_function("step_256", |b| {
        b.iter(|| {
            step(&comm, &topo, &kernel, &source, &mut pair, it, false).unwrap();
            it += 1;
        })
    });
}

criterion_group!(benches, bench_stencil, bench_exchange, bench_step);
criterion_main!(benches);
