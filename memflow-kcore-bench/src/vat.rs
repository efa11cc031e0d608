use criterion::*;

use memflow_kcore::{size, Address, ArchitectureIdent};

use rand::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng as CurRng;

use crate::{dummy_session, KERNEL_BASE};

const MAPPED: usize = size::mb(4);

fn vat_test(bench: &mut Bencher, ident: ArchitectureIdent, chunk_count: usize) {
    let mut rng = CurRng::from_rng(thread_rng()).unwrap();
    let mut session = dummy_session(ident, MAPPED);

    let addrs = (0..chunk_count)
        .map(|_| Address::from(KERNEL_BASE + rng.gen_range(0, MAPPED as u64)))
        .collect::<Vec<_>>();

    bench.iter(|| {
        for &addr in addrs.iter() {
            let _ = black_box(session.translate(addr));
        }
    });
}

fn chunk_vat_params(
    group: &mut BenchmarkGroup<'_, measurement::WallTime>,
    ident: ArchitectureIdent,
) {
    for &chunks in [1, 4, 16, 64].iter() {
        group.throughput(Throughput::Elements(chunks as u64));
        group.bench_with_input(
            BenchmarkId::new(ident.as_str(), chunks),
            &chunks,
            |b, &chunks| vat_test(b, ident, chunks),
        );
    }
}

pub fn chunk_vat(c: &mut Criterion, ident: ArchitectureIdent) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);

    let mut group = c.benchmark_group(format!("{}_chunk_vat", ident.as_str()));
    group.plot_config(plot_config);

    chunk_vat_params(&mut group, ident);
}
