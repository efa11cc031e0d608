use criterion::*;

use memflow_kcore::{size, Address, ArchitectureIdent, VirtualMemory};

use rand::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng as CurRng;

use crate::{dummy_session, KERNEL_BASE};

const MAPPED: usize = size::mb(4);

fn read_test(bench: &mut Bencher, ident: ArchitectureIdent, chunk_size: usize) {
    let mut rng = CurRng::from_rng(thread_rng()).unwrap();
    let mut session = dummy_session(ident, MAPPED);

    let mut buf = vec![0u8; chunk_size];
    let span = (MAPPED - chunk_size) as u64;

    bench.iter(|| {
        let addr = Address::from(KERNEL_BASE + rng.gen_range(0, span));
        let _ = black_box(session.virt_read_raw_into(addr, buf.as_mut_slice()));
    });
}

pub fn seq_read(c: &mut Criterion, ident: ArchitectureIdent) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);

    let mut group = c.benchmark_group(format!("{}_virt_seq_read", ident.as_str()));
    group.plot_config(plot_config);

    for &size in [0x8, 0x10, 0x100, 0x1000, 0x10000].iter() {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new(ident.as_str(), size),
            &size,
            |b, &size| read_test(b, ident, size),
        );
    }
}
