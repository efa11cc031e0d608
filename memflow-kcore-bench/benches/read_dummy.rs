extern crate memflow_kcore_bench;
use memflow_kcore_bench::*;

use criterion::*;

use memflow_kcore::ArchitectureIdent;

fn dummy_read_group(c: &mut Criterion) {
    for &ident in [ArchitectureIdent::I386, ArchitectureIdent::M68k].iter() {
        virt::seq_read(c, ident);
        vat::chunk_vat(c, ident);
    }
}

criterion_group! {
    name = dummy_read;
    config = Criterion::default()
        .warm_up_time(std::time::Duration::from_millis(300))
        .measurement_time(std::time::Duration::from_millis(2700));
    targets = dummy_read_group
}

criterion_main!(dummy_read);
