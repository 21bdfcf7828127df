use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lathe_booleans::{perform, BooleanOp, PaveFiller, RunSettings};
use lathe_math::Point3;
use lathe_primitives::{make_box, make_sphere, translate_solid};
use lathe_topo::BrepSolid;

fn offset_boxes() -> (BrepSolid, BrepSolid) {
    let a = make_box(1.0, 1.0, 1.0);
    let b = translate_solid(&make_box(1.0, 1.0, 1.0), 0.5, 0.5, 0.0);
    (a, b)
}

fn box_and_sphere() -> (BrepSolid, BrepSolid) {
    let a = make_box(1.0, 1.0, 1.0);
    let b = make_sphere(Point3::new(0.5, 0.5, 1.0), 0.5);
    (a, b)
}

fn bench_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("perform");
    let settings = RunSettings::default();
    for op in [
        BooleanOp::Common,
        BooleanOp::Fuse,
        BooleanOp::Cut,
        BooleanOp::Section,
    ] {
        group.bench_with_input(
            BenchmarkId::new("offset_boxes", format!("{op:?}")),
            &op,
            |bench, &op| {
                let (a, b) = offset_boxes();
                bench.iter(|| perform(&[&a, &b], op, &settings).unwrap());
            },
        );
    }
    group.bench_function("box_sphere/Fuse", |bench| {
        let (a, b) = box_and_sphere();
        bench.iter(|| perform(&[&a, &b], BooleanOp::Fuse, &settings).unwrap());
    });
    group.finish();
}

fn bench_filler_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("pave_filler");
    for parallel in [false, true] {
        let label = if parallel { "parallel" } else { "serial" };
        group.bench_function(BenchmarkId::new("offset_boxes", label), |bench| {
            let (a, b) = offset_boxes();
            let settings = RunSettings {
                run_parallel: parallel,
                ..RunSettings::default()
            };
            bench.iter(|| PaveFiller::run(&[&a, &b], settings.clone()).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_operations, bench_filler_dispatch);
criterion_main!(benches);
