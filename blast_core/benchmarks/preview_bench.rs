use blast_core::{
    plan_explosion, BreakChanceCurve, ExplosionCatalog, ExplosionConfig, ExplosionContext,
    ExplosionParams, Grid, TileKind, TileWorld,
};
use blast_proto::{GridId, MapCoordinates, MapId, SpaceTransform};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_break_chance(c: &mut Criterion) {
    let curve = BreakChanceCurve::new(
        vec![0.0, 5.0, 10.0, 20.0, 40.0, 80.0],
        vec![0.0, 0.1, 0.3, 0.6, 0.9, 1.0],
    );
    c.bench_function("break_chance/evaluate", |b| {
        b.iter(|| {
            let mut total = 0.0f32;
            for step in 0..100 {
                total += curve.evaluate(black_box(step as f32));
            }
            total
        })
    });
}

fn bench_dry_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("dry_run");
    let catalog = ExplosionCatalog::builtin();
    let config = ExplosionConfig::default();

    for size in [16u32, 32, 64] {
        let mut world = TileWorld::new();
        world.insert_grid(
            GridId(1),
            Grid::station(MapId(1), SpaceTransform::IDENTITY, size, size, TileKind::Floor),
        );
        let centre = size as f32 / 2.0;
        let params = ExplosionParams::new(
            MapCoordinates::new(MapId(1), centre, centre),
            (size * size) as f32 * 4.0,
            5.0,
            100.0,
        );
        group.bench_with_input(BenchmarkId::new("station", size), &params, |b, params| {
            let ctx = ExplosionContext::new(&world, &catalog, &config);
            b.iter(|| plan_explosion(&ctx, "Default", params))
        });
    }

    group.finish();
}

criterion_group!(preview_benches, bench_break_chance, bench_dry_run);
criterion_main!(preview_benches);
