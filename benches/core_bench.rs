//! Benchmarks for phaseplan core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use phaseplan::core::planner::linearize;
use phaseplan::core::types::Policy;
use phaseplan::{
    aggregated_action, bash_action, with_scope, ActionDecl, Precedence, Session, TreePlanStore,
};
use serde_json::json;

fn body(args: &[serde_json::Value]) -> Result<String, String> {
    Ok(format!("run {}", args.len()))
}

fn schedule_n(n: usize) -> Session {
    let pkg = aggregated_action(ActionDecl::new("pkg").params(["name"]), body).unwrap();
    let cfg = bash_action(
        ActionDecl::new("cfg")
            .params(["path"])
            .relation("always-after", ["pkg"]),
        body,
    )
    .unwrap();
    let mut s = Session::new(TreePlanStore::new()).for_target("bench", "node");
    for i in 0..n {
        s = pkg.invoke(s, vec![json!(format!("p{}", i % 16))]).unwrap();
        s = with_scope(s, |s| cfg.invoke(s, vec![json!(i)])).unwrap();
    }
    s
}

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule");
    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(schedule_n(n)));
        });
    }
    group.finish();
}

fn bench_linearize(c: &mut Criterion) {
    let mut group = c.benchmark_group("linearize");
    for n in [10, 100, 1000] {
        let s = schedule_n(n);
        let path = s.target_path().unwrap();
        let root = s.store().root(&path).unwrap().clone();
        group.bench_with_input(BenchmarkId::from_parameter(n), &root, |b, root| {
            b.iter(|| black_box(linearize(&path, root, &Policy::default()).unwrap()));
        });
    }
    group.finish();
}

fn bench_precedence_merge(c: &mut Criterion) {
    let a = (0..64).fold(Precedence::new(), |p, i| p.with("always-before", [format!("a{}", i)]));
    let b = (0..64).fold(Precedence::new(), |p, i| p.with("always-after", [format!("b{}", i)]));
    c.bench_function("precedence_merge_64", |bench| {
        bench.iter(|| black_box(a.merge(black_box(&b))));
    });
}

criterion_group!(benches, bench_schedule, bench_linearize, bench_precedence_merge);
criterion_main!(benches);
