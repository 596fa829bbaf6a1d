//! # Compile Benchmark
//!
//! Measures one frame of the compile-submit cycle for:
//! 1. A full structural pass over a fresh scene
//! 2. A branch-scoped pass after one subtree is replaced
//! 3. A value-only frame (re-submission of the retained list)

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use strata::prelude::*;
use strata_dev_utils::RecordingBackend;

fn leaf() -> NodeDesc {
    NodeDesc::geometry(GeometryState::triangles(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
}

/// `groups` material branches with `per_group` geometry leaves each.
fn build_scene(groups: usize, per_group: usize) -> (Scene, Vec<NodeId>) {
    let mut scene = Scene::new();
    let root = scene.root();
    let mut materials = Vec::with_capacity(groups);
    for g in 0..groups {
        let tint = g as f32 / groups as f32;
        let desc = NodeDesc::translate(Vec3::new(g as f32, 0.0, 0.0)).with_child(
            NodeDesc::material(MaterialState::default().with_color(Vec3::new(tint, 0.5, 1.0 - tint)))
                .with_children((0..per_group).map(|_| leaf())),
        );
        let id = scene.add_node(root, desc).expect("root accepts children");
        materials.push(id);
    }
    (scene, materials)
}

fn bench_full_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_full");
    for groups in [10, 100, 500] {
        group.bench_with_input(BenchmarkId::new("groups", groups), &groups, |b, &groups| {
            b.iter_batched(
                || build_scene(groups, 8).0,
                |mut scene| {
                    let mut renderer = Renderer::new(RecordingBackend::new());
                    black_box(renderer.render_frame(&mut scene).expect("frame"));
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_incremental_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_incremental");
    for groups in [10, 100, 500] {
        let (mut scene, branches) = build_scene(groups, 8);
        let mut renderer = Renderer::new(RecordingBackend::new());
        renderer.render_frame(&mut scene).expect("frame");
        let target = branches[groups / 2];

        group.bench_with_input(BenchmarkId::new("groups", groups), &groups, |b, _| {
            b.iter(|| {
                let added = scene.add_node(target, leaf()).expect("branch accepts children");
                renderer.backend_mut().clear();
                black_box(renderer.render_frame(&mut scene).expect("frame"));
                scene.remove_node(added).expect("node is live");
                renderer.render_frame(&mut scene).expect("frame");
            });
        });
    }
    group.finish();
}

fn bench_resubmit(c: &mut Criterion) {
    let (mut scene, _) = build_scene(100, 8);
    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).expect("frame");

    c.bench_function("resubmit_clean_800", |b| {
        b.iter(|| {
            renderer.backend_mut().clear();
            black_box(renderer.render_frame(&mut scene).expect("frame"));
        });
    });
}

criterion_group!(benches, bench_full_compile, bench_incremental_compile, bench_resubmit);
criterion_main!(benches);
