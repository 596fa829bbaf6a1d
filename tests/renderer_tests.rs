//! Renderer Integration Tests
//!
//! Tests for:
//! - Bind deduplication across consecutive entries
//! - Lazy allocation, allocation failure fallback, handle release
//! - Value edits reaching the backend as re-uploads
//! - World matrices from nested transforms
//! - Pick lists
//! - Shared scenes edited from another thread

use glam::Mat4;
use strata::core::{BackendError, GpuHandle};
use strata::prelude::*;
use strata::render::DrawCall;
use strata::scene::{GpuSlot, StateCore};
use strata_dev_utils::{Call, RecordingBackend};

fn leaf() -> NodeDesc {
    NodeDesc::geometry(GeometryState::triangles(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
}

fn red() -> MaterialState {
    MaterialState::default().with_color(Vec3::new(1.0, 0.0, 0.0))
}

/// Backend keeping the world matrix of every draw.
#[derive(Default)]
struct MatrixBackend {
    next: u64,
    worlds: Vec<(NodeId, Mat4)>,
}

impl RenderBackend for MatrixBackend {
    fn allocate(&mut self, _core: &StateCore) -> Result<GpuHandle, BackendError> {
        self.next += 1;
        Ok(GpuHandle(self.next))
    }

    fn release(&mut self, _handle: GpuHandle) {}

    fn bind(&mut self, _category: Category, _core: &StateCore, _handle: GpuHandle) -> Result<(), BackendError> {
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), BackendError> {
        self.worlds.push((call.node, call.world));
        Ok(())
    }
}

// ============================================================================
// Binding
// ============================================================================

#[test]
fn renderer_binds_shared_state_once() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf(), leaf()])).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert_eq!(stats.draws, 3);
    assert_eq!(renderer.backend().binds(Category::Material).len(), 1);
    assert!(stats.skipped_binds > 0);
}

#[test]
fn renderer_without_dedup_binds_every_entry() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf(), leaf()])).unwrap();

    let settings = CompileSettings {
        dedup_binds: false,
        ..CompileSettings::default()
    };
    let mut renderer = Renderer::with_settings(RecordingBackend::new(), settings).unwrap();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert_eq!(renderer.backend().binds(Category::Material).len(), 3);
    assert_eq!(stats.skipped_binds, 0);
}

#[test]
fn renderer_rebinds_when_state_changes() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap();
    scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).unwrap();
    let binds = renderer.backend().binds(Category::Material);
    assert_eq!(binds.len(), 2);
    assert_ne!(binds[0], binds[1]);
}

#[test]
fn renderer_frame_is_bracketed() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, leaf()).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).unwrap();
    let calls = &renderer.backend().calls;
    assert_eq!(calls.first(), Some(&Call::BeginFrame));
    assert_eq!(calls.last(), Some(&Call::EndFrame));
}

// ============================================================================
// Allocation
// ============================================================================

#[test]
fn renderer_allocates_each_core_once() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf()])).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    let first = renderer.render_frame(&mut scene).unwrap();
    assert!(first.allocations > 0);

    let second = renderer.render_frame(&mut scene).unwrap();
    assert_eq!(second.allocations, 0);
    assert_eq!(second.draws, 2);
}

#[test]
fn renderer_failed_allocation_is_recorded() {
    let mut scene = Scene::new();
    let root = scene.root();
    let material = scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap();

    let mut backend = RecordingBackend::new();
    backend.fail_allocation.insert(Category::Material);
    let mut renderer = Renderer::new(backend);
    let stats = renderer.render_frame(&mut scene).unwrap();

    assert_eq!(stats.draws, 1);
    assert!(renderer.backend().binds(Category::Material).is_empty());
    let core = scene.get_node(material).unwrap().core().unwrap();
    assert!(matches!(scene.registry().core(core).unwrap().gpu(), GpuSlot::Failed(_)));
}

#[test]
fn renderer_releases_handles_of_destroyed_cores() {
    let mut scene = Scene::new();
    let root = scene.root();
    let material = scene.add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf()])).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).unwrap();
    let live = renderer.backend().live_handles();

    scene.remove_node(material).unwrap();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert_eq!(stats.released, 3);
    assert_eq!(renderer.backend().releases().len(), 3);
    assert_eq!(renderer.backend().live_handles(), live - 3);
    assert_eq!(stats.draws, 0);
}

// ============================================================================
// Value Edits
// ============================================================================

#[test]
fn renderer_value_edits_refresh_backend_data() {
    let mut scene = Scene::new();
    let root = scene.root();
    let material = scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap();
    let geometry = scene.children(material)[0];
    let material_core = scene.get_node(material).unwrap().core().unwrap();
    let geometry_core = scene.get_node(geometry).unwrap().core().unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).unwrap();
    assert!(renderer.backend().refreshes().is_empty());

    scene.node(material).set_color(Vec3::new(0.0, 1.0, 0.0));
    scene.node(geometry).set_positions(vec![0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0]);
    renderer.backend_mut().clear();
    let stats = renderer.render_frame(&mut scene).unwrap();

    assert_eq!(stats.visited, 0);
    assert_eq!(
        renderer.backend().refreshes(),
        vec![(Category::Material, material_core), (Category::Geometry, geometry_core)]
    );

    // Nothing changed since the last upload.
    renderer.backend_mut().clear();
    renderer.render_frame(&mut scene).unwrap();
    assert!(renderer.backend().refreshes().is_empty());
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn renderer_composes_nested_transforms() {
    let mut scene = Scene::new();
    let root = scene.root();
    let outer = scene
        .add_node(
            root,
            NodeDesc::translate(Vec3::X).with_child(NodeDesc::translate(Vec3::new(0.0, 2.0, 0.0)).with_child(leaf())),
        )
        .unwrap();
    let inner = scene.children(outer)[0];
    let geometry = scene.children(inner)[0];
    let untransformed = scene.add_node(root, leaf()).unwrap();

    let mut renderer = Renderer::new(MatrixBackend::default());
    renderer.render_frame(&mut scene).unwrap();

    let worlds = &renderer.backend().worlds;
    let nested = worlds.iter().find(|(node, _)| *node == geometry).unwrap().1;
    assert!(nested.w_axis.truncate().abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-6));
    let plain = worlds.iter().find(|(node, _)| *node == untransformed).unwrap().1;
    assert_eq!(plain, Mat4::IDENTITY);
}

#[test]
fn renderer_moved_transform_updates_world_without_recompile() {
    let mut scene = Scene::new();
    let root = scene.root();
    let xform = scene.add_node(root, NodeDesc::translate(Vec3::X).with_child(leaf())).unwrap();

    let mut renderer = Renderer::new(MatrixBackend::default());
    renderer.render_frame(&mut scene).unwrap();

    scene.node(xform).set_translation(Vec3::new(0.0, 0.0, 5.0));
    renderer.backend_mut().worlds.clear();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert_eq!(stats.visited, 0);
    let world = renderer.backend().worlds[0].1;
    assert!(world.w_axis.truncate().abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-6));
}

// ============================================================================
// Picking
// ============================================================================

#[test]
fn renderer_pick_list_skips_unpickable() {
    let mut scene = Scene::new();
    let root = scene.root();
    let first = scene.add_node(root, leaf()).unwrap();
    let hidden = scene
        .add_node(root, NodeDesc::flags(FlagsState::default()).with_child(leaf()))
        .unwrap();
    let last = scene.add_node(root, leaf()).unwrap();

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut scene).unwrap();
    scene.node(hidden).set_picking(false);
    let level = scene.dirty_level();

    let picks = renderer.pick_list(&mut scene).unwrap();
    assert_eq!(picks.len(), 2);
    assert_eq!(picks.lookup(picks.entries()[0].color()), Some(first));
    assert_eq!(picks.lookup(picks.entries()[1].color()), Some(last));
    assert_eq!(picks.lookup([0, 0, 0, 255]), None);
    assert_eq!(scene.dirty_level(), level);
    // Picking does not affect drawing.
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(renderer.display_list().len(), 3);
}

// ============================================================================
// Shared Scenes
// ============================================================================

#[test]
fn renderer_shared_scene_edited_from_worker() {
    let shared = Scene::new().into_shared();
    let material = {
        let mut scene = shared.lock();
        let root = scene.root();
        scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap()
    };

    let mut renderer = Renderer::new(RecordingBackend::new());
    renderer.render_frame(&mut shared.lock()).unwrap();

    let worker = std::sync::Arc::clone(&shared);
    std::thread::spawn(move || {
        let mut scene = worker.lock();
        scene.node(material).set_color(Vec3::ZERO);
        let root = scene.root();
        scene.add_node(root, leaf()).unwrap();
    })
    .join()
    .unwrap();

    let stats = renderer.render_frame(&mut shared.lock()).unwrap();
    assert_eq!(stats.pass, DirtyKind::DrawList);
    assert_eq!(stats.entries, 2);
}
