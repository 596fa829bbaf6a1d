//! Compile Integration Tests
//!
//! Tests for:
//! - State inheritance: nearest enclosing core wins, siblings never leak
//! - Default fallback for uncovered categories and configuration errors
//! - Stack balance after successful and failed passes
//! - Idempotent recompilation and incremental/full equivalence
//! - Disabled subtrees and transparency ordering
//! - Layer priorities and disabled layers

use strata::DisplayList;
use strata::prelude::*;
use strata_dev_utils::RecordingBackend;

fn leaf() -> NodeDesc {
    NodeDesc::geometry(GeometryState::triangles(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
}

fn red() -> MaterialState {
    MaterialState::default().with_color(Vec3::new(1.0, 0.0, 0.0))
}

fn renderer() -> Renderer<RecordingBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    Renderer::new(RecordingBackend::new())
}

fn nodes_in_list(list: &DisplayList) -> Vec<NodeId> {
    list.iter().map(|entry| entry.node).collect()
}

// ============================================================================
// State Inheritance
// ============================================================================

#[test]
fn compile_nearest_core_wins() {
    let mut scene = Scene::new();
    let root = scene.root();
    let outer = scene
        .add_node(
            root,
            NodeDesc::material(red()).with_child(
                NodeDesc::material(MaterialState::default().with_color(Vec3::Z)).with_child(leaf().with_sid("inner")),
            ),
        )
        .unwrap();
    let inner_material = scene.children(outer)[0];
    let geometry = scene.children(inner_material)[0];
    let inner_core = scene.get_node(inner_material).unwrap().core().unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let entry = renderer.display_list().find(geometry).unwrap();
    assert_eq!(entry.core(Category::Material), inner_core);
}

#[test]
fn compile_siblings_do_not_leak_state() {
    let mut scene = Scene::new();
    let root = scene.root();
    let material = scene.add_node(root, NodeDesc::material(red()).with_child(leaf())).unwrap();
    let plain = scene.add_node(root, leaf()).unwrap();
    let red_geometry = scene.children(material)[0];

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let list = renderer.display_list();
    let default = scene.registry().default_core(Category::Material);
    assert_ne!(list.find(red_geometry).unwrap().core(Category::Material), default);
    assert_eq!(list.find(plain).unwrap().core(Category::Material), default);
}

#[test]
fn compile_uncovered_categories_use_defaults() {
    let mut scene = Scene::new();
    let root = scene.root();
    let geometry = scene.add_node(root, leaf()).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let entry = renderer.display_list().find(geometry).unwrap();
    for category in Category::STACKED {
        assert_eq!(entry.core(category), scene.registry().default_core(category), "{category}");
    }
}

#[test]
fn compile_config_error_falls_back_to_default() {
    let mut scene = Scene::new();
    let root = scene.root();
    let broken = scene
        .add_node(
            root,
            NodeDesc::of_type("material", serde_json::json!({ "alpha": 7.0 })).with_child(leaf()),
        )
        .unwrap();
    let geometry = scene.children(broken)[0];
    assert!(scene.get_node(broken).unwrap().config_error().is_some());

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let entry = renderer.display_list().find(geometry).unwrap();
    assert_eq!(entry.core(Category::Material), scene.registry().default_core(Category::Material));
}

#[test]
fn compile_broken_geometry_emits_nothing() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene
        .add_node(root, NodeDesc::of_type("geometry", serde_json::json!({ "primitive": "hexagons" })))
        .unwrap();
    scene.add_node(root, leaf()).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(renderer.display_list().len(), 1);
}

#[test]
fn compile_unknown_type_acts_as_group() {
    let mut scene = Scene::new();
    let root = scene.root();
    let group = scene
        .add_node(root, NodeDesc::of_type("sparkles", serde_json::json!({})).with_child(leaf()))
        .unwrap();
    let geometry = scene.children(group)[0];

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![geometry]);
}

// ============================================================================
// Stack Balance & Failures
// ============================================================================

#[test]
fn compile_leaves_stacks_balanced() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene
        .add_node(
            root,
            NodeDesc::translate(Vec3::X).with_child(
                NodeDesc::material(red())
                    .with_child(NodeDesc::flags(FlagsState::transparent()).with_child(leaf()))
                    .with_child(leaf()),
            ),
        )
        .unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert!(renderer.compiler().last_balance().is_balanced());
}

#[test]
fn compile_failed_pass_keeps_previous_list() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, leaf()).unwrap();

    let settings = CompileSettings {
        max_depth: 4,
        ..CompileSettings::default()
    };
    let mut renderer = Renderer::with_settings(RecordingBackend::new(), settings).unwrap();
    renderer.render_frame(&mut scene).unwrap();
    let before = renderer.display_list().clone();

    let mut parent = root;
    for _ in 0..6 {
        parent = scene.add_node(parent, NodeDesc::material(red())).unwrap();
    }
    scene.add_node(parent, leaf()).unwrap();
    let chain = scene.children(root)[1];

    let err = renderer.render_frame(&mut scene).unwrap_err();
    assert!(matches!(err, StrataError::Structural(_)));
    assert_eq!(renderer.display_list().entries(), before.entries());
    assert!(renderer.compiler().last_balance().is_balanced());
    assert_eq!(scene.dirty_level(), DirtyKind::DrawList);
    assert!(scene.needs_full_compile());

    scene.remove_node(chain).unwrap();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert!(stats.full);
    assert_eq!(renderer.display_list().len(), 1);
    assert_eq!(scene.dirty_level(), DirtyKind::Clean);
}

#[test]
fn compile_invalid_settings_are_rejected() {
    let settings = CompileSettings {
        max_depth: 0,
        ..CompileSettings::default()
    };
    let err = Renderer::with_settings(RecordingBackend::new(), settings).unwrap_err();
    assert!(matches!(err, StrataError::InvalidSettings(_)));
}

// ============================================================================
// Idempotence & Incremental Equivalence
// ============================================================================

#[test]
fn compile_rebuild_is_idempotent() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene
        .add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf()]))
        .unwrap();
    scene.add_node(root, NodeDesc::flags(FlagsState::transparent()).with_child(leaf())).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    let first = renderer.display_list().clone();

    scene.mark_structure_dirty(root);
    scene.abort_compile();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert!(stats.full);
    assert_eq!(renderer.display_list().entries(), first.entries());
}

#[test]
fn compile_incremental_matches_full() {
    let mut scene = Scene::new();
    let root = scene.root();
    let left = scene
        .add_node(root, NodeDesc::material(red()).with_children([leaf(), leaf()]))
        .unwrap();
    scene
        .add_node(root, NodeDesc::flags(FlagsState::transparent()).with_child(leaf()))
        .unwrap();
    let right = scene.add_node(root, NodeDesc::translate(Vec3::Y).with_child(leaf())).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    scene.add_node(left, leaf()).unwrap();
    scene.insert_node(right, 0, NodeDesc::material(MaterialState::default()).with_child(leaf())).unwrap();
    let stats = renderer.render_frame(&mut scene).unwrap();
    assert!(!stats.full);
    let incremental = renderer.display_list().clone();

    let mut fresh = self::renderer();
    let stats = fresh.render_frame(&mut scene).unwrap();
    assert!(stats.full);
    assert_eq!(incremental.entries(), fresh.display_list().entries());
    assert_eq!(incremental.len(), 6);
}

// ============================================================================
// Flags
// ============================================================================

#[test]
fn compile_disabled_subtree_emits_nothing() {
    let mut scene = Scene::new();
    let root = scene.root();
    scene
        .add_node(root, NodeDesc::flags(FlagsState::disabled()).with_children([leaf(), leaf()]))
        .unwrap();
    let visible = scene.add_node(root, leaf()).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![visible]);
}

#[test]
fn compile_nested_flags_reenable() {
    let mut scene = Scene::new();
    let root = scene.root();
    let off = scene
        .add_node(
            root,
            NodeDesc::flags(FlagsState::disabled()).with_child(NodeDesc::flags(FlagsState::default()).with_child(leaf())),
        )
        .unwrap();
    let on = scene.children(off)[0];
    let geometry = scene.children(on)[0];

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![geometry]);
}

#[test]
fn compile_transparent_entries_sort_last() {
    let mut scene = Scene::new();
    let root = scene.root();
    let glass = scene
        .add_node(root, NodeDesc::flags(FlagsState::transparent()).with_child(leaf()))
        .unwrap();
    let glass_geometry = scene.children(glass)[0];
    let solid = scene.add_node(root, leaf()).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let list = renderer.display_list();
    assert!(list.is_sorted());
    assert_eq!(nodes_in_list(list), vec![solid, glass_geometry]);
    assert!(!list.entries()[0].is_transparent());
    assert!(list.entries()[1].is_transparent());
}

#[test]
fn compile_without_state_sort_keeps_tree_order() {
    let mut scene = Scene::new();
    let root = scene.root();
    let glass = scene
        .add_node(root, NodeDesc::flags(FlagsState::transparent()).with_child(leaf()))
        .unwrap();
    let glass_geometry = scene.children(glass)[0];
    let solid = scene.add_node(root, leaf()).unwrap();

    let settings = CompileSettings {
        state_sort: false,
        ..CompileSettings::default()
    };
    let mut renderer = Renderer::with_settings(RecordingBackend::new(), settings).unwrap();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![glass_geometry, solid]);
}

#[test]
fn compile_equal_keys_keep_traversal_order() {
    let mut scene = Scene::new();
    let root = scene.root();
    let ids: Vec<NodeId> = (0..4).map(|_| scene.add_node(root, leaf()).unwrap()).collect();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();

    let list = renderer.display_list();
    assert_eq!(nodes_in_list(list), ids);
    assert_eq!(list.state_runs(), vec![4]);
}

// ============================================================================
// Layers
// ============================================================================

#[test]
fn compile_layers_order_by_priority() {
    let mut scene = Scene::new();
    let root = scene.root();
    let front = scene
        .add_node(root, NodeDesc::layer(LayerState::with_priority(1)).with_child(leaf()))
        .unwrap();
    let plain = scene.add_node(root, leaf()).unwrap();
    let back = scene
        .add_node(root, NodeDesc::layer(LayerState::with_priority(-1)).with_child(leaf()))
        .unwrap();
    let front_geometry = scene.children(front)[0];
    let back_geometry = scene.children(back)[0];

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(
        nodes_in_list(renderer.display_list()),
        vec![back_geometry, plain, front_geometry]
    );

    let change = scene.node(front).set_layer_priority(-2).last_change();
    assert_eq!(change, Some(DirtyKind::StateSort));
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(
        nodes_in_list(renderer.display_list()),
        vec![front_geometry, back_geometry, plain]
    );
}

#[test]
fn compile_transparency_outranks_layer_priority() {
    let mut scene = Scene::new();
    let root = scene.root();
    let glass = scene
        .add_node(
            root,
            NodeDesc::layer(LayerState::with_priority(-5))
                .with_child(NodeDesc::flags(FlagsState::transparent()).with_child(leaf())),
        )
        .unwrap();
    let glass_flags = scene.children(glass)[0];
    let glass_geometry = scene.children(glass_flags)[0];
    let solid = scene
        .add_node(root, NodeDesc::layer(LayerState::with_priority(5)).with_child(leaf()))
        .unwrap();
    let solid_geometry = scene.children(solid)[0];

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(
        nodes_in_list(renderer.display_list()),
        vec![solid_geometry, glass_geometry]
    );
}

#[test]
fn compile_disabled_layer_emits_nothing() {
    let mut scene = Scene::new();
    let root = scene.root();
    let hidden = LayerState {
        enabled: false,
        ..LayerState::default()
    };
    scene
        .add_node(root, NodeDesc::layer(hidden).with_children([leaf(), leaf()]))
        .unwrap();
    let layer = scene
        .add_node(root, NodeDesc::layer(LayerState::with_priority(3)).with_child(leaf()))
        .unwrap();
    let layer_geometry = scene.children(layer)[0];
    let visible = scene.add_node(root, leaf()).unwrap();

    let mut renderer = renderer();
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![visible, layer_geometry]);

    scene.node(layer).set_layer_enabled(false);
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![visible]);

    scene.node(layer).set_layer_enabled(true);
    renderer.render_frame(&mut scene).unwrap();
    assert_eq!(nodes_in_list(renderer.display_list()), vec![visible, layer_geometry]);
}
