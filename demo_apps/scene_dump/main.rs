//! Scene Dump
//!
//! Builds a scene from a JSON description (first argument, or a built-in
//! sample), renders it into a recording backend and prints each frame's
//! display list as JSON. After the first frame it applies a few edits to show
//! which rebuild each one costs.
//!
//! ```text
//! RUST_LOG=debug cargo run -p scene_dump -- scene.json
//! ```

use anyhow::Context;
use serde_json::{Value, json};
use strata::prelude::*;
use strata::render::FrameStats;
use strata_dev_utils::RecordingBackend;

type Edit = fn(&mut Scene, NodeId) -> strata::Result<()>;

const SAMPLE_SCENE: &str = r#"{
  "type": "node",
  "sid": "world",
  "nodes": [
    {
      "type": "lights",
      "lights": [
        { "mode": "ambient", "color": { "r": 0.2, "g": 0.2, "b": 0.2 } },
        { "mode": "dir", "color": { "r": 1.0, "g": 1.0, "b": 1.0 }, "dir": { "x": -0.5, "y": -1.0, "z": -1.0 } }
      ],
      "nodes": [
        {
          "type": "material", "sid": "red", "coreId": "red-paint",
          "color": { "r": 1.0, "g": 0.1, "b": 0.1 },
          "nodes": [
            { "type": "translate", "sid": "left", "x": -2.0,
              "nodes": [{ "type": "geometry", "sid": "box", "positions": [0,0,0, 1,0,0, 0,1,0] }] },
            { "type": "translate", "sid": "right", "x": 2.0,
              "nodes": [{ "type": "geometry", "sid": "box", "positions": [0,0,0, 1,0,0, 0,1,0] }] }
          ]
        },
        {
          "type": "flags", "sid": "glass", "flags": { "transparent": true },
          "nodes": [
            { "type": "material", "alpha": 0.4,
              "nodes": [{ "type": "geometry", "sid": "pane", "positions": [0,0,0, 1,0,0, 0,1,0] }] }
          ]
        }
      ]
    }
  ]
}"#;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => SAMPLE_SCENE.to_string(),
    };
    let desc = NodeDesc::from_json(&source).context("parsing scene description")?;
    log::info!("Scene description with {} nodes", desc.count());

    let mut scene = Scene::new();
    let root = scene.root();
    scene.add_node(root, desc)?;

    let mut renderer = Renderer::new(RecordingBackend::new());
    let stats = renderer.render_frame(&mut scene)?;
    print_frame("initial", &scene, &renderer, &stats)?;

    // Paths of the sample scene; a custom description may not have them.
    let edits: [(&str, &str, Edit); 3] = [
        ("recolour", "world/red", |scene, id| {
            scene.node(id).set_color(Vec3::new(0.1, 0.1, 1.0));
            Ok(())
        }),
        ("make opaque", "world/glass", |scene, id| {
            scene.node(id).set_transparent(false);
            Ok(())
        }),
        ("remove", "world/red/right", Scene::remove_node),
    ];
    for (label, path, edit) in edits {
        let Some(id) = scene.find_by_path(path) else {
            log::warn!("'{path}' not found; skipping '{label}'");
            continue;
        };
        edit(&mut scene, id)?;
        renderer.backend_mut().clear();
        let stats = renderer.render_frame(&mut scene)?;
        print_frame(label, &scene, &renderer, &stats)?;
    }
    Ok(())
}

fn print_frame(label: &str, scene: &Scene, renderer: &Renderer<RecordingBackend>, stats: &FrameStats) -> anyhow::Result<()> {
    let entries: Vec<Value> = renderer
        .display_list()
        .iter()
        .map(|entry| {
            let node = scene.get_node(entry.node);
            json!({
                "node": format!("{:?}", entry.node),
                "sid": node.and_then(|n| n.sid()),
                "key": format!("{:016x}", entry.key.bits()),
                "transparent": entry.is_transparent(),
                "order": entry.order,
            })
        })
        .collect();

    let dump = json!({
        "frame": stats.frame,
        "edit": label,
        "pass": stats.pass,
        "full": stats.full,
        "visited": stats.visited,
        "draws": stats.draws,
        "binds": stats.binds,
        "skippedBinds": stats.skipped_binds,
        "allocations": stats.allocations,
        "released": stats.released,
        "stateRuns": renderer.display_list().state_runs(),
        "entries": entries,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
