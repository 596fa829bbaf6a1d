//! Frame driver.
//!
//! [`Renderer::render_frame`] runs one compile-submit cycle:
//!
//! 1. Drain asset completions (`Scene::begin_compile`), emit `CompileBegin`.
//! 2. Do the cheapest sufficient work for the pending dirt:
//!    - `DrawList`: traverse (full or branch-scoped), reconcile, sort;
//!    - `StateSort`: re-key retained entries from current core hashes, sort;
//!    - `Image` / clean: nothing, the retained list is re-submitted.
//! 3. Submit: allocate cores lazily, bind a category only when its bound
//!    state id changes, draw.
//! 4. Free retired GPU handles, commit the pass, emit `CompileEnd`.
//!
//! A structural error aborts before anything is submitted: the previous
//! display list stays in place, pending dirt is kept and the next pass is a
//! full one.

use glam::Mat4;
use strata_core::{
    Category, CategoryMask, CompileSettings, CoreKey, DirtyKind, GpuHandle, Result, SceneEvent, SceneId,
    StructuralError,
};
use strata_core::settings::MAX_SUPPORTED_DEPTH;
use strata_scene::{CoreRegistry, GpuSlot, Scene};

use crate::backend::{BindTracker, DrawCall, RenderBackend};
use crate::compiler::{CompileStats, Compiler};
use crate::display_list::{DisplayList, DrawSink};
use crate::pick::{PickList, PickSink};

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Dirt the frame resolved.
    pub pass: DirtyKind,
    /// Structural pass walked the whole tree.
    pub full: bool,
    pub visited: usize,
    pub entries: usize,
    pub draws: usize,
    pub binds: usize,
    pub skipped_binds: usize,
    pub allocations: usize,
    pub released: usize,
    pub assets_applied: usize,
}

pub struct Renderer<B: RenderBackend> {
    backend: B,
    compiler: Compiler,
    list: DisplayList,
    /// Scene and reset epoch the retained list belongs to.
    owner: Option<(SceneId, u64)>,
    frame: u64,
}

impl<B: RenderBackend> Renderer<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            compiler: Compiler::new(CompileSettings::default()),
            list: DisplayList::new(),
            owner: None,
            frame: 0,
        }
    }

    pub fn with_settings(backend: B, settings: CompileSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            compiler: Compiler::new(settings),
            ..Self::new(backend)
        })
    }

    #[inline]
    #[must_use]
    pub fn display_list(&self) -> &DisplayList {
        &self.list
    }

    #[inline]
    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CompileSettings {
        self.compiler.settings()
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> B {
        self.backend
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Compiles what changed in `scene` and submits the display list.
    pub fn render_frame(&mut self, scene: &mut Scene) -> Result<FrameStats> {
        self.frame += 1;
        let mut stats = FrameStats {
            frame: self.frame,
            ..FrameStats::default()
        };

        let owner = (scene.id(), scene.epoch());
        let rebind = self.owner != Some(owner);
        if rebind {
            if self.owner.is_some() {
                log::debug!("Scene {} (epoch {}) takes over the display list", owner.0, owner.1);
            }
            self.list.clear();
            self.owner = Some(owner);
        }

        stats.assets_applied = scene.begin_compile();
        let scene_id = scene.id();
        scene.emit(SceneEvent::CompileBegin { scene: scene_id });

        stats.pass = if rebind { DirtyKind::DrawList } else { scene.dirty_level() };
        let visited = match stats.pass {
            DirtyKind::DrawList => {
                let full = rebind || scene.needs_full_compile() || !self.settings().incremental;
                match self.rebuild(scene, full) {
                    Ok(compiled) => {
                        stats.full = full;
                        compiled.visited
                    }
                    Err(error) => {
                        log::error!("Compile pass aborted: {error}");
                        scene.abort_compile();
                        scene.emit(SceneEvent::CompileEnd {
                            scene: scene_id,
                            success: false,
                        });
                        return Err(error.into());
                    }
                }
            }
            DirtyKind::StateSort => {
                self.list.rekey(scene.registry());
                if self.settings().state_sort {
                    self.list.sort_by_state_key();
                }
                Vec::new()
            }
            DirtyKind::Image | DirtyKind::Clean => Vec::new(),
        };
        stats.visited = visited.len();
        stats.entries = self.list.len();

        self.submit(scene.registry_mut(), &mut stats);

        for handle in scene.registry_mut().drain_retired() {
            self.backend.release(handle);
            stats.released += 1;
        }

        scene.commit_compile(&visited);
        scene.emit(SceneEvent::CompileEnd {
            scene: scene_id,
            success: true,
        });
        Ok(stats)
    }

    fn rebuild(&mut self, scene: &mut Scene, full: bool) -> std::result::Result<CompileStats, StructuralError> {
        let mut sink = DrawSink::new();
        let (nodes, registry) = scene.parts_mut();
        let compiled = self.compiler.compile(nodes, registry, &mut sink, full)?;

        self.list.reconcile(nodes, sink.into_entries(), full);
        if !full {
            // Retained entries may predate a pending re-sort.
            self.list.rekey(registry);
        }
        if self.settings().state_sort {
            self.list.sort_by_state_key();
        }
        Ok(compiled)
    }

    /// Full pick pass. Leaves dirt and the display list untouched.
    pub fn pick_list(&mut self, scene: &mut Scene) -> Result<PickList> {
        let mut sink = PickSink::new();
        let (nodes, registry) = scene.parts_mut();
        self.compiler.compile(nodes, registry, &mut sink, true)?;
        Ok(sink.finish())
    }

    // ========================================================================
    // Submission
    // ========================================================================

    fn submit(&mut self, registry: &mut CoreRegistry, stats: &mut FrameStats) {
        let dedup = self.settings().dedup_binds;
        let Self { backend, list, .. } = self;
        let mut tracker = BindTracker::default();

        backend.begin_frame();
        for entry in list.iter() {
            let mut rebound = CategoryMask::empty();
            for category in Category::STACKED {
                if !category.is_bound() {
                    continue;
                }
                let Some((key, handle)) = resolve_gpu(backend, registry, category, entry.core(category), stats) else {
                    continue;
                };
                let Some(core) = registry.core(key) else {
                    continue;
                };
                if dedup && !tracker.needs_bind(category, core.state_id()) {
                    stats.skipped_binds += 1;
                    continue;
                }
                match backend.bind(category, core, handle) {
                    Ok(()) => {
                        tracker.record(category, core.state_id());
                        rebound |= category.mask();
                        stats.binds += 1;
                    }
                    Err(error) => {
                        log::error!("{error}");
                        tracker.forget(category);
                    }
                }
            }

            let Some((geometry, handle)) = resolve_gpu(backend, registry, Category::Geometry, entry.geometry, stats)
            else {
                log::debug!("{:?} has no drawable geometry this frame", entry.node);
                continue;
            };
            let Some(geometry) = registry.core(geometry) else {
                continue;
            };
            let call = DrawCall {
                node: entry.node,
                geometry,
                handle,
                world: world_matrix(registry, entry.core(Category::Xform)),
                key: entry.key,
                rebound,
            };
            match backend.draw(&call) {
                Ok(()) => stats.draws += 1,
                Err(error) => log::error!("{error}"),
            }
        }
        backend.end_frame();
    }
}

/// Core to bind for `key` and its GPU handle, allocating on first use.
/// Unresolvable cores (awaiting an asset, failed) are replaced by the
/// category's default core.
fn resolve_gpu<B: RenderBackend>(
    backend: &mut B,
    registry: &mut CoreRegistry,
    category: Category,
    key: CoreKey,
    stats: &mut FrameStats,
) -> Option<(CoreKey, GpuHandle)> {
    let default = registry.default_core(category);
    let candidates = if key == default { [Some(key), None] } else { [Some(key), Some(default)] };

    for candidate in candidates.into_iter().flatten() {
        let Some(core) = registry.core(candidate) else {
            continue;
        };
        match core.gpu() {
            GpuSlot::Ready(handle) => return Some((candidate, *handle)),
            GpuSlot::Unallocated => match backend.allocate(core) {
                Ok(handle) => {
                    registry.set_gpu(candidate, GpuSlot::Ready(handle));
                    stats.allocations += 1;
                    return Some((candidate, handle));
                }
                Err(error) => {
                    log::error!("{category} core allocation failed: {error}");
                    registry.set_gpu(candidate, GpuSlot::Failed(error.to_string()));
                }
            },
            GpuSlot::Awaiting | GpuSlot::Failed(_) => {}
        }
    }
    None
}

/// Product of the transform chain ending at `key`.
fn world_matrix(registry: &CoreRegistry, key: CoreKey) -> Mat4 {
    let mut world = Mat4::IDENTITY;
    let mut cursor = Some(key);
    let mut links = 0;
    while let Some(current) = cursor {
        let Some(xform) = registry.core(current).and_then(|core| core.data().as_xform()) else {
            break;
        };
        world = xform.local_matrix() * world;
        cursor = xform.parent;
        links += 1;
        if links > MAX_SUPPORTED_DEPTH {
            log::warn!("Transform chain of {key:?} does not terminate");
            break;
        }
    }
    world
}

impl<B: RenderBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("frame", &self.frame)
            .field("entries", &self.list.len())
            .field("settings", self.compiler.settings())
            .finish_non_exhaustive()
    }
}
