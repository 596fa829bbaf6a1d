//! State Core Registry
//!
//! Owns every [`StateCore`] of a scene and implements sharing by
//! configuration key with reference counting.
//!
//! # Lifecycle
//!
//! ```text
//! acquire(key) ──► exists? ──yes──► use_count += 1
//!                     │
//!                     no ──► build() ──► register, use_count = 1
//!
//! release(core) ──► use_count -= 1 ──► 0? ──► unregister, retire GPU handle
//! ```
//!
//! Default cores (one per category) are created with the registry, pinned,
//! and never released. Acquiring never allocates GPU resources; the renderer
//! does that lazily the first time an emitted entry references a core.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use strata_core::{
    Category, ConfigError, CoreKey, CoreVersion, EditGuard, GpuHandle, STACKED_CATEGORY_COUNT, StateIdAllocator,
};

use crate::cores::{ConfigKey, CoreData, GpuSlot, ImageData, StateCore, XformState};

/// Outcome of [`CoreRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Still referenced by this many users.
    Decremented(u32),
    /// Last reference dropped; the core is gone.
    Destroyed,
    /// Dead, default or already fully released core. Nothing happened.
    Ignored,
}

/// Result of a value mutation through [`CoreRegistry::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashChange {
    pub before: u64,
    pub after: u64,
}

impl HashChange {
    #[inline]
    #[must_use]
    pub fn changed(self) -> bool {
        self.before != self.after
    }
}

/// Per-scene registry of state cores.
pub struct CoreRegistry {
    cores: SlotMap<CoreKey, StateCore>,
    shared: FxHashMap<(Category, ConfigKey), CoreKey>,
    defaults: [CoreKey; STACKED_CATEGORY_COUNT + 1],
    ids: StateIdAllocator,
    retired: Vec<GpuHandle>,
    contract_violations: u64,
}

impl Default for CoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut cores = SlotMap::with_key();
        let mut ids = StateIdAllocator::new();
        let defaults = Category::ALL.map(|category| {
            let data = CoreData::default_for(category);
            let hash = data.binding_hash();
            let state_id = ids.allocate();
            cores.insert_with_key(|key| StateCore {
                key,
                category,
                state_id,
                config_key: None,
                data,
                hash,
                use_count: 1,
                version: CoreVersion::default(),
                gpu: GpuSlot::Unallocated,
                pinned: true,
            })
        });
        Self {
            cores,
            shared: FxHashMap::default(),
            defaults,
            ids,
            retired: Vec::new(),
            contract_violations: 0,
        }
    }

    // ========================================================================
    // Acquire / release
    // ========================================================================

    /// Returns the core registered under (`category`, `key`) with its use
    /// count bumped, or builds and registers a new one.
    ///
    /// `key == None` never shares. `build` runs only when nothing is
    /// registered yet; its payload must belong to `category`.
    pub fn acquire(
        &mut self,
        category: Category,
        key: Option<ConfigKey>,
        build: impl FnOnce() -> Result<CoreData, ConfigError>,
    ) -> Result<CoreKey, ConfigError> {
        if let Some(config_key) = &key
            && let Some(&existing) = self.shared.get(&(category, config_key.clone()))
            && let Some(core) = self.cores.get_mut(existing)
        {
            core.use_count += 1;
            return Ok(existing);
        }

        let data = build()?;
        if data.category() != category {
            return Err(ConfigError::Malformed {
                type_name: category.name().to_string(),
                reason: format!("builder produced a {} payload", data.category()),
            });
        }
        data.validate()?;

        let gpu = if data.pending_uri().is_some() {
            GpuSlot::Awaiting
        } else {
            GpuSlot::Unallocated
        };
        let hash = data.binding_hash();
        let state_id = self.ids.allocate();
        let core_key = self.cores.insert_with_key(|k| StateCore {
            key: k,
            category,
            state_id,
            config_key: key.clone(),
            data,
            hash,
            use_count: 1,
            version: CoreVersion::default(),
            gpu,
            pinned: false,
        });
        if let Some(config_key) = key {
            self.shared.insert((category, config_key), core_key);
        }
        Ok(core_key)
    }

    /// Drops one reference. Over-release and default cores are logged no-ops.
    pub fn release(&mut self, key: CoreKey) -> Release {
        let Some(core) = self.cores.get_mut(key) else {
            self.contract_violations += 1;
            log::warn!("Release of a dead core {key:?} ignored");
            return Release::Ignored;
        };
        if core.pinned {
            self.contract_violations += 1;
            log::warn!("Release of the default {} core ignored", core.category);
            return Release::Ignored;
        }
        if core.use_count == 0 {
            self.contract_violations += 1;
            log::warn!("Release of an unreferenced {} core ignored", core.category);
            return Release::Ignored;
        }

        core.use_count -= 1;
        if core.use_count > 0 {
            return Release::Decremented(core.use_count);
        }

        let Some(core) = self.cores.remove(key) else {
            return Release::Ignored;
        };
        if let Some(config_key) = core.config_key
            && self.shared.get(&(core.category, config_key.clone())) == Some(&key)
        {
            self.shared.remove(&(core.category, config_key));
        }
        if let GpuSlot::Ready(handle) = core.gpu {
            self.retired.push(handle);
        }
        log::debug!("{} core {:?} destroyed", core.category, core.state_id);
        Release::Destroyed
    }

    // ========================================================================
    // Access
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn core(&self, key: CoreKey) -> Option<&StateCore> {
        self.cores.get(key)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, key: CoreKey) -> bool {
        self.cores.contains_key(key)
    }

    /// Mutates a core's payload, bumps its version and recomputes its hash.
    /// A content-keyed core is re-filed under its new content key; if that
    /// key is taken it stops being shared.
    ///
    /// The closure returns whether it applied; a declined update leaves the
    /// version untouched.
    pub fn update(&mut self, key: CoreKey, f: impl FnOnce(&mut CoreData) -> bool) -> Option<HashChange> {
        let core = self.cores.get_mut(key)?;
        let mut scratch = core.data.clone();
        if !f(&mut scratch) {
            return None;
        }
        if let Err(e) = scratch.validate() {
            log::warn!("Rejected {} update: {e}", core.category);
            return None;
        }
        let before = core.hash;
        {
            let mut data = EditGuard::new(&mut core.data, &mut core.version);
            *data = scratch;
        }
        core.hash = core.data.binding_hash();

        // Content-keyed cores follow their content to a new key.
        if matches!(core.config_key, Some(ConfigKey::Content(_))) {
            if let Some(old) = core.config_key.take()
                && self.shared.get(&(core.category, old.clone())) == Some(&key)
            {
                self.shared.remove(&(core.category, old));
            }
            if let Some(fresh) = core.data.content_key()
                && !self.shared.contains_key(&(core.category, fresh.clone()))
            {
                self.shared.insert((core.category, fresh.clone()), key);
                core.config_key = Some(fresh);
            }
        }
        Some(HashChange {
            before,
            after: core.hash,
        })
    }

    /// Links an xform core to the xform core visible above it. Not a value
    /// change: the version stays.
    pub fn link_xform(&mut self, key: CoreKey, parent: Option<CoreKey>) {
        if let Some(StateCore {
            data: CoreData::Xform(XformState { parent: link, .. }),
            pinned: false,
            ..
        }) = self.cores.get_mut(key)
        {
            *link = parent;
        }
    }

    /// Records the GPU status of a core.
    pub fn set_gpu(&mut self, key: CoreKey, slot: GpuSlot) {
        if let Some(core) = self.cores.get_mut(key) {
            core.gpu = slot;
        }
    }

    /// Stores a loaded image and marks the core allocatable.
    pub(crate) fn resolve_image(&mut self, key: CoreKey, image: ImageData) -> bool {
        let Some(core) = self.cores.get_mut(key) else {
            return false;
        };
        {
            let mut data = EditGuard::new(&mut core.data, &mut core.version);
            if !data.apply_image(image) {
                return false;
            }
        }
        core.gpu = GpuSlot::Unallocated;
        true
    }

    #[inline]
    #[must_use]
    pub fn default_core(&self, category: Category) -> CoreKey {
        self.defaults[category.index()]
    }

    /// Default cores of the stacked categories, in stack order.
    #[must_use]
    pub fn stacked_defaults(&self) -> [CoreKey; STACKED_CATEGORY_COUNT] {
        Category::STACKED.map(|category| self.default_core(category))
    }

    /// Number of live cores, default cores excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cores.len() - self.defaults.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cores of `category` registered under a shareable key.
    #[must_use]
    pub fn shared_count(&self, category: Category) -> usize {
        self.shared.keys().filter(|(c, _)| *c == category).count()
    }

    /// Looks up the core registered under a key without acquiring it.
    #[must_use]
    pub fn lookup(&self, category: Category, key: &ConfigKey) -> Option<CoreKey> {
        self.shared.get(&(category, key.clone())).copied()
    }

    /// Handles of destroyed cores the backend must free.
    pub fn drain_retired(&mut self) -> std::vec::Drain<'_, GpuHandle> {
        self.retired.drain(..)
    }

    /// Over-releases and other ignored contract breaches so far.
    #[must_use]
    pub fn contract_violations(&self) -> u64 {
        self.contract_violations
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateCore> {
        self.cores.values()
    }
}

impl std::fmt::Debug for CoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRegistry")
            .field("cores", &self.len())
            .field("shared", &self.shared.len())
            .field("retired", &self.retired.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cores::{MaterialState, TextureState};
    use glam::Vec3;

    fn texture(uri: &str) -> (Option<ConfigKey>, impl FnOnce() -> Result<CoreData, ConfigError>) {
        let state = TextureState::from_uri(uri);
        (state.content_key(), move || Ok(CoreData::Texture(state)))
    }

    #[test]
    fn equal_keys_share_one_core() {
        let mut registry = CoreRegistry::new();
        let (key, build) = texture("a.png");
        let a = registry.acquire(Category::Texture, key, build).unwrap();
        let (key, build) = texture("a.png");
        let b = registry.acquire(Category::Texture, key, build).unwrap();

        assert_eq!(a, b);
        assert_eq!(registry.core(a).unwrap().use_count(), 2);
        assert_eq!(registry.shared_count(Category::Texture), 1);
    }

    #[test]
    fn unkeyed_acquires_never_share() {
        let mut registry = CoreRegistry::new();
        let build = || Ok(CoreData::Material(MaterialState::default()));
        let a = registry.acquire(Category::Material, None, build).unwrap();
        let b = registry.acquire(Category::Material, None, build).unwrap();
        assert_ne!(a, b);
        assert_ne!(registry.core(a).unwrap().state_id(), registry.core(b).unwrap().state_id());
    }

    #[test]
    fn balanced_release_destroys_exactly_once() {
        let mut registry = CoreRegistry::new();
        let (key, build) = texture("a.png");
        let core = registry.acquire(Category::Texture, key.clone(), build).unwrap();
        let (key2, build2) = texture("a.png");
        registry.acquire(Category::Texture, key2, build2).unwrap();
        registry.set_gpu(core, GpuSlot::Ready(GpuHandle(7)));

        assert_eq!(registry.release(core), Release::Decremented(1));
        assert_eq!(registry.release(core), Release::Destroyed);
        assert_eq!(registry.release(core), Release::Ignored);

        assert!(registry.lookup(Category::Texture, &key.unwrap()).is_none());
        assert_eq!(registry.drain_retired().collect::<Vec<_>>(), vec![GpuHandle(7)]);
        assert_eq!(registry.contract_violations(), 1);
    }

    #[test]
    fn default_cores_are_pinned() {
        let mut registry = CoreRegistry::new();
        let default = registry.default_core(Category::Flags);
        assert_eq!(registry.release(default), Release::Ignored);
        assert!(registry.core(default).unwrap().is_default());
        assert!(registry.is_empty());
    }

    #[test]
    fn build_errors_register_nothing() {
        let mut registry = CoreRegistry::new();
        let result = registry.acquire(Category::Texture, None, || TextureState::from_params(&serde_json::json!({})).map(CoreData::Texture));
        assert!(result.is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn uri_textures_await_their_image() {
        let mut registry = CoreRegistry::new();
        let (key, build) = texture("a.png");
        let core = registry.acquire(Category::Texture, key, build).unwrap();
        assert_eq!(registry.core(core).unwrap().gpu(), &GpuSlot::Awaiting);
    }

    #[test]
    fn update_reports_hash_changes_and_bumps_version() {
        let mut registry = CoreRegistry::new();
        let core = registry
            .acquire(Category::Material, None, || Ok(CoreData::Material(MaterialState::default())))
            .unwrap();
        let change = registry
            .update(core, |data| match data {
                CoreData::Material(m) => {
                    m.base_color = Vec3::Z;
                    true
                }
                _ => false,
            })
            .unwrap();
        assert!(!change.changed());
        assert_eq!(registry.core(core).unwrap().version().get(), 1);
        assert_eq!(registry.core(core).unwrap().data().as_material().unwrap().base_color, Vec3::Z);
    }

    #[test]
    fn invalid_updates_are_rejected() {
        let mut registry = CoreRegistry::new();
        let core = registry
            .acquire(Category::Material, None, || Ok(CoreData::Material(MaterialState::default())))
            .unwrap();
        let change = registry.update(core, |data| match data {
            CoreData::Material(m) => {
                m.alpha = 3.0;
                true
            }
            _ => false,
        });
        assert!(change.is_none());
        assert_eq!(registry.core(core).unwrap().data().as_material().unwrap().alpha, 1.0);
    }
}
