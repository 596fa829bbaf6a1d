//! Lifecycle event bus.
//!
//! Each scene owns one [`EventBus`]. Listeners are plain closures; events carry
//! no payload beyond the scene id and the event-specific discriminant, so the
//! bus never hands out references into scene data.
//!
//! ```rust,ignore
//! let id = scene.events_mut().subscribe(|event| {
//!     if let SceneEvent::DirtyRaised { kind, .. } = event {
//!         log::info!("overlay: {kind}");
//!     }
//! });
//! ```

use slotmap::{SlotMap, new_key_type};

use crate::dirty::DirtyKind;
use crate::ids::{NodeId, SceneId};

new_key_type! {
    /// Handle returned by [`EventBus::subscribe`].
    pub struct ListenerId;
}

/// Lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    /// A compile pass is starting; stacks and per-pass caches are reset.
    CompileBegin { scene: SceneId },
    /// A compile pass ended.
    CompileEnd { scene: SceneId, success: bool },
    /// Every node below the root was destroyed.
    SceneReset { scene: SceneId },
    /// A node left the tree for good.
    NodeDestroyed { scene: SceneId, node: NodeId },
    /// Pending work was raised to `kind`.
    DirtyRaised { scene: SceneId, kind: DirtyKind },
}

impl SceneEvent {
    #[must_use]
    pub fn scene(&self) -> SceneId {
        match *self {
            SceneEvent::CompileBegin { scene }
            | SceneEvent::CompileEnd { scene, .. }
            | SceneEvent::SceneReset { scene }
            | SceneEvent::NodeDestroyed { scene, .. }
            | SceneEvent::DirtyRaised { scene, .. } => scene,
        }
    }
}

type Listener = Box<dyn FnMut(&SceneEvent) + Send>;

/// Synchronous, single-threaded signal channel.
#[derive(Default)]
pub struct EventBus {
    listeners: SlotMap<ListenerId, Listener>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked for every subsequent event.
    pub fn subscribe(&mut self, listener: impl FnMut(&SceneEvent) + Send + 'static) -> ListenerId {
        self.listeners.insert(Box::new(listener))
    }

    /// Removes a listener. Returns `false` when it was already gone.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    /// Delivers `event` to every listener in registration order.
    pub fn emit(&mut self, event: SceneEvent) {
        log::trace!("event {event:?}");
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
