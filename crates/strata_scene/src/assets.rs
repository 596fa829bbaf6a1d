//! Asynchronous asset completion.
//!
//! Image-backed cores (textures, region maps with a URI source) ask the
//! scene's [`AssetLoader`] for their pixels. The loader may finish on any
//! thread at any time; it reports through the [`AssetCompletion`] handle,
//! which only enqueues an event. The scene drains that queue at compile
//! begin, before any traversal, so cores never change mid-pass.
//!
//! Each request carries a ticket. A completion whose core was released (or
//! re-requested) in the meantime no longer matches and is dropped.

use rustc_hash::FxHashMap;
use strata_core::{Category, CoreKey, NodeId};

use crate::cores::ImageData;

/// What a loader is asked to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub uri: String,
    pub category: Category,
    /// Node that first declared the core.
    pub node: NodeId,
}

/// External asset loading backend.
pub trait AssetLoader: Send {
    /// Starts loading. `completion` may be fulfilled later, from any thread,
    /// or dropped (which counts as neither success nor failure).
    fn load(&mut self, request: LoadRequest, completion: AssetCompletion);
}

/// Result of one load, queued for the next compile begin.
#[derive(Debug)]
pub(crate) struct AssetEvent {
    pub core: CoreKey,
    pub ticket: u64,
    pub result: Result<ImageData, String>,
}

/// One-shot handle through which a loader reports a finished request.
pub struct AssetCompletion {
    sender: flume::Sender<AssetEvent>,
    core: CoreKey,
    ticket: u64,
}

impl AssetCompletion {
    /// Delivers the decoded image.
    pub fn complete(self, image: ImageData) {
        self.send(Ok(image));
    }

    /// Reports a failed load. The core stays unresolved.
    pub fn fail(self, reason: impl Into<String>) {
        self.send(Err(reason.into()));
    }

    fn send(self, result: Result<ImageData, String>) {
        let event = AssetEvent {
            core: self.core,
            ticket: self.ticket,
            result,
        };
        if self.sender.send(event).is_err() {
            log::debug!("Asset completion for {:?} dropped: scene is gone", self.core);
        }
    }
}

impl std::fmt::Debug for AssetCompletion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetCompletion")
            .field("core", &self.core)
            .field("ticket", &self.ticket)
            .finish_non_exhaustive()
    }
}

/// Per-scene bookkeeping of in-flight loads.
pub(crate) struct AssetQueue {
    sender: flume::Sender<AssetEvent>,
    receiver: flume::Receiver<AssetEvent>,
    pending: FxHashMap<CoreKey, u64>,
    next_ticket: u64,
    loader: Option<Box<dyn AssetLoader>>,
}

impl AssetQueue {
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            sender,
            receiver,
            pending: FxHashMap::default(),
            next_ticket: 1,
            loader: None,
        }
    }

    pub fn set_loader(&mut self, loader: Box<dyn AssetLoader>) {
        self.loader = Some(loader);
    }

    /// Issues a request. Returns `false` when no loader is installed.
    pub fn request(&mut self, request: LoadRequest, core: CoreKey) -> bool {
        let Some(loader) = self.loader.as_mut() else {
            return false;
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending.insert(core, ticket);
        let completion = AssetCompletion {
            sender: self.sender.clone(),
            core,
            ticket,
        };
        loader.load(request, completion);
        true
    }

    /// Forgets the in-flight load of a released core.
    pub fn cancel(&mut self, core: CoreKey) {
        self.pending.remove(&core);
    }

    /// Events that still match an in-flight request.
    pub fn drain(&mut self) -> Vec<AssetEvent> {
        let mut ready = Vec::new();
        for event in self.receiver.try_iter() {
            if self.pending.get(&event.core) == Some(&event.ticket) {
                self.pending.remove(&event.core);
                ready.push(event);
            } else {
                log::debug!("Stale asset completion for {:?} ignored", event.core);
            }
        }
        ready
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
