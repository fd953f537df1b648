//! Bookkeeping for preview handles.
//!
//! Every confirmed crop gets a preview the UI displays (in the browser, an
//! object URL for the JPEG). The registry hands out opaque handles, records
//! which are alive, and queues released ones so the host can revoke the
//! matching resources. Releasing is synchronous: once the pipeline drops an
//! image, its handle is already in the released queue.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Opaque identifier of one preview resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PreviewHandle(pub u32);

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next: u32,
    live: BTreeSet<PreviewHandle>,
    released: Vec<PreviewHandle>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> PreviewHandle {
        self.next = self.next.wrapping_add(1);
        let handle = PreviewHandle(self.next);
        self.live.insert(handle);
        handle
    }

    /// Release a handle. Returns false if it was not live.
    pub fn release(&mut self, handle: PreviewHandle) -> bool {
        if self.live.remove(&handle) {
            self.released.push(handle);
            true
        } else {
            false
        }
    }

    pub fn release_all(&mut self) {
        let live = std::mem::take(&mut self.live);
        self.released.extend(live);
    }

    pub fn is_live(&self, handle: PreviewHandle) -> bool {
        self.live.contains(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Handles released since the last call, oldest first.
    pub fn drain_released(&mut self) -> Vec<PreviewHandle> {
        std::mem::take(&mut self.released)
    }
}
