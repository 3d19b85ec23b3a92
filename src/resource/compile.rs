//! Background GPU compilation of finished subgraphs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::scene::Node;

/// Accepts subgraphs whose GPU resources should be created ahead of first draw.
pub trait CompileQueue: Send + Sync {
    fn enqueue(&self, node: Arc<Node>);
}

/// FIFO of subgraphs waiting for the render thread to upload them.
#[derive(Default)]
pub struct IncrementalCompileQueue {
    pending: Mutex<VecDeque<Arc<Node>>>,
    pending_bytes: AtomicUsize,
}

impl IncrementalCompileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Vertex bytes still waiting to be uploaded.
    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes.load(Ordering::Relaxed)
    }

    /// Take up to `max` subgraphs for this frame's upload budget.
    pub fn take(&self, max: usize) -> Vec<Arc<Node>> {
        let mut pending = self.pending.lock();
        let count = max.min(pending.len());
        let taken: Vec<Arc<Node>> = pending.drain(..count).collect();
        let bytes: usize = taken.iter().map(|n| upload_bytes(n)).sum();
        self.pending_bytes.fetch_sub(bytes, Ordering::Relaxed);
        taken
    }

    /// Take everything.
    pub fn drain(&self) -> Vec<Arc<Node>> {
        self.take(usize::MAX)
    }
}

impl CompileQueue for IncrementalCompileQueue {
    fn enqueue(&self, node: Arc<Node>) {
        let bytes = upload_bytes(&node);
        self.pending.lock().push_back(node);
        self.pending_bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// Vertex bytes of every drawable in the subgraph.
pub fn upload_bytes(node: &Node) -> usize {
    if let Some(geometry) = node.geometry() {
        return geometry.vertex_bytes().len();
    }
    node.children().into_iter().map(|c| upload_bytes(c)).sum()
}
