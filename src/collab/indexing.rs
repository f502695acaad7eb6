use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::NodeId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub node: NodeId,
    pub text: String,
}

pub trait Indexer {
    fn index(&mut self, item: &IndexItem) -> anyhow::Result<()>;
}

/// Paced background queue: at most one item per `delay`, failures logged
/// and dropped so the interactive path never sees them.
#[derive(Debug)]
pub struct IndexQueue {
    items: VecDeque<IndexItem>,
    delay: Duration,
    next_ready: Duration,
    failures: usize,
}

impl IndexQueue {
    pub fn new(delay: Duration) -> Self {
        Self { items: VecDeque::new(), delay, next_ready: Duration::ZERO, failures: 0 }
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn failures(&self) -> usize { self.failures }

    // Re-enqueueing a node replaces its queued text
    pub fn enqueue(&mut self, item: IndexItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.node == item.node) {
            *existing = item;
        } else {
            self.items.push_back(item);
        }
    }

    /// Process the head item if the pacing delay has elapsed. Returns true
    /// when an item was taken off the queue.
    pub fn tick(&mut self, now: Duration, indexer: &mut dyn Indexer) -> bool {
        if now < self.next_ready {
            return false;
        }
        let Some(item) = self.items.pop_front() else { return false };
        if let Err(e) = indexer.index(&item) {
            self.failures += 1;
            log::warn!("indexing node {} failed: {e}", item.node);
        }
        self.next_ready = now + self.delay;
        true
    }
}
