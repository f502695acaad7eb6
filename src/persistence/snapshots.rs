// "Time machine": periodic whole-workspace snapshots kept in a capped ring
// buffer and mirrored to the key-value store under a single key.
//
// Independent of the undo log. Entries are deep copies, so nothing done to
// live state afterwards (including undo) can reach back into them.

use std::cell::Cell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::kv::KeyValueStore;
use super::persist::atomic_write;
use crate::workspace::state::WorkspaceState;

pub const SNAPSHOT_KEY: &str = "workspace_snapshots";
pub const EXPORT_VERSION: &str = "1.0";
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 100;

/// Time source for the scheduler and snapshot timestamps.
pub trait Clock {
    // monotonic time since an arbitrary fixed start
    fn elapsed(&self) -> Duration;
    fn now_utc(&self) -> OffsetDateTime;
}

#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl Default for SystemClock {
    fn default() -> Self { Self { started: Instant::now() } }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration { self.started.elapsed() }
    fn now_utc(&self) -> OffsetDateTime { OffsetDateTime::now_utc() }
}

/// Hand-advanced clock for deterministic tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    elapsed: Cell<Duration>,
    base: OffsetDateTime,
}

impl ManualClock {
    pub fn new(base: OffsetDateTime) -> Self {
        Self { elapsed: Cell::new(Duration::ZERO), base }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration { self.elapsed.get() }
    fn now_utc(&self) -> OffsetDateTime { self.base + self.elapsed.get() }
}

/// Decides when the next snapshot is due: a fixed period plus a debounce
/// that restarts on every observed mutation.
#[derive(Debug, Clone)]
pub struct SnapshotScheduler {
    interval: Duration,
    debounce: Duration,
    next_periodic: Duration,
    pending: Option<Duration>,
}

impl SnapshotScheduler {
    pub fn new(interval: Duration, debounce: Duration, now: Duration) -> Self {
        Self { interval, debounce, next_periodic: now + interval, pending: None }
    }

    pub fn notify_mutation(&mut self, now: Duration) {
        self.pending = Some(now + self.debounce);
    }

    pub fn schedule_now(&mut self, now: Duration) {
        self.pending = Some(now);
    }

    /// Drop a pending debounced snapshot. The periodic timer keeps running.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool { self.pending.is_some() }

    pub fn next_deadline(&self) -> Duration {
        match self.pending {
            Some(p) => p.min(self.next_periodic),
            None => self.next_periodic,
        }
    }

    /// True when a snapshot should be taken at `now`; re-arms both timers.
    pub fn poll(&mut self, now: Duration) -> bool {
        let debounced = self.pending.is_some_and(|due| now >= due);
        if !debounced && now < self.next_periodic {
            return false;
        }
        self.pending = None;
        self.next_periodic = now + self.interval;
        true
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub data: WorkspaceState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotSummary {
    pub id: Uuid,
    pub timestamp: OffsetDateTime,
    pub node_count: usize,
    pub connection_count: usize,
    pub message_count: usize,
    pub event_count: usize,
}

/// Standalone document produced by [`SnapshotStore::export`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotExport {
    pub version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
    pub snapshot: Snapshot,
}

pub struct SnapshotStore {
    entries: VecDeque<Snapshot>,
    capacity: usize,
    current: Option<usize>,
    storage: Box<dyn KeyValueStore>,
    write_pending: bool,
}

impl SnapshotStore {
    pub fn new(storage: Box<dyn KeyValueStore>, capacity: usize) -> Self {
        Self { entries: VecDeque::new(), capacity: capacity.max(1), current: None, storage, write_pending: false }
    }

    /// Reload the buffer from `storage`. Unreadable data starts an empty
    /// buffer rather than failing.
    pub fn load(storage: Box<dyn KeyValueStore>, capacity: usize) -> Self {
        let mut store = Self::new(storage, capacity);
        let loaded = match store.storage.get(SNAPSHOT_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<Vec<Snapshot>>(&raw).unwrap_or_else(|e| {
                log::warn!("snapshot buffer unreadable, starting empty: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("snapshot buffer could not be read: {e}");
                Vec::new()
            }
        };
        let skip = loaded.len().saturating_sub(store.capacity);
        store.entries = loaded.into_iter().skip(skip).collect();
        store.current = store.entries.len().checked_sub(1);
        log::info!("loaded {} snapshot(s)", store.entries.len());
        store
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn capacity(&self) -> usize { self.capacity }
    pub fn current_index(&self) -> Option<usize> { self.current }
    pub fn get(&self, index: usize) -> Option<&Snapshot> { self.entries.get(index) }
    pub fn entries(&self) -> impl Iterator<Item = &Snapshot> { self.entries.iter() }
    pub fn is_write_pending(&self) -> bool { self.write_pending }

    pub fn summaries(&self) -> Vec<SnapshotSummary> {
        self.entries
            .iter()
            .map(|s| SnapshotSummary {
                id: s.id,
                timestamp: s.timestamp,
                node_count: s.data.nodes.len(),
                connection_count: s.data.connections.len(),
                message_count: s.data.messages.len(),
                event_count: s.data.calendar_events.len(),
            })
            .collect()
    }

    /// Append a snapshot, evicting the oldest once full, and persist.
    pub fn capture(&mut self, data: WorkspaceState, at: OffsetDateTime) -> Uuid {
        let snapshot = Snapshot { id: Uuid::now_v7(), timestamp: at, data };
        let id = snapshot.id;
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.current = Some(self.entries.len() - 1);
        log::debug!("snapshot {id} captured ({} in buffer)", self.entries.len());
        self.persist();
        id
    }

    /// Mirror the buffer to storage. Failures are logged and remembered;
    /// the in-memory buffer stays authoritative.
    pub fn persist(&mut self) -> bool {
        let all: Vec<&Snapshot> = self.entries.iter().collect();
        let result = serde_json::to_string(&all)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set(SNAPSHOT_KEY, &json));
        match result {
            Ok(()) => {
                self.write_pending = false;
                true
            }
            Err(e) => {
                log::warn!("snapshot write failed, will retry on next change: {e}");
                self.write_pending = true;
                false
            }
        }
    }

    pub fn retry_pending_write(&mut self) -> bool {
        if !self.write_pending {
            return false;
        }
        self.persist()
    }

    /// Deep copy of the snapshot at `index`, which becomes current.
    pub fn restore(&mut self, index: usize) -> Option<WorkspaceState> {
        let data = self.entries.get(index)?.data.clone();
        self.current = Some(index);
        Some(data)
    }

    pub fn delete(&mut self, index: usize) -> bool {
        if self.entries.remove(index).is_none() {
            return false;
        }
        let len = self.entries.len();
        self.current = match self.current {
            _ if len == 0 => None,
            Some(c) if c > index => Some(c - 1),
            Some(c) => Some(c.min(len - 1)),
            None => None,
        };
        self.persist();
        true
    }

    pub fn export(&self, index: usize, at: OffsetDateTime) -> Option<SnapshotExport> {
        let snapshot = self.entries.get(index)?.clone();
        Some(SnapshotExport { version: EXPORT_VERSION.to_string(), exported_at: at, snapshot })
    }

    pub fn export_json(&self, index: usize, at: OffsetDateTime) -> anyhow::Result<Option<String>> {
        match self.export(index, at) {
            Some(doc) => Ok(Some(serde_json::to_string_pretty(&doc)?)),
            None => Ok(None),
        }
    }

    pub fn export_to_path(&self, index: usize, at: OffsetDateTime, path: &Path) -> anyhow::Result<bool> {
        let Some(json) = self.export_json(index, at)? else { return Ok(false) };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        atomic_write(path, json.as_bytes())?;
        Ok(true)
    }
}
