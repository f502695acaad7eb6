mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use egui::{Rect, pos2, vec2};
use thinkspace::graph_utils::graph::{ConnectionStyle, NodeData, NodePatch};
use thinkspace::persistence::kv::{FileKvStore, KeyValueStore, MemoryKvStore};
use thinkspace::persistence::persist::{self, EXPORT_FORMAT_VERSION};
use thinkspace::persistence::settings::AppSettings;
use thinkspace::persistence::snapshots::{
    EXPORT_VERSION, SNAPSHOT_KEY, Snapshot, SnapshotExport, SnapshotScheduler, SnapshotStore,
};
use thinkspace::workspace::Workspace;
use thinkspace::workspace::state::{CalendarEvent, Role, View, WorkspaceState};
use time::macros::datetime;

use common::{harness, harness_with, note};

#[test]
fn scheduler_debounces_mutations() {
    let mut s = SnapshotScheduler::new(Duration::from_secs(300), Duration::from_secs(2), Duration::ZERO);
    assert!(!s.poll(Duration::from_secs(1)));
    s.notify_mutation(Duration::from_secs(1));
    assert!(!s.poll(Duration::from_millis(2500)));
    // Another mutation pushes the deadline back
    s.notify_mutation(Duration::from_millis(2500));
    assert!(!s.poll(Duration::from_millis(3000)));
    assert_eq!(s.next_deadline(), Duration::from_millis(4500));
    assert!(s.poll(Duration::from_millis(4500)));
    assert!(!s.is_pending());
    assert!(!s.poll(Duration::from_secs(5)));
}

#[test]
fn scheduler_fires_periodically_without_mutations() {
    let mut s = SnapshotScheduler::new(Duration::from_secs(300), Duration::from_secs(2), Duration::ZERO);
    assert!(!s.poll(Duration::from_secs(299)));
    assert!(s.poll(Duration::from_secs(300)));
    assert!(!s.poll(Duration::from_secs(301)));
    assert!(s.poll(Duration::from_secs(600)));

    s.notify_mutation(Duration::from_secs(601));
    s.cancel();
    assert!(!s.poll(Duration::from_secs(700)));
    assert_eq!(s.next_deadline(), Duration::from_secs(900));
}

#[test]
fn snapshots_taken_after_quiet_period_and_on_schedule() {
    let mut h = harness();
    h.ws.create_node(note("A"), pos2(0.0, 0.0));
    h.clock.advance(Duration::from_secs(1));
    assert!(h.ws.tick().is_none());
    h.clock.advance(Duration::from_secs(1));
    let first = h.ws.tick().expect("debounced snapshot due");
    assert_eq!(h.ws.snapshots().len(), 1);
    assert_eq!(h.ws.snapshots().get(0).map(|s| s.id), Some(first));
    assert_eq!(h.ws.snapshots().get(0).map(|s| s.timestamp), Some(datetime!(2026-01-05 09:00:02 UTC)));

    // Nothing changes; the periodic timer still fires
    h.clock.advance(Duration::from_secs(299));
    assert!(h.ws.tick().is_none());
    h.clock.advance(Duration::from_secs(1));
    assert!(h.ws.tick().is_some());
    assert_eq!(h.ws.snapshots().len(), 2);
}

#[test]
fn snapshots_restore_replaces_state_and_stays_independent() {
    let mut h = harness();
    let a = h.ws.create_node(note("A"), pos2(0.0, 0.0));
    let b = h.ws.create_node(note("B"), pos2(300.0, 0.0));
    h.ws.create_connection(a, b, ConnectionStyle::Solid);
    h.ws.push_message(Role::User, "hello");
    h.ws.set_active_project(Some("alpha".into()));
    h.ws.take_snapshot();
    let s1 = h.ws.snapshots().get(0).cloned().expect("snapshot captured");

    h.ws.delete_node(a);
    h.ws.create_node(note("C"), pos2(600.0, 0.0));
    h.ws.set_current_view(View::Writer);
    h.ws.take_snapshot();

    assert!(h.ws.restore_snapshot(0));
    assert_eq!(h.ws.state(), s1.data);
    assert_eq!(h.ws.snapshots().current_index(), Some(0));
    assert!(!h.ws.can_undo(), "history cleared on restore");
    assert_eq!(h.ws.current_view(), View::Canvas);
    assert_eq!(h.ws.active_project(), Some("alpha"));

    // Live edits after restore never reach back into the buffer
    h.ws.update_node(b, NodePatch::data(NodeData::note("B", "edited")));
    h.ws.create_node(note("D"), pos2(900.0, 0.0));
    assert_eq!(h.ws.snapshots().get(0), Some(&s1));

    // A fresh snapshot of the restored state is scheduled straight away
    let mut h = harness();
    h.ws.create_node(note("A"), pos2(0.0, 0.0));
    h.ws.take_snapshot();
    h.ws.create_node(note("B"), pos2(300.0, 0.0));
    assert!(h.ws.restore_snapshot(0));
    assert!(h.ws.tick().is_some());
    assert_eq!(h.ws.snapshots().len(), 2);
    assert_eq!(h.ws.snapshots().get(1).map(|s| s.data.nodes.len()), Some(1));
}

#[test]
fn snapshots_survive_undo_of_captured_changes() {
    let mut h = harness();
    h.ws.create_node(note("A"), pos2(0.0, 0.0));
    h.ws.take_snapshot();
    assert!(h.ws.undo());
    assert_eq!(h.ws.graph().node_count(), 0);
    assert_eq!(h.ws.snapshots().get(0).map(|s| s.data.nodes.len()), Some(1));
}

#[test]
fn snapshots_ring_buffer_evicts_oldest() {
    let settings = AppSettings { snapshot_capacity: 3, ..AppSettings::default() };
    let mut h = harness_with(settings);
    let ids: Vec<_> = (0..5)
        .map(|i| {
            h.ws.create_node(note(&i.to_string()), pos2(0.0, 0.0));
            h.ws.take_snapshot()
        })
        .collect();
    assert_eq!(h.ws.snapshots().len(), 3);
    let kept: Vec<_> = h.ws.snapshots().entries().map(|s| s.id).collect();
    assert_eq!(kept, ids[2..].to_vec());
    assert_eq!(h.ws.snapshots().current_index(), Some(2));
}

#[test]
fn snapshots_default_capacity_is_one_hundred() {
    let mut store = SnapshotStore::new(Box::new(MemoryKvStore::new()), 100);
    for _ in 0..105 {
        store.capture(WorkspaceState::default(), datetime!(2026-01-05 09:00 UTC));
    }
    assert_eq!(store.len(), 100);
    assert_eq!(AppSettings::default().snapshot_capacity, 100);
}

#[test]
fn snapshots_delete_clamps_current_index() {
    let mut h = harness();
    for i in 0..3 {
        h.ws.create_node(note(&i.to_string()), pos2(0.0, 0.0));
        h.ws.take_snapshot();
    }
    assert_eq!(h.ws.snapshots().current_index(), Some(2));
    assert!(h.ws.delete_snapshot(2));
    assert_eq!(h.ws.snapshots().current_index(), Some(1));
    assert!(h.ws.delete_snapshot(0));
    assert_eq!(h.ws.snapshots().current_index(), Some(0));
    assert!(!h.ws.delete_snapshot(5));
    assert!(h.ws.delete_snapshot(0));
    assert_eq!(h.ws.snapshots().current_index(), None);
    assert!(h.ws.snapshots().is_empty());
}

#[test]
fn snapshots_invalid_index_is_a_noop() {
    let mut h = harness();
    let a = h.ws.create_node(note("A"), pos2(0.0, 0.0));
    h.ws.take_snapshot();
    h.ws.create_node(note("B"), pos2(300.0, 0.0));
    let live = h.ws.state();

    assert!(!h.ws.restore_snapshot(7));
    assert_eq!(h.ws.state(), live);
    assert!(h.ws.can_undo());
    assert!(h.ws.export_snapshot(7).is_none());
    assert!(h.ws.graph().contains_node(a));
}

#[test]
fn snapshots_persist_to_store_and_reload() {
    let mut h = harness();
    h.ws.create_node(note("A"), pos2(20.0, 40.0));
    h.ws.push_message(Role::Assistant, "hi");
    h.ws.add_calendar_event(CalendarEvent::new("standup", datetime!(2026-01-06 10:00 UTC), None));
    h.ws.take_snapshot();
    h.ws.take_snapshot();

    let raw = h.store.get(SNAPSHOT_KEY).expect("memory store").expect("buffer written");
    let parsed: Vec<Snapshot> = serde_json::from_str(&raw).expect("stored as a JSON array");
    assert_eq!(parsed.len(), 2);
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert!(doc[0]["data"]["calendarEvents"].is_array());

    let reloaded = SnapshotStore::load(Box::new(h.store.clone()), 100);
    assert_eq!(reloaded.len(), 2);
    assert_eq!(reloaded.current_index(), Some(1));
    assert_eq!(reloaded.get(0), h.ws.snapshots().get(0));

    // A workspace built over the same store sees the buffer
    let ws = Workspace::new(&AppSettings::default(), Box::new(h.store.clone()), h.clock.clone());
    assert_eq!(ws.snapshots().len(), 2);
}

#[test]
fn snapshots_unreadable_buffer_starts_empty() {
    let mut store = MemoryKvStore::new();
    store.set(SNAPSHOT_KEY, "{not json").expect("memory store");
    let loaded = SnapshotStore::load(Box::new(store), 100);
    assert!(loaded.is_empty());
    assert_eq!(loaded.current_index(), None);
}

// Fails every write while the shared flag is set
struct FlakyStore {
    inner: MemoryKvStore,
    failing: Rc<Cell<bool>>,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.failing.get() {
            anyhow::bail!("quota exceeded");
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.inner.remove(key)
    }
}

#[test]
fn snapshots_failed_write_is_retried_on_next_change() {
    let failing = Rc::new(Cell::new(true));
    let inner = MemoryKvStore::new();
    let clock = Rc::new(thinkspace::persistence::snapshots::ManualClock::new(datetime!(2026-01-05 09:00 UTC)));
    let storage = FlakyStore { inner: inner.clone(), failing: failing.clone() };
    let mut ws = Workspace::new(&AppSettings::default(), Box::new(storage), clock);

    ws.create_node(note("A"), pos2(0.0, 0.0));
    ws.take_snapshot();
    // The in-memory buffer is authoritative even when storage fails
    assert_eq!(ws.snapshots().len(), 1);
    assert!(ws.snapshots().is_write_pending());
    assert!(inner.get(SNAPSHOT_KEY).expect("memory store").is_none());

    failing.set(false);
    ws.create_node(note("B"), pos2(300.0, 0.0));
    assert!(!ws.snapshots().is_write_pending());
    let raw = inner.get(SNAPSHOT_KEY).expect("memory store").expect("retried write landed");
    let parsed: Vec<Snapshot> = serde_json::from_str(&raw).expect("json");
    assert_eq!(parsed.len(), 1);
}

#[test]
fn snapshots_export_carries_version() {
    let mut h = harness();
    h.ws.create_node(note("A"), pos2(0.0, 0.0));
    h.ws.take_snapshot();
    h.clock.advance(Duration::from_secs(60));

    let doc = h.ws.export_snapshot(0).expect("snapshot exists");
    assert_eq!(doc.version, EXPORT_VERSION);
    assert_eq!(doc.exported_at, datetime!(2026-01-05 09:01 UTC));
    assert_eq!(Some(&doc.snapshot), h.ws.snapshots().get(0));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("exports").join("snapshot.json");
    assert!(h.ws.export_snapshot_to(0, &path).expect("write export"));
    let text = std::fs::read_to_string(&path).expect("read export");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value["version"], "1.0");
    assert_eq!(value["snapshot"]["data"]["nodes"].as_array().map(Vec::len), Some(1));
    let back: SnapshotExport = serde_json::from_str(&text).expect("typed export");
    assert_eq!(back, doc);

    assert!(!h.ws.export_snapshot_to(3, &dir.path().join("missing.json")).expect("no error"));
}

#[test]
fn snapshots_summaries_count_domains() {
    let mut h = harness();
    let a = h.ws.create_node(note("A"), pos2(0.0, 0.0));
    let b = h.ws.create_node(note("B"), pos2(300.0, 0.0));
    h.ws.create_connection(a, b, ConnectionStyle::Solid);
    h.ws.push_message(Role::User, "one");
    h.ws.take_snapshot();
    let summary = &h.ws.snapshots().summaries()[0];
    assert_eq!((summary.node_count, summary.connection_count, summary.message_count, summary.event_count), (2, 1, 1, 0));
}

#[test]
fn persist_autosave_round_trips_through_ron() {
    let mut h = harness();
    let a = h.ws.create_node(NodeData::note("A", "multi\nline"), pos2(20.0, 40.0));
    let b = h.ws.create_node(
        NodeData::Checklist {
            title: "todo".into(),
            items: vec![thinkspace::graph_utils::graph::ChecklistItem { text: "ship".into(), done: true }],
        },
        pos2(300.0, 40.0),
    );
    h.ws.create_connection(a, b, ConnectionStyle::Dotted);
    h.ws.create_frame("Group", Rect::from_min_size(pos2(0.0, 0.0), vec2(600.0, 300.0)));
    h.ws.push_message(Role::User, "hello");
    h.ws.add_calendar_event(CalendarEvent::new(
        "review",
        datetime!(2026-01-06 10:00 UTC),
        Some(datetime!(2026-01-06 11:00 UTC)),
    ));
    h.ws.set_active_project(Some("alpha".into()));
    h.ws.viewport_mut().zoom_to(1.5, pos2(100.0, 100.0));

    let dir = tempfile::tempdir().expect("tempdir");
    let file = h.ws.to_file();
    let path = persist::save_active(dir.path(), &file).expect("save state.ron");
    assert!(path.ends_with("state.ron"));
    let loaded = persist::load_active(dir.path()).expect("load").expect("file exists");
    assert_eq!(loaded, file);

    let clock = Rc::new(thinkspace::persistence::snapshots::ManualClock::new(datetime!(2026-01-05 09:00 UTC)));
    let ws = Workspace::from_file(loaded, &AppSettings::default(), Box::new(MemoryKvStore::new()), clock);
    assert_eq!(ws.state(), h.ws.state());
    assert_eq!(ws.viewport(), h.ws.viewport());
    assert!(!ws.can_undo());
}

#[test]
fn persist_versioned_saves_are_listed_newest_first() {
    let h = harness();
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(persist::load_active(dir.path()).expect("missing file is fine").is_none());
    assert!(persist::list_versions(dir.path()).expect("list").is_empty());

    let saved = persist::save_versioned(dir.path(), &h.ws.to_file()).expect("save version");
    persist::save_active(dir.path(), &h.ws.to_file()).expect("save active");
    let versions = persist::list_versions(dir.path()).expect("list");
    assert_eq!(versions, vec![saved.clone()]);
    assert!(persist::load_from_path(&saved).is_ok());
}

#[test]
fn persist_exports_json_and_csv() {
    let mut h = harness();
    let a = h.ws.create_node(note("alpha"), pos2(20.0, 40.0));
    let b = h.ws.create_node(note("beta, with comma"), pos2(300.0, 40.0));
    h.ws.create_node(note("unselected"), pos2(600.0, 40.0));
    h.ws.create_connection(a, b, ConnectionStyle::Solid);

    let export = h.ws.export_workspace();
    assert_eq!(export.meta.version, EXPORT_FORMAT_VERSION);
    let value: serde_json::Value = serde_json::from_str(&export.to_json().expect("json")).expect("valid json");
    assert_eq!(value["nodes"].as_array().map(Vec::len), Some(3));
    assert_eq!(value["connections"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["meta"]["version"], "1.0");

    let dir = tempfile::tempdir().expect("tempdir");
    h.ws.select_only([a, b]);
    let csv_path = dir.path().join("nodes.csv");
    assert_eq!(h.ws.export_selection_csv(&csv_path).expect("csv export"), 2);
    let mut rdr = csv::Reader::from_path(&csv_path).expect("read csv");
    let titles: Vec<String> = rdr
        .records()
        .map(|r| r.expect("row")[5].to_string())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"beta, with comma".to_string()));

    let json_path = dir.path().join("out").join("workspace.json");
    export.write_json(&json_path).expect("write json");
    assert!(json_path.exists());
}

#[test]
fn settings_defaults_and_round_trip() {
    let defaults = AppSettings::default();
    assert_eq!(defaults.grid_unit, 20.0);
    assert_eq!(defaults.history_cap, 20);
    assert_eq!(defaults.snapshot_interval(), Duration::from_secs(300));
    assert_eq!(defaults.snapshot_debounce(), Duration::from_secs(2));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    let custom = AppSettings { grid_unit: 10.0, autosave_override: Some(dir.path().to_path_buf()), ..defaults };
    custom.save_to(&path).expect("save settings");
    let loaded = AppSettings::load_from(&path).expect("load settings");
    assert_eq!(loaded, custom);
    assert_eq!(loaded.autosave_dir(), dir.path().to_path_buf());

    // Missing keys fall back to defaults
    std::fs::write(&path, r#"{"grid_unit": 40.0}"#).expect("write partial settings");
    let partial = AppSettings::load_from(&path).expect("load partial");
    assert_eq!(partial.grid_unit, 40.0);
    assert_eq!(partial.snapshot_capacity, 100);
}

#[test]
fn kv_file_store_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = FileKvStore::new(dir.path().join("kv"));
    assert!(store.get("workspace_snapshots").expect("get").is_none());
    store.set("workspace_snapshots", "[]").expect("set");
    store.set("workspace_snapshots", "[1]").expect("overwrite");
    assert_eq!(store.get("workspace_snapshots").expect("get").as_deref(), Some("[1]"));
    store.remove("workspace_snapshots").expect("remove");
    assert!(store.get("workspace_snapshots").expect("get").is_none());
}
