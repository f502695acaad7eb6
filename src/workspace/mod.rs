//! Workspace facade: owns the canvas and the other live domains (messages,
//! calendar, project, view), routes every mutation through the undo log and
//! reports it to the snapshot scheduler.

pub mod state;

use std::path::Path;
use std::rc::Rc;

use egui::{Pos2, Rect};
use uuid::Uuid;

use crate::canvas::placement;
use crate::canvas::pointer::{PointerController, PointerInput};
use crate::canvas::viewport::Viewport;
use crate::canvas::{Canvas, LayoutConfig};
use crate::collab::indexing::{IndexItem, IndexQueue, Indexer};
use crate::collab::{ContentGenerator, GeneratedContent, NavigationTarget, Navigator};
use crate::graph_utils::graph::{
    ConnectionId, ConnectionStyle, Frame, FrameId, GraphStore, Node, NodeData, NodeId, NodePatch,
};
use crate::history::{Command, HistoryLog};
use crate::persistence::kv::KeyValueStore;
use crate::persistence::persist::{WorkspaceExport, WorkspaceFile};
use crate::persistence::settings::AppSettings;
use crate::persistence::snapshots::{Clock, SnapshotExport, SnapshotScheduler, SnapshotStore};

use self::state::{CalendarEvent, ChatMessage, Role, View, WorkspaceState};

pub struct Workspace {
    canvas: Canvas,
    pointer: PointerController,
    messages: Vec<ChatMessage>,
    calendar_events: Vec<CalendarEvent>,
    active_project: Option<String>,
    current_view: View,
    snapshots: SnapshotStore,
    scheduler: SnapshotScheduler,
    index_queue: IndexQueue,
    clock: Rc<dyn Clock>,
}

impl Workspace {
    /// Empty workspace; the snapshot buffer is reloaded from `storage`.
    pub fn new(settings: &AppSettings, storage: Box<dyn KeyValueStore>, clock: Rc<dyn Clock>) -> Self {
        let now = clock.elapsed();
        Self {
            canvas: Canvas::new(LayoutConfig::from_settings(settings), settings.history_cap),
            pointer: PointerController::new(),
            messages: Vec::new(),
            calendar_events: Vec::new(),
            active_project: None,
            current_view: View::default(),
            snapshots: SnapshotStore::load(storage, settings.snapshot_capacity),
            scheduler: SnapshotScheduler::new(settings.snapshot_interval(), settings.snapshot_debounce(), now),
            index_queue: IndexQueue::new(settings.indexing_delay()),
            clock,
        }
    }

    pub fn from_file(
        file: WorkspaceFile,
        settings: &AppSettings,
        storage: Box<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let mut ws = Self::new(settings, storage, clock);
        ws.canvas.viewport = file.viewport();
        ws.replace_state(file.state);
        ws
    }

    // Read access
    pub fn canvas(&self) -> &Canvas { &self.canvas }
    pub fn graph(&self) -> &GraphStore { &self.canvas.graph }
    pub fn history(&self) -> &HistoryLog { &self.canvas.history }
    pub fn viewport(&self) -> &Viewport { &self.canvas.viewport }
    // pan/zoom are view state, not history
    pub fn viewport_mut(&mut self) -> &mut Viewport { &mut self.canvas.viewport }
    pub fn pointer(&self) -> &PointerController { &self.pointer }
    pub fn snapshots(&self) -> &SnapshotStore { &self.snapshots }
    pub fn index_queue(&self) -> &IndexQueue { &self.index_queue }
    pub fn messages(&self) -> &[ChatMessage] { &self.messages }
    pub fn calendar_events(&self) -> &[CalendarEvent] { &self.calendar_events }
    pub fn active_project(&self) -> Option<&str> { self.active_project.as_deref() }
    pub fn current_view(&self) -> View { self.current_view }
    pub fn can_undo(&self) -> bool { self.canvas.history.can_undo() }
    pub fn can_redo(&self) -> bool { self.canvas.history.can_redo() }
    pub fn next_snapshot_deadline(&self) -> std::time::Duration { self.scheduler.next_deadline() }

    fn observe_mutation(&mut self) {
        self.scheduler.notify_mutation(self.clock.elapsed());
        self.snapshots.retry_pending_write();
    }

    fn queue_index(&mut self, id: NodeId) {
        let Some(node) = self.canvas.graph.node(id) else { return };
        let text = match &node.data {
            NodeData::Note { title, content } => format!("{title}\n{content}"),
            NodeData::Checklist { title, items } => {
                let mut s = title.clone();
                for item in items {
                    s.push('\n');
                    s.push_str(&item.text);
                }
                s
            }
            other => other.title().to_string(),
        };
        self.index_queue.enqueue(IndexItem { node: id, text });
    }

    // Graph mutations
    pub fn create_node(&mut self, data: NodeData, pos: Pos2) -> NodeId {
        let node = Node::new(data, pos);
        let id = node.id;
        self.canvas.history.execute(Command::CreateNode { node }, &mut self.canvas.graph);
        self.queue_index(id);
        self.observe_mutation();
        id
    }

    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> bool {
        let Some(before) = self.canvas.graph.update_node(id, patch) else { return false };
        let Some(after) = self.canvas.graph.node(id).cloned() else { return false };
        if before == after {
            return false;
        }
        let data_changed = before.data != after.data;
        self.canvas.history.record(Command::UpdateNode { before, after });
        if data_changed {
            self.queue_index(id);
        }
        self.observe_mutation();
        true
    }

    pub fn set_locked(&mut self, id: NodeId, locked: bool) -> bool {
        self.update_node(id, NodePatch::locked(locked))
    }

    pub fn delete_node(&mut self, id: NodeId) -> bool {
        let Some(removed) = self.canvas.graph.delete_node(id) else { return false };
        self.canvas.history.record(Command::DeleteNode { removed });
        self.pointer.retain_existing(&self.canvas);
        self.observe_mutation();
        true
    }

    /// Delete every selected node as one undo entry.
    pub fn delete_selection(&mut self) -> usize {
        let ids: Vec<NodeId> = self.pointer.selection().iter().copied().collect();
        let commands: Vec<Command> = ids
            .into_iter()
            .filter_map(|id| self.canvas.graph.delete_node(id))
            .map(|removed| Command::DeleteNode { removed })
            .collect();
        let count = commands.len();
        if count == 0 {
            return 0;
        }
        self.canvas.history.record(Command::Batch { label: format!("delete {count} node(s)"), commands });
        self.pointer.clear_selection();
        self.observe_mutation();
        count
    }

    pub fn create_connection(&mut self, from: NodeId, to: NodeId, style: ConnectionStyle) -> Option<ConnectionId> {
        let command = connect(&mut self.canvas.graph, from, to, style)?;
        let id = match &command {
            Command::CreateConnection { connection, .. } => connection.id,
            _ => return None,
        };
        self.canvas.history.record(command);
        self.observe_mutation();
        Some(id)
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> bool {
        let Some((index, connection)) = self.canvas.graph.delete_connection(id) else { return false };
        self.canvas.history.record(Command::DeleteConnection { index, connection });
        self.observe_mutation();
        true
    }

    pub fn create_frame(&mut self, title: impl Into<String>, rect: Rect) -> FrameId {
        let frame = Frame::new(title, rect);
        let id = frame.id;
        let index = self.canvas.graph.frames().len();
        self.canvas.history.execute(Command::CreateFrame { index, frame }, &mut self.canvas.graph);
        self.observe_mutation();
        id
    }

    pub fn update_frame(&mut self, frame: Frame) -> bool {
        let after = frame.clone();
        let Some(before) = self.canvas.graph.replace_frame(frame) else { return false };
        if before == after {
            return false;
        }
        self.canvas.history.record(Command::UpdateFrame { before, after });
        self.observe_mutation();
        true
    }

    pub fn delete_frame(&mut self, id: FrameId) -> bool {
        let Some((index, frame)) = self.canvas.graph.delete_frame(id) else { return false };
        self.canvas.history.record(Command::DeleteFrame { index, frame });
        self.observe_mutation();
        true
    }

    pub fn undo(&mut self) -> bool {
        if !self.canvas.undo() {
            return false;
        }
        self.pointer.retain_existing(&self.canvas);
        self.observe_mutation();
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.canvas.redo() {
            return false;
        }
        self.pointer.retain_existing(&self.canvas);
        self.observe_mutation();
        true
    }

    // Interaction
    pub fn handle_pointer(&mut self, input: PointerInput) -> bool {
        let committed = self.pointer.handle(&mut self.canvas, input);
        if committed {
            self.observe_mutation();
        }
        committed
    }

    pub fn escape(&mut self) {
        if self.pointer.escape(&mut self.canvas) {
            self.observe_mutation();
        }
    }

    pub fn select_only(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.pointer.select_only(ids.into_iter().filter(|id| self.canvas.graph.contains_node(*id)));
    }

    /// Place generated items around `parent` and link them to it. The whole
    /// expansion is a single undo entry.
    pub fn place_generated(&mut self, parent: NodeId, items: Vec<GeneratedContent>) -> Vec<NodeId> {
        let Some(origin) = self.canvas.graph.node(parent).map(|n| n.pos) else { return Vec::new() };
        if items.is_empty() {
            return Vec::new();
        }
        let positions = placement::place_siblings(&self.canvas.graph, origin, items.len(), &self.canvas.layout);
        let mut commands = Vec::with_capacity(items.len() * 2);
        let mut created = Vec::with_capacity(items.len());
        for (item, pos) in items.into_iter().zip(positions) {
            let node = Node::new(NodeData::note(item.title, item.content), pos);
            let id = node.id;
            let cmd = Command::CreateNode { node };
            cmd.apply(&mut self.canvas.graph);
            commands.push(cmd);
            if let Some(link) = connect(&mut self.canvas.graph, parent, id, ConnectionStyle::Solid) {
                commands.push(link);
            }
            created.push(id);
        }
        self.canvas.history.record(Command::Batch { label: format!("generate {} node(s)", created.len()), commands });
        for id in &created {
            self.queue_index(*id);
        }
        self.observe_mutation();
        created
    }

    /// Ask `generator` for content and place it around `parent`. Generator
    /// failures are logged and leave the graph untouched.
    pub fn expand_with(&mut self, parent: NodeId, generator: &mut dyn ContentGenerator, prompt: &str) -> Vec<NodeId> {
        match generator.generate(prompt) {
            Ok(items) => self.place_generated(parent, items),
            Err(e) => {
                log::warn!("content generation for {parent} failed: {e}");
                Vec::new()
            }
        }
    }

    pub fn activate_node(&self, id: NodeId, navigator: &mut dyn Navigator) -> bool {
        let Some(node) = self.canvas.graph.node(id) else { return false };
        navigator.navigate(navigation_target(node));
        true
    }

    pub fn activate_selection(&self, navigator: &mut dyn Navigator) -> usize {
        let mut sent = 0;
        for id in self.pointer.selection() {
            if self.activate_node(*id, navigator) {
                sent += 1;
            }
        }
        sent
    }

    // Other domains
    pub fn push_message(&mut self, role: Role, content: impl Into<String>) -> Uuid {
        let msg = ChatMessage::new(role, content, self.clock.now_utc());
        let id = msg.id;
        self.messages.push(msg);
        self.observe_mutation();
        id
    }

    pub fn add_calendar_event(&mut self, event: CalendarEvent) -> Uuid {
        let id = event.id;
        self.calendar_events.push(event);
        self.observe_mutation();
        id
    }

    pub fn remove_calendar_event(&mut self, id: Uuid) -> bool {
        let before = self.calendar_events.len();
        self.calendar_events.retain(|e| e.id != id);
        if self.calendar_events.len() == before {
            return false;
        }
        self.observe_mutation();
        true
    }

    pub fn set_active_project(&mut self, project: Option<String>) {
        if self.active_project != project {
            self.active_project = project;
            self.observe_mutation();
        }
    }

    pub fn set_current_view(&mut self, view: View) {
        self.current_view = view;
    }

    // Persistence
    pub fn state(&self) -> WorkspaceState {
        WorkspaceState {
            nodes: self.canvas.graph.nodes().cloned().collect(),
            connections: self.canvas.graph.connections().to_vec(),
            frames: self.canvas.graph.frames().to_vec(),
            messages: self.messages.clone(),
            calendar_events: self.calendar_events.clone(),
            active_project: self.active_project.clone(),
            current_view: self.current_view,
        }
    }

    fn replace_state(&mut self, state: WorkspaceState) {
        self.canvas.graph = state.graph();
        self.messages = state.messages;
        self.calendar_events = state.calendar_events;
        self.active_project = state.active_project;
        self.current_view = state.current_view;
        // entries in the undo log describe the state that was just replaced
        self.canvas.history.clear();
        self.pointer = PointerController::new();
    }

    pub fn to_file(&self) -> WorkspaceFile {
        WorkspaceFile::from_runtime(self.state(), &self.canvas.viewport)
    }

    pub fn export_workspace(&self) -> WorkspaceExport {
        WorkspaceExport::from_graph(&self.canvas.graph, self.clock.now_utc())
    }

    pub fn export_selection_csv(&self, path: &Path) -> anyhow::Result<usize> {
        let ids: Vec<NodeId> = self.pointer.selection().iter().copied().collect();
        crate::persistence::persist::export_nodes_csv(&self.canvas.graph, &ids, path)
    }

    /// Drive timers: takes a snapshot when one is due. Returns its id.
    pub fn tick(&mut self) -> Option<Uuid> {
        if !self.scheduler.poll(self.clock.elapsed()) {
            return None;
        }
        Some(self.snapshots.capture(self.state(), self.clock.now_utc()))
    }

    pub fn tick_indexing(&mut self, indexer: &mut dyn Indexer) -> bool {
        self.index_queue.tick(self.clock.elapsed(), indexer)
    }

    pub fn take_snapshot(&mut self) -> Uuid {
        self.snapshots.capture(self.state(), self.clock.now_utc())
    }

    /// Replace live state with snapshot `index` and schedule a fresh
    /// snapshot of the restored state. Invalid indices are ignored.
    pub fn restore_snapshot(&mut self, index: usize) -> bool {
        let Some(state) = self.snapshots.restore(index) else { return false };
        log::info!("restoring snapshot {index}");
        self.replace_state(state);
        self.scheduler.schedule_now(self.clock.elapsed());
        true
    }

    pub fn delete_snapshot(&mut self, index: usize) -> bool {
        self.snapshots.delete(index)
    }

    pub fn export_snapshot(&self, index: usize) -> Option<SnapshotExport> {
        self.snapshots.export(index, self.clock.now_utc())
    }

    pub fn export_snapshot_to(&self, index: usize, path: &Path) -> anyhow::Result<bool> {
        self.snapshots.export_to_path(index, self.clock.now_utc(), path)
    }
}

// Create a connection and describe it as a history command
fn connect(graph: &mut GraphStore, from: NodeId, to: NodeId, style: ConnectionStyle) -> Option<Command> {
    let id = graph.create_connection(from, to, style)?;
    let index = graph.connections().iter().position(|c| c.id == id)?;
    let connection = graph.connections()[index].clone();
    Some(Command::CreateConnection { index, connection })
}

fn navigation_target(node: &Node) -> NavigationTarget {
    let mut target = NavigationTarget { source: format!("canvas:{}", node.kind().as_str()), ..Default::default() };
    target.metadata.insert("node_id".into(), node.id.to_string());
    target.metadata.insert("title".into(), node.data.title().to_string());
    match &node.data {
        NodeData::File { path, .. } => {
            target.metadata.insert("path".into(), path.clone());
        }
        NodeData::Link { url, .. } | NodeData::Image { url, .. } => {
            target.metadata.insert("url".into(), url.clone());
        }
        _ => {}
    }
    target
}
