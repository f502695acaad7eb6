use std::collections::BTreeMap;

use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Basic type aliases for clarity
pub type NodeId = Uuid;
pub type ConnectionId = Uuid;
pub type FrameId = Uuid;

// Canonical node footprint (world units). Hit-testing, marquee, frame
// membership, alignment and rendering all use this one size.
pub const NODE_SIZE: Vec2 = Vec2::new(160.0, 120.0);
pub const HEADER_HEIGHT: f32 = 24.0;
pub const PORT_RADIUS: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Note,
    File,
    Db,
    Image,
    Link,
    Checklist,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Note => "note",
            NodeKind::File => "file",
            NodeKind::Db => "db",
            NodeKind::Image => "image",
            NodeKind::Link => "link",
            NodeKind::Checklist => "checklist",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// Per-kind node payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeData {
    Note { title: String, content: String },
    File { title: String, path: String },
    Db { title: String, columns: Vec<String>, rows: Vec<Vec<String>> },
    Image { title: String, url: String },
    Link { title: String, url: String },
    Checklist { title: String, items: Vec<ChecklistItem> },
}

impl NodeData {
    pub fn note(title: impl Into<String>, content: impl Into<String>) -> Self {
        NodeData::Note { title: title.into(), content: content.into() }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Note { .. } => NodeKind::Note,
            NodeData::File { .. } => NodeKind::File,
            NodeData::Db { .. } => NodeKind::Db,
            NodeData::Image { .. } => NodeKind::Image,
            NodeData::Link { .. } => NodeKind::Link,
            NodeData::Checklist { .. } => NodeKind::Checklist,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NodeData::Note { title, .. }
            | NodeData::File { title, .. }
            | NodeData::Db { title, .. }
            | NodeData::Image { title, .. }
            | NodeData::Link { title, .. }
            | NodeData::Checklist { title, .. } => title,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    // top-left corner in world space
    pub pos: Pos2,
    pub data: NodeData,
    #[serde(default)]
    pub locked: bool,
}

impl Node {
    pub fn new(data: NodeData, pos: Pos2) -> Self {
        Self { id: Uuid::now_v7(), pos, data, locked: false }
    }

    pub fn kind(&self) -> NodeKind { self.data.kind() }

    pub fn rect(&self) -> Rect { Rect::from_min_size(self.pos, NODE_SIZE) }

    pub fn header_rect(&self) -> Rect {
        Rect::from_min_size(self.pos, Vec2::new(NODE_SIZE.x, HEADER_HEIGHT))
    }

    pub fn output_port(&self) -> Pos2 {
        Pos2::new(self.pos.x + NODE_SIZE.x, self.pos.y + NODE_SIZE.y * 0.5)
    }

    pub fn input_port(&self) -> Pos2 {
        Pos2::new(self.pos.x, self.pos.y + NODE_SIZE.y * 0.5)
    }
}

/// Partial update merged into a node by [`GraphStore::update_node`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub pos: Option<Pos2>,
    pub data: Option<NodeData>,
    pub locked: Option<bool>,
}

impl NodePatch {
    pub fn position(pos: Pos2) -> Self { Self { pos: Some(pos), ..Default::default() } }
    pub fn data(data: NodeData) -> Self { Self { data: Some(data), ..Default::default() } }
    pub fn locked(locked: bool) -> Self { Self { locked: Some(locked), ..Default::default() } }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub style: ConnectionStyle,
}

/// Visual grouping rectangle. Membership is computed, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub title: String,
}

impl Frame {
    pub fn new(title: impl Into<String>, rect: Rect) -> Self {
        Self {
            id: Uuid::now_v7(),
            x: rect.min.x,
            y: rect.min.y,
            width: rect.width(),
            height: rect.height(),
            title: title.into(),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::from_min_size(Pos2::new(self.x, self.y), Vec2::new(self.width, self.height))
    }
}

/// A deleted node together with the connections that were cascaded away,
/// each tagged with the index it occupied in the edge list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemovedNode {
    pub node: Node,
    pub connections: Vec<(usize, Connection)>,
}

/// Nodes keyed by id plus a flat edge list resolved by id lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    connections: Vec<Connection>,
    #[serde(default)]
    frames: Vec<Frame>,
}

impl GraphStore {
    pub fn new() -> Self { Self::default() }

    // Rebuild from stored parts, dropping connections whose endpoints are gone
    pub fn from_parts(nodes: Vec<Node>, connections: Vec<Connection>, frames: Vec<Frame>) -> Self {
        let mut store = GraphStore {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
            connections: Vec::with_capacity(connections.len()),
            frames,
        };
        for c in connections {
            let idx = store.connections.len();
            if !store.insert_connection(idx, c.clone()) {
                log::warn!("dropping dangling or duplicate connection {}", c.id);
            }
        }
        store
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(&id) }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }
    pub fn node_ids(&self) -> Vec<NodeId> { self.nodes.keys().copied().collect() }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn contains_node(&self, id: NodeId) -> bool { self.nodes.contains_key(&id) }

    pub fn connections(&self) -> &[Connection] { &self.connections }
    pub fn connection_count(&self) -> usize { self.connections.len() }
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn frames(&self) -> &[Frame] { &self.frames }
    pub fn frame(&self, id: FrameId) -> Option<&Frame> { self.frames.iter().find(|f| f.id == id) }

    // Node CRUD
    pub fn create_node(&mut self, data: NodeData, pos: Pos2) -> NodeId {
        let node = Node::new(data, pos);
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Insert a fully formed node, replacing any node with the same id.
    pub fn insert_node(&mut self, node: Node) -> Option<Node> {
        self.nodes.insert(node.id, node)
    }

    /// Merge `patch` into the node and return its pre-image.
    pub fn update_node(&mut self, id: NodeId, patch: NodePatch) -> Option<Node> {
        let node = self.nodes.get_mut(&id)?;
        let before = node.clone();
        if let Some(pos) = patch.pos {
            node.pos = pos;
        }
        if let Some(data) = patch.data {
            node.data = data;
        }
        if let Some(locked) = patch.locked {
            node.locked = locked;
        }
        Some(before)
    }

    // Overwrite an existing node wholesale; unknown ids are ignored
    pub fn replace_node(&mut self, node: Node) -> bool {
        match self.nodes.get_mut(&node.id) {
            Some(slot) => {
                *slot = node;
                true
            }
            None => false,
        }
    }

    pub fn set_position(&mut self, id: NodeId, pos: Pos2) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.pos = pos;
                true
            }
            None => false,
        }
    }

    pub fn delete_node(&mut self, id: NodeId) -> Option<RemovedNode> {
        let node = self.nodes.remove(&id)?;
        // Cascade delete connections involving this node, remembering their slots
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.connections.len());
        for (idx, c) in self.connections.drain(..).enumerate() {
            if c.from == id || c.to == id {
                removed.push((idx, c));
            } else {
                kept.push(c);
            }
        }
        self.connections = kept;
        Some(RemovedNode { node, connections: removed })
    }

    // Connections
    pub fn has_connection(&self, from: NodeId, to: NodeId) -> bool {
        self.connections.iter().any(|c| c.from == from && c.to == to)
    }

    /// Add a connection; `None` for self-loops, missing endpoints or a
    /// duplicate (from, to) pair.
    pub fn create_connection(&mut self, from: NodeId, to: NodeId, style: ConnectionStyle) -> Option<ConnectionId> {
        let connection = Connection { id: Uuid::now_v7(), from, to, style };
        let id = connection.id;
        let idx = self.connections.len();
        self.insert_connection(idx, connection).then_some(id)
    }

    pub fn insert_connection(&mut self, index: usize, connection: Connection) -> bool {
        if connection.from == connection.to
            || !self.nodes.contains_key(&connection.from)
            || !self.nodes.contains_key(&connection.to)
            || self.has_connection(connection.from, connection.to)
            || self.connection(connection.id).is_some()
        {
            return false;
        }
        let index = index.min(self.connections.len());
        self.connections.insert(index, connection);
        true
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Option<(usize, Connection)> {
        let idx = self.connections.iter().position(|c| c.id == id)?;
        Some((idx, self.connections.remove(idx)))
    }

    // Frames
    pub fn create_frame(&mut self, title: impl Into<String>, rect: Rect) -> FrameId {
        let frame = Frame::new(title, rect);
        let id = frame.id;
        self.frames.push(frame);
        id
    }

    pub fn insert_frame(&mut self, index: usize, frame: Frame) -> bool {
        if self.frame(frame.id).is_some() {
            return false;
        }
        let index = index.min(self.frames.len());
        self.frames.insert(index, frame);
        true
    }

    /// Overwrite a frame and return its pre-image.
    pub fn replace_frame(&mut self, frame: Frame) -> Option<Frame> {
        let slot = self.frames.iter_mut().find(|f| f.id == frame.id)?;
        Some(std::mem::replace(slot, frame))
    }

    pub fn delete_frame(&mut self, id: FrameId) -> Option<(usize, Frame)> {
        let idx = self.frames.iter().position(|f| f.id == id)?;
        Some((idx, self.frames.remove(idx)))
    }

    /// Nodes whose footprint lies entirely inside the frame.
    pub fn frame_members(&self, id: FrameId) -> Vec<NodeId> {
        let Some(frame) = self.frame(id) else { return Vec::new() };
        let area = frame.rect();
        self.nodes
            .values()
            .filter_map(|n| if area.contains_rect(n.rect()) { Some(n.id) } else { None })
            .collect()
    }

    // Spatial queries
    pub fn nodes_in_rect(&self, rect: Rect) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter_map(|n| if n.rect().intersects(rect) { Some(n.id) } else { None })
            .collect()
    }

    /// Closest node whose footprint lies within `radius` of `point`.
    pub fn nearest_node(&self, point: Pos2, radius: f32) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for n in self.nodes.values() {
            let d = distance_to_rect(n.rect(), point);
            if d > radius {
                continue;
            }
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((n.id, d)),
            }
        }
        best.map(|(id, _)| id)
    }

    // Later nodes draw on top, so hit-testing walks in reverse
    pub fn node_at(&self, point: Pos2) -> Option<NodeId> {
        self.nodes.values().rev().find(|n| n.rect().contains(point)).map(|n| n.id)
    }

    pub fn header_at(&self, point: Pos2) -> Option<NodeId> {
        self.nodes.values().rev().find(|n| n.header_rect().contains(point)).map(|n| n.id)
    }

    pub fn output_port_at(&self, point: Pos2, radius: f32) -> Option<NodeId> {
        self.nodes
            .values()
            .rev()
            .find(|n| n.output_port().distance(point) <= radius)
            .map(|n| n.id)
    }

    /// Bounding box of every node footprint.
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes.values().map(|n| n.rect()).reduce(|a, b| a.union(b))
    }
}

fn distance_to_rect(rect: Rect, p: Pos2) -> f32 {
    let dx = (rect.min.x - p.x).max(0.0).max(p.x - rect.max.x);
    let dy = (rect.min.y - p.y).max(0.0).max(p.y - rect.max.y);
    (dx * dx + dy * dy).sqrt()
}
