// Pointer interaction state machine for the canvas.
//
// Input handling never fails: unexpected sequences (a press while another
// gesture is live, a move with no buttons held, focus loss) resolve the
// active gesture and fall back to Idle.

use std::collections::{BTreeSet, HashSet};

use egui::{Modifiers, PointerButton, Pos2, Rect, Vec2};

use super::Canvas;
use super::alignment::{self, Guide};
use crate::graph_utils::graph::{ConnectionStyle, NodeId, PORT_RADIUS};
use crate::history::{Command, NodeMove};

/// Raw pointer events in canvas-local screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerInput {
    Down { pos: Pos2, button: PointerButton, modifiers: Modifiers },
    Move { pos: Pos2, any_down: bool },
    Up { pos: Pos2 },
    Scroll { pos: Pos2, delta: f32 },
    FocusLost,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PointerState {
    Idle,
    PanningCanvas { last: Pos2, moved: bool, clears_selection: bool },
    DraggingNodes { origin: Pos2, starts: Vec<(NodeId, Pos2)> },
    MarqueeSelecting { anchor: Pos2, current: Pos2 },
    DrawingConnection { from: NodeId, endpoint: Pos2 },
}

#[derive(Debug)]
pub struct PointerController {
    state: PointerState,
    selection: BTreeSet<NodeId>,
    guides: Vec<Guide>,
}

impl Default for PointerController {
    fn default() -> Self {
        Self { state: PointerState::Idle, selection: BTreeSet::new(), guides: Vec::new() }
    }
}

impl PointerController {
    pub fn new() -> Self { Self::default() }

    pub fn state(&self) -> &PointerState { &self.state }
    pub fn is_idle(&self) -> bool { matches!(self.state, PointerState::Idle) }
    pub fn selection(&self) -> &BTreeSet<NodeId> { &self.selection }
    pub fn is_selected(&self, id: NodeId) -> bool { self.selection.contains(&id) }
    pub fn guides(&self) -> &[Guide] { &self.guides }

    pub fn select_only(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selection = ids.into_iter().collect();
    }

    pub fn clear_selection(&mut self) { self.selection.clear(); }

    // Drop ids that no longer exist (after delete, undo or restore)
    pub fn retain_existing(&mut self, canvas: &Canvas) {
        self.selection.retain(|id| canvas.graph.contains_node(*id));
    }

    /// Live marquee rectangle in world space.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match self.state {
            PointerState::MarqueeSelecting { anchor, current } => Some(Rect::from_two_pos(anchor, current)),
            _ => None,
        }
    }

    /// Rubber-band line (source port, pointer) in world space.
    pub fn rubber_band(&self, canvas: &Canvas) -> Option<(Pos2, Pos2)> {
        match self.state {
            PointerState::DrawingConnection { from, endpoint } => {
                canvas.graph.node(from).map(|n| (n.output_port(), endpoint))
            }
            _ => None,
        }
    }

    /// Feed one event. Returns true when a history entry was committed.
    pub fn handle(&mut self, canvas: &mut Canvas, input: PointerInput) -> bool {
        match input {
            PointerInput::Down { pos, button, modifiers } => self.pointer_down(canvas, pos, button, modifiers),
            PointerInput::Move { pos, any_down } => self.pointer_move(canvas, pos, any_down),
            PointerInput::Up { pos } => {
                if !finite(pos) {
                    return self.finish(canvas, None, true);
                }
                self.finish(canvas, Some(pos), false)
            }
            PointerInput::Scroll { pos, delta } => {
                if finite(pos) {
                    canvas.viewport.zoom_at(delta, pos);
                }
                false
            }
            PointerInput::FocusLost => self.finish(canvas, None, true),
        }
    }

    /// Resolve any live gesture, then clear selection and guides.
    pub fn escape(&mut self, canvas: &mut Canvas) -> bool {
        let committed = self.finish(canvas, None, true);
        self.selection.clear();
        self.guides.clear();
        committed
    }

    fn pointer_down(&mut self, canvas: &mut Canvas, pos: Pos2, button: PointerButton, modifiers: Modifiers) -> bool {
        if !finite(pos) {
            return false;
        }
        // A press during a live gesture means the release was missed
        let committed = self.finish(canvas, Some(pos), true);
        let additive = modifiers.shift || modifiers.command;
        match button {
            PointerButton::Primary => {}
            PointerButton::Middle => {
                self.state = PointerState::PanningCanvas { last: pos, moved: false, clears_selection: false };
                return committed;
            }
            _ => return committed,
        }

        let world = canvas.viewport.screen_to_world(pos);
        let port_radius = PORT_RADIUS / canvas.viewport.zoom();
        if let Some(id) = canvas.graph.output_port_at(world, port_radius) {
            self.state = PointerState::DrawingConnection { from: id, endpoint: world };
        } else if let Some(id) = canvas.graph.header_at(world) {
            self.press_node(id, additive);
            let starts: Vec<(NodeId, Pos2)> = self
                .selection
                .iter()
                .filter_map(|sid| canvas.graph.node(*sid))
                .filter(|n| !n.locked)
                .map(|n| (n.id, n.pos))
                .collect();
            let grabbed_unlocked = canvas.graph.node(id).map(|n| !n.locked).unwrap_or(false);
            if grabbed_unlocked && !starts.is_empty() {
                self.state = PointerState::DraggingNodes { origin: world, starts };
            }
        } else if let Some(id) = canvas.graph.node_at(world) {
            // body press selects but leaves the content area to the node itself
            self.press_node(id, additive);
        } else if additive {
            self.state = PointerState::MarqueeSelecting { anchor: world, current: world };
        } else {
            self.state = PointerState::PanningCanvas { last: pos, moved: false, clears_selection: true };
        }
        committed
    }

    fn press_node(&mut self, id: NodeId, additive: bool) {
        if additive {
            self.selection.insert(id);
        } else if !self.selection.contains(&id) {
            self.selection.clear();
            self.selection.insert(id);
        }
    }

    fn pointer_move(&mut self, canvas: &mut Canvas, pos: Pos2, any_down: bool) -> bool {
        if !finite(pos) {
            return false;
        }
        if !any_down {
            // resync: the release event never arrived
            return self.finish(canvas, Some(pos), true);
        }
        let world = canvas.viewport.screen_to_world(pos);
        match &mut self.state {
            PointerState::Idle => {}
            PointerState::PanningCanvas { last, moved, .. } => {
                let delta: Vec2 = pos - *last;
                if delta != Vec2::ZERO {
                    canvas.viewport.pan_by(delta);
                    *moved = true;
                }
                *last = pos;
            }
            PointerState::DraggingNodes { origin, starts } => {
                let delta = world - *origin;
                for (id, start) in starts.iter() {
                    let target = canvas.layout.snap(*start + delta);
                    canvas.graph.set_position(*id, target);
                }
                let moving: HashSet<NodeId> = starts.iter().map(|(id, _)| *id).collect();
                let threshold = canvas.layout.alignment_threshold / canvas.viewport.zoom();
                let mut guides = Vec::new();
                for id in &moving {
                    for g in alignment::compute_guides(&canvas.graph, *id, &moving, threshold) {
                        if !guides.contains(&g) {
                            guides.push(g);
                        }
                    }
                }
                self.guides = guides;
            }
            PointerState::MarqueeSelecting { current, .. } => *current = world,
            PointerState::DrawingConnection { endpoint, .. } => *endpoint = world,
        }
        false
    }

    // Commit the active gesture and return to Idle. `pos` is the release
    // point when known; `cancel_connection` abandons a connection draw.
    fn finish(&mut self, canvas: &mut Canvas, pos: Option<Pos2>, cancel_connection: bool) -> bool {
        let state = std::mem::replace(&mut self.state, PointerState::Idle);
        self.guides.clear();
        let world = pos.map(|p| canvas.viewport.screen_to_world(p));
        match state {
            PointerState::Idle => false,
            PointerState::PanningCanvas { moved, clears_selection, .. } => {
                if !moved && clears_selection {
                    self.selection.clear();
                }
                false
            }
            PointerState::DraggingNodes { starts, .. } => {
                let moves: Vec<NodeMove> = starts
                    .into_iter()
                    .filter_map(|(id, from)| {
                        let to = canvas.graph.node(id)?.pos;
                        (from != to).then_some(NodeMove { id, from, to })
                    })
                    .collect();
                if moves.is_empty() {
                    return false;
                }
                canvas.history.record(Command::MoveNodes { moves });
                true
            }
            PointerState::MarqueeSelecting { anchor, current } => {
                let corner = world.unwrap_or(current);
                let rect = Rect::from_two_pos(anchor, corner);
                self.selection = canvas.graph.nodes_in_rect(rect).into_iter().collect();
                false
            }
            PointerState::DrawingConnection { from, endpoint } => {
                if cancel_connection {
                    return false;
                }
                let drop_at = world.unwrap_or(endpoint);
                let target = canvas
                    .graph
                    .node_at(drop_at)
                    .or_else(|| canvas.graph.nearest_node(drop_at, canvas.layout.connect_radius));
                let Some(to) = target.filter(|t| *t != from) else { return false };
                let Some(cid) = canvas.graph.create_connection(from, to, ConnectionStyle::Solid) else {
                    log::debug!("connection {from} -> {to} rejected");
                    return false;
                };
                let Some(index) = canvas.graph.connections().iter().position(|c| c.id == cid) else {
                    return false;
                };
                let connection = canvas.graph.connections()[index].clone();
                canvas.history.record(Command::CreateConnection { index, connection });
                true
            }
        }
    }
}

fn finite(p: Pos2) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
