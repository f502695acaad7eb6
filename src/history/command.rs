use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::{Connection, Frame, GraphStore, Node, NodeId, RemovedNode};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMove {
    pub id: NodeId,
    pub from: Pos2,
    pub to: Pos2,
}

/// Data-only undo entry: an operation tag plus the before/after payload
/// needed to replay it in either direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    CreateNode { node: Node },
    UpdateNode { before: Node, after: Node },
    DeleteNode { removed: RemovedNode },
    MoveNodes { moves: Vec<NodeMove> },
    CreateConnection { index: usize, connection: Connection },
    DeleteConnection { index: usize, connection: Connection },
    CreateFrame { index: usize, frame: Frame },
    UpdateFrame { before: Frame, after: Frame },
    DeleteFrame { index: usize, frame: Frame },
    // Composite gesture recorded as one entry; reverted back to front
    Batch { label: String, commands: Vec<Command> },
}

impl Command {
    pub fn label(&self) -> &str {
        match self {
            Command::CreateNode { .. } => "create node",
            Command::UpdateNode { .. } => "update node",
            Command::DeleteNode { .. } => "delete node",
            Command::MoveNodes { .. } => "move nodes",
            Command::CreateConnection { .. } => "create connection",
            Command::DeleteConnection { .. } => "delete connection",
            Command::CreateFrame { .. } => "create frame",
            Command::UpdateFrame { .. } => "update frame",
            Command::DeleteFrame { .. } => "delete frame",
            Command::Batch { label, .. } => label,
        }
    }

    /// Re-run the operation against `graph`.
    pub fn apply(&self, graph: &mut GraphStore) {
        match self {
            Command::CreateNode { node } => {
                graph.insert_node(node.clone());
            }
            Command::UpdateNode { after, .. } => {
                graph.replace_node(after.clone());
            }
            Command::DeleteNode { removed } => {
                graph.delete_node(removed.node.id);
            }
            Command::MoveNodes { moves } => {
                for m in moves {
                    graph.set_position(m.id, m.to);
                }
            }
            Command::CreateConnection { index, connection } => {
                graph.insert_connection(*index, connection.clone());
            }
            Command::DeleteConnection { connection, .. } => {
                graph.delete_connection(connection.id);
            }
            Command::CreateFrame { index, frame } => {
                graph.insert_frame(*index, frame.clone());
            }
            Command::UpdateFrame { after, .. } => {
                graph.replace_frame(after.clone());
            }
            Command::DeleteFrame { frame, .. } => {
                graph.delete_frame(frame.id);
            }
            Command::Batch { commands, .. } => {
                for c in commands {
                    c.apply(graph);
                }
            }
        }
    }

    /// Apply the inverse of the operation against `graph`.
    pub fn revert(&self, graph: &mut GraphStore) {
        match self {
            Command::CreateNode { node } => {
                graph.delete_node(node.id);
            }
            Command::UpdateNode { before, .. } => {
                graph.replace_node(before.clone());
            }
            Command::DeleteNode { removed } => {
                graph.insert_node(removed.node.clone());
                // ascending slot order reproduces the original edge list
                for (idx, c) in &removed.connections {
                    graph.insert_connection(*idx, c.clone());
                }
            }
            Command::MoveNodes { moves } => {
                for m in moves {
                    graph.set_position(m.id, m.from);
                }
            }
            Command::CreateConnection { connection, .. } => {
                graph.delete_connection(connection.id);
            }
            Command::DeleteConnection { index, connection } => {
                graph.insert_connection(*index, connection.clone());
            }
            Command::CreateFrame { frame, .. } => {
                graph.delete_frame(frame.id);
            }
            Command::UpdateFrame { before, .. } => {
                graph.replace_frame(before.clone());
            }
            Command::DeleteFrame { index, frame } => {
                graph.insert_frame(*index, frame.clone());
            }
            Command::Batch { commands, .. } => {
                for c in commands.iter().rev() {
                    c.revert(graph);
                }
            }
        }
    }
}
