use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph_utils::graph::{GraphStore, NODE_SIZE, NodeId};

/// Transient snap guide shown while dragging. World-space coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Guide {
    Vertical(f32),
    Horizontal(f32),
}

/// Guides for `moving` against every node not in `exclude`. Purely
/// informational: positions are never adjusted here.
pub fn compute_guides(graph: &GraphStore, moving: NodeId, exclude: &HashSet<NodeId>, threshold: f32) -> Vec<Guide> {
    let Some(node) = graph.node(moving) else { return Vec::new() };
    let half = NODE_SIZE.x * 0.5;
    let (x, cx, y) = (node.pos.x, node.pos.x + half, node.pos.y);
    let mut guides = Vec::new();
    for other in graph.nodes() {
        if other.id == moving || exclude.contains(&other.id) {
            continue;
        }
        let (ox, ocx, oy) = (other.pos.x, other.pos.x + half, other.pos.y);
        if (x - ox).abs() < threshold {
            push_unique(&mut guides, Guide::Vertical(ox));
        }
        if (cx - ocx).abs() < threshold {
            push_unique(&mut guides, Guide::Vertical(ocx));
        }
        if (y - oy).abs() < threshold {
            push_unique(&mut guides, Guide::Horizontal(oy));
        }
    }
    guides
}

fn push_unique(guides: &mut Vec<Guide>, g: Guide) {
    if !guides.contains(&g) {
        guides.push(g);
    }
}
