// Collision-avoiding radial placement for generated sibling nodes.
//
// Siblings fan out evenly around the parent. A candidate that lands too
// close to an existing node is pushed outward and rotated a little on each
// retry, so progress is bounded by the attempt count.

use std::f32::consts::TAU;

use egui::{Pos2, Vec2};

use super::LayoutConfig;
use crate::graph_utils::graph::GraphStore;

pub fn collides(a: Pos2, b: Pos2, extent: f32) -> bool {
    (a.x - b.x).abs() < extent && (a.y - b.y).abs() < extent
}

/// Position for sibling `index` of `count` around `parent`, avoiding every
/// position in `occupied`. Falls back to the last candidate tried.
pub fn place_sibling(occupied: &[Pos2], parent: Pos2, index: usize, count: usize, cfg: &LayoutConfig) -> Pos2 {
    let count = count.max(1);
    let mut angle = (index as f32 / count as f32) * TAU;
    let mut radius = cfg.placement_radius;
    let mut candidate = cfg.snap(parent);
    for attempt in 0..cfg.placement_attempts.max(1) {
        candidate = cfg.snap(parent + Vec2::angled(angle) * radius);
        if !occupied.iter().any(|p| collides(candidate, *p, cfg.collision_extent)) {
            return candidate;
        }
        radius += cfg.placement_radius_step;
        angle += attempt as f32 * cfg.placement_angle_jitter;
    }
    log::debug!("placement gave up after {} attempts for sibling {index}", cfg.placement_attempts);
    candidate
}

/// Place `count` siblings around `parent`; each placed sibling counts as
/// occupied for the ones after it.
pub fn place_siblings(graph: &GraphStore, parent: Pos2, count: usize, cfg: &LayoutConfig) -> Vec<Pos2> {
    let mut occupied: Vec<Pos2> = graph.nodes().map(|n| n.pos).collect();
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let p = place_sibling(&occupied, parent, i, count, cfg);
        occupied.push(p);
        out.push(p);
    }
    out
}
