pub mod alignment;
pub mod placement;
pub mod pointer;
pub mod viewport;

use egui::Pos2;

use crate::graph_utils::graph::GraphStore;
use crate::history::HistoryLog;
use crate::persistence::settings::AppSettings;

use self::viewport::Viewport;

pub const GRID_UNIT: f32 = 20.0;

/// Layout tunables shared by dragging, placement and alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutConfig {
    pub grid_unit: f32,
    pub alignment_threshold: f32,
    pub collision_extent: f32,
    pub placement_radius: f32,
    pub placement_radius_step: f32,
    pub placement_attempts: usize,
    pub placement_angle_jitter: f32,
    // world-space slop when dropping a connection near a node
    pub connect_radius: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_unit: GRID_UNIT,
            alignment_threshold: 5.0,
            collision_extent: 250.0,
            placement_radius: 400.0,
            placement_radius_step: 120.0,
            placement_attempts: 8,
            placement_angle_jitter: 0.5,
            connect_radius: 30.0,
        }
    }
}

impl LayoutConfig {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            grid_unit: settings.grid_unit,
            alignment_threshold: settings.alignment_threshold,
            collision_extent: settings.collision_extent,
            placement_radius: settings.placement_radius,
            placement_radius_step: settings.placement_radius_step,
            placement_attempts: settings.placement_attempts,
            ..Self::default()
        }
    }

    pub fn snap(&self, p: Pos2) -> Pos2 {
        Pos2::new(snap_to_grid(p.x, self.grid_unit), snap_to_grid(p.y, self.grid_unit))
    }
}

pub fn snap_to_grid(v: f32, unit: f32) -> f32 {
    if unit <= 0.0 {
        return v;
    }
    (v / unit).round() * unit
}

/// Explicit handle to the interactive canvas: graph, view and undo log.
/// Consumers mutate only through these owned parts.
#[derive(Debug, Default)]
pub struct Canvas {
    pub graph: GraphStore,
    pub viewport: Viewport,
    pub history: HistoryLog,
    pub layout: LayoutConfig,
}

impl Canvas {
    pub fn new(layout: LayoutConfig, history_cap: usize) -> Self {
        Self {
            graph: GraphStore::new(),
            viewport: Viewport::default(),
            history: HistoryLog::with_capacity(history_cap),
            layout,
        }
    }

    pub fn undo(&mut self) -> bool { self.history.undo(&mut self.graph) }

    pub fn redo(&mut self) -> bool { self.history.redo(&mut self.graph) }
}
