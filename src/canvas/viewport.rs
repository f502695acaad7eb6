use egui::{Pos2, Rect, Vec2};
use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.2;
pub const MAX_ZOOM: f32 = 2.5;
// Scroll units to zoom factor, and the per-event factor bounds
const ZOOM_SENSITIVITY: f32 = 0.001;
const MAX_STEP_FACTOR: f32 = 1.1;
const MIN_STEP_FACTOR: f32 = 0.9;

/// Pan/zoom transform between screen space and world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Vec2,
    zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { pan: Vec2::ZERO, zoom: 1.0 }
    }
}

impl Viewport {
    pub fn new(pan: Vec2, zoom: f32) -> Self {
        let mut v = Self { pan, zoom: 1.0 };
        v.set_zoom(zoom);
        v
    }

    pub fn zoom(&self) -> f32 { self.zoom }

    pub fn set_zoom(&mut self, zoom: f32) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn screen_to_world(&self, p: Pos2) -> Pos2 {
        Pos2::new((p.x - self.pan.x) / self.zoom, (p.y - self.pan.y) / self.zoom)
    }

    pub fn world_to_screen(&self, p: Pos2) -> Pos2 {
        Pos2::new(p.x * self.zoom + self.pan.x, p.y * self.zoom + self.pan.y)
    }

    pub fn world_rect_to_screen(&self, r: Rect) -> Rect {
        Rect::from_min_max(self.world_to_screen(r.min), self.world_to_screen(r.max))
    }

    pub fn pan_by(&mut self, screen_delta: Vec2) {
        if screen_delta.x.is_finite() && screen_delta.y.is_finite() {
            self.pan += screen_delta;
        }
    }

    /// Rescale by a scroll `delta`, keeping `anchor` (screen space) fixed.
    pub fn zoom_at(&mut self, delta: f32, anchor: Pos2) {
        if !delta.is_finite() {
            return;
        }
        let factor = (1.0 + delta * ZOOM_SENSITIVITY).clamp(MIN_STEP_FACTOR, MAX_STEP_FACTOR);
        self.zoom_to(self.zoom * factor, anchor);
    }

    pub fn zoom_to(&mut self, zoom: f32, anchor: Pos2) {
        let world = self.screen_to_world(anchor);
        self.set_zoom(zoom);
        self.pan = anchor.to_vec2() - world.to_vec2() * self.zoom;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fit `world` into a `screen` sized area with some breathing room.
    pub fn zoom_to_fit(&mut self, world: Rect, screen: Vec2) {
        const MARGIN: f32 = 40.0;
        if world.width() <= 0.0 || world.height() <= 0.0 {
            return;
        }
        let avail = (screen - Vec2::splat(MARGIN * 2.0)).max(Vec2::splat(1.0));
        self.set_zoom((avail.x / world.width()).min(avail.y / world.height()));
        let center_screen = (screen * 0.5).to_pos2();
        self.pan = center_screen.to_vec2() - world.center().to_vec2() * self.zoom;
    }
}
