#![allow(dead_code)]

use std::rc::Rc;

use egui::{Modifiers, PointerButton, Pos2, pos2};
use thinkspace::canvas::pointer::PointerInput;
use thinkspace::persistence::kv::MemoryKvStore;
use thinkspace::persistence::settings::AppSettings;
use thinkspace::persistence::snapshots::ManualClock;
use thinkspace::workspace::Workspace;
use time::macros::datetime;

pub struct Harness {
    pub ws: Workspace,
    pub clock: Rc<ManualClock>,
    pub store: MemoryKvStore,
}

pub fn harness() -> Harness {
    harness_with(AppSettings::default())
}

pub fn harness_with(settings: AppSettings) -> Harness {
    let clock = Rc::new(ManualClock::new(datetime!(2026-01-05 09:00 UTC)));
    let store = MemoryKvStore::new();
    let ws = Workspace::new(&settings, Box::new(store.clone()), clock.clone());
    Harness { ws, clock, store }
}

pub fn down(x: f32, y: f32) -> PointerInput {
    PointerInput::Down { pos: pos2(x, y), button: PointerButton::Primary, modifiers: Modifiers::NONE }
}

pub fn down_with(x: f32, y: f32, modifiers: Modifiers) -> PointerInput {
    PointerInput::Down { pos: pos2(x, y), button: PointerButton::Primary, modifiers }
}

pub fn drag_to(x: f32, y: f32) -> PointerInput {
    PointerInput::Move { pos: pos2(x, y), any_down: true }
}

pub fn up(x: f32, y: f32) -> PointerInput {
    PointerInput::Up { pos: pos2(x, y) }
}

pub fn note(title: &str) -> thinkspace::graph_utils::graph::NodeData {
    thinkspace::graph_utils::graph::NodeData::note(title, "")
}

pub fn collides(a: Pos2, b: Pos2) -> bool {
    (a.x - b.x).abs() < 250.0 && (a.y - b.y).abs() < 250.0
}
