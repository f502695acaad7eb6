// Translate one frame's egui events into canvas inputs.
//
// Button state is tracked per event, so a move queued before a release in
// the same frame still reports the button as held.

use eframe::egui::{self, Event, Pos2, Vec2};

use crate::canvas::pointer::PointerInput;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CanvasAction {
    Pointer(PointerInput),
    Escape,
    DeleteSelection,
}

#[derive(Debug, Default)]
pub struct InputTracker {
    buttons_down: bool,
    last_pos: Option<Pos2>,
}

impl InputTracker {
    pub fn new() -> Self { Self::default() }

    pub fn buttons_down(&self) -> bool { self.buttons_down }

    /// `origin` is the canvas top-left in screen space; `hovered` gates new
    /// presses; `any_down_after` is egui's button state at the end of the
    /// frame and is only used to catch a release that never arrived.
    pub fn translate(&mut self, events: &[Event], origin: Vec2, hovered: bool, any_down_after: bool) -> Vec<CanvasAction> {
        let mut out = Vec::new();
        for ev in events {
            match ev {
                Event::PointerButton { pos, button, pressed, modifiers } => {
                    let local = *pos - origin;
                    self.last_pos = Some(local);
                    if *pressed {
                        self.buttons_down = true;
                        if hovered {
                            out.push(CanvasAction::Pointer(PointerInput::Down { pos: local, button: *button, modifiers: *modifiers }));
                        }
                    } else {
                        self.buttons_down = false;
                        out.push(CanvasAction::Pointer(PointerInput::Up { pos: local }));
                    }
                }
                Event::PointerMoved(pos) => {
                    let local = *pos - origin;
                    self.last_pos = Some(local);
                    out.push(CanvasAction::Pointer(PointerInput::Move { pos: local, any_down: self.buttons_down }));
                }
                Event::WindowFocused(false) => {
                    self.buttons_down = false;
                    out.push(CanvasAction::Pointer(PointerInput::FocusLost));
                }
                Event::Key { key: egui::Key::Escape, pressed: true, .. } => out.push(CanvasAction::Escape),
                Event::Key { key: egui::Key::Delete, pressed: true, .. } => out.push(CanvasAction::DeleteSelection),
                _ => {}
            }
        }
        if self.buttons_down && !any_down_after {
            // release happened somewhere we never saw it
            self.buttons_down = false;
            if let Some(pos) = self.last_pos {
                out.push(CanvasAction::Pointer(PointerInput::Move { pos, any_down: false }));
            }
        }
        out
    }
}
