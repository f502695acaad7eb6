use std::rc::Rc;
use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Pos2, Rect, Sense, Stroke, Vec2};

use crate::canvas::alignment::Guide;
use crate::canvas::pointer::PointerInput;
use crate::graph_utils::graph::{ConnectionStyle, NodeData, NodeKind};
use crate::gui::input::{CanvasAction, InputTracker};
use crate::persistence::kv::FileKvStore;
use crate::persistence::persist::{self, WorkspaceFile};
use crate::persistence::settings::AppSettings;
use crate::persistence::snapshots::SystemClock;
use crate::workspace::Workspace;

#[derive(Clone, Copy, Debug)]
enum SnapshotAction {
    Restore(usize),
    Export(usize),
    Delete(usize),
}

pub struct ThinkspaceApp {
    ws: Workspace,
    settings: AppSettings,
    status: Option<String>,
    // Timestamp for the transient status banner
    status_time: Option<Instant>,
    show_snapshots: bool,
    last_canvas_rect: Option<Rect>,
    input: InputTracker,
}

impl ThinkspaceApp {
    pub fn new(settings: AppSettings, loaded: Option<WorkspaceFile>) -> Self {
        let storage = Box::new(FileKvStore::new(settings.autosave_dir()));
        let clock = Rc::new(SystemClock::default());
        let ws = match loaded {
            Some(file) => Workspace::from_file(file, &settings, storage, clock),
            None => Workspace::new(&settings, storage, clock),
        };
        Self { ws, settings, status: None, status_time: None, show_snapshots: false, last_canvas_rect: None, input: InputTracker::new() }
    }

    fn notify(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
        self.status_time = Some(Instant::now());
    }

    fn save_now(&mut self) {
        match persist::save_active(&self.settings.autosave_dir(), &self.ws.to_file()) {
            Ok(path) => self.notify(format!("Saved to {}", path.display())),
            Err(e) => {
                log::warn!("save failed: {e}");
                self.notify(format!("Save failed: {e}"));
            }
        }
    }

    fn save_versioned_now(&mut self) {
        match persist::save_versioned(&self.settings.autosave_dir(), &self.ws.to_file()) {
            Ok(path) => self.notify(format!("Saved version {}", path.display())),
            Err(e) => self.notify(format!("Save version failed: {e}")),
        }
    }

    fn export_now(&mut self) {
        let now = time::OffsetDateTime::now_utc();
        let fmt = time::macros::format_description!("[year][month][day]_[hour][minute][second]");
        let stamp = now.format(&fmt).unwrap_or_else(|_| "now".into());
        let path = self.settings.export_dir().join(format!("canvas_export_{}.json", stamp));
        match self.ws.export_workspace().write_json(&path) {
            Ok(()) => self.notify(format!("Exported to {}", path.display())),
            Err(e) => self.notify(format!("Export failed: {e}")),
        }
    }

    // New nodes land at the centre of the visible canvas
    fn view_center_world(&self) -> Pos2 {
        let size = self.last_canvas_rect.map(|r| r.size()).unwrap_or(Vec2::new(800.0, 600.0));
        self.ws.viewport().screen_to_world((size * 0.5).to_pos2())
    }

    fn apply_snapshot_action(&mut self, action: SnapshotAction) {
        match action {
            SnapshotAction::Restore(i) => {
                if self.ws.restore_snapshot(i) {
                    self.notify(format!("Restored snapshot #{}", i + 1));
                }
            }
            SnapshotAction::Export(i) => {
                let path = self.settings.export_dir().join(format!("snapshot_{}.json", i + 1));
                match self.ws.export_snapshot_to(i, &path) {
                    Ok(true) => self.notify(format!("Exported snapshot to {}", path.display())),
                    Ok(false) => {}
                    Err(e) => self.notify(format!("Snapshot export failed: {e}")),
                }
            }
            SnapshotAction::Delete(i) => {
                self.ws.delete_snapshot(i);
            }
        }
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        if ctx.input_mut(|i| i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND | egui::Modifiers::SHIFT, egui::Key::Z))) {
            self.ws.redo();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::Z))) {
            self.ws.undo();
        }
        if ctx.input_mut(|i| i.consume_shortcut(&egui::KeyboardShortcut::new(egui::Modifiers::COMMAND, egui::Key::S))) {
            self.save_now();
        }

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Thinkspace");
                ui.menu_button("File", |ui| {
                    if ui.button("Save").clicked() {
                        self.save_now();
                        ui.close();
                    }
                    if ui.button("Save Version").clicked() {
                        self.save_versioned_now();
                        ui.close();
                    }
                    if ui.button("Export Canvas").clicked() {
                        self.export_now();
                        ui.close();
                    }
                });
                ui.separator();
                if ui.add_enabled(self.ws.can_undo(), egui::Button::new("Undo")).clicked() {
                    self.ws.undo();
                }
                if ui.add_enabled(self.ws.can_redo(), egui::Button::new("Redo")).clicked() {
                    self.ws.redo();
                }
                ui.separator();
                if ui.button("New Note").clicked() {
                    let at = self.view_center_world();
                    let pos = self.ws.canvas().layout.snap(at);
                    self.ws.create_node(NodeData::note("Untitled", ""), pos);
                }
                let has_selection = !self.ws.pointer().selection().is_empty();
                if ui.add_enabled(has_selection, egui::Button::new("Lock")).clicked() {
                    let ids: Vec<_> = self.ws.pointer().selection().iter().copied().collect();
                    for id in ids {
                        let locked = self.ws.graph().node(id).map(|n| n.locked).unwrap_or(false);
                        self.ws.set_locked(id, !locked);
                    }
                }
                if ui.add_enabled(has_selection, egui::Button::new("Delete")).clicked() {
                    self.ws.delete_selection();
                }
                ui.separator();
                if ui.button("Snapshot").clicked() {
                    self.ws.take_snapshot();
                    self.notify("Snapshot taken");
                }
                ui.toggle_value(&mut self.show_snapshots, "Time Machine");
                ui.separator();
                if ui.button("Reset View").clicked() {
                    self.ws.viewport_mut().reset();
                }
                if ui.button("Fit").clicked() {
                    if let (Some(bounds), Some(rect)) = (self.ws.graph().bounds(), self.last_canvas_rect) {
                        self.ws.viewport_mut().zoom_to_fit(bounds, rect.size());
                    }
                }
                ui.label(format!("{:.2}x", self.ws.viewport().zoom()));
                if let (Some(msg), Some(t)) = (&self.status, self.status_time) {
                    if t.elapsed() < Duration::from_secs(4) {
                        ui.separator();
                        ui.small(msg.clone());
                    }
                }
            });
        });
    }

    fn snapshot_window(&mut self, ctx: &egui::Context) {
        if !self.show_snapshots {
            return;
        }
        let mut open = true;
        let mut action = None;
        let current = self.ws.snapshots().current_index();
        let summaries = self.ws.snapshots().summaries();
        let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        egui::Window::new("Time Machine").open(&mut open).show(ctx, |ui| {
            if summaries.is_empty() {
                ui.label("No snapshots yet.");
            }
            egui::ScrollArea::vertical().max_height(360.0).show(ui, |ui| {
                for (i, s) in summaries.iter().enumerate().rev() {
                    ui.horizontal(|ui| {
                        let stamp = s.timestamp.format(&fmt).unwrap_or_else(|_| "?".into());
                        let marker = if current == Some(i) { ">" } else { " " };
                        ui.label(format!("{marker} {stamp}  {} nodes, {} links", s.node_count, s.connection_count));
                        if ui.small_button("Restore").clicked() {
                            action = Some(SnapshotAction::Restore(i));
                        }
                        if ui.small_button("Export").clicked() {
                            action = Some(SnapshotAction::Export(i));
                        }
                        if ui.small_button("Delete").clicked() {
                            action = Some(SnapshotAction::Delete(i));
                        }
                    });
                }
            });
        });
        if let Some(a) = action {
            self.apply_snapshot_action(a);
        }
        if !open {
            self.show_snapshots = false;
        }
    }

    fn feed_input(&mut self, ctx: &egui::Context, canvas: Rect, hovered: bool) {
        let origin = canvas.min.to_vec2();
        let (events, any_down, hover_pos, scroll) =
            ctx.input(|i| (i.events.clone(), i.pointer.any_down(), i.pointer.hover_pos(), i.raw_scroll_delta.y));
        for action in self.input.translate(&events, origin, hovered, any_down) {
            match action {
                CanvasAction::Pointer(input) => {
                    self.ws.handle_pointer(input);
                }
                CanvasAction::Escape => {
                    self.ws.escape();
                    self.show_snapshots = false;
                }
                CanvasAction::DeleteSelection => {
                    self.ws.delete_selection();
                }
            }
        }
        if hovered && scroll != 0.0 {
            if let Some(p) = hover_pos {
                self.ws.handle_pointer(PointerInput::Scroll { pos: p - origin, delta: scroll });
            }
        }
    }

    fn paint_canvas(&self, ui: &egui::Ui, canvas: Rect) {
        let painter = ui.painter_at(canvas);
        let origin = canvas.min.to_vec2();
        let view = *self.ws.viewport();
        let zoom = view.zoom();
        let to_screen = move |p: Pos2| view.world_to_screen(p) + origin;
        let to_screen_rect = move |r: Rect| view.world_rect_to_screen(r).translate(origin);

        painter.rect_filled(canvas, 0.0, Color32::from_rgb(24, 24, 28));

        for frame in self.ws.graph().frames() {
            let r = to_screen_rect(frame.rect());
            painter.rect_filled(r, 8.0, Color32::from_rgba_unmultiplied(90, 110, 160, 30));
            painter.rect_stroke(r, 8.0, Stroke::new(1.0, Color32::from_rgb(90, 110, 160)), egui::StrokeKind::Inside);
            painter.text(
                r.min + Vec2::new(8.0, 6.0),
                egui::Align2::LEFT_TOP,
                &frame.title,
                egui::FontId::proportional((13.0 * zoom).clamp(9.0, 20.0)),
                Color32::from_rgb(160, 175, 210),
            );
        }

        let edge_color = Color32::from_rgba_unmultiplied(200, 200, 200, 200);
        for c in self.ws.graph().connections() {
            let (Some(a), Some(b)) = (self.ws.graph().node(c.from), self.ws.graph().node(c.to)) else { continue };
            let (pa, pb) = (to_screen(a.output_port()), to_screen(b.input_port()));
            let stroke = Stroke::new(1.5, edge_color);
            match c.style {
                ConnectionStyle::Solid => {
                    painter.line_segment([pa, pb], stroke);
                }
                ConnectionStyle::Dashed => {
                    painter.extend(egui::Shape::dashed_line(&[pa, pb], stroke, 8.0, 5.0));
                }
                ConnectionStyle::Dotted => {
                    painter.extend(egui::Shape::dashed_line(&[pa, pb], stroke, 2.0, 4.0));
                }
            }
        }

        for node in self.ws.graph().nodes() {
            let r = to_screen_rect(node.rect());
            let header = to_screen_rect(node.header_rect());
            let selected = self.ws.pointer().is_selected(node.id);
            painter.rect_filled(r, 6.0, Color32::from_rgb(44, 46, 54));
            painter.rect_filled(header, 6.0, kind_color(node.kind()));
            let outline = if selected {
                Stroke::new(2.0, Color32::from_rgb(255, 200, 80))
            } else {
                Stroke::new(1.0, Color32::from_rgb(70, 72, 80))
            };
            painter.rect_stroke(r, 6.0, outline, egui::StrokeKind::Inside);
            let mut title = node.data.title().to_string();
            if node.locked {
                title.push_str(" (locked)");
            }
            painter.text(
                header.left_center() + Vec2::new(6.0, 0.0),
                egui::Align2::LEFT_CENTER,
                title,
                egui::FontId::proportional((13.0 * zoom).clamp(8.0, 22.0)),
                Color32::WHITE,
            );
            if let NodeData::Note { content, .. } = &node.data {
                let snippet: String = content.chars().take(120).collect();
                painter.text(
                    header.left_bottom() + Vec2::new(6.0, 6.0),
                    egui::Align2::LEFT_TOP,
                    snippet,
                    egui::FontId::proportional((11.0 * zoom).clamp(7.0, 18.0)),
                    Color32::from_gray(190),
                );
            }
            painter.circle_filled(to_screen(node.output_port()), (5.0 * zoom).clamp(3.0, 9.0), Color32::from_rgb(120, 220, 255));
        }

        let guide_stroke = Stroke::new(1.0, Color32::from_rgb(255, 90, 160));
        for g in self.ws.pointer().guides() {
            match *g {
                Guide::Vertical(x) => {
                    let sx = to_screen(Pos2::new(x, 0.0)).x;
                    painter.line_segment([Pos2::new(sx, canvas.top()), Pos2::new(sx, canvas.bottom())], guide_stroke);
                }
                Guide::Horizontal(y) => {
                    let sy = to_screen(Pos2::new(0.0, y)).y;
                    painter.line_segment([Pos2::new(canvas.left(), sy), Pos2::new(canvas.right(), sy)], guide_stroke);
                }
            }
        }

        if let Some(m) = self.ws.pointer().marquee_rect() {
            let r = to_screen_rect(m);
            painter.rect_filled(r, 0.0, Color32::from_rgba_unmultiplied(120, 180, 255, 30));
            painter.rect_stroke(r, 0.0, Stroke::new(1.0, Color32::from_rgb(120, 180, 255)), egui::StrokeKind::Inside);
        }

        if let Some((a, b)) = self.ws.pointer().rubber_band(self.ws.canvas()) {
            painter.line_segment([to_screen(a), to_screen(b)], Stroke::new(2.0, Color32::from_rgb(120, 220, 255)));
        }
    }
}

fn kind_color(kind: NodeKind) -> Color32 {
    match kind {
        NodeKind::Note => Color32::from_rgb(70, 110, 170),
        NodeKind::File => Color32::from_rgb(110, 90, 160),
        NodeKind::Db => Color32::from_rgb(60, 140, 120),
        NodeKind::Image => Color32::from_rgb(170, 110, 60),
        NodeKind::Link => Color32::from_rgb(60, 130, 170),
        NodeKind::Checklist => Color32::from_rgb(120, 150, 60),
    }
}

impl eframe::App for ThinkspaceApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.top_bar(ctx);
        self.snapshot_window(ctx);

        egui::CentralPanel::default().frame(egui::Frame::NONE).show(ctx, |ui| {
            let available = ui.available_rect_before_wrap();
            self.last_canvas_rect = Some(available);
            let resp = ui.allocate_rect(available, Sense::click_and_drag());
            self.feed_input(ctx, available, resp.hovered());
            self.paint_canvas(ui, available);
        });

        if self.ws.tick().is_some() {
            log::debug!("{} snapshot(s) in buffer", self.ws.snapshots().len());
        }

        if self.ws.pointer().is_idle() {
            ctx.request_repaint_after(Duration::from_millis(500));
        } else {
            ctx.request_repaint_after(Duration::from_millis(16));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Err(e) = persist::save_active(&self.settings.autosave_dir(), &self.ws.to_file()) {
            log::warn!("autosave on exit failed: {e}");
        }
    }
}
