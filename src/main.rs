use eframe::egui;

use thinkspace::gui::frontend::ThinkspaceApp;
use thinkspace::persistence::persist;
use thinkspace::persistence::settings::AppSettings;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = AppSettings::load().unwrap_or_else(|e| {
        log::warn!("settings unreadable, using defaults: {e}");
        AppSettings::default()
    });
    let loaded_state = persist::load_active(&settings.autosave_dir()).unwrap_or_else(|e| {
        log::warn!("previous workspace could not be loaded: {e}");
        None
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 710.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Thinkspace",
        options,
        Box::new(move |_cc| Ok(Box::new(ThinkspaceApp::new(settings, loaded_state)) as Box<dyn eframe::App>)),
    )
}
