mod app;
mod config;
mod data;
mod state;
mod ui;

use app::RustySieveApp;
use config::Settings;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Sieve – Table Filter",
        options,
        Box::new(|_cc| Ok(Box::new(RustySieveApp::new(settings)))),
    )
}
