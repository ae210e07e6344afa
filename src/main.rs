mod app;
mod chart;
mod color;
mod data;
mod persist;
mod plots;
mod refresh;
mod state;
mod ui;

use std::path::PathBuf;

use app::SensorStateApp;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([700.0, 450.0]),
        ..Default::default()
    };

    // Restore the previous session (loaded table, plots, refresh settings).
    let state = AppState::restore(PathBuf::from(persist::SNAPSHOT_FILE));

    eframe::run_native(
        "SensorState – Sensor Log Dashboard",
        options,
        Box::new(|_cc| Ok(Box::new(SensorStateApp::new(state)))),
    )
}
