use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct SensorStateApp {
    pub state: AppState,
}

impl SensorStateApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for SensorStateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Apply whatever the refresh worker produced since the last frame,
        // then keep frames coming while it runs so events are picked up.
        self.state.drain_refresh_events();
        if self.state.refresh_running() {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }

        // ---- Top panel: title / status bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: source, filters, plot management ----
        egui::SidePanel::left("filter_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: configured plots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            self.central_panel(ui);
        });
    }
}

impl SensorStateApp {
    fn central_panel(&mut self, ui: &mut egui::Ui) {
        let Some(table) = self.state.table.clone() else {
            ui.centered_and_justified(|ui: &mut egui::Ui| {
                ui.heading("Please load a CSV or Excel file to display the data.");
            });
            return;
        };

        let selection = self.state.plot_selection();
        let entries: Vec<(usize, crate::plots::PlotSpec)> = self
            .state
            .plots
            .list(&selection)
            .into_iter()
            .map(|(i, spec)| (i, spec.clone()))
            .collect();

        if entries.is_empty() {
            ui.label("No plots configured. Use \"Add Plot\" in the sidebar.");
            return;
        }

        let mut to_remove: Vec<usize> = Vec::new();
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui: &mut egui::Ui| {
                for (index, spec) in &entries {
                    let action = plot::plot_card(ui, &table, *index, spec);
                    if let Some(patch) = action.patch {
                        self.state.update_plot(*index, patch);
                    }
                    if action.remove {
                        to_remove.push(*index);
                    }
                }
            });

        self.state.remove_plots(&to_remove);
    }
}
