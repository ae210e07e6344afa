use eframe::egui::{self, Color32, DragValue, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::data::filter::{BucketSize, RangeBounds};
use crate::data::writer::parse_hhmm;
use crate::plots::{ChartKind, PlotSpec};
use crate::refresh::{MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / status bar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.heading(RichText::new("SENSORSTATE").color(crate::color::BRAND_PRIMARY));
        ui.separator();

        if let Some(table) = &state.table {
            ui.label(format!(
                "{} rows × {} columns",
                table.num_rows(),
                table.num_columns()
            ));
            ui.separator();
        }

        let status = if state.refresh_running() {
            "Auto-Refresh: Running"
        } else {
            "Auto-Refresh: Stopped"
        };
        ui.label(status);

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Side panel
// ---------------------------------------------------------------------------

/// Render the left sidebar: source, filters, plot management, refresh
/// control and the add-data form.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            source_section(ui, state);
            if state.table.is_some() {
                ui.separator();
                column_section(ui, state);
                ui.separator();
                range_section(ui, state);
                ui.separator();
                plot_section(ui, state);
                ui.separator();
                refresh_section(ui, state);
                ui.separator();
                add_data_section(ui, state);
            } else {
                ui.add_space(8.0);
                ui.label("Load a CSV or Excel file to display the data.");
            }
        });
}

fn source_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Data source");
    ui.text_edit_singleline(&mut state.form.source_input)
        .on_hover_text("File path or URL");
    ui.add(
        egui::TextEdit::singleline(&mut state.form.username).hint_text("Username (optional)"),
    );
    ui.add(
        egui::TextEdit::singleline(&mut state.form.password)
            .hint_text("Password (optional)")
            .password(true),
    );

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Load").clicked() && !state.form.source_input.trim().is_empty() {
            state.load_from_input();
        }
        if ui.button("Open file…").clicked() {
            open_file_dialog(state);
        }
    });
}

fn column_section(ui: &mut Ui, state: &mut AppState) {
    let columns = state.column_names.clone();

    ui.strong("Timestamp / filter column");
    egui::ComboBox::from_id_salt("filter_column")
        .selected_text(&state.form.filter_column)
        .show_ui(ui, |ui: &mut Ui| {
            for col in &columns {
                ui.selectable_value(&mut state.form.filter_column, col.clone(), col);
            }
        });

    ui.strong("Value columns");
    for col in &columns {
        if *col == state.form.filter_column {
            continue;
        }
        let mut checked = state.form.value_columns.contains(col);
        if ui.checkbox(&mut checked, col).changed() {
            if checked {
                state.form.value_columns.push(col.clone());
            } else {
                state.form.value_columns.retain(|c| c != col);
            }
        }
    }
}

fn range_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Range");

    match state.detected_bounds(&state.form.filter_column) {
        Some(RangeBounds::Time(min, max)) => {
            ui.label(format!("Detected start: {}", min.format("%Y-%m-%d %H:%M")));
            ui.label(format!("Detected end:   {}", max.format("%Y-%m-%d %H:%M")));
            if ui.small_button("Use full range").clicked() {
                state.form.start_date = min.date();
                state.form.start_time = min.format("%H:%M").to_string();
                state.form.end_date = max.date();
                state.form.end_time = max.format("%H:%M").to_string();
            }

            ui.horizontal(|ui: &mut Ui| {
                ui.label("Start");
                ui.add(DatePickerButton::new(&mut state.form.start_date).id_salt("start_date"));
                ui.add(
                    egui::TextEdit::singleline(&mut state.form.start_time).desired_width(50.0),
                );
            });
            ui.horizontal(|ui: &mut Ui| {
                ui.label("End  ");
                ui.add(DatePickerButton::new(&mut state.form.end_date).id_salt("end_date"));
                ui.add(egui::TextEdit::singleline(&mut state.form.end_time).desired_width(50.0));
            });
        }
        Some(RangeBounds::Number(min, max)) => {
            ui.label(format!("Detected range: {min} … {max}"));
        }
        None => {
            ui.label("Selected column has no usable values.");
        }
    }
}

fn plot_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Plots");
    ui.add(egui::TextEdit::singleline(&mut state.form.plot_name).hint_text("Plot Name"));

    if ui.button("Add Plot").clicked() {
        match form_bounds(state) {
            Ok(bounds) => {
                let spec = PlotSpec {
                    name: state.form.plot_name.trim().to_string(),
                    filter_column: state.form.filter_column.clone(),
                    value_columns: state.form.value_columns.clone(),
                    chart_kind: ChartKind::Line,
                    bucket: BucketSize::None,
                    bounds,
                };
                state.add_plot(spec);
                state.form.plot_name.clear();
            }
            Err(msg) => state.status_message = Some(msg),
        }
    }

    let mut names = vec!["All".to_string()];
    names.extend(state.plots.names());
    egui::ComboBox::from_id_salt("selected_plot")
        .selected_text(&state.form.selected_plot)
        .show_ui(ui, |ui: &mut Ui| {
            for name in names {
                ui.selectable_value(&mut state.form.selected_plot, name.clone(), &name);
            }
        });
}

/// Combine the sidebar range widgets into plot bounds. Time bounds come
/// from the date pickers plus HH:MM fields; numeric columns fall back to
/// the detected full range.
fn form_bounds(state: &AppState) -> Result<RangeBounds, String> {
    match state.detected_bounds(&state.form.filter_column) {
        Some(RangeBounds::Time(_, _)) => {
            let start_time = parse_hhmm(&state.form.start_time).map_err(|e| format!("Error: {e}"))?;
            let end_time = parse_hhmm(&state.form.end_time).map_err(|e| format!("Error: {e}"))?;
            Ok(RangeBounds::Time(
                state.form.start_date.and_time(start_time),
                state.form.end_date.and_time(end_time),
            ))
        }
        Some(bounds @ RangeBounds::Number(_, _)) => Ok(bounds),
        None => Err("Error: selected filter column has no usable values".into()),
    }
}

fn refresh_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Auto-Refresh Settings");
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Interval (s)");
        ui.add(
            DragValue::new(&mut state.form.refresh_interval_input)
                .speed(0.1)
                .range(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS),
        );
    });

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Start Auto-Refresh").clicked() {
            let interval = state.form.refresh_interval_input;
            if let Err(e) = state.start_refresh(interval) {
                state.status_message = Some(format!("Error: {e}"));
            } else {
                state.status_message = None;
            }
        }
        if ui.button("Stop Auto-Refresh").clicked() {
            state.stop_refresh();
        }
    });

    if ui.button("Manual Refresh Data").clicked() {
        state.manual_refresh();
    }
}

fn add_data_section(ui: &mut Ui, state: &mut AppState) {
    ui.strong("Add New Data");

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Date");
        ui.add(DatePickerButton::new(&mut state.form.add_date).id_salt("add_date"));
        ui.add(egui::TextEdit::singleline(&mut state.form.add_time).desired_width(50.0));
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Value");
        ui.add(DragValue::new(&mut state.form.add_value).speed(0.1));
    });

    // Target column: one of the selected value columns, like the original
    // form; all columns when nothing is selected yet.
    let candidates = if state.form.value_columns.is_empty() {
        state.column_names.clone()
    } else {
        state.form.value_columns.clone()
    };
    egui::ComboBox::from_id_salt("add_column")
        .selected_text(&state.form.add_column)
        .show_ui(ui, |ui: &mut Ui| {
            for col in &candidates {
                if *col == state.form.filter_column {
                    continue;
                }
                ui.selectable_value(&mut state.form.add_column, col.clone(), col);
            }
        });

    if ui.button("Add Data").clicked() {
        state.add_data_row();
    }
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open sensor log")
        .add_filter("Supported files", &["csv", "xlsx", "xls"])
        .add_filter("CSV", &["csv"])
        .add_filter("Excel", &["xlsx", "xls"])
        .pick_file();

    if let Some(path) = file {
        state.load_from_path(path);
    }
}
