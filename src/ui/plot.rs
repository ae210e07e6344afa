use eframe::egui::{self, Color32, RichText, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, Legend, Line, Plot, PlotPoint, PlotPoints,
    Points, Polygon, Text,
};

use crate::chart::{self, Histogram, PieSlice, Series};
use crate::color;
use crate::data::filter::{filter_table, BucketSize, RangeBounds};
use crate::data::model::Table;
use crate::plots::{ChartKind, PlotPatch, PlotSpec};

// ---------------------------------------------------------------------------
// Per-plot card: config widgets + the chart itself
// ---------------------------------------------------------------------------

/// What the user did to a plot card this frame.
#[derive(Default)]
pub struct PlotCardAction {
    pub patch: Option<PlotPatch>,
    pub remove: bool,
}

/// Render one configured plot: bucket / chart-kind selectors, the chart,
/// and a remove button. Mutations are returned, not applied.
pub fn plot_card(ui: &mut Ui, table: &Table, index: usize, spec: &PlotSpec) -> PlotCardAction {
    let mut action = PlotCardAction::default();

    ui.heading(format!("Plot: {}", spec.name));

    ui.horizontal(|ui: &mut Ui| {
        let mut bucket = spec.bucket;
        egui::ComboBox::from_id_salt(("bucket", index))
            .selected_text(bucket.label())
            .show_ui(ui, |ui: &mut Ui| {
                for candidate in BucketSize::ALL {
                    ui.selectable_value(&mut bucket, candidate, candidate.label());
                }
            });

        let mut kind = spec.chart_kind;
        egui::ComboBox::from_id_salt(("kind", index))
            .selected_text(kind.label())
            .show_ui(ui, |ui: &mut Ui| {
                for candidate in ChartKind::ALL {
                    ui.selectable_value(&mut kind, candidate, candidate.label());
                }
            });

        if bucket != spec.bucket || kind != spec.chart_kind {
            action.patch = Some(PlotPatch {
                chart_kind: (kind != spec.chart_kind).then_some(kind),
                bucket: (bucket != spec.bucket).then_some(bucket),
            });
        }

        if ui.button("Remove").clicked() {
            action.remove = true;
        }
    });

    // Callers guard against empty value columns; double-check here so a
    // stale spec cannot panic the renderer.
    if spec.value_columns.is_empty() {
        ui.label("No value columns selected for this plot.");
        return action;
    }

    match filter_table(table, &spec.filter_column, &spec.bounds, spec.bucket) {
        Ok(filtered) if filtered.is_empty() => {
            ui.label("No rows in the selected range.");
        }
        Ok(filtered) => {
            if spec.bucket != BucketSize::None {
                ui.label(
                    RichText::new(format!(
                        "Data resampled using mean at {} frequency",
                        spec.bucket.label().to_lowercase()
                    ))
                    .italics(),
                );
            }
            render_chart(ui, &filtered, index, spec);
        }
        Err(e) => {
            ui.colored_label(Color32::RED, format!("Error: {e}"));
        }
    }

    ui.separator();
    action
}

// ---------------------------------------------------------------------------
// Chart dispatch
// ---------------------------------------------------------------------------

fn render_chart(ui: &mut Ui, filtered: &Table, index: usize, spec: &PlotSpec) {
    let time_axis = matches!(spec.bounds, RangeBounds::Time(_, _));
    match spec.chart_kind {
        ChartKind::Line | ChartKind::Scatter | ChartKind::Bar | ChartKind::StackedBar => {
            let series = chart::xy_series(filtered, &spec.filter_column, &spec.value_columns);
            xy_plot(ui, index, spec.chart_kind, &series, time_axis);
        }
        ChartKind::Box => {
            let summaries = chart::box_summaries(filtered, &spec.value_columns);
            box_plot(ui, index, &summaries);
        }
        ChartKind::Pie => {
            let slices = chart::pie_slices(filtered, &spec.filter_column, &spec.value_columns);
            pie_plot(ui, index, &slices);
        }
        ChartKind::Count => {
            let histogram = chart::count_histogram(filtered, &spec.filter_column, 20);
            count_plot(ui, index, histogram.as_ref(), time_axis);
        }
        ChartKind::Correlation => {
            let matrix = chart::correlation_matrix(filtered, &spec.value_columns);
            correlation_plot(ui, index, matrix.as_ref());
        }
    }
}

const PLOT_HEIGHT: f32 = 320.0;

/// Shared plot scaffolding; type stays inferred so the builder chain works
/// across egui_plot releases.
macro_rules! base_plot {
    ($id:expr, $time_axis:expr) => {{
        let plot = Plot::new($id)
            .legend(Legend::default())
            .height(PLOT_HEIGHT)
            .allow_boxed_zoom(true)
            .allow_drag(true)
            .allow_scroll(false)
            .allow_zoom(true);
        if $time_axis {
            plot.x_axis_formatter(|mark, _range| format_unix_seconds(mark.value))
        } else {
            plot
        }
    }};
}

fn format_unix_seconds(value: f64) -> String {
    match chrono::DateTime::from_timestamp(value as i64, 0) {
        Some(t) => t.naive_utc().format("%Y-%m-%d %H:%M").to_string(),
        None => format!("{value:.0}"),
    }
}

// ---------------------------------------------------------------------------
// XY kinds
// ---------------------------------------------------------------------------

fn xy_plot(ui: &mut Ui, index: usize, kind: ChartKind, series: &[Series], time_axis: bool) {
    let total = series.len();
    let bar_width = bar_width(series);

    base_plot!(("xy_plot", index), time_axis).show(ui, |plot_ui| {
        // Stacked bars sit on a per-x running offset instead of grouping.
        let mut stack_offsets: std::collections::BTreeMap<i64, f64> =
            std::collections::BTreeMap::new();

        for (i, s) in series.iter().enumerate() {
            let color = color::series_color(i, total);
            match kind {
                ChartKind::Line => {
                    let points: PlotPoints = s.points.iter().copied().collect();
                    plot_ui.line(Line::new(points).name(&s.name).color(color).width(1.5));
                }
                ChartKind::Scatter => {
                    let points: PlotPoints = s.points.iter().copied().collect();
                    plot_ui.points(Points::new(points).name(&s.name).color(color).radius(2.5));
                }
                ChartKind::Bar => {
                    let bars: Vec<Bar> = s
                        .points
                        .iter()
                        .map(|[x, y]| Bar::new(*x, *y).width(bar_width))
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(&s.name).color(color));
                }
                ChartKind::StackedBar => {
                    let bars: Vec<Bar> = s
                        .points
                        .iter()
                        .map(|[x, y]| {
                            let key = x.to_bits() as i64;
                            let offset = stack_offsets.entry(key).or_insert(0.0);
                            let bar = Bar::new(*x, *y).base_offset(*offset).width(bar_width);
                            *offset += *y;
                            bar
                        })
                        .collect();
                    plot_ui.bar_chart(BarChart::new(bars).name(&s.name).color(color));
                }
                _ => {}
            }
        }
    });
}

/// Bars sized to the smallest x gap so neighbours never overlap fully.
fn bar_width(series: &[Series]) -> f64 {
    let mut xs: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p[0]))
        .collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    let min_gap = xs
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if min_gap.is_finite() {
        min_gap * 0.8
    } else {
        1.0
    }
}

// ---------------------------------------------------------------------------
// Box
// ---------------------------------------------------------------------------

fn box_plot(ui: &mut Ui, index: usize, summaries: &[chart::BoxSummary]) {
    let total = summaries.len();
    base_plot!(("box_plot", index), false).show(ui, |plot_ui| {
        for (i, s) in summaries.iter().enumerate() {
            let color = color::series_color(i, total);
            let elem = BoxElem::new(
                i as f64,
                BoxSpread::new(s.min, s.q1, s.median, s.q3, s.max),
            )
            .name(&s.name)
            .fill(color.gamma_multiply(0.4))
            .stroke(egui::Stroke::new(1.5, color));
            plot_ui.box_plot(BoxPlot::new(vec![elem]).name(&s.name));
        }
    });
}

// ---------------------------------------------------------------------------
// Pie
// ---------------------------------------------------------------------------

fn pie_plot(ui: &mut Ui, index: usize, slices: &[PieSlice]) {
    let total: f64 = slices.iter().map(|s| s.value).sum();
    if total <= 0.0 {
        ui.label("No positive magnitudes to draw.");
        return;
    }

    let n = slices.len();
    Plot::new(("pie_plot", index))
        .height(PLOT_HEIGHT)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            let mut angle = -std::f64::consts::FRAC_PI_2;
            for (i, slice) in slices.iter().enumerate() {
                let sweep = slice.value / total * std::f64::consts::TAU;
                let color = color::series_color(i, n);

                // Sector polygon: centre plus an arc.
                let steps = ((sweep / 0.05).ceil() as usize).max(2);
                let mut points = vec![[0.0, 0.0]];
                for step in 0..=steps {
                    let a = angle + sweep * step as f64 / steps as f64;
                    points.push([a.cos(), a.sin()]);
                }
                plot_ui.polygon(
                    Polygon::new(PlotPoints::from(points))
                        .name(&slice.label)
                        .fill_color(color.gamma_multiply(0.8))
                        .stroke(egui::Stroke::new(1.0, Color32::WHITE)),
                );

                // Percentage label at the slice midpoint.
                let mid = angle + sweep / 2.0;
                let share = slice.value / total * 100.0;
                plot_ui.text(Text::new(
                    PlotPoint::new(mid.cos() * 0.65, mid.sin() * 0.65),
                    RichText::new(format!("{share:.1}%")).strong(),
                ));

                angle += sweep;
            }
        });
}

// ---------------------------------------------------------------------------
// Count histogram
// ---------------------------------------------------------------------------

fn count_plot(ui: &mut Ui, index: usize, histogram: Option<&Histogram>, time_axis: bool) {
    let Some(histogram) = histogram else {
        ui.label("Nothing to count.");
        return;
    };
    base_plot!(("count_plot", index), time_axis).show(ui, |plot_ui| {
        let bars: Vec<Bar> = histogram
            .bins
            .iter()
            .map(|(start, count)| {
                Bar::new(start + histogram.bin_width / 2.0, *count as f64)
                    .width(histogram.bin_width * 0.95)
            })
            .collect();
        plot_ui.bar_chart(
            BarChart::new(bars)
                .name("count")
                .color(color::BRAND_PRIMARY),
        );
    });
}

// ---------------------------------------------------------------------------
// Correlation heat-map
// ---------------------------------------------------------------------------

fn correlation_plot(ui: &mut Ui, index: usize, matrix: Option<&chart::CorrelationMatrix>) {
    let Some(matrix) = matrix else {
        ui.label("No numeric value columns to correlate.");
        return;
    };
    let n = matrix.labels.len();

    Plot::new(("correlation_plot", index))
        .height(PLOT_HEIGHT)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            for i in 0..n {
                for j in 0..n {
                    let r = matrix.values[i][j];
                    // Row 0 at the top.
                    let x = j as f64;
                    let y = (n - 1 - i) as f64;
                    let cell = vec![
                        [x, y],
                        [x + 1.0, y],
                        [x + 1.0, y + 1.0],
                        [x, y + 1.0],
                    ];
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::from(cell))
                            .fill_color(color::heat_color(r))
                            .stroke(egui::Stroke::new(0.5, Color32::DARK_GRAY)),
                    );
                    let label = if r.is_finite() {
                        format!("{r:.2}")
                    } else {
                        "–".to_string()
                    };
                    plot_ui.text(Text::new(
                        PlotPoint::new(x + 0.5, y + 0.5),
                        RichText::new(label).color(Color32::BLACK),
                    ));
                }
            }
            // Axis labels along the edges.
            for (i, label) in matrix.labels.iter().enumerate() {
                plot_ui.text(Text::new(
                    PlotPoint::new(i as f64 + 0.5, n as f64 + 0.3),
                    RichText::new(label.clone()).strong(),
                ));
                plot_ui.text(Text::new(
                    PlotPoint::new(-0.4, (n - 1 - i) as f64 + 0.5),
                    RichText::new(label.clone()).strong(),
                ));
            }
        });
}
