use eframe::egui::{RichText, Ui};
use egui_plot::{Corner, Legend, Line, LineStyle, Plot, PlotPoints, PlotUi, uniform_grid_spacer};

use crate::state::{ReportState, Series, fmt_metric};

// ---------------------------------------------------------------------------
// 2 x 2 report grid (central panel)
// ---------------------------------------------------------------------------

/// Loss, accuracy, sensitivity/specificity and a run summary.
pub fn report_grid(ui: &mut Ui, state: &ReportState) {
    let cell_height = (ui.available_height() / 2.0 - 40.0).max(120.0);

    ui.columns(2, |cols: &mut [Ui]| {
        loss_plot(&mut cols[0], state, cell_height);
        accuracy_plot(&mut cols[1], state, cell_height);
    });
    ui.separator();
    ui.columns(2, |cols: &mut [Ui]| {
        sweep_plot(&mut cols[0], state, cell_height);
        summary(&mut cols[1], state);
    });
}

/// Y axis fixed to [0, 1] with a gridline every 0.1.
fn unit_plot(id: &str, corner: Corner, height: f32) -> Plot {
    Plot::new(id)
        .legend(Legend::default().position(corner))
        .include_y(0.0)
        .include_y(1.0)
        .y_grid_spacer(uniform_grid_spacer(|_| [0.1, 0.5, 1.0]))
        .height(height)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
}

fn epoch_points(values: &[f64]) -> PlotPoints<'static> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| [i as f64, v])
        .collect()
}

/// Train / validation / test curves of one metric.
fn draw_epoch_series(
    plot_ui: &mut PlotUi,
    state: &ReportState,
    metric: &str,
    train: Vec<f64>,
    validation: Vec<f64>,
    test: Vec<f64>,
) {
    for (series, values) in [
        (Series::Train, train),
        (Series::Validation, validation),
        (Series::Test, test),
    ] {
        if !state.is_visible(series) || values.is_empty() {
            continue;
        }
        let mut line = Line::new(epoch_points(&values))
            .name(format!("{} {metric}", series.label()))
            .color(state.colors.color_for(series))
            .width(1.5);
        if series == Series::Test {
            line = line.style(LineStyle::Dashed { length: 10.0 });
        }
        plot_ui.line(line);
    }
}

fn loss_plot(ui: &mut Ui, state: &ReportState, height: f32) {
    let h = &state.report.history;
    ui.label(RichText::new("Model Loss Over Epochs").strong());
    unit_plot("loss_plot", Corner::RightTop, height)
        .x_axis_label("Epoch")
        .y_axis_label("Loss")
        .show(ui, |plot_ui| {
            draw_epoch_series(plot_ui, state, "Loss", h.loss(), h.val_loss(), h.test_loss_series());
        });
}

fn accuracy_plot(ui: &mut Ui, state: &ReportState, height: f32) {
    let h = &state.report.history;
    ui.label(RichText::new("Model Accuracy Over Epochs").strong());
    unit_plot("accuracy_plot", Corner::RightBottom, height)
        .x_axis_label("Epoch")
        .y_axis_label("Accuracy")
        .show(ui, |plot_ui| {
            draw_epoch_series(
                plot_ui,
                state,
                "Accuracy",
                h.accuracy(),
                h.val_accuracy(),
                h.test_accuracy_series(),
            );
        });
}

fn sweep_plot(ui: &mut Ui, state: &ReportState, height: f32) {
    let points = &state.report.sweep.points;
    ui.label(RichText::new("Sensitivity and Specificity").strong());
    unit_plot("sweep_plot", Corner::LeftBottom, height)
        .x_axis_label("Threshold")
        .y_axis_label("Rate")
        .show_grid(true)
        .show(ui, |plot_ui| {
            if state.is_visible(Series::Sensitivity) {
                let pts: PlotPoints = points.iter().map(|p| [p.threshold, p.sensitivity]).collect();
                plot_ui.line(
                    Line::new(pts)
                        .name(Series::Sensitivity.label())
                        .color(state.colors.color_for(Series::Sensitivity))
                        .width(1.5),
                );
            }
            if state.is_visible(Series::Specificity) {
                let pts: PlotPoints = points.iter().map(|p| [p.threshold, p.specificity]).collect();
                plot_ui.line(
                    Line::new(pts)
                        .name(Series::Specificity.label())
                        .color(state.colors.color_for(Series::Specificity))
                        .width(1.5),
                );
            }
        });
}

fn summary(ui: &mut Ui, state: &ReportState) {
    let r = &state.report;
    ui.label(RichText::new("Run Summary").strong());
    ui.add_space(4.0);

    egui_grid(ui, |ui| {
        row(ui, "Bone-age threshold", format!("{} months", r.threshold_months));
        row(ui, "Train samples", r.split.train.to_string());
        row(ui, "Validation samples", r.split.validation.to_string());
        row(ui, "Test samples", r.split.test.to_string());
        row(ui, "Epochs run", r.history.len().to_string());
        row(
            ui,
            "Best epoch",
            r.history
                .best_epoch
                .map_or_else(|| "-".to_string(), |e| e.to_string()),
        );
        row(ui, "Stopped early", r.history.stopped_early.to_string());
        row(
            ui,
            "Final learning rate",
            r.history
                .final_learning_rate()
                .map_or_else(|| "-".to_string(), |lr| format!("{lr:.2e}")),
        );
        row(ui, "Test loss", fmt_metric(r.history.test_loss));
        row(ui, "Test accuracy", fmt_metric(r.history.test_accuracy));
        if let Some(p) = r.sweep.nearest(0.5) {
            row(ui, "Sensitivity @ 0.5", format!("{:.4}", p.sensitivity));
            row(ui, "Specificity @ 0.5", format!("{:.4}", p.specificity));
        }
    });
}

fn egui_grid(ui: &mut Ui, add_contents: impl FnOnce(&mut Ui)) {
    eframe::egui::Grid::new("summary_grid")
        .num_columns(2)
        .striped(true)
        .show(ui, add_contents);
}

fn row(ui: &mut Ui, key: &str, value: String) {
    ui.label(key);
    ui.label(value);
    ui.end_row();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_points_outlive_their_source() {
        let points = {
            let values = vec![0.5, 0.25];
            epoch_points(&values)
        };
        let pts = points.points();
        assert_eq!(pts.len(), 2);
        assert_eq!((pts[1].x, pts[1].y), (1.0, 0.25));
    }
}
