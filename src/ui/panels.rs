use eframe::egui::{self, RichText, Ui};

use crate::state::{ReportState, Series};

// ---------------------------------------------------------------------------
// Left side panel – series toggles
// ---------------------------------------------------------------------------

/// Render the left panel with one checkbox per plotted series.
pub fn side_panel(ui: &mut Ui, state: &mut ReportState) {
    ui.heading("Series");
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        if ui.small_button("All").clicked() {
            state.show_all();
        }
        if ui.small_button("None").clicked() {
            state.hide_all();
        }
    });

    for series in Series::ALL {
        let mut checked = state.is_visible(series);
        let text = RichText::new(series.label()).color(state.colors.color_for(series));
        if ui.checkbox(&mut checked, text).changed() {
            state.toggle(series);
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top bar with the run summary.
pub fn top_bar(ui: &mut Ui, state: &ReportState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.strong("Bone-age classifier");
        ui.separator();
        ui.label(state.summary_line());
    });
}
