use eframe::egui;

use crate::experiment::ExperimentReport;
use crate::state::ReportState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct BoneAgeApp {
    pub state: ReportState,
}

impl BoneAgeApp {
    pub fn new(report: ExperimentReport) -> Self {
        Self {
            state: ReportState::new(report),
        }
    }
}

impl eframe::App for BoneAgeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: run summary ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.state);
        });

        // ---- Left side panel: series toggles ----
        egui::SidePanel::left("series_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: 2 x 2 plots ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::report_grid(ui, &self.state);
        });
    }
}
