mod app;
mod color;
mod config;
mod data;
mod error;
mod experiment;
mod metrics;
mod network;
mod persist;
mod state;
mod training;
mod ui;

use anyhow::{Result, anyhow};
use app::BoneAgeApp;
use clap::Parser;
use config::ExperimentConfig;
use eframe::egui;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ExperimentConfig::parse();

    let report = experiment::run(&config).inspect_err(|e| log::error!("Run failed: {e:#}"))?;

    if config.headless {
        experiment::log_report(&report);
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Bone-Age Classifier – Training Report",
        options,
        Box::new(|_cc| Ok(Box::new(BoneAgeApp::new(report)))),
    )
    .map_err(|e| anyhow!("plot window failed: {e}"))
}
