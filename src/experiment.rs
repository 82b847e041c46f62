//! End-to-end run: load → split → build → fit → evaluate → (save).

use anyhow::{Context, Result, bail};
use candle_nn::VarMap;

use crate::config::ExperimentConfig;
use crate::data::loader::load_images_from_csv;
use crate::data::model::XrayDataset;
use crate::data::preprocess::{Partitions, split_partitions};
use crate::metrics::SweepTable;
use crate::network::{BoneAgeClassifier, InputShape, select_device};
use crate::persist::save_run;
use crate::training::history::History;
use crate::training::trainer::{TrainConfig, evaluate, extract_features, fit, predict};

/// Partition sizes of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl From<&Partitions> for SplitSizes {
    fn from(p: &Partitions) -> Self {
        SplitSizes {
            train: p.train.len(),
            validation: p.validation.len(),
            test: p.test.len(),
        }
    }
}

/// Everything the reporter needs from a finished run.
#[derive(Debug, Clone, Default)]
pub struct ExperimentReport {
    pub history: History,
    pub sweep: SweepTable,
    pub split: SplitSizes,
    pub threshold_months: f64,
}

/// Load the configured dataset and pretrained backbone, then train and evaluate.
pub fn run(config: &ExperimentConfig) -> Result<ExperimentReport> {
    let side = config.image_size as usize;
    let input_shape = InputShape::new(side, side, 3);
    input_shape.validate()?;

    log::info!("Loading images listed in {}", config.csv.display());
    let dataset = load_images_from_csv(
        &config.csv,
        &config.image_dir,
        config.threshold,
        config.limit,
        config.image_size,
    )?;

    let device = select_device();
    let head_vars = VarMap::new();
    let model = BoneAgeClassifier::from_pretrained(&config.weights, input_shape, &head_vars, &device)
        .with_context(|| format!("building classifier from {}", config.weights.display()))?;

    run_with_model(&model, &head_vars, &dataset, &config.train_config(), config)
}

/// Train and evaluate an already-built model on `dataset`.
pub fn run_with_model(
    model: &BoneAgeClassifier,
    head_vars: &VarMap,
    dataset: &XrayDataset,
    train_config: &TrainConfig,
    config: &ExperimentConfig,
) -> Result<ExperimentReport> {
    if dataset.is_empty() {
        bail!("no samples to train on");
    }
    let partitions = split_partitions(dataset.len(), train_config.seed)?;
    log::info!("Model summary:\n{}", model.summary());

    log::info!("Extracting frozen VGG16 features");
    let batch = train_config.batch_size;
    let train = extract_features(model, dataset, &partitions.train, batch)?;
    let validation = extract_features(model, dataset, &partitions.validation, batch)?;
    let test = extract_features(model, dataset, &partitions.test, batch)?;

    let mut history = fit(model, head_vars, &train, &validation, train_config)?;

    let (test_loss, test_accuracy) = evaluate(model, &test)?;
    log::info!("Test Loss: {test_loss:.4}, Test Accuracy: {test_accuracy:.4}");
    history.set_test_result(test_loss, test_accuracy);

    let probabilities = predict(model, &test)?;
    let sweep = SweepTable::compute(&test.labels, &probabilities)?;

    if let Some(dir) = &config.save_dir {
        let ids: Vec<String> = partitions.test.iter().map(|&i| dataset.ids[i].clone()).collect();
        save_run(dir, &history, &ids, &test.labels, &probabilities, head_vars)?;
    }

    Ok(ExperimentReport {
        history,
        sweep,
        split: SplitSizes::from(&partitions),
        threshold_months: config.threshold,
    })
}

/// Log the summary and a coarse sweep table (used when no window is shown).
pub fn log_report(report: &ExperimentReport) {
    log::info!(
        "Split train/validation/test = {}/{}/{}, {} epochs, best epoch {}",
        report.split.train,
        report.split.validation,
        report.split.test,
        report.history.len(),
        report
            .history
            .best_epoch
            .map_or_else(|| "-".to_string(), |e| e.to_string()),
    );
    if report.history.is_empty() {
        log::warn!("No training epochs were recorded");
    }
    if let (Some(loss), Some(acc)) = (report.history.test_loss, report.history.test_accuracy) {
        log::info!("Test Loss: {loss:.4}, Test Accuracy: {acc:.4}");
    }
    log::info!("threshold  sensitivity  specificity");
    for p in report.sweep.points.iter().step_by(10) {
        log::info!("{:>9.2}  {:>11.4}  {:>11.4}", p.threshold, p.sensitivity, p.specificity);
    }
}
