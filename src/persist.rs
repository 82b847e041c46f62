//! Optional on-disk output of a finished run.

use std::path::Path;

use anyhow::{Context, Result};
use candle_nn::VarMap;
use serde::Serialize;

use crate::training::history::History;

pub const HISTORY_FILE: &str = "history.json";
pub const PREDICTIONS_FILE: &str = "test_predictions.json";
pub const HEAD_WEIGHTS_FILE: &str = "classifier_head.safetensors";

/// Test-set labels next to the predicted probabilities.
#[derive(Debug, Serialize)]
struct TestPredictions<'a> {
    ids: &'a [String],
    labels: &'a [u8],
    probabilities: &'a [f32],
}

/// Write history, test predictions and head weights into `dir`.
pub fn save_run(
    dir: &Path,
    history: &History,
    ids: &[String],
    labels: &[u8],
    probabilities: &[f32],
    head_vars: &VarMap,
) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    write_json(&dir.join(HISTORY_FILE), history)?;
    write_json(
        &dir.join(PREDICTIONS_FILE),
        &TestPredictions {
            ids,
            labels,
            probabilities,
        },
    )?;

    let weights = dir.join(HEAD_WEIGHTS_FILE);
    head_vars
        .save(&weights)
        .with_context(|| format!("saving head weights to {}", weights.display()))?;

    log::info!("Saved run artefacts to {}", dir.display());
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serializing JSON")?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
