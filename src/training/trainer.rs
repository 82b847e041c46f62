//! Training loop for the sigmoid head with early stopping and LR decay.
//!
//! The backbone is frozen and deterministic, so its pooled output is computed
//! once per partition ([`extract_features`]) and every epoch only runs the
//! dense head over those cached features.

use std::collections::HashMap;

use candle_core::{Device, Tensor};
use candle_nn::{Optimizer, VarMap};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::callbacks::{EarlyStopping, ReduceLrOnPlateau};
use super::history::{EpochMetrics, History};
use crate::data::model::XrayDataset;
use crate::data::preprocess::{grayscale_to_rgb, image_batch};
use crate::error::{Error, Result};
use crate::metrics::binary_accuracy;
use crate::network::BoneAgeClassifier;

/// Training configuration.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub seed: u64,
    pub early_stopping_patience: usize,
    pub lr_patience: usize,
    pub lr_factor: f64,
    pub min_lr: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            batch_size: 8,
            epochs: 50,
            seed: 42,
            early_stopping_patience: 25,
            lr_patience: 5,
            lr_factor: 0.5,
            min_lr: 1e-5,
        }
    }
}

// ---------------------------------------------------------------------------
// Cached features
// ---------------------------------------------------------------------------

/// Pooled backbone features of one partition with their labels.
pub struct FeatureSet {
    /// `[N, 512]`
    pub features: Tensor,
    /// `[N]`, 0.0 or 1.0
    pub targets: Tensor,
    pub labels: Vec<u8>,
}

impl FeatureSet {
    pub fn new(features: Tensor, labels: Vec<u8>) -> Result<Self> {
        let as_f32: Vec<f32> = labels.iter().map(|&l| f32::from(l)).collect();
        let targets = Tensor::from_vec(as_f32, labels.len(), features.device())?;
        Ok(Self {
            features,
            targets,
            labels,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Run the frozen backbone over `indices` in batches and keep pooled features.
pub fn extract_features(
    model: &BoneAgeClassifier,
    dataset: &XrayDataset,
    indices: &[usize],
    batch_size: usize,
) -> Result<FeatureSet> {
    let device = model.device();
    let mut chunks = Vec::with_capacity(indices.len().div_ceil(batch_size.max(1)));

    for (i, chunk) in indices.chunks(batch_size.max(1)).enumerate() {
        let gray = image_batch(dataset, chunk, device)?;
        let rgb = grayscale_to_rgb(&gray)?;
        chunks.push(model.embed(&rgb)?);

        if (i + 1) % 50 == 0 {
            log::debug!("  [{}/{}] images embedded", (i + 1) * batch_size, indices.len());
        }
    }

    let features = Tensor::cat(&chunks, 0)?;
    FeatureSet::new(features, dataset.gather_labels(indices))
}

// ---------------------------------------------------------------------------
// Mini-batches
// ---------------------------------------------------------------------------

/// Mini-batch iterator over cached features. Reshuffles indices each epoch.
struct BatchIterator<'a> {
    set: &'a FeatureSet,
    indices: Vec<u32>,
    batch_size: usize,
    pos: usize,
}

impl<'a> BatchIterator<'a> {
    fn new(set: &'a FeatureSet, batch_size: usize) -> Self {
        Self {
            set,
            indices: (0..set.len() as u32).collect(),
            batch_size: batch_size.max(1),
            pos: 0,
        }
    }

    /// Reshuffle for a new epoch using a seeded RNG derived from base seed + epoch.
    fn reshuffle(&mut self, seed: u64, epoch: usize) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(epoch as u64));
        self.indices.shuffle(&mut rng);
        self.pos = 0;
    }

    fn next_batch(&mut self, device: &Device) -> Result<Option<(Tensor, Tensor)>> {
        let n = self.indices.len();
        if self.pos >= n {
            return Ok(None);
        }
        let end = (self.pos + self.batch_size).min(n);
        let idx = Tensor::new(&self.indices[self.pos..end], device)?;
        self.pos = end;

        let inputs = self.set.features.index_select(&idx, 0)?;
        let targets = self.set.targets.index_select(&idx, 0)?;
        Ok(Some((inputs, targets)))
    }
}

// ---------------------------------------------------------------------------
// Loss
// ---------------------------------------------------------------------------

/// Mean binary cross-entropy computed from logits:
/// `max(x, 0) - x * y + ln(1 + e^-|x|)`.
pub fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?;
    let loss = ((logits.relu()? - logits.mul(targets)?)? + softplus)?;
    Ok(loss.mean_all()?)
}

// ---------------------------------------------------------------------------
// Fit / evaluate / predict
// ---------------------------------------------------------------------------

/// Train the head of `model` (variables in `head_vars`) and return the history.
///
/// The best head weights by validation loss are restored before returning.
pub fn fit(
    model: &BoneAgeClassifier,
    head_vars: &VarMap,
    train: &FeatureSet,
    validation: &FeatureSet,
    config: &TrainConfig,
) -> Result<History> {
    let device = model.device().clone();

    let mut optimizer = candle_nn::AdamW::new(
        head_vars.all_vars(),
        candle_nn::ParamsAdamW {
            lr: config.learning_rate,
            eps: 1e-7,
            weight_decay: 0.0,
            ..Default::default()
        },
    )?;
    let mut reduce_lr = ReduceLrOnPlateau::new(config.lr_factor, config.lr_patience, config.min_lr);
    let mut early_stopping = EarlyStopping::new(config.early_stopping_patience);
    let mut best_weights: Option<HashMap<String, Tensor>> = None;
    let mut history = History::default();
    let mut batches = BatchIterator::new(train, config.batch_size);

    log::info!(
        "Training: lr={}, batch={}, epochs={}, early_stopping_patience={}, lr_patience={}",
        config.learning_rate,
        config.batch_size,
        config.epochs,
        config.early_stopping_patience,
        config.lr_patience,
    );

    for epoch in 0..config.epochs {
        batches.reshuffle(config.seed, epoch);
        let learning_rate = optimizer.learning_rate();

        let mut loss_sum = 0.0;
        let mut correct = 0.0;
        let mut seen = 0usize;

        while let Some((inputs, targets)) = batches.next_batch(&device)? {
            let logits = model.logits_from_features(&inputs)?;
            let loss = bce_with_logits(&logits, &targets)?;
            optimizer.backward_step(&loss)?;

            let n = targets.dim(0)?;
            loss_sum += f64::from(loss.to_scalar::<f32>()?) * n as f64;
            let probs: Vec<f32> = candle_nn::ops::sigmoid(&logits)?.to_vec1()?;
            let labels: Vec<u8> = targets.to_vec1::<f32>()?.iter().map(|&t| t as u8).collect();
            correct += binary_accuracy(&labels, &probs)? * n as f64;
            seen += n;
        }

        let (loss, accuracy) = if seen > 0 {
            (loss_sum / seen as f64, correct / seen as f64)
        } else {
            (0.0, 0.0)
        };
        let (val_loss, val_accuracy) = evaluate(model, validation)?;

        history.push(EpochMetrics {
            epoch: epoch + 1,
            loss,
            accuracy,
            val_loss,
            val_accuracy,
            learning_rate,
        });

        let decision = early_stopping.on_epoch_end(epoch, val_loss);
        if decision.improved {
            best_weights = Some(snapshot(head_vars)?);
        }

        log::info!(
            "epoch {:3}/{} | loss={:.4} acc={:.4} | val_loss={:.4} val_acc={:.4} | lr={:.2e} {}",
            epoch + 1,
            config.epochs,
            loss,
            accuracy,
            val_loss,
            val_accuracy,
            learning_rate,
            if decision.improved { "*" } else { "" },
        );

        if let Some(new_lr) = reduce_lr.on_epoch_end(val_loss, learning_rate) {
            log::info!("Reducing learning rate to {new_lr:.2e}");
            optimizer.set_learning_rate(new_lr);
        }

        if decision.stop {
            log::info!(
                "Early stopping at epoch {} (patience={} exhausted)",
                epoch + 1,
                config.early_stopping_patience,
            );
            history.stopped_early = true;
            break;
        }
    }

    if let Some(weights) = &best_weights {
        restore(head_vars, weights)?;
    }
    history.best_epoch = early_stopping.best_epoch().map(|e| e + 1);
    if let Some(best) = history.best_epoch {
        log::info!("Restored weights from epoch {best} (val_loss={:.4})", early_stopping.best());
    }

    Ok(history)
}

/// Loss and accuracy of the current head over a whole partition.
pub fn evaluate(model: &BoneAgeClassifier, set: &FeatureSet) -> Result<(f64, f64)> {
    if set.is_empty() {
        return Ok((0.0, 0.0));
    }
    let logits = model.logits_from_features(&set.features)?;
    let loss = f64::from(bce_with_logits(&logits, &set.targets)?.to_scalar::<f32>()?);
    let probs: Vec<f32> = candle_nn::ops::sigmoid(&logits)?.to_vec1()?;
    Ok((loss, binary_accuracy(&set.labels, &probs)?))
}

/// Positive-class probabilities for every sample of a partition.
pub fn predict(model: &BoneAgeClassifier, set: &FeatureSet) -> Result<Vec<f32>> {
    if set.is_empty() {
        return Ok(Vec::new());
    }
    let logits = model.logits_from_features(&set.features)?;
    Ok(candle_nn::ops::sigmoid(&logits)?.to_vec1()?)
}

fn snapshot(vars: &VarMap) -> Result<HashMap<String, Tensor>> {
    let data = vars.data().lock().unwrap_or_else(|e| e.into_inner());
    data.iter()
        .map(|(name, var)| Ok::<_, Error>((name.clone(), var.as_tensor().copy()?)))
        .collect()
}

fn restore(vars: &VarMap, weights: &HashMap<String, Tensor>) -> Result<()> {
    let data = vars.data().lock().unwrap_or_else(|e| e.into_inner());
    for (name, var) in data.iter() {
        if let Some(saved) = weights.get(name) {
            var.set(saved)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FEATURE_DIM, InputShape};
    use candle_core::DType;

    fn toy_model(vars: &VarMap) -> BoneAgeClassifier {
        BoneAgeClassifier::new_random(InputShape::new(32, 32, 3), vars, &Device::Cpu).unwrap()
    }

    /// Linearly separable features: label 1 samples carry +1 in every
    /// dimension, label 0 samples carry -1.
    fn separable_set(n: usize) -> FeatureSet {
        let labels: Vec<u8> = (0..n).map(|i| (i % 2) as u8).collect();
        let values: Vec<f32> = labels
            .iter()
            .flat_map(|&l| std::iter::repeat(if l == 1 { 1.0 } else { -1.0 }).take(FEATURE_DIM))
            .collect();
        let features = Tensor::from_vec(values, (n, FEATURE_DIM), &Device::Cpu).unwrap();
        FeatureSet::new(features, labels).unwrap()
    }

    #[test]
    fn test_train_config_default() {
        let cfg = TrainConfig::default();
        assert!((cfg.learning_rate - 1e-3).abs() < 1e-12);
        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.epochs, 50);
        assert_eq!(cfg.early_stopping_patience, 25);
        assert_eq!(cfg.lr_patience, 5);
        assert_eq!(cfg.seed, 42);
    }

    #[test]
    fn bce_matches_closed_form() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[0.0f32, 2.0, -3.0], &device).unwrap();
        let targets = Tensor::new(&[1.0f32, 0.0, 0.0], &device).unwrap();
        let loss = bce_with_logits(&logits, &targets).unwrap().to_scalar::<f32>().unwrap();

        let sig = |x: f64| 1.0 / (1.0 + (-x).exp());
        let expected = (-(sig(0.0).ln()) - (1.0 - sig(2.0)).ln() - (1.0 - sig(-3.0)).ln()) / 3.0;
        assert!((f64::from(loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn bce_is_finite_for_saturated_logits() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[200.0f32, -200.0], &device).unwrap();
        let targets = Tensor::new(&[0.0f32, 1.0], &device).unwrap();
        let loss = bce_with_logits(&logits, &targets).unwrap().to_scalar::<f32>().unwrap();
        assert!(loss.is_finite());
        assert!((loss - 200.0).abs() < 1e-3);
    }

    #[test]
    fn batch_iterator_exhausts() {
        let set = separable_set(10);
        let mut iter = BatchIterator::new(&set, 3);
        iter.reshuffle(42, 0);

        let mut count = 0;
        let mut rows = 0;
        while let Some((inputs, _)) = iter.next_batch(&Device::Cpu).unwrap() {
            count += 1;
            rows += inputs.dim(0).unwrap();
        }
        assert_eq!(count, 4); // ceil(10/3) = 4
        assert_eq!(rows, 10);
    }

    #[test]
    fn fit_learns_separable_features() {
        let vars = VarMap::new();
        let model = toy_model(&vars);
        let train = separable_set(40);
        let val = separable_set(10);

        let config = TrainConfig {
            epochs: 20,
            ..TrainConfig::default()
        };
        let history = fit(&model, &vars, &train, &val, &config).unwrap();

        assert_eq!(history.len(), 20);
        assert!(history.best_epoch.is_some());
        let (val_loss, val_acc) = evaluate(&model, &val).unwrap();
        assert!((val_acc - 1.0).abs() < 1e-12);
        assert!(val_loss < history.epochs[0].val_loss);
    }

    #[test]
    fn fit_stops_early_and_restores_best() {
        let vars = VarMap::new();
        let model = toy_model(&vars);
        let train = separable_set(16);
        // Validation labels are the opposite of training, so val loss only grows.
        let flipped: Vec<u8> = train.labels.iter().map(|&l| 1 - l).collect();
        let val = FeatureSet::new(train.features.clone(), flipped).unwrap();

        let config = TrainConfig {
            epochs: 30,
            early_stopping_patience: 3,
            ..TrainConfig::default()
        };
        let history = fit(&model, &vars, &train, &val, &config).unwrap();

        assert!(history.stopped_early);
        assert!(history.len() < 30);
        let best = history.best_epoch.unwrap();
        let (val_loss, _) = evaluate(&model, &val).unwrap();
        assert!((val_loss - history.epochs[best - 1].val_loss).abs() < 1e-4);
    }

    #[test]
    fn predict_returns_probabilities() {
        let vars = VarMap::new();
        let model = toy_model(&vars);
        let set = separable_set(6);
        let probs = predict(&model, &set).unwrap();
        assert_eq!(probs.len(), 6);
        assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));

        let empty = FeatureSet::new(
            Tensor::zeros((0, FEATURE_DIM), DType::F32, &Device::Cpu).unwrap(),
            Vec::new(),
        )
        .unwrap();
        assert!(predict(&model, &empty).unwrap().is_empty());
    }

    #[test]
    fn extract_features_pools_each_image() {
        let vars = VarMap::new();
        let model = toy_model(&vars);
        let mut ds = XrayDataset::new(32, 32);
        for i in 0..3 {
            ds.push(i.to_string(), 50.0 * i as f64, u8::from(i > 1), &vec![0.1 * i as f32; 32 * 32]);
        }
        let set = extract_features(&model, &ds, &[2, 0, 1], 2).unwrap();
        assert_eq!(set.features.dims(), &[3, FEATURE_DIM]);
        assert_eq!(set.labels, vec![1, 0, 0]);
    }
}
