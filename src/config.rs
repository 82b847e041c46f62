use std::path::PathBuf;

use clap::Parser;

use crate::training::trainer::TrainConfig;

/// Command-line configuration. Every default reproduces the reference run.
#[derive(Debug, Clone, Parser)]
#[command(name = "bone-age-classifier")]
#[command(about = "Fine-tune a frozen VGG16 to classify hand X-rays by bone-age threshold")]
pub struct ExperimentConfig {
    /// CSV with `id` and `boneage` columns
    #[arg(long, default_value = "data/boneage-training-dataset.csv")]
    pub csv: PathBuf,

    /// Directory holding `<id>.png` images
    #[arg(long, default_value = "data/boneage-training-dataset/boneage-training-dataset")]
    pub image_dir: PathBuf,

    /// Pretrained VGG16 weights (safetensors, torchvision naming)
    #[arg(long, default_value = "model/vgg16.safetensors")]
    pub weights: PathBuf,

    /// Bone age (months) at which the label becomes positive
    #[arg(long, default_value_t = 100.0)]
    pub threshold: f64,

    /// Maximum number of CSV rows to load
    #[arg(long, default_value_t = 5000)]
    pub limit: usize,

    /// Side length images are resized to
    #[arg(long, default_value_t = 224)]
    pub image_size: u32,

    #[arg(long, default_value_t = 50)]
    pub epochs: usize,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Seed for the data split and per-epoch shuffling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Epochs without validation-loss improvement before stopping
    #[arg(long, default_value_t = 25)]
    pub early_stopping_patience: usize,

    /// Epochs without validation-loss improvement before reducing the learning rate
    #[arg(long, default_value_t = 5)]
    pub lr_patience: usize,

    #[arg(long, default_value_t = 0.5)]
    pub lr_factor: f64,

    #[arg(long, default_value_t = 1e-5)]
    pub min_lr: f64,

    /// Write history, test predictions and head weights here
    #[arg(long)]
    pub save_dir: Option<PathBuf>,

    /// Log the results instead of opening the plot window
    #[arg(long)]
    pub headless: bool,
}

impl ExperimentConfig {
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            learning_rate: self.learning_rate,
            batch_size: self.batch_size,
            epochs: self.epochs,
            seed: self.seed,
            early_stopping_patience: self.early_stopping_patience,
            lr_patience: self.lr_patience,
            lr_factor: self.lr_factor,
            min_lr: self.min_lr,
        }
    }
}
