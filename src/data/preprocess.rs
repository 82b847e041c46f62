//! Channel expansion and seeded train/validation/test partitioning.

use candle_core::{Device, Tensor};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use super::model::XrayDataset;
use crate::error::{Error, Result};

/// Fraction held out by the first split (train vs. the rest).
pub const HOLDOUT_FRACTION: f64 = 0.4;
/// Fraction of the held-out part that becomes the test set.
pub const TEST_FRACTION_OF_HOLDOUT: f64 = 0.5;

// ---------------------------------------------------------------------------
// Channel expansion
// ---------------------------------------------------------------------------

/// Replicate a `[N, 1, H, W]` batch into `[N, 3, H, W]`.
pub fn grayscale_to_rgb(batch: &Tensor) -> Result<Tensor> {
    Ok(Tensor::cat(&[batch, batch, batch], 1)?)
}

/// Build a `[N, 1, H, W]` tensor from selected dataset images.
pub fn image_batch(dataset: &XrayDataset, indices: &[usize], device: &Device) -> Result<Tensor> {
    let pixels = dataset.gather_pixels(indices);
    Ok(Tensor::from_vec(
        pixels,
        (indices.len(), 1, dataset.height, dataset.width),
        device,
    )?)
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

/// Sample indices of the three disjoint partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitions {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partitions {
    pub fn total(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }
}

/// Shuffle `items` with `seed` and cut off `ceil(test_fraction * n)` of them.
///
/// Returns `(train, test)`; the test part is taken from the front of the
/// shuffled order.
pub fn train_test_split(
    items: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::InvalidFraction(test_fraction));
    }

    let n = items.len();
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(Error::EmptyPartition {
            samples: n,
            fraction: test_fraction,
        });
    }

    let mut shuffled = items.to_vec();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let train = shuffled.split_off(n_test);
    Ok((train, shuffled))
}

/// Two-stage split: 60/40, then the 40 halved into validation and test.
/// Both stages use the same seed.
pub fn split_partitions(n: usize, seed: u64) -> Result<Partitions> {
    let all: Vec<usize> = (0..n).collect();
    let (train, holdout) = train_test_split(&all, HOLDOUT_FRACTION, seed)?;
    let (validation, test) = train_test_split(&holdout, TEST_FRACTION_OF_HOLDOUT, seed)?;

    log::info!(
        "Split {n} samples: train={} validation={} test={}",
        train.len(),
        validation.len(),
        test.len(),
    );

    Ok(Partitions {
        train,
        validation,
        test,
    })
}
