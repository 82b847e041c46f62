//! Confusion-matrix metrics and the sensitivity/specificity threshold sweep.
//!
//! Label 0 = below the bone-age threshold, label 1 = at or above it.

use serde::Serialize;

use crate::error::{Error, Result};

/// Number of steps between threshold 0 and threshold 1.
pub const SWEEP_STEPS: usize = 100;

/// Decision threshold used for accuracy.
pub const ACCURACY_THRESHOLD: f32 = 0.5;

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// Binary confusion matrix over labels {0, 1}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_count: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Count outcomes for `probability >= threshold`. Labels other than 0 and
    /// 1 are skipped.
    pub fn at_threshold(labels: &[u8], probabilities: &[f32], threshold: f64) -> Result<Self> {
        check_lengths(labels, probabilities)?;

        let mut m = ConfusionMatrix::default();
        for (&label, &p) in labels.iter().zip(probabilities) {
            let predicted = f64::from(p) >= threshold;
            match (label, predicted) {
                (1, true) => m.tp += 1,
                (1, false) => m.fn_count += 1,
                (0, true) => m.fp += 1,
                (0, false) => m.tn += 1,
                _ => {}
            }
        }
        Ok(m)
    }

    /// TP / (TP + FN), or `None` without positive samples.
    pub fn sensitivity_checked(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fn_count)
    }

    /// TN / (TN + FP), or `None` without negative samples.
    pub fn specificity_checked(&self) -> Option<f64> {
        ratio(self.tn, self.tn + self.fp)
    }

    /// Sensitivity with 0 standing in for "undefined".
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity_checked().unwrap_or(0.0)
    }

    /// Specificity with 0 standing in for "undefined".
    pub fn specificity(&self) -> f64 {
        self.specificity_checked().unwrap_or(0.0)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_count + self.tp
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

fn check_lengths(labels: &[u8], probabilities: &[f32]) -> Result<()> {
    if labels.len() != probabilities.len() {
        return Err(Error::LengthMismatch {
            labels: labels.len(),
            predictions: probabilities.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Threshold sweep
// ---------------------------------------------------------------------------

/// `0.00, 0.01, …, 1.00`.
pub fn sweep_thresholds() -> Vec<f64> {
    (0..=SWEEP_STEPS).map(|i| i as f64 / SWEEP_STEPS as f64).collect()
}

/// Parallel sensitivity and specificity sequences, one pair per threshold.
pub fn sensitivity_specificity(
    labels: &[u8],
    probabilities: &[f32],
    thresholds: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut sensitivity = Vec::with_capacity(thresholds.len());
    let mut specificity = Vec::with_capacity(thresholds.len());

    for &t in thresholds {
        let m = ConfusionMatrix::at_threshold(labels, probabilities, t)?;
        sensitivity.push(m.sensitivity());
        specificity.push(m.specificity());
    }

    Ok((sensitivity, specificity))
}

/// One row of the sweep table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub threshold: f64,
    pub sensitivity: f64,
    pub specificity: f64,
}

/// Sensitivity/specificity over the standard 101-point threshold grid.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepTable {
    pub points: Vec<SweepPoint>,
}

impl SweepTable {
    pub fn compute(labels: &[u8], probabilities: &[f32]) -> Result<Self> {
        let thresholds = sweep_thresholds();
        let (sens, spec) = sensitivity_specificity(labels, probabilities, &thresholds)?;
        let points = thresholds
            .into_iter()
            .zip(sens.into_iter().zip(spec))
            .map(|(threshold, (sensitivity, specificity))| SweepPoint {
                threshold,
                sensitivity,
                specificity,
            })
            .collect();
        Ok(SweepTable { points })
    }

    /// Point whose threshold is closest to `t`.
    pub fn nearest(&self, t: f64) -> Option<&SweepPoint> {
        self.points
            .iter()
            .min_by(|a, b| (a.threshold - t).abs().total_cmp(&(b.threshold - t).abs()))
    }
}

// ---------------------------------------------------------------------------
// Accuracy
// ---------------------------------------------------------------------------

/// Share of samples where `probability > 0.5` agrees with the label.
pub fn binary_accuracy(labels: &[u8], probabilities: &[f32]) -> Result<f64> {
    check_lengths(labels, probabilities)?;
    if labels.is_empty() {
        return Ok(0.0);
    }
    let correct = labels
        .iter()
        .zip(probabilities)
        .filter(|&(&l, &p)| u8::from(p > ACCURACY_THRESHOLD) == l)
        .count();
    Ok(correct as f64 / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example_at_half() {
        let labels = [0, 1, 1, 0];
        let probs = [0.2, 0.8, 0.4, 0.6];
        let m = ConfusionMatrix::at_threshold(&labels, &probs, 0.5).unwrap();
        assert_eq!(
            m,
            ConfusionMatrix {
                tn: 1,
                fp: 1,
                fn_count: 1,
                tp: 1
            }
        );
        assert!((m.sensitivity() - 0.5).abs() < 1e-12);
        assert!((m.specificity() - 0.5).abs() < 1e-12);

        let (sens, spec) = sensitivity_specificity(&labels, &probs, &[0.5]).unwrap();
        assert_eq!(sens, vec![0.5]);
        assert_eq!(spec, vec![0.5]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let m = ConfusionMatrix::at_threshold(&[1], &[0.5], 0.5).unwrap();
        assert_eq!(m.tp, 1);
    }

    #[test]
    fn grid_has_101_points() {
        let t = sweep_thresholds();
        assert_eq!(t.len(), 101);
        assert_eq!(t[0], 0.0);
        assert_eq!(t[100], 1.0);
        assert!((t[37] - 0.37).abs() < 1e-12);
    }

    #[test]
    fn sweep_is_bounded_and_monotone() {
        let labels = [0, 0, 1, 1, 0, 1, 1, 0, 1, 0];
        let probs = [0.1, 0.35, 0.9, 0.55, 0.6, 0.2, 0.99, 0.0, 0.7, 0.45];
        let table = SweepTable::compute(&labels, &probs).unwrap();
        assert_eq!(table.points.len(), 101);

        for p in &table.points {
            assert!((0.0..=1.0).contains(&p.sensitivity));
            assert!((0.0..=1.0).contains(&p.specificity));
        }
        for w in table.points.windows(2) {
            assert!(w[1].sensitivity <= w[0].sensitivity);
            assert!(w[1].specificity >= w[0].specificity);
        }
    }

    #[test]
    fn boundary_thresholds() {
        let labels = [0, 1, 0, 1];
        let probs = [0.0, 0.3, 0.7, 0.95];
        let table = SweepTable::compute(&labels, &probs).unwrap();
        assert_eq!(table.points[0].sensitivity, 1.0);
        assert_eq!(table.points[100].specificity, 1.0);
    }

    #[test]
    fn undefined_rates_fall_back_to_zero() {
        let m = ConfusionMatrix::at_threshold(&[0, 0], &[0.1, 0.9], 0.5).unwrap();
        assert_eq!(m.sensitivity_checked(), None);
        assert_eq!(m.sensitivity(), 0.0);
        assert_eq!(m.specificity_checked(), Some(0.5));

        let empty = ConfusionMatrix::at_threshold(&[], &[], 0.5).unwrap();
        assert_eq!(empty.specificity_checked(), None);
        assert_eq!(empty.specificity(), 0.0);
    }

    #[test]
    fn foreign_labels_are_ignored() {
        let m = ConfusionMatrix::at_threshold(&[0, 1, 2], &[0.1, 0.9, 0.9], 0.5).unwrap();
        assert_eq!(m.total(), 2);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(matches!(
            sensitivity_specificity(&[0, 1], &[0.3], &[0.5]),
            Err(Error::LengthMismatch {
                labels: 2,
                predictions: 1
            })
        ));
        assert!(binary_accuracy(&[0], &[]).is_err());
    }

    #[test]
    fn accuracy_uses_strict_half() {
        let acc = binary_accuracy(&[1, 0, 1, 0], &[0.9, 0.5, 0.5, 0.1]).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn nearest_point_lookup() {
        let table = SweepTable::compute(&[0, 1], &[0.2, 0.8]).unwrap();
        let p = table.nearest(0.504).unwrap();
        assert!((p.threshold - 0.5).abs() < 1e-12);
    }
}
