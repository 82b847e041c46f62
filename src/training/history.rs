use serde::Serialize;

/// Metrics of a single epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochMetrics {
    /// One-based epoch number.
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    /// Learning rate the epoch was trained with.
    pub learning_rate: f64,
}

/// Per-epoch training record plus the held-out test result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct History {
    pub epochs: Vec<EpochMetrics>,
    /// One-based epoch whose weights were kept.
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
    pub test_loss: Option<f64>,
    pub test_accuracy: Option<f64>,
}

impl History {
    pub fn push(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.accuracy).collect()
    }

    pub fn val_loss(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.val_loss).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.val_accuracy).collect()
    }

    /// Test loss repeated once per epoch, so it plots as a flat reference line.
    pub fn test_loss_series(&self) -> Vec<f64> {
        self.test_loss.map_or_else(Vec::new, |v| vec![v; self.len()])
    }

    pub fn test_accuracy_series(&self) -> Vec<f64> {
        self.test_accuracy.map_or_else(Vec::new, |v| vec![v; self.len()])
    }

    /// Attach the final evaluation on the test partition.
    pub fn set_test_result(&mut self, loss: f64, accuracy: f64) {
        self.test_loss = Some(loss);
        self.test_accuracy = Some(accuracy);
    }

    pub fn final_learning_rate(&self) -> Option<f64> {
        self.epochs.last().map(|e| e.learning_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch(n: usize, loss: f64) -> EpochMetrics {
        EpochMetrics {
            epoch: n,
            loss,
            accuracy: 1.0 - loss,
            val_loss: loss + 0.1,
            val_accuracy: 0.9 - loss,
            learning_rate: 1e-3,
        }
    }

    #[test]
    fn test_series_match_epoch_count() {
        let mut h = History::default();
        assert!(h.test_loss_series().is_empty());
        h.push(epoch(1, 0.6));
        h.push(epoch(2, 0.4));
        h.push(epoch(3, 0.3));
        h.set_test_result(0.35, 0.81);

        assert_eq!(h.loss(), vec![0.6, 0.4, 0.3]);
        assert_eq!(h.test_loss_series(), vec![0.35; 3]);
        assert_eq!(h.test_accuracy_series(), vec![0.81; 3]);
        assert_eq!(h.final_learning_rate(), Some(1e-3));
    }

    #[test]
    fn serializes_to_json() {
        let mut h = History::default();
        h.push(epoch(1, 0.5));
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.contains("\"val_loss\":0.6"));
        assert!(json.contains("\"test_loss\":null"));
    }
}
