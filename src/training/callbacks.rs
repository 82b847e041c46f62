//! Validation-loss driven schedule: learning-rate decay and early stopping.

/// Halve (by default) the learning rate when validation loss stops improving.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
    best: f64,
    wait: usize,
}

impl ReduceLrOnPlateau {
    pub fn new(factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            factor,
            patience,
            min_lr,
            min_delta: 1e-4,
            best: f64::INFINITY,
            wait: 0,
        }
    }

    /// Feed one epoch's validation loss. Returns the new learning rate when
    /// it should change.
    pub fn on_epoch_end(&mut self, val_loss: f64, current_lr: f64) -> Option<f64> {
        if val_loss < self.best - self.min_delta {
            self.best = val_loss;
            self.wait = 0;
            return None;
        }

        self.wait += 1;
        if self.wait < self.patience {
            return None;
        }
        self.wait = 0;

        if current_lr > self.min_lr {
            Some((current_lr * self.factor).max(self.min_lr))
        } else {
            None
        }
    }
}

/// Outcome of an [`EarlyStopping`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopDecision {
    /// This epoch is the best so far; its weights should be kept.
    pub improved: bool,
    /// Training should end after this epoch.
    pub stop: bool,
}

/// Stop once validation loss has not improved for `patience` epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
        }
    }

    pub fn on_epoch_end(&mut self, epoch: usize, val_loss: f64) -> StopDecision {
        let improved = val_loss < self.best;
        if improved {
            self.best = val_loss;
            self.best_epoch = Some(epoch);
            self.wait = 0;
        } else {
            self.wait += 1;
        }

        StopDecision {
            improved,
            stop: !improved && self.wait >= self.patience && epoch > 0,
        }
    }

    /// Zero-based epoch with the lowest validation loss seen.
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lr_halves_after_patience_flat_epochs() {
        let mut cb = ReduceLrOnPlateau::new(0.5, 2, 1e-5);
        assert_eq!(cb.on_epoch_end(0.6, 1e-3), None);
        assert_eq!(cb.on_epoch_end(0.6, 1e-3), None);
        assert_eq!(cb.on_epoch_end(0.6, 1e-3), Some(5e-4));
        // wait was reset, needs another `patience` flat epochs
        assert_eq!(cb.on_epoch_end(0.6, 5e-4), None);
        assert_eq!(cb.on_epoch_end(0.6, 5e-4), Some(2.5e-4));
    }

    #[test]
    fn lr_improvement_needs_min_delta() {
        let mut cb = ReduceLrOnPlateau::new(0.5, 1, 1e-5);
        assert_eq!(cb.on_epoch_end(0.5, 1e-3), None);
        // 0.49995 is not 1e-4 better than 0.5
        assert_eq!(cb.on_epoch_end(0.49995, 1e-3), Some(5e-4));
        assert_eq!(cb.on_epoch_end(0.4, 5e-4), None);
    }

    #[test]
    fn lr_is_floored_at_min() {
        let mut cb = ReduceLrOnPlateau::new(0.5, 1, 1e-5);
        cb.on_epoch_end(0.5, 1.5e-5);
        assert_eq!(cb.on_epoch_end(0.5, 1.5e-5), Some(1e-5));
        assert_eq!(cb.on_epoch_end(0.5, 1e-5), None);
    }

    #[test]
    fn early_stopping_counts_non_improving_epochs() {
        let mut es = EarlyStopping::new(3);
        assert!(es.on_epoch_end(0, 0.7).improved);
        assert!(es.on_epoch_end(1, 0.5).improved);
        assert!(!es.on_epoch_end(2, 0.5).stop);
        assert!(!es.on_epoch_end(3, 0.6).stop);
        let d = es.on_epoch_end(4, 0.55);
        assert!(d.stop);
        assert!(!d.improved);
        assert_eq!(es.best_epoch(), Some(1));
        assert!((es.best() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn improvement_resets_patience() {
        let mut es = EarlyStopping::new(2);
        es.on_epoch_end(0, 0.5);
        es.on_epoch_end(1, 0.6);
        assert!(es.on_epoch_end(2, 0.4).improved);
        assert!(!es.on_epoch_end(3, 0.45).stop);
        assert!(es.on_epoch_end(4, 0.45).stop);
    }
}
