use std::collections::BTreeSet;

use crate::color::SeriesColors;
use crate::experiment::ExperimentReport;

// ---------------------------------------------------------------------------
// Plotted series
// ---------------------------------------------------------------------------

/// A curve that can be toggled in the side panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Series {
    Train,
    Validation,
    Test,
    Sensitivity,
    Specificity,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::Train,
        Series::Validation,
        Series::Test,
        Series::Sensitivity,
        Series::Specificity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Series::Train => "Train",
            Series::Validation => "Validation",
            Series::Test => "Test",
            Series::Sensitivity => "Sensitivity (True Positive Rate)",
            Series::Specificity => "Specificity (True Negative Rate)",
        }
    }
}

// ---------------------------------------------------------------------------
// Report state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct ReportState {
    /// Results of the finished run.
    pub report: ExperimentReport,

    /// Series currently drawn.
    pub visible: BTreeSet<Series>,

    /// Colour per series.
    pub colors: SeriesColors,
}

impl ReportState {
    pub fn new(report: ExperimentReport) -> Self {
        Self {
            report,
            visible: Series::ALL.into_iter().collect(),
            colors: SeriesColors::default(),
        }
    }

    pub fn is_visible(&self, series: Series) -> bool {
        self.visible.contains(&series)
    }

    /// Toggle a single series on or off.
    pub fn toggle(&mut self, series: Series) {
        if !self.visible.remove(&series) {
            self.visible.insert(series);
        }
    }

    pub fn show_all(&mut self) {
        self.visible = Series::ALL.into_iter().collect();
    }

    pub fn hide_all(&mut self) {
        self.visible.clear();
    }

    /// One-line run description for the top bar.
    pub fn summary_line(&self) -> String {
        let r = &self.report;
        format!(
            "threshold {} months | train {} / val {} / test {} | {} epochs | test loss {}, accuracy {}",
            r.threshold_months,
            r.split.train,
            r.split.validation,
            r.split.test,
            r.history.len(),
            fmt_metric(r.history.test_loss),
            fmt_metric(r.history.test_accuracy),
        )
    }
}

/// Four decimals, or `-` when the value was never computed.
pub fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}
