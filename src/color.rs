use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::state::Series;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            // Start at 210° so the first colour is a blue, the second an orange.
            let hue = (210.0 + (i as f32 / n as f32) * 360.0) % 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Series colours
// ---------------------------------------------------------------------------

pub const LIME: Color32 = Color32::from_rgb(0, 255, 0);
pub const BLUE: Color32 = Color32::from_rgb(0, 0, 255);
pub const GREEN: Color32 = Color32::from_rgb(0, 128, 0);

/// Colour of every plotted series.
#[derive(Debug, Clone)]
pub struct SeriesColors {
    mapping: BTreeMap<Series, Color32>,
}

impl Default for SeriesColors {
    fn default() -> Self {
        let mut mapping = BTreeMap::new();
        let fitted = generate_palette(2);
        mapping.insert(Series::Train, fitted[0]);
        mapping.insert(Series::Validation, fitted[1]);
        mapping.insert(Series::Test, LIME);
        mapping.insert(Series::Sensitivity, BLUE);
        mapping.insert(Series::Specificity, GREEN);
        SeriesColors { mapping }
    }
}

impl SeriesColors {
    pub fn color_for(&self, series: Series) -> Color32 {
        self.mapping.get(&series).copied().unwrap_or(Color32::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_colours_are_distinct() {
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        for i in 0..p.len() {
            for j in i + 1..p.len() {
                assert_ne!(p[i], p[j]);
            }
        }
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn fixed_series_keep_their_colours() {
        let colors = SeriesColors::default();
        assert_eq!(colors.color_for(Series::Test), LIME);
        assert_eq!(colors.color_for(Series::Sensitivity), BLUE);
        assert_eq!(colors.color_for(Series::Specificity), GREEN);
        assert_ne!(colors.color_for(Series::Train), colors.color_for(Series::Validation));
    }
}
