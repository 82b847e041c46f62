use serde::Deserialize;

// ---------------------------------------------------------------------------
// BoneAgeRecord – one row of the training CSV
// ---------------------------------------------------------------------------

/// A row of the bone-age CSV. Columns other than these are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BoneAgeRecord {
    /// Identifier; the image lives at `<image_dir>/<id>.png`.
    pub id: String,
    /// Skeletal age in months.
    pub boneage: f64,
    /// Sex column as written by the dataset (`True` / `False`), if present.
    #[serde(default)]
    pub male: Option<String>,
}

impl BoneAgeRecord {
    /// Binary label: 1 when the age reaches the threshold.
    pub fn label(&self, threshold_months: f64) -> u8 {
        u8::from(self.boneage >= threshold_months)
    }

    /// Parse the sex column, tolerating the capitalised pandas spelling.
    pub fn is_male(&self) -> Option<bool> {
        match self.male.as_deref()?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// XrayDataset – the complete loaded sample set
// ---------------------------------------------------------------------------

/// Loaded images and labels, stored as one contiguous `N x 1 x H x W` buffer.
#[derive(Debug, Clone)]
pub struct XrayDataset {
    /// Grayscale pixels in `[0, 1]`, row-major, one image after another.
    pub pixels: Vec<f32>,
    /// Binary labels, parallel to the images.
    pub labels: Vec<u8>,
    /// Identifiers, parallel to the images.
    pub ids: Vec<String>,
    /// Ages in months the labels were derived from.
    pub ages: Vec<f64>,
    pub height: usize,
    pub width: usize,
}

impl XrayDataset {
    pub fn new(height: usize, width: usize) -> Self {
        XrayDataset {
            pixels: Vec::new(),
            labels: Vec::new(),
            ids: Vec::new(),
            ages: Vec::new(),
            height,
            width,
        }
    }

    /// Append one image. `pixels` must hold exactly `height * width` values.
    pub fn push(&mut self, id: String, age: f64, label: u8, pixels: &[f32]) {
        debug_assert_eq!(pixels.len(), self.image_len());
        self.pixels.extend_from_slice(pixels);
        self.labels.push(label);
        self.ids.push(id);
        self.ages.push(age);
    }

    /// Number of pixels in a single image.
    pub fn image_len(&self) -> usize {
        self.height * self.width
    }

    /// Pixels of the `idx`-th image.
    pub fn image(&self, idx: usize) -> &[f32] {
        let len = self.image_len();
        &self.pixels[idx * len..(idx + 1) * len]
    }

    /// Copy the selected images into a fresh contiguous buffer.
    pub fn gather_pixels(&self, indices: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(indices.len() * self.image_len());
        for &i in indices {
            out.extend_from_slice(self.image(i));
        }
        out
    }

    /// Labels of the selected samples, in index order.
    pub fn gather_labels(&self, indices: &[usize]) -> Vec<u8> {
        indices.iter().map(|&i| self.labels[i]).collect()
    }

    /// Number of positive (label 1) samples.
    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(age: f64, male: Option<&str>) -> BoneAgeRecord {
        BoneAgeRecord {
            id: "1377".to_string(),
            boneage: age,
            male: male.map(str::to_string),
        }
    }

    #[test]
    fn label_is_inclusive_at_threshold() {
        assert_eq!(record(99.0, None).label(100.0), 0);
        assert_eq!(record(100.0, None).label(100.0), 1);
        assert_eq!(record(180.0, None).label(100.0), 1);
    }

    #[test]
    fn sex_column_accepts_pandas_spelling() {
        assert_eq!(record(1.0, Some("True")).is_male(), Some(true));
        assert_eq!(record(1.0, Some("False")).is_male(), Some(false));
        assert_eq!(record(1.0, Some("unknown")).is_male(), None);
        assert_eq!(record(1.0, None).is_male(), None);
    }

    #[test]
    fn gather_copies_selected_images() {
        let mut ds = XrayDataset::new(1, 2);
        ds.push("a".into(), 10.0, 0, &[0.0, 0.1]);
        ds.push("b".into(), 120.0, 1, &[1.0, 1.1]);
        ds.push("c".into(), 130.0, 1, &[2.0, 2.1]);

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.positives(), 2);
        assert_eq!(ds.image(1), &[1.0, 1.1]);
        assert_eq!(ds.gather_pixels(&[2, 0]), vec![2.0, 2.1, 0.0, 0.1]);
        assert_eq!(ds.gather_labels(&[2, 0]), vec![1, 0]);
    }
}
