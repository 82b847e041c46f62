use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::imageops::FilterType;

use super::model::{BoneAgeRecord, XrayDataset};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load up to `limit` samples listed in `csv_path`.
///
/// CSV layout: header row with at least `id` and `boneage` columns.
/// The image for each row is `<image_dir>/<id>.png`; it is decoded as
/// grayscale, resized to `image_size x image_size` and scaled to `[0, 1]`.
/// Labels are `1` when `boneage >= threshold_months`.
pub fn load_images_from_csv(
    csv_path: &Path,
    image_dir: &Path,
    threshold_months: f64,
    limit: usize,
    image_size: u32,
) -> Result<XrayDataset> {
    let records = read_records(csv_path, limit)?;
    if records.is_empty() {
        bail!("{} contains no samples", csv_path.display());
    }

    let side = image_size as usize;
    let mut dataset = XrayDataset::new(side, side);
    let mut males = 0usize;

    for (row_no, record) in records.iter().enumerate() {
        let path = image_path(image_dir, &record.id);
        let pixels = load_grayscale(&path, image_size)
            .with_context(|| format!("CSV row {row_no} (id {})", record.id))?;
        if record.is_male() == Some(true) {
            males += 1;
        }
        dataset.push(
            record.id.clone(),
            record.boneage,
            record.label(threshold_months),
            &pixels,
        );

        if (row_no + 1) % 500 == 0 {
            log::debug!("  [{}/{}] images decoded", row_no + 1, records.len());
        }
    }

    let positives = dataset.positives();
    log::info!(
        "Loaded {} samples from {} ({} >= {threshold_months} months, {} below, {} male)",
        dataset.len(),
        csv_path.display(),
        positives,
        dataset.len() - positives,
        males,
    );

    Ok(dataset)
}

/// Image file backing a CSV row.
pub fn image_path(image_dir: &Path, id: &str) -> PathBuf {
    image_dir.join(format!("{id}.png"))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn read_records(path: &Path, limit: usize) -> Result<Vec<BoneAgeRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening CSV {}", path.display()))?;

    let headers = reader.headers().context("reading CSV headers")?.clone();
    for required in ["id", "boneage"] {
        if !headers.iter().any(|h| h == required) {
            bail!("CSV {} missing '{required}' column", path.display());
        }
    }

    reader
        .deserialize::<BoneAgeRecord>()
        .take(limit)
        .enumerate()
        .map(|(row_no, rec)| rec.with_context(|| format!("CSV row {row_no}")))
        .collect()
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

fn load_grayscale(path: &Path, size: u32) -> Result<Vec<f32>> {
    let img = image::open(path).with_context(|| format!("decoding {}", path.display()))?;
    let gray = img.resize_exact(size, size, FilterType::Triangle).to_luma8();
    Ok(gray.as_raw().iter().map(|&p| f32::from(p) / 255.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_png(dir: &Path, id: &str, value: u8) {
        let img = GrayImage::from_pixel(8, 6, Luma([value]));
        img.save(image_path(dir, id)).unwrap();
    }

    fn fixture(csv: &str, images: &[(&str, u8)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("labels.csv"), csv).unwrap();
        for (id, value) in images {
            write_png(dir.path(), id, *value);
        }
        dir
    }

    #[test]
    fn loads_resizes_and_labels_rows() {
        let dir = fixture(
            "id,boneage,male\n1,180,True\n2,40,False\n3,100,True\n",
            &[("1", 255), ("2", 0), ("3", 51)],
        );
        let ds = load_images_from_csv(&dir.path().join("labels.csv"), dir.path(), 100.0, 5000, 4)
            .unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!((ds.height, ds.width), (4, 4));
        assert_eq!(ds.pixels.len(), 3 * 16);
        assert_eq!(ds.labels, vec![1, 0, 1]);
        assert_eq!(ds.ids, vec!["1", "2", "3"]);
        assert!(ds.image(0).iter().all(|&p| (p - 1.0).abs() < 1e-6));
        assert!(ds.image(1).iter().all(|&p| p.abs() < 1e-6));
        assert!(ds.image(2).iter().all(|&p| (p - 0.2).abs() < 1e-6));
    }

    #[test]
    fn limit_caps_rows_in_file_order() {
        let dir = fixture(
            "id,boneage\n1,180\n2,40\n3,100\n",
            &[("1", 10), ("2", 20), ("3", 30)],
        );
        let ds = load_images_from_csv(&dir.path().join("labels.csv"), dir.path(), 100.0, 2, 4)
            .unwrap();
        assert_eq!(ds.ids, vec!["1", "2"]);
    }

    #[test]
    fn missing_image_is_reported_with_row() {
        let dir = fixture("id,boneage\n1,180\n2,40\n", &[("1", 10)]);
        let err = load_images_from_csv(&dir.path().join("labels.csv"), dir.path(), 100.0, 10, 4)
            .unwrap_err();
        assert!(format!("{err:#}").contains("CSV row 1"));
    }

    #[test]
    fn unparsable_age_is_reported_with_row() {
        let dir = fixture("id,boneage\n1,180\n2,old\n", &[("1", 10), ("2", 20)]);
        let err = load_images_from_csv(&dir.path().join("labels.csv"), dir.path(), 100.0, 10, 4)
            .unwrap_err();
        assert!(format!("{err:#}").contains("CSV row 1"));
    }

    #[test]
    fn missing_csv_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_images_from_csv(&dir.path().join("absent.csv"), dir.path(), 100.0, 10, 4)
            .unwrap_err();
        assert!(err.to_string().contains("opening CSV"));
    }

    #[test]
    fn missing_age_column_is_rejected() {
        let dir = fixture("id,age\n1,180\n", &[("1", 10)]);
        let err = load_images_from_csv(&dir.path().join("labels.csv"), dir.path(), 100.0, 10, 4)
            .unwrap_err();
        assert!(err.to_string().contains("boneage"));
    }
}
