//! Writes a synthetic bone-age dataset in the layout the trainer expects:
//!
//! ```text
//! <out>/boneage-training-dataset.csv
//! <out>/boneage-training-dataset/boneage-training-dataset/<id>.png
//! ```
//!
//! Each "hand" is a dark background with finger-like bright bars; older
//! hands get longer, brighter bars so the threshold task is learnable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::{GrayImage, Luma};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
#[command(name = "generate_sample")]
#[command(about = "Generate a synthetic bone-age CSV + PNG dataset")]
struct Cli {
    /// Output root (use `data` to match the trainer's defaults)
    #[arg(long, default_value = "data")]
    out: PathBuf,

    /// Number of images
    #[arg(long, default_value_t = 200)]
    count: usize,

    /// Image side length in pixels
    #[arg(long, default_value_t = 256)]
    size: u32,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn draw_hand(age_months: f64, size: u32, rng: &mut ChaCha8Rng) -> GrayImage {
    let maturity = (age_months / 228.0).clamp(0.0, 1.0);
    let mut img = GrayImage::new(size, size);

    let fingers = 5u32;
    let bar_width = size / (fingers * 3);
    let bar_len = (f64::from(size) * (0.35 + 0.45 * maturity)) as u32;
    let brightness = 110.0 + 120.0 * maturity;

    for (x, y, px) in img.enumerate_pixels_mut() {
        let finger_slot = x / (size / fingers).max(1);
        let in_bar = x % (size / fingers).max(1) < bar_width
            && finger_slot < fingers
            && y >= size - bar_len.min(size);
        let base = if in_bar { brightness } else { 20.0 };
        let noise: f64 = rng.gen_range(-12.0..12.0);
        *px = Luma([(base + noise).clamp(0.0, 255.0) as u8]);
    }
    img
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);

    let image_dir = cli
        .out
        .join("boneage-training-dataset")
        .join("boneage-training-dataset");
    std::fs::create_dir_all(&image_dir)
        .with_context(|| format!("creating {}", image_dir.display()))?;

    let csv_path = cli.out.join("boneage-training-dataset.csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(["id", "boneage", "male"])?;

    let first_id = 1377u32;
    for i in 0..cli.count {
        let id = first_id + i as u32;
        let age: f64 = rng.gen_range(1.0..228.0_f64).round();
        let male = rng.gen_bool(0.5);

        let img = draw_hand(age, cli.size, &mut rng);
        let path = image_dir.join(format!("{id}.png"));
        img.save(&path)
            .with_context(|| format!("writing {}", path.display()))?;

        writer.write_record([
            id.to_string(),
            age.to_string(),
            if male { "True" } else { "False" }.to_string(),
        ])?;
    }
    writer.flush()?;

    println!(
        "Wrote {} images ({}x{}) and {}",
        cli.count,
        cli.size,
        cli.size,
        csv_path.display()
    );
    Ok(())
}
