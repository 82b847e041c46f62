/// Data layer: record types, CSV/image loading, and partitioning.
///
/// Architecture:
/// ```text
///  boneage.csv + <id>.png
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse rows, decode + resize images → XrayDataset
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ XrayDataset │  N x 1 x H x W pixels, binary labels
///   └─────────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ preprocess │  seeded train/val/test split, grey → RGB per batch
///   └────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod preprocess;
