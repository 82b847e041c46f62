//! Frozen VGG16 feature extractor with a trainable sigmoid head.
//!
//! # Architecture
//!
//! ```text
//! Input (3 x H x W)
//!   → VGG16 conv blocks 1-5 (frozen, pretrained)
//!   → GlobalAveragePooling → 512
//!   → Linear(1) → Sigmoid
//! ```
//!
//! Backbone weights are read from a safetensors file using the torchvision
//! layout (`features.{idx}.weight`, `features.{idx}.bias`). They never enter
//! the optimiser's variable map, which is what keeps them frozen.

use std::fmt::Write as _;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder, VarMap};

use crate::error::{Error, Result};

/// Channels produced by the last convolution block.
pub const FEATURE_DIM: usize = 512;

/// Smallest input side VGG16 accepts without a classifier top.
pub const MIN_INPUT_SIDE: usize = 32;

/// Output channels per block; each block ends with a 2x2 max-pool.
const BLOCKS: [&[usize]; 5] = [
    &[64, 64],
    &[128, 128],
    &[256, 256, 256],
    &[512, 512, 512],
    &[512, 512, 512],
];

// ---------------------------------------------------------------------------
// Input shape
// ---------------------------------------------------------------------------

/// Height, width and channel count of a single network input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl InputShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        InputShape {
            height,
            width,
            channels,
        }
    }

    /// Reject shapes the pretrained network cannot consume.
    pub fn validate(&self) -> Result<()> {
        if self.channels != 3 || self.height < MIN_INPUT_SIDE || self.width < MIN_INPUT_SIDE {
            return Err(Error::InputShape {
                height: self.height,
                width: self.width,
                channels: self.channels,
                min_side: MIN_INPUT_SIDE,
            });
        }
        Ok(())
    }

    /// Spatial size after the five max-pools.
    fn pooled(&self) -> (usize, usize) {
        (self.height >> BLOCKS.len(), self.width >> BLOCKS.len())
    }
}

// ---------------------------------------------------------------------------
// Backbone
// ---------------------------------------------------------------------------

/// The convolutional part of VGG16.
pub struct Vgg16Features {
    blocks: Vec<Vec<Conv2d>>,
}

impl Vgg16Features {
    /// Build the layers from `vb`, using torchvision's `features.{idx}` indices.
    pub fn new(vb: VarBuilder) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: 1,
            ..Default::default()
        };
        let vb = vb.pp("features");

        let mut in_channels = 3;
        // Every conv is followed by a ReLU, every block by a max-pool.
        let mut layer_idx = 0;
        let mut blocks = Vec::with_capacity(BLOCKS.len());
        for widths in BLOCKS {
            let mut convs = Vec::with_capacity(widths.len());
            for &out_channels in widths {
                let conv = candle_nn::conv2d(
                    in_channels,
                    out_channels,
                    3,
                    cfg,
                    vb.pp(layer_idx.to_string()),
                )?;
                convs.push(conv);
                in_channels = out_channels;
                layer_idx += 2;
            }
            layer_idx += 1;
            blocks.push(convs);
        }

        Ok(Self { blocks })
    }

    /// `[N, 3, H, W]` → `[N, 512, H/32, W/32]`.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for block in &self.blocks {
            for conv in block {
                xs = conv.forward(&xs)?.relu()?;
            }
            xs = xs.max_pool2d(2)?;
        }
        Ok(xs)
    }

    fn parameter_count() -> usize {
        let mut in_channels = 3;
        let mut total = 0;
        for widths in BLOCKS {
            for &out in widths {
                total += in_channels * out * 9 + out;
                in_channels = out;
            }
        }
        total
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Frozen backbone + global average pooling + one sigmoid unit.
pub struct BoneAgeClassifier {
    backbone: Vgg16Features,
    head: Linear,
    input_shape: InputShape,
    device: Device,
}

impl BoneAgeClassifier {
    /// Load the pretrained backbone from `weights` and attach a fresh head
    /// whose variables live in `head_vars`.
    pub fn from_pretrained(
        weights: &Path,
        input_shape: InputShape,
        head_vars: &VarMap,
        device: &Device,
    ) -> Result<Self> {
        input_shape.validate()?;
        // SAFETY: memory-mapping safetensors is the standard candle pattern.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights.to_path_buf()], DType::F32, device)?
        };
        Self::assemble(vb, input_shape, head_vars, device)
    }

    /// Backbone with random weights, for architecture checks and tests.
    pub fn new_random(input_shape: InputShape, head_vars: &VarMap, device: &Device) -> Result<Self> {
        input_shape.validate()?;
        let backbone_vars = VarMap::new();
        let vb = VarBuilder::from_varmap(&backbone_vars, DType::F32, device);
        Self::assemble(vb, input_shape, head_vars, device)
    }

    fn assemble(
        backbone_vb: VarBuilder,
        input_shape: InputShape,
        head_vars: &VarMap,
        device: &Device,
    ) -> Result<Self> {
        let backbone = Vgg16Features::new(backbone_vb)?;
        let head_vb = VarBuilder::from_varmap(head_vars, DType::F32, device);
        let head = candle_nn::linear(FEATURE_DIM, 1, head_vb.pp("head"))?;
        Ok(Self {
            backbone,
            head,
            input_shape,
            device: device.clone(),
        })
    }

    /// Pooled backbone features: `[N, 3, H, W]` → `[N, 512]`.
    pub fn embed(&self, images: &Tensor) -> Result<Tensor> {
        let (_, c, h, w) = images.dims4()?;
        InputShape::new(h, w, c).validate()?;
        let maps = self.backbone.forward(images)?;
        Ok(maps.mean((2, 3))?)
    }

    /// Head logits from pooled features: `[N, 512]` → `[N]`.
    pub fn logits_from_features(&self, features: &Tensor) -> Result<Tensor> {
        Ok(self.head.forward(features)?.squeeze(1)?)
    }

    /// Probabilities for a batch of RGB images.
    pub fn predict(&self, images: &Tensor) -> Result<Tensor> {
        let logits = self.logits_from_features(&self.embed(images)?)?;
        Ok(candle_nn::ops::sigmoid(&logits)?)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Keras-style layer table with trainable / frozen parameter counts.
    pub fn summary(&self) -> String {
        let (ph, pw) = self.input_shape.pooled();
        let backbone = Vgg16Features::parameter_count();
        let head = FEATURE_DIM + 1;

        let mut out = String::new();
        let rule = "-".repeat(64);
        let _ = writeln!(out, "{:<28}{:<22}{:>14}", "Layer", "Output shape", "Params");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{:<28}{:<22}{:>14}", "vgg16 (frozen)", format!("({ph}, {pw}, 512)"), backbone);
        let _ = writeln!(out, "{:<28}{:<22}{:>14}", "global_average_pooling", "(512)", 0);
        let _ = writeln!(out, "{:<28}{:<22}{:>14}", "dense (sigmoid)", "(1)", head);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total params: {}", backbone + head);
        let _ = writeln!(out, "Trainable params: {head}");
        let _ = write!(out, "Non-trainable params: {backbone}");
        out
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// CUDA > Metal > CPU, depending on enabled features and hardware.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            log::info!("Using CUDA device 0");
            return device;
        }
        log::warn!("CUDA feature enabled but no GPU available, falling back");
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            log::info!("Using Metal device 0");
            return device;
        }
        log::warn!("Metal feature enabled but no device available, falling back");
    }

    Device::Cpu
}
