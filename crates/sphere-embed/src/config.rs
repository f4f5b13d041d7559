//! Model configuration loaded from `config.json` beside the checkpoint.
//!
//! The configuration pins the dimensions the checkpoint was trained with:
//! the pooled trunk output (the embedding), the projected feature fed to the
//! angular head, the class count, and the margin settings baked into the
//! head. Image preprocessing constants live here too so a checkpoint always
//! travels with the normalization it expects.

use std::path::Path;

use serde::Deserialize;

use crate::backbone::BackboneConfig;
use crate::error::{EmbedError, EmbedResult};
use crate::margin::{MarginKind, MarginOrder};

/// Pooled trunk output dimension (the inference-time embedding).
pub const DEFAULT_EMBED_DIM: usize = 2048;

/// Projected feature dimension fed to the angular head during training.
pub const DEFAULT_FEATURE_DIM: usize = 1024;

/// Square input resolution expected by the trunk.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Per-channel RGB mean used for input normalization.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel RGB standard deviation used for input normalization.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Complete model configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Number of identity classes the head was trained against.
    pub num_classes: usize,

    /// Feature dimension of the angular head input.
    #[serde(default = "default_feature_dim")]
    pub feature_dim: usize,

    /// Pooled trunk output dimension.
    #[serde(default = "default_embed_dim")]
    pub embed_dim: usize,

    /// Multiple-angle margin order baked into the head.
    #[serde(default = "default_margin_order")]
    pub margin_order: MarginOrder,

    /// Margin evaluation path the head was trained with.
    #[serde(default)]
    pub margin_kind: MarginKind,

    /// Square input resolution.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Per-channel RGB normalization mean.
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],

    /// Per-channel RGB normalization standard deviation.
    #[serde(default = "default_std")]
    pub std: [f32; 3],

    /// Trunk layout.
    #[serde(default)]
    pub backbone: BackboneConfig,
}

fn default_feature_dim() -> usize {
    DEFAULT_FEATURE_DIM
}

fn default_embed_dim() -> usize {
    DEFAULT_EMBED_DIM
}

fn default_margin_order() -> MarginOrder {
    MarginOrder::default()
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIZE
}

fn default_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn default_std() -> [f32; 3] {
    IMAGENET_STD
}

impl ModelConfig {
    /// Parse and validate `config.json` from a model directory.
    pub fn load(model_dir: &Path) -> EmbedResult<Self> {
        let config_path = model_dir.join("config.json");
        let content = std::fs::read_to_string(&config_path).map_err(|e| EmbedError::ModelLoad {
            path: config_path.clone(),
            reason: format!("config read failed: {}", e),
        })?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| EmbedError::Config {
                message: format!("config parse failed at {}: {}", config_path.display(), e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> EmbedResult<()> {
        if self.num_classes < 2 {
            return Err(EmbedError::Config {
                message: format!(
                    "num_classes must be at least 2, got {}",
                    self.num_classes
                ),
            });
        }
        if self.feature_dim == 0 {
            return Err(EmbedError::Config {
                message: "feature_dim must be non-zero".to_string(),
            });
        }
        if self.image_size == 0 {
            return Err(EmbedError::Config {
                message: "image_size must be non-zero".to_string(),
            });
        }
        let trunk_features = self.backbone.num_features();
        if self.embed_dim != trunk_features {
            return Err(EmbedError::Config {
                message: format!(
                    "embed_dim {} does not match trunk output {} (stage widths x expansion)",
                    self.embed_dim, trunk_features
                ),
            });
        }
        Ok(())
    }
}
