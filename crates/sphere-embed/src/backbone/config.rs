//! Trunk layout configuration.

use serde::Deserialize;

/// Layout of the bottleneck residual trunk.
///
/// The pooled output dimension is `stage_widths[3] * expansion`; the
/// default layout yields 2048.
#[derive(Debug, Clone, Deserialize)]
pub struct BackboneConfig {
    /// Stem output channels (7x7 stride-2 convolution).
    #[serde(default = "default_stem_channels")]
    pub stem_channels: usize,

    /// Bottleneck blocks per stage.
    #[serde(default = "default_stage_blocks")]
    pub stage_blocks: [usize; 4],

    /// Bottleneck width per stage (pre-expansion).
    #[serde(default = "default_stage_widths")]
    pub stage_widths: [usize; 4],

    /// Channel expansion of the final 1x1 convolution in each block.
    #[serde(default = "default_expansion")]
    pub expansion: usize,

    /// Batch norm epsilon.
    #[serde(default = "default_bn_eps")]
    pub bn_eps: f64,
}

fn default_stem_channels() -> usize {
    64
}

fn default_stage_blocks() -> [usize; 4] {
    [3, 4, 6, 3]
}

fn default_stage_widths() -> [usize; 4] {
    [64, 128, 256, 512]
}

fn default_expansion() -> usize {
    4
}

fn default_bn_eps() -> f64 {
    1e-5
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            stem_channels: default_stem_channels(),
            stage_blocks: default_stage_blocks(),
            stage_widths: default_stage_widths(),
            expansion: default_expansion(),
            bn_eps: default_bn_eps(),
        }
    }
}

impl BackboneConfig {
    /// Pooled output dimension of the trunk.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.stage_widths[3] * self.expansion
    }

    /// Input channel count entering stage `stage`.
    pub(crate) fn stage_in_channels(&self, stage: usize) -> usize {
        if stage == 0 {
            self.stem_channels
        } else {
            self.stage_widths[stage - 1] * self.expansion
        }
    }

    /// Spatial stride of the first block in stage `stage`.
    pub(crate) fn stage_stride(&self, stage: usize) -> usize {
        if stage == 0 {
            1
        } else {
            2
        }
    }
}
