//! Weight structures for the trunk.

use candle_core::Tensor;

use super::config::BackboneConfig;

/// A convolution paired with its batch norm parameters.
#[derive(Debug)]
pub struct ConvBnWeights {
    /// Convolution kernel, shape (out, in, kH, kW).
    pub conv: Tensor,
    /// Batch norm scale, shape (out,).
    pub bn_weight: Tensor,
    /// Batch norm shift, shape (out,).
    pub bn_bias: Tensor,
    /// Running mean, shape (out,).
    pub bn_mean: Tensor,
    /// Running variance, shape (out,).
    pub bn_var: Tensor,
}

/// One bottleneck block: 1x1 reduce, 3x3, 1x1 expand, optional projection
/// shortcut when the block changes shape.
#[derive(Debug)]
pub struct BottleneckWeights {
    pub conv1: ConvBnWeights,
    pub conv2: ConvBnWeights,
    pub conv3: ConvBnWeights,
    pub downsample: Option<ConvBnWeights>,
}

/// One stage of bottleneck blocks.
#[derive(Debug)]
pub struct StageWeights {
    pub blocks: Vec<BottleneckWeights>,
}

/// The full trunk: stem plus four stages.
#[derive(Debug)]
pub struct TrunkWeights {
    pub stem: ConvBnWeights,
    pub stages: Vec<StageWeights>,
    pub config: BackboneConfig,
}

impl TrunkWeights {
    /// Pooled output dimension.
    #[must_use]
    pub fn num_features(&self) -> usize {
        self.config.num_features()
    }
}
