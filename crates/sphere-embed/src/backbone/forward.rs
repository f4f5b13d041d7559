//! Trunk forward pass.

use candle_core::Tensor;

use crate::error::{EmbedError, EmbedResult};

use super::ops::{conv_bn, conv_bn_relu, max_pool_3x3};
use super::weights::{BottleneckWeights, TrunkWeights};

impl TrunkWeights {
    /// Run the trunk over a (B, 3, H, W) batch.
    ///
    /// Returns the final convolutional feature map (B, C_out, H', W');
    /// callers pool it to get the embedding.
    pub fn forward(&self, images: &Tensor) -> EmbedResult<Tensor> {
        let eps = self.config.bn_eps;

        // Stem: 7x7/2 conv, BN, ReLU, 3x3/2 max pool.
        let mut x = conv_bn_relu(images, &self.stem, 3, 2, eps, "stem conv")?;
        x = max_pool_3x3(&x)?;

        for (stage_idx, stage) in self.stages.iter().enumerate() {
            let stage_stride = self.config.stage_stride(stage_idx);
            for (block_idx, block) in stage.blocks.iter().enumerate() {
                let stride = if block_idx == 0 { stage_stride } else { 1 };
                x = bottleneck(&x, block, stride, eps)?;
            }
        }

        Ok(x)
    }
}

/// One bottleneck block: 1x1 reduce, 3x3 (carrying the stride), 1x1 expand,
/// residual add, ReLU. The projection shortcut applies when the block
/// changes channel count or resolution.
fn bottleneck(
    input: &Tensor,
    block: &BottleneckWeights,
    stride: usize,
    eps: f64,
) -> EmbedResult<Tensor> {
    let out = conv_bn_relu(input, &block.conv1, 0, 1, eps, "bottleneck reduce")?;
    let out = conv_bn_relu(&out, &block.conv2, 1, stride, eps, "bottleneck 3x3")?;
    let out = conv_bn(&out, &block.conv3, 0, 1, eps, "bottleneck expand")?;

    let shortcut = match &block.downsample {
        Some(projection) => conv_bn(input, projection, 0, stride, eps, "bottleneck shortcut")?,
        None => input.clone(),
    };

    out.add(&shortcut)
        .and_then(|t| t.relu())
        .map_err(|e| EmbedError::tensor("bottleneck residual", e))
}
