//! Forward pass primitives for the trunk.

use candle_core::{Tensor, D};

use crate::error::{EmbedError, EmbedResult};

use super::weights::ConvBnWeights;

/// 2D convolution with the given padding and stride.
pub fn conv2d(
    input: &Tensor,
    kernel: &Tensor,
    padding: usize,
    stride: usize,
    context: &str,
) -> EmbedResult<Tensor> {
    input
        .conv2d(kernel, padding, stride, 1, 1)
        .map_err(|e| EmbedError::tensor(context, e))
}

/// Inference-mode batch norm over the channel axis of a (B, C, H, W) tensor.
///
/// Uses the checkpoint's running statistics:
/// y = (x − mean) / sqrt(var + eps) · weight + bias.
pub fn batch_norm(
    input: &Tensor,
    weights: &ConvBnWeights,
    eps: f64,
    context: &str,
) -> EmbedResult<Tensor> {
    let channels = weights
        .bn_mean
        .dim(0)
        .map_err(|e| EmbedError::tensor(context, e))?;

    let reshape = |t: &Tensor| t.reshape((1, channels, 1, 1));
    let mean = reshape(&weights.bn_mean).map_err(|e| EmbedError::tensor(context, e))?;
    let std = (&weights.bn_var + eps)
        .and_then(|t| t.sqrt())
        .and_then(|t| reshape(&t))
        .map_err(|e| EmbedError::tensor(context, e))?;
    let weight = reshape(&weights.bn_weight).map_err(|e| EmbedError::tensor(context, e))?;
    let bias = reshape(&weights.bn_bias).map_err(|e| EmbedError::tensor(context, e))?;

    input
        .broadcast_sub(&mean)
        .and_then(|t| t.broadcast_div(&std))
        .and_then(|t| t.broadcast_mul(&weight))
        .and_then(|t| t.broadcast_add(&bias))
        .map_err(|e| EmbedError::tensor(context, e))
}

/// Convolution, batch norm, then ReLU.
pub fn conv_bn_relu(
    input: &Tensor,
    weights: &ConvBnWeights,
    padding: usize,
    stride: usize,
    eps: f64,
    context: &str,
) -> EmbedResult<Tensor> {
    let out = conv_bn(input, weights, padding, stride, eps, context)?;
    out.relu().map_err(|e| EmbedError::tensor(context, e))
}

/// Convolution then batch norm, no activation.
pub fn conv_bn(
    input: &Tensor,
    weights: &ConvBnWeights,
    padding: usize,
    stride: usize,
    eps: f64,
    context: &str,
) -> EmbedResult<Tensor> {
    let out = conv2d(input, &weights.conv, padding, stride, context)?;
    batch_norm(&out, weights, eps, context)
}

/// 3x3 max pool, stride 2, padding 1.
///
/// Inputs arrive post-ReLU (non-negative), so zero padding is neutral.
pub fn max_pool_3x3(input: &Tensor) -> EmbedResult<Tensor> {
    input
        .pad_with_zeros(D::Minus2, 1, 1)
        .and_then(|t| t.pad_with_zeros(D::Minus1, 1, 1))
        .and_then(|t| t.max_pool2d_with_stride((3, 3), (2, 2)))
        .map_err(|e| EmbedError::tensor("stem max pool", e))
}

/// Global average pool: (B, C, H, W) → (B, C).
pub fn global_avg_pool(input: &Tensor) -> EmbedResult<Tensor> {
    input
        .mean(D::Minus1)
        .and_then(|t| t.mean(D::Minus1))
        .map_err(|e| EmbedError::tensor("global average pool", e))
}
