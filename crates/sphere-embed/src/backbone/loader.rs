//! Tensor-name-based weight loading for the trunk.
//!
//! Checkpoint naming (265 tensors for the default layout):
//!   - conv1.weight [64, 3, 7, 7]
//!   - bn1.{weight,bias,running_mean,running_var} [64]
//!   - layer{s}.{i}.conv1.weight [w, in, 1, 1] and bn1.* [w]
//!   - layer{s}.{i}.conv2.weight [w, w, 3, 3] and bn2.* [w]
//!   - layer{s}.{i}.conv3.weight [w*4, w, 1, 1] and bn3.* [w*4]
//!   - layer{s}.{i}.downsample.0.weight [w*4, in, 1, 1] (first block only)
//!   - layer{s}.{i}.downsample.1.{weight,bias,running_mean,running_var}

use candle_core::Tensor;
use candle_nn::VarBuilder;

use crate::error::{EmbedError, EmbedResult};

use super::config::BackboneConfig;
use super::weights::{BottleneckWeights, ConvBnWeights, StageWeights, TrunkWeights};

/// Load the trunk from a `VarBuilder`, validating every tensor shape.
pub fn load_trunk(vb: &VarBuilder, config: &BackboneConfig) -> EmbedResult<TrunkWeights> {
    let stem = load_conv_bn(
        vb,
        "conv1.weight",
        "bn1",
        &[config.stem_channels, 3, 7, 7],
    )?;

    let mut stages = Vec::with_capacity(4);
    for stage_idx in 0..4 {
        let width = config.stage_widths[stage_idx];
        let out_channels = width * config.expansion;
        let mut in_channels = config.stage_in_channels(stage_idx);

        let mut blocks = Vec::with_capacity(config.stage_blocks[stage_idx]);
        for block_idx in 0..config.stage_blocks[stage_idx] {
            let prefix = format!("layer{}.{}", stage_idx + 1, block_idx);

            let conv1 = load_conv_bn(
                vb,
                &format!("{}.conv1.weight", prefix),
                &format!("{}.bn1", prefix),
                &[width, in_channels, 1, 1],
            )?;
            let conv2 = load_conv_bn(
                vb,
                &format!("{}.conv2.weight", prefix),
                &format!("{}.bn2", prefix),
                &[width, width, 3, 3],
            )?;
            let conv3 = load_conv_bn(
                vb,
                &format!("{}.conv3.weight", prefix),
                &format!("{}.bn3", prefix),
                &[out_channels, width, 1, 1],
            )?;

            // The first block changes channel count (and usually stride):
            // it carries the projection shortcut.
            let downsample = if block_idx == 0 {
                Some(load_conv_bn(
                    vb,
                    &format!("{}.downsample.0.weight", prefix),
                    &format!("{}.downsample.1", prefix),
                    &[out_channels, in_channels, 1, 1],
                )?)
            } else {
                None
            };

            blocks.push(BottleneckWeights {
                conv1,
                conv2,
                conv3,
                downsample,
            });
            in_channels = out_channels;
        }
        stages.push(StageWeights { blocks });
    }

    Ok(TrunkWeights {
        stem,
        stages,
        config: config.clone(),
    })
}

/// Load one convolution with its batch norm parameters.
fn load_conv_bn(
    vb: &VarBuilder,
    conv_name: &str,
    bn_prefix: &str,
    conv_shape: &[usize],
) -> EmbedResult<ConvBnWeights> {
    let channels = conv_shape[0];
    let conv = get_tensor(vb, conv_name, conv_shape.to_vec())?;
    let bn_weight = get_tensor(vb, &format!("{}.weight", bn_prefix), vec![channels])?;
    let bn_bias = get_tensor(vb, &format!("{}.bias", bn_prefix), vec![channels])?;
    let bn_mean = get_tensor(vb, &format!("{}.running_mean", bn_prefix), vec![channels])?;
    let bn_var = get_tensor(vb, &format!("{}.running_var", bn_prefix), vec![channels])?;
    Ok(ConvBnWeights {
        conv,
        bn_weight,
        bn_bias,
        bn_mean,
        bn_var,
    })
}

fn get_tensor(vb: &VarBuilder, name: &str, shape: Vec<usize>) -> EmbedResult<Tensor> {
    vb.get(shape, name).map_err(|e| EmbedError::Tensor {
        message: format!("failed to load weight '{}': {}", name, e),
    })
}

/// Enumerate every trunk tensor name with its expected shape.
///
/// The list matches what [`load_trunk`] reads; callers use it to validate
/// checkpoints or to generate fixtures.
#[must_use]
pub fn trunk_tensor_shapes(config: &BackboneConfig) -> Vec<(String, Vec<usize>)> {
    let mut shapes = Vec::new();
    push_conv_bn(
        &mut shapes,
        "conv1.weight",
        "bn1",
        vec![config.stem_channels, 3, 7, 7],
    );

    for stage_idx in 0..4 {
        let width = config.stage_widths[stage_idx];
        let out_channels = width * config.expansion;
        let mut in_channels = config.stage_in_channels(stage_idx);

        for block_idx in 0..config.stage_blocks[stage_idx] {
            let prefix = format!("layer{}.{}", stage_idx + 1, block_idx);
            push_conv_bn(
                &mut shapes,
                &format!("{}.conv1.weight", prefix),
                &format!("{}.bn1", prefix),
                vec![width, in_channels, 1, 1],
            );
            push_conv_bn(
                &mut shapes,
                &format!("{}.conv2.weight", prefix),
                &format!("{}.bn2", prefix),
                vec![width, width, 3, 3],
            );
            push_conv_bn(
                &mut shapes,
                &format!("{}.conv3.weight", prefix),
                &format!("{}.bn3", prefix),
                vec![out_channels, width, 1, 1],
            );
            if block_idx == 0 {
                push_conv_bn(
                    &mut shapes,
                    &format!("{}.downsample.0.weight", prefix),
                    &format!("{}.downsample.1", prefix),
                    vec![out_channels, in_channels, 1, 1],
                );
            }
            in_channels = out_channels;
        }
    }
    shapes
}

fn push_conv_bn(
    shapes: &mut Vec<(String, Vec<usize>)>,
    conv_name: &str,
    bn_prefix: &str,
    conv_shape: Vec<usize>,
) {
    let channels = conv_shape[0];
    shapes.push((conv_name.to_string(), conv_shape));
    for suffix in ["weight", "bias", "running_mean", "running_var"] {
        shapes.push((format!("{}.{}", bn_prefix, suffix), vec![channels]));
    }
}
