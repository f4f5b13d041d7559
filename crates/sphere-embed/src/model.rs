//! The full model: trunk plus angular-margin training head.
//!
//! Inference uses the trunk alone ([`SphereModel::forward_features`]); the
//! head exists because the checkpoint carries it and because
//! [`SphereModel::forward_train`] is the contract the embedding space was
//! shaped by.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::backbone::{global_avg_pool, load_trunk, trunk_tensor_shapes, TrunkWeights};
use crate::checkpoint::{
    has_data_parallel_prefix, load_tensors, strip_data_parallel_prefix,
};
use crate::config::ModelConfig;
use crate::error::{EmbedError, EmbedResult};
use crate::margin::{AngularLogits, AngularMargin};

/// Checkpoint file name inside a model directory.
pub const CHECKPOINT_FILE_NAME: &str = "model.safetensors";

/// Trunk plus training head, loaded from a checkpoint.
#[derive(Debug)]
pub struct SphereModel {
    trunk: TrunkWeights,
    embed_weight: Tensor,
    embed_bias: Tensor,
    head: AngularMargin,
    config: ModelConfig,
}

impl SphereModel {
    /// Load config and checkpoint from a model directory.
    ///
    /// Tries the parameter names as stored first; if construction fails and
    /// every name carries the `module.` namespace, strips it and retries
    /// once. Any remaining failure propagates.
    pub fn load(model_dir: &Path, device: &'static Device) -> EmbedResult<Self> {
        let config = ModelConfig::load(model_dir)?;
        let checkpoint_path = model_dir.join(CHECKPOINT_FILE_NAME);
        let tensors = load_tensors(&checkpoint_path, device)?;

        let direct = Self::from_tensor_map(tensors.clone(), &config, device);
        match direct {
            Ok(model) => {
                tracing::info!(
                    target: "sphere_embed::model",
                    classes = config.num_classes,
                    embed_dim = config.embed_dim,
                    "model loaded"
                );
                Ok(model)
            }
            Err(first_err) => {
                if !has_data_parallel_prefix(&tensors) {
                    return Err(first_err);
                }
                tracing::warn!(
                    target: "sphere_embed::model",
                    "direct load failed; retrying with the data-parallel prefix stripped"
                );
                let stripped = strip_data_parallel_prefix(tensors);
                let model = Self::from_tensor_map(stripped, &config, device)?;
                tracing::info!(
                    target: "sphere_embed::model",
                    classes = config.num_classes,
                    embed_dim = config.embed_dim,
                    "model loaded (prefix stripped)"
                );
                Ok(model)
            }
        }
    }

    /// Build the model from an in-memory tensor map.
    pub fn from_tensor_map(
        tensors: HashMap<String, Tensor>,
        config: &ModelConfig,
        device: &Device,
    ) -> EmbedResult<Self> {
        let vb = VarBuilder::from_tensors(tensors, DType::F32, device);
        Self::from_var_builder(&vb, config)
    }

    /// Build the model from a `VarBuilder`.
    pub fn from_var_builder(vb: &VarBuilder, config: &ModelConfig) -> EmbedResult<Self> {
        config.validate()?;
        let trunk = load_trunk(vb, &config.backbone)?;

        let embed_weight = vb
            .get((config.feature_dim, config.embed_dim), "fc.0.weight")
            .map_err(|e| EmbedError::Tensor {
                message: format!("failed to load weight 'fc.0.weight': {}", e),
            })?;
        let embed_bias = vb
            .get((config.feature_dim,), "fc.0.bias")
            .map_err(|e| EmbedError::Tensor {
                message: format!("failed to load weight 'fc.0.bias': {}", e),
            })?;
        let head_weight = vb
            .get((config.feature_dim, config.num_classes), "fc.1.weight")
            .map_err(|e| EmbedError::Tensor {
                message: format!("failed to load weight 'fc.1.weight': {}", e),
            })?;

        let head = AngularMargin::new(head_weight, config.margin_order, config.margin_kind)?;

        Ok(Self {
            trunk,
            embed_weight,
            embed_bias,
            head,
            config: config.clone(),
        })
    }

    /// Model configuration.
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Pooled embedding for a (B, 3, H, W) batch: trunk, ReLU, global
    /// average pool. Output shape (B, embed_dim), not yet normalized.
    pub fn forward_features(&self, images: &Tensor) -> EmbedResult<Tensor> {
        let feature_map = self.trunk.forward(images)?;
        let activated = feature_map
            .relu()
            .map_err(|e| EmbedError::tensor("feature activation", e))?;
        global_avg_pool(&activated)
    }

    /// Training-head forward: pooled features plus the angular pair.
    pub fn forward_train(&self, images: &Tensor) -> EmbedResult<(Tensor, AngularLogits)> {
        let pooled = self.forward_features(images)?;
        let projected = pooled
            .matmul(
                &self
                    .embed_weight
                    .t()
                    .map_err(|e| EmbedError::tensor("projection transpose", e))?,
            )
            .and_then(|t| t.broadcast_add(&self.embed_bias))
            .map_err(|e| EmbedError::tensor("feature projection", e))?;
        let logits = self.head.forward(&projected)?;
        Ok((pooled, logits))
    }

    /// Every tensor name and shape the checkpoint must provide.
    #[must_use]
    pub fn checkpoint_tensor_shapes(config: &ModelConfig) -> Vec<(String, Vec<usize>)> {
        let mut shapes = trunk_tensor_shapes(&config.backbone);
        shapes.push((
            "fc.0.weight".to_string(),
            vec![config.feature_dim, config.embed_dim],
        ));
        shapes.push(("fc.0.bias".to_string(), vec![config.feature_dim]));
        shapes.push((
            "fc.1.weight".to_string(),
            vec![config.feature_dim, config.num_classes],
        ));
        shapes
    }
}
