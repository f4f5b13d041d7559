//! Feature extraction from single images.

use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::{EmbedError, EmbedResult};
use crate::model::SphereModel;
use crate::pipeline::image::ImageProcessor;

/// Seam between the batch driver and whatever produces embeddings.
pub trait FeatureExtractor {
    /// Extract the embedding for one image file.
    fn embed(&self, image_path: &Path) -> EmbedResult<Vec<f32>>;

    /// Output dimension of embeddings.
    fn dimension(&self) -> usize;
}

/// Extractor backed by a loaded [`SphereModel`].
pub struct ModelExtractor {
    model: SphereModel,
    processor: ImageProcessor,
    device: &'static Device,
}

impl ModelExtractor {
    /// Wrap a loaded model.
    #[must_use]
    pub fn new(model: SphereModel, device: &'static Device) -> Self {
        let processor = ImageProcessor::for_model(model.config());
        Self {
            model,
            processor,
            device,
        }
    }

    /// The wrapped model.
    #[must_use]
    pub fn model(&self) -> &SphereModel {
        &self.model
    }
}

impl FeatureExtractor for ModelExtractor {
    fn embed(&self, image_path: &Path) -> EmbedResult<Vec<f32>> {
        let pixels = self.processor.load(image_path)?;
        let size = self.processor.target_size() as usize;
        let input = Tensor::from_vec(pixels, (1, 3, size, size), self.device)
            .map_err(|e| EmbedError::tensor("input tensor", e))?;

        let pooled = self.model.forward_features(&input)?;
        let normalized =
            l2_normalize(&pooled).map_err(|e| EmbedError::tensor("embedding normalize", e))?;

        normalized
            .squeeze(0)
            .and_then(|t| t.to_vec1())
            .map_err(|e| EmbedError::tensor("embedding readback", e))
    }

    fn dimension(&self) -> usize {
        self.model.config().embed_dim
    }
}

/// Normalize a tensor to unit length along its last dimension.
pub fn l2_normalize(tensor: &Tensor) -> candle_core::Result<Tensor> {
    let norm = tensor
        .sqr()?
        .sum_keepdim(candle_core::D::Minus1)?
        .sqrt()?;
    tensor.broadcast_div(&(norm + 1e-12)?)
}
