//! Single-image feature extraction.
//!
//! [`ImageProcessor`] turns an image file into a normalized CHW tensor
//! buffer; [`ModelExtractor`] runs it through the trunk and L2-normalizes
//! the pooled output. [`FeatureExtractor`] is the seam the batch driver
//! works against, with [`StubExtractor`] standing in for tests.

mod extract;
mod image;
mod stub;

pub use extract::{l2_normalize, FeatureExtractor, ModelExtractor};
pub use image::ImageProcessor;
pub use stub::StubExtractor;
