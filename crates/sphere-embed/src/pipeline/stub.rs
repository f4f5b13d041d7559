//! Deterministic stub extractor for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use crate::error::EmbedResult;
use crate::pipeline::extract::FeatureExtractor;

/// Stub extractor producing filename-seeded unit vectors.
///
/// Never touches the file contents; the same filename always yields the
/// same embedding, so gallery runs are reproducible without a model.
#[derive(Debug, Clone)]
pub struct StubExtractor {
    dimension: usize,
}

impl StubExtractor {
    /// Create a stub emitting vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn generate(&self, name: &str) -> Vec<f32> {
        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            let mut hasher = DefaultHasher::new();
            name.hash(&mut hasher);
            (i as u64).hash(&mut hasher);
            let hash = hasher.finish();
            let value = ((hash as f64 / u64::MAX as f64) * 2.0 - 1.0) as f32;
            embedding.push(value);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

impl FeatureExtractor for StubExtractor {
    fn embed(&self, image_path: &Path) -> EmbedResult<Vec<f32>> {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.generate(&name))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
