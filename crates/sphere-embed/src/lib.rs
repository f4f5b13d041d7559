//! Angular-margin image embeddings for gallery retrieval.
//!
//! Loads a pretrained convolutional trunk whose embedding space was shaped
//! by an angular-margin classification head, extracts one L2-normalized
//! embedding per image in a gallery directory, and persists the embedding
//! matrix alongside a stable index → filename table.
//!
//! # Architecture
//!
//! - [`margin`] — the angular-margin head ([`AngularMargin`]) and its
//!   paired training loss ([`AngularLoss`]); the only numerically
//!   non-trivial piece.
//! - [`backbone`] — bottleneck residual trunk pooling to 2048 features.
//! - [`model`] — [`SphereModel`]: trunk + head, loaded from a safetensors
//!   checkpoint with guarded `module.` prefix handling.
//! - [`pipeline`] — image preprocessing and the [`FeatureExtractor`] seam.
//! - [`gallery`] — sequential batch driver over a directory.
//! - [`storage`] — binary codecs for the two output artifacts.
//!
//! # Example
//!
//! ```rust,no_run
//! use sphere_embed::{
//!     extract_gallery, persist_gallery, select_device, ModelExtractor, SphereModel,
//! };
//!
//! fn run() -> sphere_embed::EmbedResult<()> {
//!     let device = select_device(true);
//!     let model = SphereModel::load(std::path::Path::new("/models/gallery"), device)?;
//!     let extractor = ModelExtractor::new(model, device);
//!     let extraction = extract_gallery(&extractor, std::path::Path::new("/data/gallery"))?;
//!     persist_gallery(std::path::Path::new("."), &extraction)?;
//!     Ok(())
//! }
//! ```

pub mod backbone;
pub mod checkpoint;
pub mod config;
pub mod device;
pub mod error;
pub mod gallery;
pub mod margin;
pub mod model;
pub mod pipeline;
pub mod storage;

pub use config::{ModelConfig, DEFAULT_EMBED_DIM, DEFAULT_FEATURE_DIM};
pub use device::select_device;
pub use error::{EmbedError, EmbedResult};
pub use gallery::{extract_gallery, persist_gallery, GalleryExtraction, GalleryIndex};
pub use margin::{
    AngularLogits, AngularLoss, AngularLossConfig, AngularMargin, MarginKind, MarginOrder,
};
pub use model::SphereModel;
pub use pipeline::{FeatureExtractor, ImageProcessor, ModelExtractor, StubExtractor};
pub use storage::{FeatureFileCodec, FeatureMatrix, IndexFileCodec};
