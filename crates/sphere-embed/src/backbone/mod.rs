//! Convolutional trunk producing the pooled embedding.
//!
//! A bottleneck residual network: a 7x7 stem followed by four stages of
//! 1x1/3x3/1x1 bottleneck blocks with channel expansion 4. The default
//! layout ([3, 4, 6, 3] blocks over widths [64, 128, 256, 512]) pools to
//! 2048 features. Batch norm runs in inference mode against the
//! checkpoint's running statistics; nothing here trains.
//!
//! Weights are held in explicit structs and loaded tensor-by-tensor from a
//! `VarBuilder`, with shapes validated at load time.

mod config;
mod forward;
mod loader;
mod ops;
mod weights;

pub use config::BackboneConfig;
pub use loader::{load_trunk, trunk_tensor_shapes};
pub use ops::global_avg_pool;
pub use weights::{BottleneckWeights, ConvBnWeights, StageWeights, TrunkWeights};
