//! Checkpoint loading from safetensors files.
//!
//! Checkpoints exported from a multi-device training run carry a `module.`
//! namespace on every parameter name. Stripping is an explicit
//! prefix-match: it only happens when every key actually carries the
//! prefix, and callers decide when to apply it (direct load first, one
//! retry with the prefix stripped).

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::{EmbedError, EmbedResult};

/// Parameter-name namespace added by multi-device training exports.
pub const DATA_PARALLEL_PREFIX: &str = "module.";

/// Load all tensors from a safetensors checkpoint.
pub fn load_tensors(path: &Path, device: &Device) -> EmbedResult<HashMap<String, Tensor>> {
    if !path.exists() {
        return Err(EmbedError::ModelLoad {
            path: path.to_path_buf(),
            reason: "checkpoint file not found".to_string(),
        });
    }
    candle_core::safetensors::load(path, device).map_err(|e| EmbedError::ModelLoad {
        path: path.to_path_buf(),
        reason: format!("safetensors load failed: {}", e),
    })
}

/// Whether every parameter name carries the data-parallel prefix.
#[must_use]
pub fn has_data_parallel_prefix(tensors: &HashMap<String, Tensor>) -> bool {
    !tensors.is_empty()
        && tensors
            .keys()
            .all(|name| name.starts_with(DATA_PARALLEL_PREFIX))
}

/// Strip the data-parallel prefix from every parameter name.
///
/// Callers check [`has_data_parallel_prefix`] first; names without the
/// prefix pass through unchanged rather than being blindly truncated.
#[must_use]
pub fn strip_data_parallel_prefix(
    tensors: HashMap<String, Tensor>,
) -> HashMap<String, Tensor> {
    tensors
        .into_iter()
        .map(|(name, tensor)| {
            let stripped = name
                .strip_prefix(DATA_PARALLEL_PREFIX)
                .map(str::to_string)
                .unwrap_or(name);
            (stripped, tensor)
        })
        .collect()
}
