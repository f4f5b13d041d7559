//! Compute device selection.
//!
//! The rest of the crate is device-agnostic; tensors land wherever the
//! device returned here lives. The choice is made once per process.

use std::sync::OnceLock;

use candle_core::Device;

static DEVICE: OnceLock<Device> = OnceLock::new();

/// Select the compute device, preferring CUDA when requested.
///
/// Falls back to CPU when CUDA is unavailable or not compiled in. The first
/// call decides for the lifetime of the process; later calls return the same
/// device regardless of `prefer_gpu`.
pub fn select_device(prefer_gpu: bool) -> &'static Device {
    DEVICE.get_or_init(|| {
        if prefer_gpu {
            match Device::new_cuda(0) {
                Ok(device) => {
                    tracing::info!(target: "sphere_embed::device", "using CUDA device 0");
                    return device;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "sphere_embed::device",
                        error = %e,
                        "CUDA unavailable, falling back to CPU"
                    );
                }
            }
        }
        tracing::info!(target: "sphere_embed::device", "using CPU device");
        Device::Cpu
    })
}
