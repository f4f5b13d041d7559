//! Model loading and extraction against a tiny randomly-initialized trunk.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use candle_core::{Device, Tensor};
use image::{Rgb, RgbImage};
use sphere_embed::{
    select_device, FeatureExtractor, ModelConfig, ModelExtractor, SphereModel,
};
use tempfile::TempDir;

/// Tiny layout so tests run in milliseconds on CPU.
const CONFIG_JSON: &str = r#"{
    "num_classes": 5,
    "feature_dim": 8,
    "embed_dim": 16,
    "margin_order": 4,
    "margin_kind": "exact",
    "image_size": 32,
    "backbone": {
        "stem_channels": 4,
        "stage_blocks": [1, 1, 1, 1],
        "stage_widths": [4, 4, 8, 8],
        "expansion": 2
    }
}"#;

fn tiny_config() -> ModelConfig {
    serde_json::from_str(CONFIG_JSON).unwrap()
}

/// Random tensors for every checkpoint slot. Running variances must be
/// positive; everything else is small gaussian noise.
fn random_checkpoint(config: &ModelConfig, device: &Device) -> HashMap<String, Tensor> {
    SphereModel::checkpoint_tensor_shapes(config)
        .into_iter()
        .map(|(name, shape)| {
            let tensor = if name.ends_with("running_var") {
                Tensor::rand(0.5f32, 1.5f32, shape, device).unwrap()
            } else {
                Tensor::randn(0.0f32, 0.2f32, shape, device).unwrap()
            };
            (name, tensor)
        })
        .collect()
}

fn write_model_dir(dir: &Path, tensors: &HashMap<String, Tensor>) {
    fs::write(dir.join("config.json"), CONFIG_JSON).unwrap();
    candle_core::safetensors::save(tensors, dir.join("model.safetensors")).unwrap();
}

fn write_test_image(path: &Path) {
    let img = RgbImage::from_fn(20, 14, |x, y| {
        Rgb([(x * 12) as u8, (y * 17) as u8, ((x + y) * 7) as u8])
    });
    img.save(path).unwrap();
}

#[test]
fn extracted_embedding_is_unit_norm() {
    let device = select_device(false);
    let config = tiny_config();
    let model_dir = TempDir::new().unwrap();
    write_model_dir(model_dir.path(), &random_checkpoint(&config, device));

    let model = SphereModel::load(model_dir.path(), device).unwrap();
    let extractor = ModelExtractor::new(model, device);

    let gallery = TempDir::new().unwrap();
    let image_path = gallery.path().join("sample.png");
    write_test_image(&image_path);

    let embedding = extractor.embed(&image_path).unwrap();
    assert_eq!(embedding.len(), config.embed_dim);

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!(
        (norm - 1.0).abs() < 1e-4,
        "embedding norm must be 1.0, got {}",
        norm
    );
}

#[test]
fn data_parallel_checkpoint_loads_via_prefix_strip() {
    let device = select_device(false);
    let config = tiny_config();
    let model_dir = TempDir::new().unwrap();

    let prefixed: HashMap<String, Tensor> = random_checkpoint(&config, device)
        .into_iter()
        .map(|(name, tensor)| (format!("module.{}", name), tensor))
        .collect();
    write_model_dir(model_dir.path(), &prefixed);

    let model = SphereModel::load(model_dir.path(), device).unwrap();
    assert_eq!(model.config().num_classes, 5);
}

#[test]
fn train_forward_produces_per_class_angular_pair() {
    let device = select_device(false);
    let config = tiny_config();
    let model_dir = TempDir::new().unwrap();
    write_model_dir(model_dir.path(), &random_checkpoint(&config, device));

    let model = SphereModel::load(model_dir.path(), device).unwrap();
    let input = Tensor::randn(0.0f32, 1.0f32, (2, 3, 32, 32), device).unwrap();

    let (pooled, logits) = model.forward_train(&input).unwrap();
    assert_eq!(pooled.dims(), &[2, config.embed_dim]);
    assert_eq!(logits.cos_theta.dims(), &[2, config.num_classes]);
    assert_eq!(logits.phi_theta.dims(), &[2, config.num_classes]);
}

#[test]
fn checkpoint_with_missing_tensors_fails() {
    let device = select_device(false);
    let config = tiny_config();
    let model_dir = TempDir::new().unwrap();

    let mut tensors = random_checkpoint(&config, device);
    tensors.remove("fc.1.weight");
    write_model_dir(model_dir.path(), &tensors);

    assert!(SphereModel::load(model_dir.path(), device).is_err());
}
