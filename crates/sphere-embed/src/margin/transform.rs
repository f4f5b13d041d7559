//! Angular margin transform: features → (cosine, margin-adjusted cosine).

use candle_core::Tensor;

use crate::error::{EmbedError, EmbedResult};

use super::polynomial::{cos_multiple_angle, series_margin, MarginKind, MarginOrder};

/// Per-column norm clip applied before rescaling.
pub const WEIGHT_NORM_EPS: f64 = 1e-5;

/// Rescale factor applied after the norm clip.
pub const WEIGHT_NORM_SCALE: f64 = 1e5;

/// Output of the angular transform: two B×C matrices consumed by the loss.
#[derive(Debug, Clone)]
pub struct AngularLogits {
    /// Plain cosine similarity, rescaled by each sample's feature norm.
    pub cos_theta: Tensor,
    /// Margin-adjusted cosine, rescaled by each sample's feature norm.
    pub phi_theta: Tensor,
}

/// Angular-margin classification layer.
///
/// Holds a learned class-direction matrix of shape (F, C) and scores feature
/// batches against it. The margin order and evaluation path are fixed at
/// construction and invariant for the lifetime of the instance.
///
/// Samples with near-zero feature norm produce outputs of large magnitude:
/// the cosine divides by the norm and the rescale multiplies it back, so no
/// floor is applied to the feature norm itself. Callers feeding degenerate
/// features see that amplification unguarded.
#[derive(Debug)]
pub struct AngularMargin {
    weight: Tensor,
    order: MarginOrder,
    kind: MarginKind,
}

impl AngularMargin {
    /// Build the head from a weight matrix of shape (in_features, classes).
    pub fn new(weight: Tensor, order: MarginOrder, kind: MarginKind) -> EmbedResult<Self> {
        let dims = weight.dims();
        if dims.len() != 2 {
            return Err(EmbedError::InvalidInput(format!(
                "angular weight must be rank 2 (features x classes), got shape {:?}",
                dims
            )));
        }
        Ok(Self {
            weight,
            order,
            kind,
        })
    }

    /// Feature dimension F.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weight.dims()[0]
    }

    /// Class count C.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.weight.dims()[1]
    }

    /// Margin order.
    #[must_use]
    pub const fn order(&self) -> MarginOrder {
        self.order
    }

    /// Score a feature batch of shape (B, F) against the class directions.
    ///
    /// Reads the weight matrix; no other side effects.
    pub fn forward(&self, features: &Tensor) -> EmbedResult<AngularLogits> {
        let (_, f) = features
            .dims2()
            .map_err(|e| EmbedError::tensor("angular head expects a (B, F) feature batch", e))?;
        if f != self.in_features() {
            return Err(EmbedError::DimensionMismatch {
                expected: self.in_features(),
                actual: f,
            });
        }

        let w = renormalize_columns(&self.weight)?;

        // Norms: features per row (B, 1), class directions per column (1, C).
        let x_norm = features
            .sqr()
            .and_then(|t| t.sum_keepdim(1))
            .and_then(|t| t.sqrt())
            .map_err(|e| EmbedError::tensor("feature norm", e))?;
        let w_norm = w
            .sqr()
            .and_then(|t| t.sum_keepdim(0))
            .and_then(|t| t.sqrt())
            .map_err(|e| EmbedError::tensor("class direction norm", e))?;

        let cos = features
            .matmul(&w)
            .map_err(|e| EmbedError::tensor("feature x weight product", e))?
            .broadcast_div(&x_norm)
            .and_then(|t| t.broadcast_div(&w_norm))
            .map_err(|e| EmbedError::tensor("cosine normalization", e))?
            // Guard against float overshoot before any arccos downstream.
            .clamp(-1f32, 1f32)
            .map_err(|e| EmbedError::tensor("cosine clamp", e))?;

        let phi = match self.kind {
            MarginKind::Exact => exact_margin(&cos, self.order)?,
            MarginKind::Approximate => approximate_margin(&cos, self.order)?,
        };

        // Restore the unnormalized similarity scale the loss expects.
        let cos_theta = cos
            .broadcast_mul(&x_norm)
            .map_err(|e| EmbedError::tensor("cosine rescale", e))?;
        let phi_theta = phi
            .broadcast_mul(&x_norm)
            .map_err(|e| EmbedError::tensor("margin rescale", e))?;

        Ok(AngularLogits {
            cos_theta,
            phi_theta,
        })
    }
}

/// Renormalize each class direction: clip the column L2 norm to
/// [`WEIGHT_NORM_EPS`], then rescale the whole matrix by
/// [`WEIGHT_NORM_SCALE`].
///
/// The two-step clip-then-scale floors near-zero columns around the epsilon
/// scale and brings every other column to unit norm. Both steps are part of
/// the trained head's conditioning; do not fuse them into a single
/// normalization.
pub fn renormalize_columns(weight: &Tensor) -> EmbedResult<Tensor> {
    let norms = weight
        .sqr()
        .and_then(|t| t.sum_keepdim(0))
        .and_then(|t| t.sqrt())
        .map_err(|e| EmbedError::tensor("column norms", e))?;

    // min(eps / norm, 1): columns above the clip shrink, the rest pass through.
    let scale = norms
        .recip()
        .and_then(|t| t.affine(WEIGHT_NORM_EPS, 0.0))
        .and_then(|t| t.clamp(0f32, 1f32))
        .map_err(|e| EmbedError::tensor("column norm clip", e))?;

    weight
        .broadcast_mul(&scale)
        .and_then(|t| t.affine(WEIGHT_NORM_SCALE, 0.0))
        .map_err(|e| EmbedError::tensor("column rescale", e))
}

/// Exact path: phi = (−1)^k · cos(mθ) − 2k with k = floor(m·θ/π).
///
/// The quadrant term keeps the margin monotonic in θ across the full angle
/// range; the raw multiple-angle cosine alone is not. Elementwise math runs
/// on a CPU round-trip since candle has no arccos kernel.
fn exact_margin(cos: &Tensor, order: MarginOrder) -> EmbedResult<Tensor> {
    let m = f32::from(order.get());
    map_elementwise(cos, "exact margin", |v| {
        let cos_m_theta = cos_multiple_angle(order, v);
        let theta = v.acos();
        let k = (m * theta / std::f32::consts::PI).floor();
        let sign = if (k as i64) % 2 == 0 { 1.0 } else { -1.0 };
        sign * cos_m_theta - 2.0 * k
    })
}

/// Approximate path: truncated series at mθ, clamped to [−m, 1].
fn approximate_margin(cos: &Tensor, order: MarginOrder) -> EmbedResult<Tensor> {
    let m = f32::from(order.get());
    map_elementwise(cos, "approximate margin", |v| {
        let theta = v.acos();
        series_margin(order, theta).clamp(-m, 1.0)
    })
}

/// Apply a scalar function over a (B, C) tensor via host memory.
fn map_elementwise(
    input: &Tensor,
    context: &str,
    f: impl Fn(f32) -> f32,
) -> EmbedResult<Tensor> {
    let (b, c) = input
        .dims2()
        .map_err(|e| EmbedError::tensor(context, e))?;
    let rows: Vec<Vec<f32>> = input
        .to_vec2()
        .map_err(|e| EmbedError::tensor(context, e))?;
    let mapped: Vec<f32> = rows.into_iter().flatten().map(f).collect();
    Tensor::from_vec(mapped, (b, c), input.device())
        .map_err(|e| EmbedError::tensor(context, e))
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    const TOLERANCE: f32 = 1e-5;

    fn tensor_2d(rows: &[&[f32]]) -> Tensor {
        let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::from_vec(flat, (rows.len(), rows[0].len()), &Device::Cpu).unwrap()
    }

    fn column_norms(t: &Tensor) -> Vec<f32> {
        t.sqr()
            .unwrap()
            .sum(0)
            .unwrap()
            .sqrt()
            .unwrap()
            .to_vec1()
            .unwrap()
    }

    #[test]
    fn renormalize_brings_typical_columns_to_unit_norm() {
        let w = tensor_2d(&[&[3.0, 0.5], &[4.0, 0.0]]);
        let renormed = renormalize_columns(&w).unwrap();
        for norm in column_norms(&renormed) {
            assert!((norm - 1.0).abs() < TOLERANCE, "column norm {}", norm);
        }
    }

    #[test]
    fn renormalize_is_idempotent_after_first_application() {
        let w = tensor_2d(&[&[0.2, -1.5, 7.0], &[0.9, 2.5, -0.1]]);
        let once = renormalize_columns(&w).unwrap();
        let twice = renormalize_columns(&once).unwrap();
        let a: Vec<Vec<f32>> = once.to_vec2().unwrap();
        let b: Vec<Vec<f32>> = twice.to_vec2().unwrap();
        for (ra, rb) in a.iter().zip(&b) {
            for (va, vb) in ra.iter().zip(rb) {
                assert!((va - vb).abs() < TOLERANCE, "{} vs {}", va, vb);
            }
        }
    }

    #[test]
    fn renormalize_keeps_zero_columns_zero() {
        let w = tensor_2d(&[&[0.0, 1.0], &[0.0, 1.0]]);
        let renormed = renormalize_columns(&w).unwrap();
        let values: Vec<Vec<f32>> = renormed.to_vec2().unwrap();
        assert_eq!(values[0][0], 0.0);
        assert_eq!(values[1][0], 0.0);
    }

    #[test]
    fn forward_cosine_matches_alignment() {
        // Feature aligned with class 0, orthogonal to class 1.
        let weight = tensor_2d(&[&[2.0, 0.0], &[0.0, 3.0]]);
        let head = AngularMargin::new(weight, MarginOrder::new(4).unwrap(), MarginKind::Exact)
            .unwrap();
        let features = tensor_2d(&[&[5.0, 0.0]]);
        let logits = head.forward(&features).unwrap();

        let cos: Vec<Vec<f32>> = logits.cos_theta.to_vec2().unwrap();
        // Rescaled by the feature norm (5.0): aligned -> 5, orthogonal -> 0.
        assert!((cos[0][0] - 5.0).abs() < TOLERANCE);
        assert!(cos[0][1].abs() < TOLERANCE);

        // Aligned class: theta = 0, cos(m*0) = 1, k = 0, phi = 1 -> rescaled 5.
        let phi: Vec<Vec<f32>> = logits.phi_theta.to_vec2().unwrap();
        assert!((phi[0][0] - 5.0).abs() < TOLERANCE);
    }

    #[test]
    fn exact_margin_is_monotonic_in_angle() {
        // phi must decrease as the angle to the class direction grows.
        let weight = tensor_2d(&[&[1.0], &[0.0]]);
        let head = AngularMargin::new(weight, MarginOrder::new(4).unwrap(), MarginKind::Exact)
            .unwrap();

        let mut last = f32::INFINITY;
        for deg in [0.0f32, 20.0, 45.0, 70.0, 90.0, 120.0, 150.0, 180.0] {
            let rad = deg.to_radians();
            let features = tensor_2d(&[&[rad.cos(), rad.sin()]]);
            let logits = head.forward(&features).unwrap();
            let phi: Vec<Vec<f32>> = logits.phi_theta.to_vec2().unwrap();
            assert!(
                phi[0][0] < last + TOLERANCE,
                "phi not monotonic at {} degrees: {} after {}",
                deg,
                phi[0][0],
                last
            );
            last = phi[0][0];
        }
    }

    #[test]
    fn approximate_margin_is_clamped_to_order_range() {
        let weight = tensor_2d(&[&[1.0], &[0.0]]);
        let order = MarginOrder::new(4).unwrap();
        let head = AngularMargin::new(weight, order, MarginKind::Approximate).unwrap();

        // Unit-norm features so the rescale does not change the bound.
        for deg in [0.0f32, 60.0, 120.0, 180.0] {
            let rad = deg.to_radians();
            let features = tensor_2d(&[&[rad.cos(), rad.sin()]]);
            let logits = head.forward(&features).unwrap();
            let phi: Vec<Vec<f32>> = logits.phi_theta.to_vec2().unwrap();
            assert!(phi[0][0] <= 1.0 + TOLERANCE);
            assert!(phi[0][0] >= -4.0 - TOLERANCE);
        }
    }

    #[test]
    fn rejects_feature_dimension_mismatch() {
        let weight = tensor_2d(&[&[1.0, 0.0], &[0.0, 1.0]]);
        let head = AngularMargin::new(weight, MarginOrder::default(), MarginKind::Exact).unwrap();
        let features = tensor_2d(&[&[1.0, 0.0, 0.0]]);
        assert!(matches!(
            head.forward(&features),
            Err(EmbedError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }
}
