//! Focal margin loss paired with the angular transform.
//!
//! The loss blends the plain cosine toward the margin-adjusted cosine for
//! each sample's target class, with a blend weight that shrinks as the
//! annealing weight λ grows. λ is a pure function of the training step the
//! caller passes in; the loss holds no hidden state, so the same inputs at
//! the same step always produce the same value.

use candle_core::Tensor;

use crate::error::{EmbedError, EmbedResult};

use super::transform::AngularLogits;

/// Configuration for the margin loss.
#[derive(Debug, Clone)]
pub struct AngularLossConfig {
    /// Focusing exponent; 0 degenerates to plain cross-entropy.
    pub gamma: f32,
    /// Annealing floor.
    pub lambda_min: f64,
    /// Annealing numerator; λ starts near this value and decays.
    pub lambda_max: f64,
}

impl Default for AngularLossConfig {
    fn default() -> Self {
        Self {
            gamma: 0.0,
            lambda_min: 5.0,
            lambda_max: 1500.0,
        }
    }
}

/// Scalar loss plus the annealing weight it was computed with.
#[derive(Debug)]
pub struct MarginLossOutput {
    /// Mean focal loss over the batch, as a scalar tensor.
    pub loss: Tensor,
    /// λ at the given step.
    pub lambda: f64,
}

/// Margin loss over the angular pair.
#[derive(Debug, Clone)]
pub struct AngularLoss {
    config: AngularLossConfig,
}

impl AngularLoss {
    /// Create a loss with the given configuration.
    #[must_use]
    pub fn new(config: AngularLossConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration (gamma 0, λ in [5, 1500]).
    #[must_use]
    pub fn default_config() -> Self {
        Self::new(AngularLossConfig::default())
    }

    /// Annealing weight at a training step:
    /// λ = max(λ_min, λ_max / (1 + 0.1·step)).
    #[must_use]
    pub fn annealed_lambda(&self, step: u64) -> f64 {
        let decayed = self.config.lambda_max / (1.0 + 0.1 * step as f64);
        decayed.max(self.config.lambda_min)
    }

    /// Compute the loss for one batch at a training step.
    ///
    /// `targets` holds one class index per sample, each required to be below
    /// the class count. `step` drives the annealing schedule; callers thread
    /// their training step counter through here, so two identical batches at
    /// different steps see different λ and generally different losses.
    pub fn forward(
        &self,
        logits: &AngularLogits,
        targets: &[u32],
        step: u64,
    ) -> EmbedResult<MarginLossOutput> {
        let (batch, classes) = logits
            .cos_theta
            .dims2()
            .map_err(|e| EmbedError::tensor("loss expects (B, C) cosine", e))?;
        if targets.len() != batch {
            return Err(EmbedError::InvalidInput(format!(
                "target count {} does not match batch size {}",
                targets.len(),
                batch
            )));
        }
        for (i, &t) in targets.iter().enumerate() {
            if t as usize >= classes {
                return Err(EmbedError::InvalidInput(format!(
                    "target {} at sample {} is out of range for {} classes",
                    t, i, classes
                )));
            }
        }

        let lambda = self.annealed_lambda(step);
        let blend = 1.0 / (1.0 + lambda);

        // Start from the plain cosine; for the target class only, blend
        // toward the margin-adjusted value.
        let cos: Vec<Vec<f32>> = logits
            .cos_theta
            .to_vec2()
            .map_err(|e| EmbedError::tensor("cosine readback", e))?;
        let phi: Vec<Vec<f32>> = logits
            .phi_theta
            .to_vec2()
            .map_err(|e| EmbedError::tensor("margin readback", e))?;

        let mut blended: Vec<f32> = Vec::with_capacity(batch * classes);
        for (i, row) in cos.iter().enumerate() {
            let t = targets[i] as usize;
            for (j, &value) in row.iter().enumerate() {
                if j == t {
                    let shifted =
                        value - value * blend as f32 + phi[i][j] * blend as f32;
                    blended.push(shifted);
                } else {
                    blended.push(value);
                }
            }
        }
        let output = Tensor::from_vec(blended, (batch, classes), logits.cos_theta.device())
            .map_err(|e| EmbedError::tensor("blended logits", e))?;

        // log-softmax over the batch axis (dim 0) -- the convention this
        // head was trained with, not the usual per-sample class axis.
        let max0 = output
            .max_keepdim(0)
            .map_err(|e| EmbedError::tensor("log-softmax max", e))?;
        let shifted = output
            .broadcast_sub(&max0)
            .map_err(|e| EmbedError::tensor("log-softmax shift", e))?;
        let log_sum = shifted
            .exp()
            .and_then(|t| t.sum_keepdim(0))
            .and_then(|t| t.log())
            .map_err(|e| EmbedError::tensor("log-softmax sum", e))?;
        let log_softmax = shifted
            .broadcast_sub(&log_sum)
            .map_err(|e| EmbedError::tensor("log-softmax", e))?;

        // Gather the target log-probability per sample, then apply the
        // focal weighting and reduce by arithmetic mean.
        let rows: Vec<Vec<f32>> = log_softmax
            .to_vec2()
            .map_err(|e| EmbedError::tensor("log-softmax readback", e))?;
        let mut total = 0.0f64;
        for (i, row) in rows.iter().enumerate() {
            let logpt = row[targets[i] as usize];
            let pt = logpt.exp();
            let focal = (1.0 - pt).powf(self.config.gamma);
            total -= f64::from(focal * logpt);
        }
        let mean = (total / batch as f64) as f32;

        let loss = Tensor::new(&[mean], logits.cos_theta.device())
            .and_then(|t| t.squeeze(0))
            .map_err(|e| EmbedError::tensor("loss scalar", e))?;

        Ok(MarginLossOutput { loss, lambda })
    }
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use super::*;

    const TOLERANCE: f32 = 1e-5;

    fn logits_from(cos: &[&[f32]], phi: &[&[f32]]) -> AngularLogits {
        let to_tensor = |rows: &[&[f32]]| {
            let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
            Tensor::from_vec(flat, (rows.len(), rows[0].len()), &Device::Cpu).unwrap()
        };
        AngularLogits {
            cos_theta: to_tensor(cos),
            phi_theta: to_tensor(phi),
        }
    }

    fn loss_value(output: &MarginLossOutput) -> f32 {
        output.loss.to_scalar::<f32>().unwrap()
    }

    #[test]
    fn lambda_schedule_decays_to_floor() {
        let loss = AngularLoss::default_config();
        assert!((loss.annealed_lambda(0) - 1500.0).abs() < 1e-9);
        assert!((loss.annealed_lambda(1) - 1500.0 / 1.1).abs() < 1e-9);
        // Far into training the floor takes over.
        assert_eq!(loss.annealed_lambda(1_000_000), 5.0);
    }

    #[test]
    fn gamma_zero_matches_manual_cross_entropy() {
        // Two samples, two classes, targets on the diagonal. Expected value
        // computed by hand: blend the target entries, log-softmax each
        // column (batch axis), average the negative target log-probs.
        let cos = [&[2.0f32, 0.5][..], &[0.3, 1.5][..]];
        let phi = [&[1.0f32, 0.2][..], &[0.1, 0.8][..]];
        let targets = [0u32, 1];
        let step = 10;

        let loss = AngularLoss::default_config();
        let output = loss
            .forward(&logits_from(&cos, &phi), &targets, step)
            .unwrap();

        let lambda = 1500.0f64 / (1.0 + 0.1 * step as f64);
        let blend = 1.0 / (1.0 + lambda);
        let mut out = [[0.0f64; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                out[i][j] = f64::from(cos[i][j]);
            }
        }
        out[0][0] = out[0][0] - out[0][0] * blend + f64::from(phi[0][0]) * blend;
        out[1][1] = out[1][1] - out[1][1] * blend + f64::from(phi[1][1]) * blend;

        let mut expected = 0.0f64;
        for (i, &t) in targets.iter().enumerate() {
            let j = t as usize;
            let denom: f64 = (0..2).map(|r| out[r][j].exp()).sum();
            let logpt = out[i][j] - denom.ln();
            expected -= logpt;
        }
        expected /= 2.0;

        assert!(
            (loss_value(&output) - expected as f32).abs() < TOLERANCE,
            "loss {} vs manual {}",
            loss_value(&output),
            expected
        );
        assert!((output.lambda - lambda).abs() < 1e-9);
    }

    #[test]
    fn fixed_step_is_invariant_to_batch_order() {
        let cos = [&[2.0f32, 0.5, -0.3][..], &[0.3, 1.5, 0.9][..]];
        let phi = [&[1.0f32, 0.2, -0.5][..], &[0.1, 0.8, 0.4][..]];
        let loss = AngularLoss::default_config();

        let forward = loss
            .forward(&logits_from(&cos, &phi), &[0, 2], 25)
            .unwrap();

        // Same batch with the rows (and targets) swapped.
        let cos_swapped = [cos[1], cos[0]];
        let phi_swapped = [phi[1], phi[0]];
        let swapped = loss
            .forward(&logits_from(&cos_swapped, &phi_swapped), &[2, 0], 25)
            .unwrap();

        assert!((loss_value(&forward) - loss_value(&swapped)).abs() < TOLERANCE);
    }

    #[test]
    fn different_steps_change_lambda_and_loss() {
        let cos = [&[2.0f32, 0.5][..], &[0.3, 1.5][..]];
        let phi = [&[-1.0f32, 0.2][..], &[0.1, -0.8][..]];
        let loss = AngularLoss::default_config();

        let early = loss.forward(&logits_from(&cos, &phi), &[0, 1], 1).unwrap();
        let late = loss
            .forward(&logits_from(&cos, &phi), &[0, 1], 5000)
            .unwrap();

        assert!(early.lambda > late.lambda);
        assert!(
            (loss_value(&early) - loss_value(&late)).abs() > 1e-4,
            "losses should differ across steps: {} vs {}",
            loss_value(&early),
            loss_value(&late)
        );
    }

    #[test]
    fn focal_exponent_downweights_confident_samples() {
        let cos = [&[5.0f32, 0.0][..], &[0.0, 5.0][..]];
        let phi = [&[4.0f32, 0.0][..], &[0.0, 4.0][..]];

        let plain = AngularLoss::default_config()
            .forward(&logits_from(&cos, &phi), &[0, 1], 100)
            .unwrap();
        let focal = AngularLoss::new(AngularLossConfig {
            gamma: 2.0,
            ..AngularLossConfig::default()
        })
        .forward(&logits_from(&cos, &phi), &[0, 1], 100)
        .unwrap();

        assert!(loss_value(&focal) < loss_value(&plain));
    }

    #[test]
    fn rejects_out_of_range_target() {
        let cos = [&[1.0f32, 0.0][..]];
        let phi = [&[0.5f32, 0.0][..]];
        let loss = AngularLoss::default_config();
        assert!(matches!(
            loss.forward(&logits_from(&cos, &phi), &[2], 0),
            Err(EmbedError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_target_count_mismatch() {
        let cos = [&[1.0f32, 0.0][..]];
        let phi = [&[0.5f32, 0.0][..]];
        let loss = AngularLoss::default_config();
        assert!(matches!(
            loss.forward(&logits_from(&cos, &phi), &[0, 1], 0),
            Err(EmbedError::InvalidInput(_))
        ));
    }
}
