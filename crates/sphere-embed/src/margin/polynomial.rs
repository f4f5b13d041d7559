//! Multiple-angle cosine evaluation for the angular margin.
//!
//! Two paths exist, fixed when the head is built:
//!
//! - [`MarginKind::Exact`]: the closed-form multiple-angle polynomial
//!   cos(mθ) expressed in cos(θ), combined by the caller with the angle
//!   quadrant to stay monotonic over the full range.
//! - [`MarginKind::Approximate`]: a truncated power series evaluated
//!   directly at mθ.

use serde::Deserialize;

/// Highest supported margin order.
pub const MAX_MARGIN_ORDER: u8 = 5;

/// Margin order m in {0..=5}, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "u8")]
pub struct MarginOrder(u8);

impl MarginOrder {
    /// Build a margin order, rejecting values above [`MAX_MARGIN_ORDER`].
    pub fn new(order: u8) -> Result<Self, String> {
        if order > MAX_MARGIN_ORDER {
            return Err(format!(
                "margin order must be in 0..={}, got {}",
                MAX_MARGIN_ORDER, order
            ));
        }
        Ok(Self(order))
    }

    /// Raw order value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for MarginOrder {
    /// Order 4, the value galleries in the wild are trained with.
    fn default() -> Self {
        Self(4)
    }
}

impl TryFrom<u8> for MarginOrder {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::fmt::Display for MarginOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which margin evaluation path the head uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginKind {
    /// Closed-form multiple-angle polynomial plus quadrant reconstruction.
    #[default]
    Exact,
    /// Truncated power-series approximation evaluated at mθ.
    Approximate,
}

/// Evaluate cos(mθ) as a polynomial in x = cos(θ).
///
/// The six closed forms, indexed by m:
///
/// | m | cos(mθ) |
/// |---|---------|
/// | 0 | 1 |
/// | 1 | x |
/// | 2 | 2x² − 1 |
/// | 3 | 4x³ − 3x |
/// | 4 | 8x⁴ − 8x² + 1 |
/// | 5 | 16x⁵ − 20x³ + 5x |
///
/// `x` is expected in [-1, 1]; callers clamp before evaluation.
#[must_use]
pub fn cos_multiple_angle(order: MarginOrder, x: f32) -> f32 {
    match order.get() {
        0 => 1.0,
        1 => x,
        2 => 2.0 * x.powi(2) - 1.0,
        3 => 4.0 * x.powi(3) - 3.0 * x,
        4 => 8.0 * x.powi(4) - 8.0 * x.powi(2) + 1.0,
        5 => 16.0 * x.powi(5) - 20.0 * x.powi(3) + 5.0 * x,
        _ => unreachable!("MarginOrder is validated at construction"),
    }
}

/// Truncated series approximation of cos(mθ), evaluated at x = mθ.
///
/// 1 − x²/2! + x⁴/4! − x⁶/6! + x⁸/8! − x⁹/9!
///
/// The final term is odd-powered; the series is reproduced term for term
/// from the trained head rather than symmetrized. The result is clamped to
/// [−m, 1] by the caller.
#[must_use]
pub fn series_margin(order: MarginOrder, theta: f32) -> f32 {
    const FACT_2: f32 = 2.0;
    const FACT_4: f32 = 24.0;
    const FACT_6: f32 = 720.0;
    const FACT_8: f32 = 40320.0;
    const FACT_9: f32 = 362880.0;

    let x = theta * f32::from(order.get());
    1.0 - x.powi(2) / FACT_2 + x.powi(4) / FACT_4 - x.powi(6) / FACT_6 + x.powi(8) / FACT_8
        - x.powi(9) / FACT_9
}
