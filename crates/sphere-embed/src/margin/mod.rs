//! Angular-margin classification head and its paired training loss.
//!
//! The head scores a feature batch against a set of learned class
//! directions twice: once as a plain cosine similarity and once with an
//! angular margin folded in. The loss blends the two for the target class
//! under a step-annealed weight, so early training behaves like ordinary
//! cross-entropy and the margin bites progressively harder as the schedule
//! decays.
//!
//! # Components
//!
//! - [`AngularMargin`] — feature batch → ([`AngularLogits`]) cosine and
//!   margin-adjusted cosine, one column per class.
//! - [`AngularLoss`] — angular pair + targets + step → scalar focal loss.
//! - [`MarginOrder`] / [`MarginKind`] — margin configuration fixed at head
//!   construction.
//!
//! The loss exists as the contract of the training objective the head was
//! shaped by; inference never runs it.

mod loss;
mod polynomial;
mod transform;

pub use loss::{AngularLoss, AngularLossConfig, MarginLossOutput};
pub use polynomial::{cos_multiple_angle, MarginKind, MarginOrder};
pub use transform::{renormalize_columns, AngularLogits, AngularMargin};
