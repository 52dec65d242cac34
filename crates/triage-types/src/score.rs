// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Score Types
// ─────────────────────────────────────────────────────────────────────

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::category::{Category, ChannelKind, N_CATEGORIES, N_CHANNELS};

/// Length of the text signature.
pub const SIGNATURE_DIM: usize = 10;

/// Guard added to every denominator in the engine.
pub const EPSILON: f64 = 1e-9;

/// Fixed-length real vector used for signatures, heated vectors and filters.
pub type Vector = [f64; SIGNATURE_DIM];

/// Clamp a value to [lo, hi], mapping NaN to lo and Inf to nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.4}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.4}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Per-category scores, indexed by [`Category`].
///
/// Intermediate maps are not normalised; [`ScoreMap::normalized`]
/// produces the distribution form.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreMap([f64; N_CATEGORIES]);

impl ScoreMap {
    pub fn zeros() -> Self {
        Self([0.0; N_CATEGORIES])
    }

    pub fn from_array(values: [f64; N_CATEGORIES]) -> Self {
        Self(values)
    }

    /// A map with every category set to `value`.
    pub fn uniform(value: f64) -> Self {
        Self([value; N_CATEGORIES])
    }

    pub fn as_array(&self) -> &[f64; N_CATEGORIES] {
        &self.0
    }

    pub fn get(&self, category: Category) -> f64 {
        self.0[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        Category::ALL.iter().copied().zip(self.0.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Clamp every score to >= 0 (NaN → 0).
    pub fn clamp_non_negative(&mut self) {
        for v in self.0.iter_mut() {
            *v = clamp_score(*v, 0.0, f64::MAX);
        }
    }

    /// Divide by `total + EPSILON`.
    ///
    /// A map carrying no mass puts everything on `Unknown`, so the result
    /// is always a valid distribution.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if !total.is_finite() || total <= EPSILON {
            let mut out = Self::zeros();
            out[Category::Unknown] = 1.0;
            return out;
        }
        let mut out = *self;
        for v in out.0.iter_mut() {
            *v /= total + EPSILON;
        }
        out
    }

    /// Highest-scoring category. Ties go to the first in enumeration order.
    pub fn leader(&self) -> Category {
        let mut best = 0;
        for (i, &v) in self.0.iter().enumerate().skip(1) {
            if v > self.0[best] {
                best = i;
            }
        }
        Category::ALL[best]
    }
}

impl Index<Category> for ScoreMap {
    type Output = f64;

    fn index(&self, category: Category) -> &f64 {
        &self.0[category.index()]
    }
}

impl IndexMut<Category> for ScoreMap {
    fn index_mut(&mut self, category: Category) -> &mut f64 {
        &mut self.0[category.index()]
    }
}

/// Bridging rules in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeRuleKind {
    StructuralVocabulary,
    OperatorKeyword,
    DomainTrigger,
    PositionBand,
    LowSignal,
}

/// Intermediate values from one classification, for explainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Squared norm of the heated vector.
    pub energy: f64,
    /// Warped position of the signature's dominant component.
    pub query_position: f64,
    /// Normalised head outputs, in channel order.
    pub head_scores: [ScoreMap; N_CHANNELS],
    /// Raw fused scores before boost and suppression.
    pub fused: ScoreMap,
    /// Final normalised distribution.
    pub final_scores: ScoreMap,
    /// The bridging rule that fired, if any.
    pub bridge_rule: Option<BridgeRuleKind>,
}

/// Result of classifying one text.
///
/// `confidence` is comparable only within one call; it is not a
/// calibrated probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub category: Category,
    pub confidence: f64,
    /// Explainability only; never used for ranking.
    pub dominant_channel: ChannelKind,
    pub channel_activations: [f64; N_CHANNELS],
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_nan() {
        assert_eq!(clamp_score(f64::NAN, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_clamp_pos_inf() {
        assert_eq!(clamp_score(f64::INFINITY, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_clamp_below_lo() {
        assert_eq!(clamp_score(-0.3, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_normalized_sums_to_one() {
        let map = ScoreMap::from_array([1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0, 4.0]);
        let n = map.normalized();
        assert!((n.total() - 1.0).abs() < 1e-6);
        assert!((n[Category::Unknown] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_empty_goes_to_unknown() {
        let n = ScoreMap::zeros().normalized();
        assert_eq!(n[Category::Unknown], 1.0);
        assert_eq!(n.total(), 1.0);
    }

    #[test]
    fn test_leader_tie_prefers_first() {
        let mut map = ScoreMap::zeros();
        map[Category::Status] = 0.5;
        map[Category::Physics] = 0.5;
        assert_eq!(map.leader(), Category::Status);
        assert_eq!(ScoreMap::uniform(0.3).leader(), Category::Greeting);
    }

    #[test]
    fn test_clamp_non_negative() {
        let mut map = ScoreMap::from_array([-1.0, 0.5, f64::NAN, 0.0, 0.0, 0.0, 0.0, 0.0]);
        map.clamp_non_negative();
        assert_eq!(map[Category::Greeting], 0.0);
        assert_eq!(map[Category::Help], 0.5);
        assert_eq!(map[Category::Status], 0.0);
    }
}
