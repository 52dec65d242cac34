// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Suppression Layer
// ─────────────────────────────────────────────────────────────────────
//! Disambiguation of mutually confusable categories.
//!
//! Two steps, in pipeline order:
//! 1. `boost`: flat increment per matched discriminative keyword.
//! 2. `suppress`: for each confusable pair with both sides above the
//!    activation threshold, subtract
//!    `repulsion · dominance · s_a · s_b` from the side carrying more
//!    attractor mass (split evenly on equal mass), then clamp to >= 0.
//!
//! Attractor mass is the only cross-call state of the engine. It grows
//! on categories that were predicted wrongly and is relieved on the
//! correct label, so historically over-favoured categories pay the
//! repulsion penalty.

use parking_lot::RwLock;

use triage_types::config::SuppressionConfig;
use triage_types::error::{TriageError, TriageResult};
use triage_types::{Category, ScoreMap};

pub struct Suppressor {
    config: SuppressionConfig,
    mass: RwLock<ScoreMap>,
}

impl Suppressor {
    pub fn new(config: &SuppressionConfig) -> Self {
        Self {
            config: config.clone(),
            mass: RwLock::new(ScoreMap::zeros()),
        }
    }

    /// Add the boost increment once per matched discriminative keyword.
    pub fn boost(&self, lower: &str, scores: &ScoreMap) -> ScoreMap {
        let mut out = *scores;
        for table in &self.config.discriminative {
            let hits = table
                .keywords
                .iter()
                .filter(|k| lower.contains(k.as_str()))
                .count();
            out[table.category] += hits as f64 * self.config.boost_increment;
        }
        out
    }

    /// Pair repulsion against the current attractor mass.
    pub fn suppress(&self, scores: &ScoreMap) -> ScoreMap {
        let mass = *self.mass.read();
        self.suppress_with_mass(scores, &mass)
    }

    /// Pair repulsion against an explicit mass snapshot.
    ///
    /// Pairs are visited in table order and each sees the scores left by
    /// the previous one.
    pub fn suppress_with_mass(&self, scores: &ScoreMap, mass: &ScoreMap) -> ScoreMap {
        let threshold = self.config.activation_threshold;
        let mut out = *scores;

        for pair in &self.config.pairs {
            let (sa, sb) = (out[pair.a], out[pair.b]);
            if sa <= threshold || sb <= threshold {
                continue;
            }
            let penalty = pair.repulsion * self.config.dominance * sa * sb;
            let (ma, mb) = (mass[pair.a], mass[pair.b]);
            if ma > mb {
                out[pair.a] -= penalty;
            } else if mb > ma {
                out[pair.b] -= penalty;
            } else {
                out[pair.a] -= 0.5 * penalty;
                out[pair.b] -= 0.5 * penalty;
            }
        }

        out.clamp_non_negative();
        out
    }

    /// Feedback hook for supervised use. No-op when the prediction was right.
    pub fn record_outcome(&self, predicted: Category, actual: Category) {
        if predicted == actual {
            return;
        }
        let mut mass = self.mass.write();
        mass[predicted] += self.config.mass_penalty;
        mass[actual] = (mass[actual] - self.config.mass_relief).max(0.0);
        log::info!(
            "attractor mass updated: {predicted}={:.3}, {actual}={:.3}",
            mass[predicted],
            mass[actual]
        );
    }

    pub fn attractor_mass(&self) -> ScoreMap {
        *self.mass.read()
    }

    /// Replace the attractor mass, e.g. from a persisted snapshot.
    pub fn restore_mass(&self, mass: ScoreMap) -> TriageResult<()> {
        if let Some((c, v)) = mass.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(TriageError::Numerical(format!(
                "attractor mass for {c} must be finite and >= 0, got {v}"
            )));
        }
        *self.mass.write() = mass;
        Ok(())
    }
}
