// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Classifier Heads
// ─────────────────────────────────────────────────────────────────────
//! Three views of the same input, one per channel:
//! - **Lexical** (conservative channel): raw keyword hits.
//! - **Subspace** (balanced channel): fixed linear read-outs of the signature.
//! - **Shape** (liberal channel): symmetry, concentration and uniformity.
//!
//! Every head returns a normalised distribution, including on an all-zero
//! signature.

use triage_types::config::{FeatureRoute, HeadConfig};
use triage_types::{Category, ScoreMap, Vector, EPSILON, N_CHANNELS, SIGNATURE_DIM};

/// Scalar shape features feeding the shape head.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeFeatures {
    /// `1 - mean |s_i - s_{D-1-i}|`; 1 for a mirror-symmetric signature.
    pub symmetry: f64,
    /// 1 when `max(heated) / mean(heated)` reaches the threshold, else 0.
    pub concentration: f64,
    /// `1 - stddev(signature)`, clamped to [0, 1].
    pub uniformity: f64,
}

impl ShapeFeatures {
    pub fn extract(signature: &Vector, heated: &Vector, concentration_threshold: f64) -> Self {
        let d = SIGNATURE_DIM as f64;

        let mirror_gap: f64 = (0..SIGNATURE_DIM)
            .map(|i| (signature[i] - signature[SIGNATURE_DIM - 1 - i]).abs())
            .sum();
        let symmetry = 1.0 - mirror_gap / d;

        let heated_mean = heated.iter().sum::<f64>() / d;
        let heated_max = heated.iter().copied().fold(0.0, f64::max);
        let ratio = heated_max / (heated_mean.abs() + EPSILON);
        let concentration = if ratio >= concentration_threshold { 1.0 } else { 0.0 };

        let mean = signature.iter().sum::<f64>() / d;
        let variance = signature.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (d + EPSILON);
        let uniformity = (1.0 - variance.sqrt()).clamp(0.0, 1.0);

        Self {
            symmetry,
            concentration,
            uniformity,
        }
    }
}

fn route_into(scores: &mut ScoreMap, routes: &[FeatureRoute], feature: f64) {
    for r in routes {
        scores[r.category] += r.weight * feature;
    }
}

pub struct ClassifierHeads {
    config: HeadConfig,
}

impl ClassifierHeads {
    pub fn new(config: &HeadConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn keyword_hits(&self, lower: &str) -> ScoreMap {
        let mut scores = ScoreMap::zeros();
        for table in &self.config.lexical {
            for keyword in &table.keywords {
                if lower.contains(keyword.as_str()) {
                    scores[table.category] += 1.0;
                    if keyword.contains(' ') {
                        scores[table.category] += self.config.phrase_bonus;
                    }
                }
            }
        }
        scores
    }

    /// True when any lexical keyword occurs in the lower-cased text.
    pub fn has_lexical_match(&self, lower: &str) -> bool {
        self.config
            .lexical
            .iter()
            .flat_map(|t| t.keywords.iter())
            .any(|k| lower.contains(k.as_str()))
    }

    /// Keyword hits on lower-cased text: +1 per keyword, plus the phrase
    /// bonus for keywords containing a space.
    ///
    /// Without any hit the head returns a flat prior tilted toward
    /// `Unknown`, so it never claims certainty it has no evidence for.
    pub fn lexical(&self, lower: &str) -> ScoreMap {
        let mut scores = self.keyword_hits(lower);
        if scores.total() <= EPSILON {
            scores = ScoreMap::uniform(1.0);
            scores[Category::Unknown] = self.config.no_match_unknown_weight;
        }
        scores.normalized()
    }

    /// Per category `max(0, offset + Σ coeff_k · s_k)`.
    pub fn subspace(&self, signature: &Vector) -> ScoreMap {
        let mut scores = ScoreMap::zeros();
        for (row, &category) in self.config.subspace.iter().zip(Category::ALL.iter()) {
            let projection: f64 = row.iter().zip(signature.iter()).map(|(c, s)| c * s).sum();
            scores[category] = (self.config.subspace_offset + projection).max(0.0);
        }
        scores.normalized()
    }

    pub fn shape_features(&self, signature: &Vector, heated: &Vector) -> ShapeFeatures {
        ShapeFeatures::extract(signature, heated, self.config.concentration_threshold)
    }

    pub fn shape(&self, signature: &Vector, heated: &Vector) -> ScoreMap {
        let f = self.shape_features(signature, heated);
        let mut scores = ScoreMap::zeros();
        route_into(&mut scores, &self.config.symmetry_routes, f.symmetry);
        route_into(&mut scores, &self.config.concentration_routes, f.concentration);
        route_into(&mut scores, &self.config.uniformity_routes, f.uniformity);
        scores.normalized()
    }

    /// All three heads, in channel order.
    pub fn evaluate(&self, lower: &str, signature: &Vector, heated: &Vector) -> [ScoreMap; N_CHANNELS] {
        [
            self.lexical(lower),
            self.subspace(signature),
            self.shape(signature, heated),
        ]
    }
}
