// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Feature Substrate
// ─────────────────────────────────────────────────────────────────────
//! Text → signature, and the shared heating transform.
//!
//! The signature mixes a coarse lexical signal (one weight per semantic
//! slot whose vocabulary occurs in the text) with a crude character
//! signal (`char_code / 1000` for the first D characters), then
//! L2-normalises. The character part keeps unseen words from producing
//! an empty signature.
//!
//! Heating multiplies the signature by a row-stochastic D×D matrix built
//! once from the reference sequence:
//!
//!   raw[i][j] = exp(-|r_i - r_j| / spread) + bonus·[r_i + r_j = S]
//!   M[i][j]   = raw[i][j] / Σ_j raw[i][j]

use triage_types::config::{KeywordSlot, SubstrateConfig};
use triage_types::error::{check_dimension, TriageError, TriageResult};
use triage_types::{Vector, EPSILON, SIGNATURE_DIM};

/// Scale `v` to unit L2 norm. Vectors with norm below `EPSILON` are
/// returned unchanged.
///
/// Components are divided by the largest magnitude before squaring, so
/// large finite inputs do not overflow to an infinite norm.
pub fn normalize(v: &Vector) -> Vector {
    let scale = v.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if scale == 0.0 {
        return *v;
    }
    let unit_norm = v.iter().map(|x| (x / scale).powi(2)).sum::<f64>().sqrt();
    if scale * unit_norm < EPSILON {
        return *v;
    }
    let mut out = *v;
    for x in out.iter_mut() {
        *x = *x / scale / unit_norm;
    }
    out
}

/// Validate and normalise a caller-supplied signature.
///
/// Length is checked before anything else is looked at.
pub fn signature_from_slice(values: &[f64]) -> TriageResult<Vector> {
    check_dimension(SIGNATURE_DIM, values.len())?;
    let mut v = [0.0; SIGNATURE_DIM];
    for (i, (&x, slot)) in values.iter().zip(v.iter_mut()).enumerate() {
        if !x.is_finite() {
            return Err(TriageError::Numerical(format!(
                "signature[{i}] is not finite: {x}"
            )));
        }
        if x < 0.0 {
            return Err(TriageError::Numerical(format!(
                "signature[{i}] must be >= 0, got {x}"
            )));
        }
        *slot = x;
    }
    Ok(normalize(&v))
}

/// Fixed D×D row-stochastic heating matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformMatrix {
    rows: [Vector; SIGNATURE_DIM],
}

impl TransformMatrix {
    pub fn build(config: &SubstrateConfig) -> Self {
        let r = &config.reference_sequence;
        let mut rows = [[0.0f64; SIGNATURE_DIM]; SIGNATURE_DIM];

        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let mut w = (-(r[i] - r[j]).abs() / config.coupling_spread).exp();
                if (r[i] + r[j] - config.mirror_sum).abs() < 1e-9 {
                    w += config.mirror_bonus;
                }
                *cell = w;
            }
            // diagonal is exp(0) = 1, so the sum is at least 1
            let total: f64 = row.iter().sum();
            for cell in row.iter_mut() {
                *cell /= total;
            }
        }

        Self { rows }
    }

    pub fn row(&self, i: usize) -> &Vector {
        &self.rows[i]
    }

    /// Row-vector product `v · M`.
    pub fn apply(&self, v: &Vector) -> Vector {
        let mut out = [0.0; SIGNATURE_DIM];
        for (vi, row) in v.iter().zip(self.rows.iter()) {
            for (o, m) in out.iter_mut().zip(row.iter()) {
                *o += vi * m;
            }
        }
        out
    }
}

/// Output of [`FeatureSubstrate::heat`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heated {
    pub values: Vector,
    /// `Σ values²`. Diagnostic only.
    pub energy: f64,
}

/// Signature extraction plus heating.
pub struct FeatureSubstrate {
    matrix: TransformMatrix,
    slots: Vec<KeywordSlot>,
    char_scale: f64,
    min_signal_chars: usize,
    temperature: f64,
}

impl FeatureSubstrate {
    pub fn new(config: &SubstrateConfig) -> Self {
        Self {
            matrix: TransformMatrix::build(config),
            slots: config.slots.clone(),
            char_scale: config.char_scale,
            min_signal_chars: config.min_signal_chars,
            temperature: config.temperature,
        }
    }

    pub fn matrix(&self) -> &TransformMatrix {
        &self.matrix
    }

    /// Signature of already lower-cased text.
    ///
    /// Text with no slot vocabulary and fewer than `min_signal_chars`
    /// visible characters carries no signal and yields the zero vector;
    /// normalisation would otherwise inflate a lone character to a full
    /// unit signature.
    pub fn signature_lower(&self, lower: &str) -> Vector {
        let mut raw = [0.0; SIGNATURE_DIM];

        for (slot, value) in self.slots.iter().zip(raw.iter_mut()) {
            if slot.keywords.iter().any(|k| lower.contains(k.as_str())) {
                *value += slot.weight;
            }
        }

        if raw.iter().all(|&v| v == 0.0) && !self.has_visible_signal(lower) {
            return raw;
        }

        for (i, c) in lower.chars().take(SIGNATURE_DIM).enumerate() {
            raw[i % SIGNATURE_DIM] += c as u32 as f64 / self.char_scale;
        }

        normalize(&raw)
    }

    fn has_visible_signal(&self, lower: &str) -> bool {
        lower
            .chars()
            .filter(|c| !c.is_whitespace())
            .nth(self.min_signal_chars.saturating_sub(1))
            .is_some()
    }

    pub fn signature(&self, text: &str) -> Vector {
        self.signature_lower(&text.to_lowercase())
    }

    pub fn heat(&self, signature: &Vector) -> Heated {
        let mut values = self.matrix.apply(signature);
        for v in values.iter_mut() {
            *v *= self.temperature;
        }
        let energy = values.iter().map(|v| v * v).sum();
        Heated { values, energy }
    }
}
