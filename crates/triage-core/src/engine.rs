// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Orchestrator
// ─────────────────────────────────────────────────────────────────────
//! `classify(text) -> Decision`.
//!
//! Pipeline:
//!   1. Signature (or a validated override)
//!   2. Heat → energy
//!   3. Channel activations
//!   4. Lexical / subspace / shape heads
//!   5. Fusion: Σ trust · activation · head
//!   6. Discriminative boost
//!   7. Pair suppression
//!   8. Bridging (first rule wins)
//!   9. Arg-max (first category on ties) → confidence
//!
//! Signal-free input (zero signature, no lexical keyword) skips 6–8 and
//! resolves to `Unknown` at a confidence just above `1/N`.
//!
//! Only the channel counters are written during a call; the decision is a
//! pure function of the text, the configuration, the channel filters and
//! the attractor mass.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use triage_types::error::{TriageError, TriageResult};
use triage_types::{
    clamp_score, Category, ChannelKind, Decision, Diagnostics, EngineConfig, ScoreMap, Vector,
    EPSILON, N_CHANNELS,
};

use crate::bridge::BridgeLayer;
use crate::channel::{ChannelCounters, ChannelLayer};
use crate::heads::ClassifierHeads;
use crate::substrate::{signature_from_slice, FeatureSubstrate};
use crate::suppression::Suppressor;

/// `fused[c] = Σ_ch trust[ch] · activation[ch] · head[ch][c]`. Not renormalised.
pub fn fuse(
    heads: &[ScoreMap; N_CHANNELS],
    activations: &[f64; N_CHANNELS],
    trust: &[f64; N_CHANNELS],
) -> ScoreMap {
    let mut fused = ScoreMap::zeros();
    for ((head, a), t) in heads.iter().zip(activations).zip(trust) {
        for (c, s) in head.iter() {
            fused[c] += t * a * s;
        }
    }
    fused
}

/// Channel whose `trust · head score` for `winner` is largest; first on ties.
pub fn dominant_channel(
    heads: &[ScoreMap; N_CHANNELS],
    trust: &[f64; N_CHANNELS],
    winner: Category,
) -> ChannelKind {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, (head, t)) in heads.iter().zip(trust).enumerate() {
        let v = head[winner] * t;
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    ChannelKind::ALL[best]
}

/// Persistable engine state: attractor mass plus one filter per channel.
///
/// The engine defines no file format; callers serialise this however they
/// like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub attractor_mass: ScoreMap,
    pub filters: [Vector; N_CHANNELS],
}

/// The intent classification engine.
///
/// Thread-safe: filters, counters and attractor mass are guarded by
/// `parking_lot` locks; everything else is immutable after construction.
pub struct TriageEngine {
    config: Arc<EngineConfig>,
    substrate: FeatureSubstrate,
    channels: ChannelLayer,
    heads: ClassifierHeads,
    suppressor: Suppressor,
    bridge: BridgeLayer,
}

impl Default for TriageEngine {
    fn default() -> Self {
        Self::build(Arc::new(EngineConfig::default()))
    }
}

impl TriageEngine {
    /// Validate `config` and build every stage from it.
    pub fn new(config: EngineConfig) -> TriageResult<Self> {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<EngineConfig>) -> TriageResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: Arc<EngineConfig>) -> Self {
        Self {
            substrate: FeatureSubstrate::new(&config.substrate),
            channels: ChannelLayer::new(&config.channels),
            heads: ClassifierHeads::new(&config.heads),
            suppressor: Suppressor::new(&config.suppression),
            bridge: BridgeLayer::new(&config.bridge, &config.substrate.reference_sequence),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn substrate(&self) -> &FeatureSubstrate {
        &self.substrate
    }

    /// Classify free-form text. Never fails: empty or signal-free text
    /// routes to `Unknown`.
    pub fn classify(&self, text: &str) -> Decision {
        let lower = text.to_lowercase();
        let signature = self.substrate.signature_lower(&lower);
        self.run(&lower, signature)
    }

    /// Classify with a caller-supplied signature in place of the derived one.
    ///
    /// The override is length-checked before any scoring and normalised like
    /// a derived signature.
    pub fn classify_with_signature(&self, text: &str, signature: &[f64]) -> TriageResult<Decision> {
        let signature = signature_from_slice(signature)?;
        Ok(self.run(&text.to_lowercase(), signature))
    }

    fn run(&self, lower: &str, signature: Vector) -> Decision {
        let heated = self.substrate.heat(&signature);
        let activations = self.channels.activate_all(&heated.values);
        let head_scores = self.heads.evaluate(lower, &signature, &heated.values);

        let trust = self.config.trust_weights();
        let fused = fuse(&head_scores, &activations, &trust);

        let (final_scores, bridge_rule) = if self.is_signal_free(lower, &signature) {
            (self.signal_free_scores(), None)
        } else {
            let boosted = self.suppressor.boost(lower, &fused);
            let suppressed = self.suppressor.suppress(&boosted);
            let (bridged, rule) = self.bridge.apply(lower, &signature, &suppressed);
            (bridged.normalized(), rule)
        };

        let category = final_scores.leader();
        let confidence = clamp_score(
            final_scores[category] / (final_scores.total() + EPSILON),
            0.0,
            1.0,
        );
        let dominant = dominant_channel(&head_scores, &trust, category);

        log::debug!(
            "classified as {category} (confidence {confidence:.4}, channel {dominant}, rule {bridge_rule:?})"
        );

        Decision {
            category,
            confidence,
            dominant_channel: dominant,
            channel_activations: activations,
            diagnostics: Diagnostics {
                energy: clamp_score(heated.energy, 0.0, f64::MAX),
                query_position: self.bridge.query_position(&signature),
                head_scores,
                fused,
                final_scores,
                bridge_rule,
            },
        }
    }

    /// Zero signature and no lexical keyword: nothing to classify on.
    fn is_signal_free(&self, lower: &str, signature: &Vector) -> bool {
        signature.iter().all(|&s| s == 0.0) && !self.heads.has_lexical_match(lower)
    }

    /// Near-flat distribution with `Unknown` just ahead of the `1/N` floor.
    fn signal_free_scores(&self) -> ScoreMap {
        let mut scores = ScoreMap::uniform(1.0);
        scores[Category::Unknown] = self.config.signal_free_unknown_weight;
        scores.normalized()
    }

    /// Offline tuning of one channel's filter.
    pub fn update_filter(
        &self,
        channel: ChannelKind,
        gradient: &[f64],
        learning_rate: f64,
    ) -> TriageResult<()> {
        self.channels
            .channel(channel)
            .update_filter(gradient, learning_rate)
    }

    /// Supervised feedback; only call when the true label is known.
    pub fn record_outcome(&self, predicted: Category, actual: Category) {
        self.suppressor.record_outcome(predicted, actual);
    }

    pub fn attractor_mass(&self) -> ScoreMap {
        self.suppressor.attractor_mass()
    }

    pub fn channel_counters(&self) -> [ChannelCounters; N_CHANNELS] {
        std::array::from_fn(|i| self.channels.channel(ChannelKind::ALL[i]).counters())
    }

    pub fn snapshot(&self) -> EngineState {
        EngineState {
            attractor_mass: self.suppressor.attractor_mass(),
            filters: std::array::from_fn(|i| self.channels.channel(ChannelKind::ALL[i]).filter()),
        }
    }

    /// Restore persisted state. Rejected as a whole if any value is not finite.
    pub fn restore(&self, state: &EngineState) -> TriageResult<()> {
        for (kind, filter) in ChannelKind::ALL.iter().zip(state.filters.iter()) {
            if filter.iter().any(|f| !f.is_finite()) {
                return Err(TriageError::Numerical(format!(
                    "{kind} filter contains a non-finite value"
                )));
            }
        }
        self.suppressor.restore_mass(state.attractor_mass)?;
        for (kind, filter) in ChannelKind::ALL.iter().zip(state.filters.iter()) {
            self.channels.channel(*kind).set_filter(*filter);
        }
        log::info!("engine state restored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::{BridgeRuleKind, SIGNATURE_DIM};

    fn engine() -> TriageEngine {
        TriageEngine::default()
    }

    fn assert_distribution(map: &ScoreMap) {
        assert!(map.iter().all(|(_, v)| v >= 0.0 && v.is_finite()));
        assert!((map.total() - 1.0).abs() < 1e-6, "total {}", map.total());
    }

    const SAMPLES: [&str; 10] = [
        "",
        "what can you do",
        "hello there",
        "GRAVITY and momentum of a falling mass",
        "apply the operator",
        "classify this operator into a category",
        "take me to the map",
        "status report please",
        "enter the zone",
        "🦀🦀🦀 ¿qué?",
    ];

    #[test]
    fn test_help_regression() {
        let e = engine();
        let d = e.classify("what can you do");
        assert!((d.diagnostics.head_scores[0][Category::Help] - 1.0).abs() < 1e-6);
        assert_eq!(d.category, Category::Help);
        assert_eq!(d.diagnostics.bridge_rule, None);
    }

    /// Every lexical keyword alone and in pairs and triples, in table order.
    fn keyword_texts(cfg: &EngineConfig) -> Vec<String> {
        let words: Vec<&str> = cfg
            .heads
            .lexical
            .iter()
            .flat_map(|t| t.keywords.iter().map(String::as_str))
            .collect();
        let mut texts = Vec::new();
        for (i, a) in words.iter().enumerate() {
            texts.push(a.to_string());
            texts.push(format!("please {a}"));
            for (j, b) in words.iter().enumerate().skip(i + 1) {
                texts.push(format!("{a} {b}"));
                for c in words.iter().skip(j + 1) {
                    texts.push(format!("{a} {b} {c}"));
                }
            }
        }
        texts
    }

    #[test]
    fn test_empty_input_routes_to_unknown() {
        let e = engine();
        let empty = e.classify("");
        assert_eq!(empty.category, Category::Unknown);
        assert_eq!(empty.diagnostics.energy, 0.0);
        assert_eq!(empty.diagnostics.bridge_rule, None);
        // weights 1 × 7 + 1.05
        assert!((empty.confidence - 1.05 / 8.05).abs() < 1e-6);
    }

    #[test]
    fn test_empty_confidence_below_every_keyword_text() {
        let e = engine();
        let empty = e.classify("").confidence;
        let texts = keyword_texts(e.config());
        assert!(texts.len() > 8000);
        for text in &texts {
            let d = e.classify(text);
            assert!(
                empty < d.confidence,
                "{text:?}: empty {empty} >= {}",
                d.confidence
            );
        }
    }

    #[test]
    fn test_short_vocabulary_free_text_routes_to_unknown() {
        let e = engine();
        let empty = e.classify("");
        for text in [" ", "a", "ok", "no", "i", "😀", "İ", "\t\n"] {
            let d = e.classify(text);
            assert_eq!(d.category, Category::Unknown, "{text:?}");
            assert_eq!(d.confidence, empty.confidence, "{text:?}");
        }
    }

    #[test]
    fn test_longer_gibberish_routes_to_unknown() {
        let e = engine();
        for text in ["zzz", "ping", "random words here", "🦀🦀🦀 ¿qué?"] {
            assert_eq!(e.classify(text).category, Category::Unknown, "{text:?}");
        }
    }

    #[test]
    fn test_distributions_valid() {
        let e = engine();
        for text in SAMPLES {
            let d = e.classify(text);
            for head in &d.diagnostics.head_scores {
                assert_distribution(head);
            }
            assert_distribution(&d.diagnostics.final_scores);
            assert!(d.confidence.is_finite() && (0.0..=1.0).contains(&d.confidence));
            assert!(d.diagnostics.energy.is_finite());
            assert!(d.channel_activations.iter().all(|a| (0.0..=1.0).contains(a)));
        }
    }

    #[test]
    fn test_deterministic() {
        let e = engine();
        for text in SAMPLES {
            assert_eq!(e.classify(text), e.classify(text));
        }
        // a fresh engine with the same configuration agrees too
        let other = engine();
        assert_eq!(e.classify("apply the operator"), other.classify("apply the operator"));
    }

    #[test]
    fn test_physics_text() {
        let d = engine().classify("gravity and momentum");
        assert_eq!(d.category, Category::Physics);
    }

    #[test]
    fn test_structural_text_fires_rule_one() {
        let d = engine().classify("classify this operator into a category");
        assert_eq!(d.diagnostics.bridge_rule, Some(BridgeRuleKind::StructuralVocabulary));
        assert_eq!(d.category, Category::Structure);
    }

    #[test]
    fn test_confidence_matches_final_scores() {
        let d = engine().classify("hello there");
        let f = &d.diagnostics.final_scores;
        assert_eq!(f.leader(), d.category);
        assert!((d.confidence - f[d.category]).abs() < 1e-6);
    }

    #[test]
    fn test_tie_resolves_to_first_category() {
        // Only the lexical channel carries weight and "hello help" hits
        // Greeting and Help once each, so their fused scores tie exactly.
        let mut cfg = EngineConfig::default();
        cfg.channels[1].trust = 0.0;
        cfg.channels[2].trust = 0.0;
        let e = TriageEngine::new(cfg).unwrap();
        let d = e.classify("hello help");
        let f = &d.diagnostics.final_scores;
        assert_eq!(f[Category::Greeting], f[Category::Help]);
        assert_eq!(d.category, Category::Greeting);
    }

    #[test]
    fn test_signature_override_dimension_mismatch() {
        let err = engine()
            .classify_with_signature("hello", &[0.5; 3])
            .unwrap_err();
        assert_eq!(
            err,
            TriageError::DimensionMismatch {
                expected: SIGNATURE_DIM,
                actual: 3
            }
        );
    }

    #[test]
    fn test_signature_override_low_signal() {
        // strong lexical evidence without any signature behind it is noise
        let d = engine()
            .classify_with_signature("good morning greetings", &[0.0; SIGNATURE_DIM])
            .unwrap();
        assert_eq!(d.diagnostics.bridge_rule, Some(BridgeRuleKind::LowSignal));
        assert_eq!(d.category, Category::Unknown);
    }

    #[test]
    fn test_signature_override_large_values() {
        let d = engine()
            .classify_with_signature("apply the operator", &[f64::MAX; SIGNATURE_DIM])
            .unwrap();
        assert!(d.diagnostics.energy > 0.0);
        assert_distribution(&d.diagnostics.final_scores);
    }

    #[test]
    fn test_signature_override_matches_derived() {
        let e = engine();
        let sig = e.substrate().signature("what can you do");
        let a = e.classify("what can you do");
        let b = e.classify_with_signature("what can you do", &sig).unwrap();
        assert_eq!(a.category, b.category);
        assert!((a.confidence - b.confidence).abs() < 1e-9);
    }

    #[test]
    fn test_classify_counts_activations() {
        let e = engine();
        e.classify("hello");
        e.classify("help");
        for c in e.channel_counters() {
            assert_eq!(c.activations, 2);
            assert!(c.flow > 0.0);
        }
    }

    #[test]
    fn test_concurrent_classify() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TriageEngine>();

        let e = engine();
        let expected: Vec<Decision> = SAMPLES.iter().map(|t| e.classify(t)).collect();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for i in 0..200 {
                        let k = i % SAMPLES.len();
                        assert_eq!(e.classify(SAMPLES[k]), expected[k]);
                    }
                });
            }
        });

        let calls = (SAMPLES.len() + 8 * 200) as u64;
        for c in e.channel_counters() {
            assert_eq!(c.activations, calls);
        }
    }

    #[test]
    fn test_record_outcome_shifts_mass() {
        let e = engine();
        e.record_outcome(Category::Physics, Category::Operator);
        let m = e.attractor_mass();
        assert!((m[Category::Physics] - 0.1).abs() < 1e-12);
        assert_eq!(m[Category::Operator], 0.0);
    }

    #[test]
    fn test_update_filter_changes_activation() {
        let e = engine();
        let before = e.classify("hello").channel_activations[0];
        e.update_filter(ChannelKind::Conservative, &[-1.0; SIGNATURE_DIM], 0.5)
            .unwrap();
        let after = e.classify("hello").channel_activations[0];
        assert!(after > before);
        assert!(e
            .update_filter(ChannelKind::Conservative, &[1.0; 2], 0.5)
            .is_err());
    }

    #[test]
    fn test_snapshot_restore_via_json() {
        let e = engine();
        e.record_outcome(Category::Help, Category::Status);
        e.update_filter(ChannelKind::Balanced, &[0.1; SIGNATURE_DIM], 1.0)
            .unwrap();
        let json = serde_json::to_string(&e.snapshot()).unwrap();

        let restored = engine();
        restored
            .restore(&serde_json::from_str::<EngineState>(&json).unwrap())
            .unwrap();
        assert_eq!(restored.snapshot(), e.snapshot());
        assert_eq!(restored.classify("help status"), e.classify("help status"));
    }

    #[test]
    fn test_restore_rejects_nan_filter() {
        let e = engine();
        let mut state = e.snapshot();
        state.filters[2][0] = f64::NAN;
        state.attractor_mass[Category::Help] = 0.3;
        assert!(matches!(e.restore(&state), Err(TriageError::Numerical(_))));
        // nothing was applied
        assert_eq!(e.attractor_mass()[Category::Help], 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.substrate.temperature = -1.0;
        assert!(matches!(TriageEngine::new(cfg), Err(TriageError::Config(_))));
    }

    #[test]
    fn test_fuse_weights() {
        let mut lexical = ScoreMap::zeros();
        lexical[Category::Help] = 1.0;
        let heads = [lexical, ScoreMap::uniform(0.125), ScoreMap::zeros()];
        let fused = fuse(&heads, &[0.5, 1.0, 1.0], &[0.4, 0.35, 0.25]);
        assert!((fused[Category::Help] - (0.2 + 0.04375)).abs() < 1e-12);
        assert!((fused[Category::Greeting] - 0.04375).abs() < 1e-12);
    }

    #[test]
    fn test_dominant_channel() {
        let mut lexical = ScoreMap::zeros();
        lexical[Category::Help] = 0.2;
        let mut shape = ScoreMap::zeros();
        shape[Category::Help] = 0.9;
        let heads = [lexical, ScoreMap::zeros(), shape];
        let trust = [0.4, 0.35, 0.25];
        assert_eq!(dominant_channel(&heads, &trust, Category::Help), ChannelKind::Liberal);
        assert_eq!(
            dominant_channel(&heads, &trust, Category::Status),
            ChannelKind::Conservative
        );
    }
}
