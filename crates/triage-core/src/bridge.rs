// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Bridging Layer
// ─────────────────────────────────────────────────────────────────────
//! Ordered rule table applied after suppression. Only the first rule
//! whose predicate holds is applied; rules never accumulate.
//!
//! | # | Rule                 | Trigger                                              |
//! |---|----------------------|------------------------------------------------------|
//! | 1 | StructuralVocabulary | structure words, no physics words, no operator symbols |
//! | 2 | OperatorKeyword      | explicit operator words                              |
//! | 3 | DomainTrigger        | the single domain trigger word                       |
//! | 4 | PositionBand         | leader in band, warped query position in band, secondary present |
//! | 5 | LowSignal            | confident non-catch-all leader on a near-empty signature |
//!
//! The query position is the reference value of the signature's dominant
//! component pulled toward `center`: `f(x) = center + (x - center) / k`.

use triage_types::config::{Adjustment, BridgeConfig};
use triage_types::{BridgeRuleKind, Category, ScoreMap, Vector, EPSILON};

/// Read-only inputs every rule predicate sees.
pub struct BridgeContext<'a> {
    /// Lower-cased text.
    pub text: &'a str,
    pub signature: &'a Vector,
    pub query_position: f64,
}

type Predicate = fn(&BridgeConfig, &BridgeContext<'_>, &ScoreMap) -> bool;
type Effect = fn(&BridgeConfig, &mut ScoreMap);

/// One `(predicate, effect)` entry of the rule table.
pub struct BridgeRule {
    pub kind: BridgeRuleKind,
    predicate: Predicate,
    effect: Effect,
}

fn contains_any(text: &str, words: &[String]) -> bool {
    words.iter().any(|w| text.contains(w.as_str()))
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn adjust(scores: &mut ScoreMap, adjustments: &[Adjustment]) {
    for a in adjustments {
        scores[a.category] *= a.factor;
    }
}

fn transfer(scores: &mut ScoreMap, from: Category, to: Category, fraction: f64) {
    let moved = scores[from] * fraction;
    scores[from] -= moved;
    scores[to] += moved;
}

fn structural_vocabulary(cfg: &BridgeConfig, ctx: &BridgeContext<'_>, _: &ScoreMap) -> bool {
    contains_any(ctx.text, &cfg.structural_keywords)
        && !contains_any(ctx.text, &cfg.physics_cues)
        && !contains_any(ctx.text, &cfg.operator_symbols)
}

fn operator_keyword(cfg: &BridgeConfig, ctx: &BridgeContext<'_>, _: &ScoreMap) -> bool {
    contains_any(ctx.text, &cfg.operator_keywords)
}

fn domain_trigger(cfg: &BridgeConfig, ctx: &BridgeContext<'_>, _: &ScoreMap) -> bool {
    has_word(ctx.text, &cfg.domain_trigger)
}

fn position_band(cfg: &BridgeConfig, ctx: &BridgeContext<'_>, scores: &ScoreMap) -> bool {
    scores.leader() == cfg.band_leader
        && (cfg.band_low..=cfg.band_high).contains(&ctx.query_position)
        && scores[cfg.band_secondary] >= cfg.band_secondary_floor
}

fn low_signal(cfg: &BridgeConfig, ctx: &BridgeContext<'_>, scores: &ScoreMap) -> bool {
    let leader = scores.leader();
    if leader == Category::Unknown {
        return false;
    }
    let share = scores[leader] / (scores.total() + EPSILON);
    let peak = ctx.signature.iter().copied().fold(0.0, f64::max);
    share > cfg.low_signal_share && peak < cfg.low_signal_max
}

fn apply_structural(cfg: &BridgeConfig, scores: &mut ScoreMap) {
    adjust(scores, &cfg.structural_effect);
}

fn apply_operator(cfg: &BridgeConfig, scores: &mut ScoreMap) {
    adjust(scores, &cfg.operator_effect);
}

fn apply_domain(cfg: &BridgeConfig, scores: &mut ScoreMap) {
    adjust(scores, &cfg.domain_effect);
}

fn apply_band(cfg: &BridgeConfig, scores: &mut ScoreMap) {
    transfer(scores, cfg.band_leader, cfg.band_secondary, cfg.band_transfer);
}

fn apply_low_signal(cfg: &BridgeConfig, scores: &mut ScoreMap) {
    let leader = scores.leader();
    transfer(scores, leader, Category::Unknown, cfg.low_signal_transfer);
}

fn default_rules() -> Vec<BridgeRule> {
    vec![
        BridgeRule {
            kind: BridgeRuleKind::StructuralVocabulary,
            predicate: structural_vocabulary,
            effect: apply_structural,
        },
        BridgeRule {
            kind: BridgeRuleKind::OperatorKeyword,
            predicate: operator_keyword,
            effect: apply_operator,
        },
        BridgeRule {
            kind: BridgeRuleKind::DomainTrigger,
            predicate: domain_trigger,
            effect: apply_domain,
        },
        BridgeRule {
            kind: BridgeRuleKind::PositionBand,
            predicate: position_band,
            effect: apply_band,
        },
        BridgeRule {
            kind: BridgeRuleKind::LowSignal,
            predicate: low_signal,
            effect: apply_low_signal,
        },
    ]
}

pub struct BridgeLayer {
    config: BridgeConfig,
    reference: Vector,
    rules: Vec<BridgeRule>,
}

impl BridgeLayer {
    pub fn new(config: &BridgeConfig, reference: &Vector) -> Self {
        Self {
            config: config.clone(),
            reference: *reference,
            rules: default_rules(),
        }
    }

    /// Rule kinds in evaluation order.
    pub fn rule_order(&self) -> impl Iterator<Item = BridgeRuleKind> + '_ {
        self.rules.iter().map(|r| r.kind)
    }

    /// Warped reference value of the dominant signature component.
    /// Ties (including the zero signature) pick the first component.
    pub fn query_position(&self, signature: &Vector) -> f64 {
        let mut dominant = 0;
        for (i, &v) in signature.iter().enumerate().skip(1) {
            if v > signature[dominant] {
                dominant = i;
            }
        }
        let x = self.reference[dominant];
        self.config.center + (x - self.config.center) / self.config.warp
    }

    /// Apply the first matching rule. Returns the adjusted scores and the
    /// rule that fired, if any.
    pub fn apply(
        &self,
        lower: &str,
        signature: &Vector,
        scores: &ScoreMap,
    ) -> (ScoreMap, Option<BridgeRuleKind>) {
        let ctx = BridgeContext {
            text: lower,
            signature,
            query_position: self.query_position(signature),
        };
        let mut out = *scores;
        for rule in &self.rules {
            if (rule.predicate)(&self.config, &ctx, scores) {
                (rule.effect)(&self.config, &mut out);
                out.clamp_non_negative();
                return (out, Some(rule.kind));
            }
        }
        (out, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::config::SubstrateConfig;
    use triage_types::SIGNATURE_DIM;

    fn layer() -> BridgeLayer {
        BridgeLayer::new(
            &BridgeConfig::default(),
            &SubstrateConfig::default().reference_sequence,
        )
    }

    /// Unit signature peaking at `slot`.
    fn peaked(slot: usize) -> Vector {
        let mut v = [0.0; SIGNATURE_DIM];
        v[slot] = 1.0;
        v
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_rule_order() {
        let order: Vec<_> = layer().rule_order().collect();
        assert_eq!(
            order,
            vec![
                BridgeRuleKind::StructuralVocabulary,
                BridgeRuleKind::OperatorKeyword,
                BridgeRuleKind::DomainTrigger,
                BridgeRuleKind::PositionBand,
                BridgeRuleKind::LowSignal,
            ]
        );
    }

    #[test]
    fn test_query_position_warp() {
        let l = layer();
        // r_5 = 123 → 107 + 16/2 = 115
        assert_close(l.query_position(&peaked(5)), 115.0);
        // r_0 = 7 → 107 - 100/2 = 57
        assert_close(l.query_position(&peaked(0)), 57.0);
        assert_close(l.query_position(&[0.0; SIGNATURE_DIM]), 57.0);
    }

    #[test]
    fn test_structural_wins_over_operator() {
        // Both rule 1 (structure words, no physics, no symbols) and rule 2
        // ("operator") match; only rule 1's deltas may appear.
        let text = "classify this operator into a category";
        let scores = ScoreMap::uniform(1.0);
        let (out, rule) = layer().apply(text, &peaked(7), &scores);

        assert_eq!(rule, Some(BridgeRuleKind::StructuralVocabulary));
        assert_close(out[Category::Structure], 1.5);
        assert_close(out[Category::Physics], 0.6);
        assert_close(out[Category::Operator], 0.6);
        for c in [
            Category::Greeting,
            Category::Help,
            Category::Status,
            Category::Navigation,
            Category::Unknown,
        ] {
            assert_close(out[c], 1.0);
        }
    }

    #[test]
    fn test_operator_rule_when_structure_vetoed() {
        // a physics cue vetoes rule 1, leaving rule 2
        let text = "apply the operator to each layer of energy";
        let (out, rule) = layer().apply(text, &peaked(6), &ScoreMap::uniform(1.0));
        assert_eq!(rule, Some(BridgeRuleKind::OperatorKeyword));
        assert_close(out[Category::Operator], 1.4);
        assert_close(out[Category::Physics], 0.7);
        assert_close(out[Category::Structure], 1.0);
    }

    #[test]
    fn test_operator_symbol_vetoes_structure() {
        let text = "layer = compose(a, b)";
        let (_, rule) = layer().apply(text, &peaked(6), &ScoreMap::uniform(1.0));
        assert_eq!(rule, Some(BridgeRuleKind::OperatorKeyword));
    }

    #[test]
    fn test_domain_trigger() {
        let (out, rule) = layer().apply("enter the zone", &peaked(4), &ScoreMap::uniform(1.0));
        assert_eq!(rule, Some(BridgeRuleKind::DomainTrigger));
        assert_close(out[Category::Navigation], 1.3);
        assert_close(out[Category::Status], 0.8);
    }

    #[test]
    fn test_domain_trigger_whole_word_only() {
        let (_, rule) = layer().apply("ozone levels", &peaked(0), &ScoreMap::uniform(1.0));
        assert_eq!(rule, None);
    }

    #[test]
    fn test_position_band_redistributes() {
        let mut scores = ScoreMap::zeros();
        scores[Category::Physics] = 0.8;
        scores[Category::Operator] = 0.2;
        // slot 5 → query position 115, inside [85, 130]
        let (out, rule) = layer().apply("something heavy", &peaked(5), &scores);
        assert_eq!(rule, Some(BridgeRuleKind::PositionBand));
        assert_close(out[Category::Physics], 0.6);
        assert_close(out[Category::Operator], 0.4);
    }

    #[test]
    fn test_position_band_outside() {
        let mut scores = ScoreMap::zeros();
        scores[Category::Physics] = 0.8;
        scores[Category::Operator] = 0.2;
        // slot 8 → 107 + 88/2 = 151, outside the band
        let (out, rule) = layer().apply("something heavy", &peaked(8), &scores);
        assert_eq!(rule, None);
        assert_eq!(out, scores);
    }

    #[test]
    fn test_position_band_needs_secondary() {
        let mut scores = ScoreMap::zeros();
        scores[Category::Physics] = 0.8;
        scores[Category::Operator] = 0.01;
        let (_, rule) = layer().apply("something heavy", &peaked(5), &scores);
        assert_eq!(rule, None);
    }

    #[test]
    fn test_low_signal_redirects_to_unknown() {
        let mut scores = ScoreMap::zeros();
        scores[Category::Greeting] = 0.9;
        scores[Category::Unknown] = 0.1;
        let (out, rule) = layer().apply("", &[0.0; SIGNATURE_DIM], &scores);
        assert_eq!(rule, Some(BridgeRuleKind::LowSignal));
        assert_close(out[Category::Greeting], 0.45);
        assert_close(out[Category::Unknown], 0.55);
    }

    #[test]
    fn test_low_signal_ignores_unknown_leader() {
        let mut scores = ScoreMap::zeros();
        scores[Category::Unknown] = 0.9;
        let (out, rule) = layer().apply("", &[0.0; SIGNATURE_DIM], &scores);
        assert_eq!(rule, None);
        assert_eq!(out, scores);
    }

    #[test]
    fn test_no_rule_passes_through() {
        let scores = ScoreMap::from_array([0.1, 0.7, 0.1, 0.0, 0.0, 0.0, 0.0, 0.1]);
        let (out, rule) = layer().apply("what can you do", &peaked(1), &scores);
        assert_eq!(rule, None);
        assert_eq!(out, scores);
    }
}
