// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Engine Configuration
// ─────────────────────────────────────────────────────────────────────
//! Every tunable constant of the engine, grouped per pipeline stage.
//!
//! The defaults are the hand-tuned values the engine ships with. They
//! are not derived from anything and must be kept exactly as they are
//! for behavioural parity; load a JSON override to experiment instead
//! of editing them.

use serde::{Deserialize, Serialize};

use crate::category::{Category, ChannelKind, N_CATEGORIES, N_CHANNELS};
use crate::error::{TriageError, TriageResult};
use crate::score::{Vector, SIGNATURE_DIM};

fn kw(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// Activation function of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Sigmoid,
    /// `tanh` rescaled from [-1, 1] to [0, 1].
    Tanh,
    Softplus,
    Linear,
}

impl Activation {
    /// Apply the activation. The caller clamps the result to [0, 1].
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => 0.5 * (x.tanh() + 1.0),
            // ln(1 + e^x), rewritten to stay finite for large x
            Activation::Softplus => x.max(0.0) + (-x.abs()).exp().ln_1p(),
            Activation::Linear => x,
        }
    }
}

/// One semantic slot of the signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSlot {
    pub weight: f64,
    pub keywords: Vec<String>,
}

/// Keyword list attached to one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryKeywords {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl CategoryKeywords {
    fn new(category: Category, words: &[&str]) -> Self {
        Self {
            category,
            keywords: kw(words),
        }
    }
}

/// Multiply one category's score by `factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub category: Category,
    pub factor: f64,
}

impl Adjustment {
    pub const fn new(category: Category, factor: f64) -> Self {
        Self { category, factor }
    }
}

/// Feature substrate: signature extraction and the heating transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubstrateConfig {
    /// Fixed reference sequence the transform matrix is built from.
    pub reference_sequence: Vector,
    /// `S` in the mirror relation `mirror(v) = S - v`.
    pub mirror_sum: f64,
    /// Length scale of the exponential coupling between reference values.
    pub coupling_spread: f64,
    /// Extra coupling between mirror partners.
    pub mirror_bonus: f64,
    pub temperature: f64,
    /// Character codes are divided by this before being added to a slot.
    pub char_scale: f64,
    /// Vocabulary-free text needs at least this many non-whitespace
    /// characters to count as signal.
    pub min_signal_chars: usize,
    pub slots: Vec<KeywordSlot>,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        let slot = |weight: f64, words: &[&str]| KeywordSlot {
            weight,
            keywords: kw(words),
        };
        Self {
            reference_sequence: [
                7.0, 19.0, 37.0, 61.0, 91.0, 123.0, 153.0, 177.0, 195.0, 207.0,
            ],
            mirror_sum: 214.0,
            coupling_spread: 20.0,
            mirror_bonus: 0.5,
            temperature: 1.0,
            char_scale: 1000.0,
            min_signal_chars: 3,
            slots: vec![
                slot(1.0, &["hello", "hey", "greetings", "good morning", "good evening"]),
                slot(1.0, &["help", "what can you do", "how do i", "guide me", "assist"]),
                slot(0.9, &["status", "health", "uptime", "diagnostics", "are you running"]),
                slot(0.9, &["go to", "open", "navigate", "show me", "take me to"]),
                slot(0.8, &["zone", "area", "region", "boundary"]),
                slot(1.0, &["energy", "force", "velocity", "gravity", "momentum", "mass"]),
                slot(1.0, &["operator", "apply", "compose", "transform", "eigen"]),
                slot(
                    1.0,
                    &["category", "categories", "classify", "classification", "channel", "layer"],
                ),
                slot(0.6, &["what", "why", "how", "?"]),
                slot(0.7, &["run", "start", "stop", "set"]),
            ],
        }
    }
}

/// One channel of the channel layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub kind: ChannelKind,
    pub activation: Activation,
    pub bias: f64,
    /// Output multiplier applied after the activation function.
    pub scale: f64,
    /// Filter before jitter.
    pub affinity: Vector,
    /// Half-width of the uniform jitter added to each filter component.
    pub jitter: f64,
    pub seed: u64,
    /// Static trust weight used in fusion.
    pub trust: f64,
}

impl ChannelConfig {
    fn defaults() -> [ChannelConfig; N_CHANNELS] {
        let mut rising = [0.0; SIGNATURE_DIM];
        for (i, v) in rising.iter_mut().enumerate() {
            *v = 0.3 + 0.9 * i as f64 / (SIGNATURE_DIM - 1) as f64;
        }
        [
            ChannelConfig {
                kind: ChannelKind::Conservative,
                activation: Activation::Sigmoid,
                bias: -1.0,
                scale: 1.0,
                affinity: [0.8, 1.0, 0.6, 0.6, 0.4, 0.9, 0.9, 0.9, 0.5, 0.5],
                jitter: 0.02,
                seed: 42,
                trust: 0.40,
            },
            ChannelConfig {
                kind: ChannelKind::Balanced,
                activation: Activation::Tanh,
                bias: 0.0,
                scale: 1.0,
                affinity: [0.7; SIGNATURE_DIM],
                jitter: 0.02,
                seed: 43,
                trust: 0.35,
            },
            ChannelConfig {
                kind: ChannelKind::Liberal,
                activation: Activation::Softplus,
                bias: 0.5,
                scale: 0.5,
                affinity: rising,
                jitter: 0.02,
                seed: 44,
                trust: 0.25,
            },
        ]
    }
}

/// Weighted routing of one shape feature into categories.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRoute {
    pub category: Category,
    pub weight: f64,
}

const fn route(category: Category, weight: f64) -> FeatureRoute {
    FeatureRoute { category, weight }
}

/// Classifier head tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadConfig {
    /// Lexical head keyword tables.
    pub lexical: Vec<CategoryKeywords>,
    /// Bonus for a matched keyword containing a space.
    pub phrase_bonus: f64,
    /// Weight of the catch-all when no keyword matches; every other
    /// category weighs 1 before normalisation.
    pub no_match_unknown_weight: f64,
    /// Subspace head: one coefficient row per category, in category order.
    pub subspace: [Vector; N_CATEGORIES],
    pub subspace_offset: f64,
    /// `max/mean` ratio of the heated vector at which concentration fires.
    pub concentration_threshold: f64,
    pub symmetry_routes: Vec<FeatureRoute>,
    pub concentration_routes: Vec<FeatureRoute>,
    pub uniformity_routes: Vec<FeatureRoute>,
}

impl Default for HeadConfig {
    fn default() -> Self {
        use Category::*;
        Self {
            lexical: vec![
                CategoryKeywords::new(
                    Greeting,
                    &["hello", "hey", "greetings", "good morning", "good evening"],
                ),
                CategoryKeywords::new(
                    Help,
                    &["help", "what can you do", "how do i", "guide me", "assist"],
                ),
                CategoryKeywords::new(
                    Status,
                    &["status", "health", "uptime", "diagnostics", "are you running"],
                ),
                CategoryKeywords::new(
                    Navigation,
                    &["go to", "open", "navigate", "show me", "take me to"],
                ),
                CategoryKeywords::new(
                    Physics,
                    &["energy", "force", "velocity", "gravity", "momentum", "mass"],
                ),
                CategoryKeywords::new(
                    Operator,
                    &["operator", "apply", "compose", "transform", "eigen"],
                ),
                CategoryKeywords::new(
                    Structure,
                    &["category", "categories", "classify", "classification", "channel", "layer"],
                ),
            ],
            phrase_bonus: 0.5,
            no_match_unknown_weight: 3.0,
            subspace: [
                // greeting
                [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                // help
                [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0],
                // status
                [0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.3],
                // navigation
                [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                // physics
                [0.0, 0.0, 0.0, 0.0, 0.5, 1.0, 0.0, -0.3, 0.0, 0.0],
                // operator
                [0.0, 0.0, 0.0, 0.0, 0.0, -0.3, 1.0, 0.0, 0.0, 0.0],
                // structure
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, -0.2, 1.0, 0.0, 0.0],
                // unknown
                [-0.5, -0.5, -0.5, -0.5, -0.5, -0.5, -0.5, -0.5, 0.0, 0.0],
            ],
            subspace_offset: 0.5,
            concentration_threshold: 2.0,
            symmetry_routes: vec![route(Structure, 0.6), route(Unknown, 0.4)],
            concentration_routes: vec![
                route(Physics, 0.4),
                route(Help, 0.3),
                route(Navigation, 0.3),
            ],
            uniformity_routes: vec![
                route(Greeting, 0.3),
                route(Status, 0.3),
                route(Unknown, 0.4),
            ],
        }
    }
}

/// An unordered confusable pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfusablePair {
    pub a: Category,
    pub b: Category,
    pub repulsion: f64,
}

/// Suppression layer: discriminative boosts, pair repulsion, attractor mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressionConfig {
    pub boost_increment: f64,
    pub discriminative: Vec<CategoryKeywords>,
    pub pairs: Vec<ConfusablePair>,
    /// Overall strength of the repulsion mechanism.
    pub dominance: f64,
    /// Both sides of a pair must exceed this for repulsion to apply.
    pub activation_threshold: f64,
    /// Added to the mass of a wrongly predicted category.
    pub mass_penalty: f64,
    /// Removed from the mass of the correct category (floored at 0).
    pub mass_relief: f64,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        use Category::*;
        let pair = |a, b| ConfusablePair {
            a,
            b,
            repulsion: 0.5,
        };
        Self {
            boost_increment: 0.3,
            discriminative: vec![
                CategoryKeywords::new(Greeting, &["good morning", "greetings"]),
                CategoryKeywords::new(Help, &["what can you do", "how do i"]),
                CategoryKeywords::new(Status, &["uptime", "diagnostics"]),
                CategoryKeywords::new(Navigation, &["navigate", "take me to"]),
                CategoryKeywords::new(Physics, &["gravity", "momentum", "velocity"]),
                CategoryKeywords::new(Operator, &["eigen", "compose"]),
                CategoryKeywords::new(Structure, &["classification", "classify"]),
            ],
            pairs: vec![
                pair(Physics, Operator),
                pair(Structure, Operator),
                pair(Structure, Physics),
                pair(Help, Status),
                pair(Help, Navigation),
            ],
            dominance: 0.75,
            activation_threshold: 0.1,
            mass_penalty: 0.1,
            mass_relief: 0.05,
        }
    }
}

/// Bridging rule table parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Fixed point of the query-position warp.
    pub center: f64,
    /// Contraction factor `k` of the warp `center + (x - center) / k`.
    pub warp: f64,

    pub structural_keywords: Vec<String>,
    /// Physics vocabulary that vetoes the structural rule.
    pub physics_cues: Vec<String>,
    /// Operator symbols that veto the structural rule.
    pub operator_symbols: Vec<String>,
    pub structural_effect: Vec<Adjustment>,

    pub operator_keywords: Vec<String>,
    pub operator_effect: Vec<Adjustment>,

    pub domain_trigger: String,
    pub domain_effect: Vec<Adjustment>,

    pub band_leader: Category,
    pub band_secondary: Category,
    pub band_low: f64,
    pub band_high: f64,
    /// Minimum score of the secondary category for the band rule.
    pub band_secondary_floor: f64,
    /// Fraction of the leader's score moved to the secondary.
    pub band_transfer: f64,

    /// Maximum signature component below which the signal counts as noise.
    pub low_signal_max: f64,
    /// Leader share of the total above which the low-signal rule can fire.
    pub low_signal_share: f64,
    /// Fraction of the leader's score moved to `Unknown`.
    pub low_signal_transfer: f64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        use Category::*;
        Self {
            center: 107.0,
            warp: 2.0,
            structural_keywords: kw(&[
                "category",
                "categories",
                "classify",
                "classification",
                "channel",
                "layer",
            ]),
            physics_cues: kw(&["energy", "force", "velocity", "gravity", "momentum", "mass"]),
            operator_symbols: kw(&["=", "+", "*", "^"]),
            structural_effect: vec![
                Adjustment::new(Structure, 1.5),
                Adjustment::new(Physics, 0.6),
                Adjustment::new(Operator, 0.6),
            ],
            operator_keywords: kw(&["operator", "apply", "compose", "transform"]),
            operator_effect: vec![
                Adjustment::new(Operator, 1.4),
                Adjustment::new(Physics, 0.7),
            ],
            domain_trigger: "zone".to_string(),
            domain_effect: vec![
                Adjustment::new(Navigation, 1.3),
                Adjustment::new(Status, 0.8),
            ],
            band_leader: Physics,
            band_secondary: Operator,
            band_low: 85.0,
            band_high: 130.0,
            band_secondary_floor: 0.05,
            band_transfer: 0.25,
            low_signal_max: 0.15,
            low_signal_share: 0.6,
            low_signal_transfer: 0.5,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub substrate: SubstrateConfig,
    pub channels: [ChannelConfig; N_CHANNELS],
    pub heads: HeadConfig,
    pub suppression: SuppressionConfig,
    pub bridge: BridgeConfig,
    /// Weight of `Unknown` in the decision for signal-free input (zero
    /// signature, no lexical keyword); every other category weighs 1.
    /// Must exceed 1 so `Unknown` leads, and stays close to 1 so the
    /// confidence sits just above the `1/N` floor.
    pub signal_free_unknown_weight: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            substrate: SubstrateConfig::default(),
            channels: ChannelConfig::defaults(),
            heads: HeadConfig::default(),
            suppression: SuppressionConfig::default(),
            bridge: BridgeConfig::default(),
            signal_free_unknown_weight: 1.05,
        }
    }
}

/// Category whose lexical vocabulary each signature slot carries.
pub const SLOT_CATEGORIES: [Option<Category>; SIGNATURE_DIM] = [
    Some(Category::Greeting),
    Some(Category::Help),
    Some(Category::Status),
    Some(Category::Navigation),
    None,
    Some(Category::Physics),
    Some(Category::Operator),
    Some(Category::Structure),
    None,
    None,
];

/// Sorted, deduplicated keyword set.
fn vocabulary<'a>(words: impl Iterator<Item = &'a String>) -> Vec<&'a str> {
    let mut v: Vec<&str> = words.map(String::as_str).collect();
    v.sort_unstable();
    v.dedup();
    v
}

fn require_same_vocabulary(name: &str, table: &[&str], lexical: &[&str]) -> TriageResult<()> {
    if table != lexical {
        return Err(TriageError::Config(format!(
            "{name} {table:?} must match the lexical table {lexical:?}"
        )));
    }
    Ok(())
}

fn require_subset(name: &str, table: &[&str], lexical: &[&str]) -> TriageResult<()> {
    if let Some(w) = table.iter().find(|w| !lexical.contains(w)) {
        return Err(TriageError::Config(format!(
            "{name}: \"{w}\" is missing from the lexical table"
        )));
    }
    Ok(())
}

fn require_finite(name: &str, value: f64) -> TriageResult<()> {
    if !value.is_finite() {
        return Err(TriageError::Config(format!("{name} must be finite, got {value}")));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> TriageResult<()> {
    require_finite(name, value)?;
    if value <= 0.0 {
        return Err(TriageError::Config(format!("{name} must be > 0, got {value}")));
    }
    Ok(())
}

fn require_non_negative(name: &str, value: f64) -> TriageResult<()> {
    require_finite(name, value)?;
    if value < 0.0 {
        return Err(TriageError::Config(format!("{name} must be >= 0, got {value}")));
    }
    Ok(())
}

fn require_unit(name: &str, value: f64) -> TriageResult<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(TriageError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )));
    }
    Ok(())
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> TriageResult<()> {
        let s = &self.substrate;
        if s.slots.len() != SIGNATURE_DIM {
            return Err(TriageError::Config(format!(
                "substrate needs {SIGNATURE_DIM} slots, got {}",
                s.slots.len()
            )));
        }
        for (i, slot) in s.slots.iter().enumerate() {
            require_non_negative(&format!("slot {i} weight"), slot.weight)?;
        }
        for (i, &r) in s.reference_sequence.iter().enumerate() {
            require_positive(&format!("reference_sequence[{i}]"), r)?;
        }
        require_positive("mirror_sum", s.mirror_sum)?;
        require_positive("coupling_spread", s.coupling_spread)?;
        require_non_negative("mirror_bonus", s.mirror_bonus)?;
        require_positive("temperature", s.temperature)?;
        require_positive("char_scale", s.char_scale)?;

        for (i, ch) in self.channels.iter().enumerate() {
            if ch.kind != ChannelKind::ALL[i] {
                return Err(TriageError::Config(format!(
                    "channel {i} must be {}, got {}",
                    ChannelKind::ALL[i],
                    ch.kind
                )));
            }
            require_finite(&format!("{} bias", ch.kind), ch.bias)?;
            require_positive(&format!("{} scale", ch.kind), ch.scale)?;
            require_non_negative(&format!("{} jitter", ch.kind), ch.jitter)?;
            require_non_negative(&format!("{} trust", ch.kind), ch.trust)?;
            for &a in &ch.affinity {
                require_finite(&format!("{} affinity", ch.kind), a)?;
            }
        }

        let h = &self.heads;
        require_non_negative("phrase_bonus", h.phrase_bonus)?;
        require_non_negative("no_match_unknown_weight", h.no_match_unknown_weight)?;
        require_finite("subspace_offset", h.subspace_offset)?;
        require_positive("concentration_threshold", h.concentration_threshold)?;
        for row in &h.subspace {
            for &c in row {
                require_finite("subspace coefficient", c)?;
            }
        }
        for r in h
            .symmetry_routes
            .iter()
            .chain(&h.concentration_routes)
            .chain(&h.uniformity_routes)
        {
            require_non_negative("shape route weight", r.weight)?;
        }

        let sup = &self.suppression;
        require_non_negative("boost_increment", sup.boost_increment)?;
        require_non_negative("dominance", sup.dominance)?;
        require_non_negative("activation_threshold", sup.activation_threshold)?;
        require_non_negative("mass_penalty", sup.mass_penalty)?;
        require_non_negative("mass_relief", sup.mass_relief)?;
        for p in &sup.pairs {
            if p.a == p.b {
                return Err(TriageError::Config(format!(
                    "confusable pair must join two categories, got {} twice",
                    p.a
                )));
            }
            require_non_negative("repulsion", p.repulsion)?;
        }

        let b = &self.bridge;
        require_finite("center", b.center)?;
        require_positive("warp", b.warp)?;
        require_finite("band_low", b.band_low)?;
        require_finite("band_high", b.band_high)?;
        if b.band_low > b.band_high {
            return Err(TriageError::Config(format!(
                "band_low must be <= band_high, got {} > {}",
                b.band_low, b.band_high
            )));
        }
        require_unit("band_transfer", b.band_transfer)?;
        require_unit("low_signal_share", b.low_signal_share)?;
        require_unit("low_signal_transfer", b.low_signal_transfer)?;
        require_non_negative("band_secondary_floor", b.band_secondary_floor)?;
        require_non_negative("low_signal_max", b.low_signal_max)?;
        for adj in b
            .structural_effect
            .iter()
            .chain(&b.operator_effect)
            .chain(&b.domain_effect)
        {
            require_non_negative("bridge factor", adj.factor)?;
        }
        if b.domain_trigger.trim().is_empty() {
            return Err(TriageError::Config("domain_trigger must not be empty".into()));
        }

        require_finite("signal_free_unknown_weight", self.signal_free_unknown_weight)?;
        if self.signal_free_unknown_weight <= 1.0 {
            return Err(TriageError::Config(format!(
                "signal_free_unknown_weight must be > 1, got {}",
                self.signal_free_unknown_weight
            )));
        }

        self.validate_vocabulary()
    }

    /// Category vocabulary is listed in several tables; they must agree.
    fn validate_vocabulary(&self) -> TriageResult<()> {
        for (slot, category) in self.substrate.slots.iter().zip(SLOT_CATEGORIES) {
            if let Some(c) = category {
                require_same_vocabulary(
                    &format!("{c} substrate slot"),
                    &vocabulary(slot.keywords.iter()),
                    &self.lexical_vocabulary(c),
                )?;
            }
        }

        let b = &self.bridge;
        require_same_vocabulary(
            "structural_keywords",
            &vocabulary(b.structural_keywords.iter()),
            &self.lexical_vocabulary(Category::Structure),
        )?;
        require_same_vocabulary(
            "physics_cues",
            &vocabulary(b.physics_cues.iter()),
            &self.lexical_vocabulary(Category::Physics),
        )?;
        require_subset(
            "operator_keywords",
            &vocabulary(b.operator_keywords.iter()),
            &self.lexical_vocabulary(Category::Operator),
        )?;
        for table in &self.suppression.discriminative {
            require_subset(
                &format!("{} discriminative keywords", table.category),
                &vocabulary(table.keywords.iter()),
                &self.lexical_vocabulary(table.category),
            )?;
        }
        Ok(())
    }

    fn lexical_vocabulary(&self, category: Category) -> Vec<&str> {
        vocabulary(
            self.heads
                .lexical
                .iter()
                .filter(|t| t.category == category)
                .flat_map(|t| t.keywords.iter()),
        )
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> TriageResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TriageError::Config(format!("JSON parse error: {e}")))
    }

    /// Trust weights in channel order.
    pub fn trust_weights(&self) -> [f64; N_CHANNELS] {
        [
            self.channels[0].trust,
            self.channels[1].trust,
            self.channels[2].trust,
        ]
    }
}
