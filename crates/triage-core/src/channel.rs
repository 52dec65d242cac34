// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Channel Layer
// ─────────────────────────────────────────────────────────────────────
//! Three gates reading the same heated vector in different styles.
//!
//! `activation = clamp(scale · act(Σ heated_i · filter_i + bias), 0, 1)`
//!
//! Filters sit behind an `RwLock` and only change through
//! [`Channel::update_filter`]. Flow counters sit behind a separate
//! `Mutex` so [`Channel::respond`] stays a pure read.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use triage_types::config::ChannelConfig;
use triage_types::error::{check_dimension, TriageError, TriageResult};
use triage_types::{clamp_score, Activation, ChannelKind, Vector, N_CHANNELS, SIGNATURE_DIM};

/// Minimal xorshift64 RNG for filter jitter (no external dep).
struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0xDEAD_BEEF_CAFE_BABE } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Monotonic per-channel counters. Never reset by `activate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelCounters {
    /// Sum of every activation this channel has produced.
    pub flow: f64,
    pub activations: u64,
}

pub struct Channel {
    kind: ChannelKind,
    activation: Activation,
    bias: f64,
    scale: f64,
    filter: RwLock<Vector>,
    counters: Mutex<ChannelCounters>,
}

impl Channel {
    pub fn from_config(config: &ChannelConfig) -> Self {
        let mut rng = SimpleRng::new(config.seed);
        let mut filter = config.affinity;
        for f in filter.iter_mut() {
            *f += (2.0 * rng.next_f64() - 1.0) * config.jitter;
        }
        Self {
            kind: config.kind,
            activation: config.activation,
            bias: config.bias,
            scale: config.scale,
            filter: RwLock::new(filter),
            counters: Mutex::new(ChannelCounters::default()),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Activation for `heated` without touching the counters.
    pub fn respond(&self, heated: &Vector) -> f64 {
        let filter = self.filter.read();
        let drive: f64 = heated.iter().zip(filter.iter()).map(|(h, f)| h * f).sum();
        clamp_score(self.scale * self.activation.apply(drive + self.bias), 0.0, 1.0)
    }

    /// [`respond`](Self::respond), then bump flow and activation count.
    pub fn activate(&self, heated: &Vector) -> f64 {
        let a = self.respond(heated);
        let mut counters = self.counters.lock();
        counters.flow += a;
        counters.activations += 1;
        a
    }

    /// Gradient step on the filter: `filter_i -= learning_rate · gradient_i`.
    ///
    /// Offline tuning only; nothing in the classification path calls this.
    pub fn update_filter(&self, gradient: &[f64], learning_rate: f64) -> TriageResult<()> {
        check_dimension(SIGNATURE_DIM, gradient.len())?;
        if !learning_rate.is_finite() {
            return Err(TriageError::Numerical(format!(
                "learning_rate is not finite: {learning_rate}"
            )));
        }
        if let Some(i) = gradient.iter().position(|g| !g.is_finite()) {
            return Err(TriageError::Numerical(format!(
                "gradient[{i}] is not finite: {}",
                gradient[i]
            )));
        }

        let mut filter = self.filter.write();
        for (f, g) in filter.iter_mut().zip(gradient) {
            *f -= learning_rate * g;
        }
        log::info!("{} filter updated (lr={learning_rate})", self.kind);
        Ok(())
    }

    pub fn filter(&self) -> Vector {
        *self.filter.read()
    }

    pub(crate) fn set_filter(&self, filter: Vector) {
        *self.filter.write() = filter;
    }

    pub fn counters(&self) -> ChannelCounters {
        *self.counters.lock()
    }
}

/// The three channels in [`ChannelKind::ALL`] order.
pub struct ChannelLayer {
    channels: [Channel; N_CHANNELS],
}

impl ChannelLayer {
    pub fn new(configs: &[ChannelConfig; N_CHANNELS]) -> Self {
        Self {
            channels: std::array::from_fn(|i| Channel::from_config(&configs[i])),
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> &Channel {
        &self.channels[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn activate_all(&self, heated: &Vector) -> [f64; N_CHANNELS] {
        std::array::from_fn(|i| self.channels[i].activate(heated))
    }

    pub fn respond_all(&self, heated: &Vector) -> [f64; N_CHANNELS] {
        std::array::from_fn(|i| self.channels[i].respond(heated))
    }
}
