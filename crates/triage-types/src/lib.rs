// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! Triage Kernel, the intent classification and disambiguation engine.

pub mod category;
pub mod config;
pub mod error;
pub mod score;

pub use category::{Category, ChannelKind, N_CATEGORIES, N_CHANNELS};
pub use config::{Activation, EngineConfig};
pub use error::{TriageError, TriageResult};
pub use score::{
    clamp_score, BridgeRuleKind, Decision, Diagnostics, ScoreMap, Vector, EPSILON, SIGNATURE_DIM,
};
