// ─────────────────────────────────────────────────────────────────────
// Triage Kernel — Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Deterministic multi-channel intent triage for short text queries.
//!
//! A query flows through six stages, each in its own module:
//!
//! ```text
//! text ─► substrate ─► channel ─► heads ─► fuse ─► suppression ─► bridge ─► Decision
//!          signature   3 gates    3 views          boost+repel    rules
//! ```
//!
//! # Guarantees
//!
//! 1. **Total**: `classify` never fails. Empty text, emoji and text with
//!    no known vocabulary all produce a valid [`triage_types::Decision`].
//!
//! 2. **Normalised**: every head output and the final score map sum to 1
//!    and contain only finite, non-negative values.
//!
//! 3. **Deterministic**: filter jitter is seeded, so two engines built
//!    from the same configuration agree on every input until one of them
//!    receives feedback.
//!
//! 4. **Shareable**: filters, counters and attractor mass live behind
//!    `parking_lot` locks; a `TriageEngine` can be classified against
//!    from many threads at once.

pub mod bridge;
pub mod channel;
pub mod engine;
pub mod heads;
pub mod substrate;
pub mod suppression;

pub use bridge::BridgeLayer;
pub use channel::{Channel, ChannelCounters, ChannelLayer};
pub use engine::{EngineState, TriageEngine};
pub use heads::{ClassifierHeads, ShapeFeatures};
pub use substrate::{FeatureSubstrate, Heated, TransformMatrix};
pub use suppression::Suppressor;
