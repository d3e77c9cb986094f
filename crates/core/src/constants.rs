//! Constants used throughout the MDM core crate.

/// `tracing` target for per-match troubleshooting events.
pub const TROUBLESHOOTING_TARGET: &str = "mdm_troubleshooting";

/// Confidence attached to deterministic (identifier) matches.
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Default lower bound for a `SCORED_MATCH`.
pub const DEFAULT_CERTAIN_THRESHOLD: f64 = 0.9;

/// Default lower bound for a `POSSIBLE_MATCH`.
pub const DEFAULT_POSSIBLE_THRESHOLD: f64 = 0.6;

/// Key in `eidSystems` that applies to every entity type.
pub const ANY_ENTITY_TYPE: &str = "*";

/// Rules document version understood by this crate.
pub const RULES_VERSION: &str = "1";
