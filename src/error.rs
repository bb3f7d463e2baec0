//! Error taxonomy (spec §7): kinds, not type names.
//!
//! Validation and Resource/Admission errors are typed so callers can match on
//! them; External and Fatal failures are swallowed or escalated at the
//! boundary that owns them (see `match_engine::Match::abort_on_fault`).

use thiserror::Error;

/// Config/loot/arena document rejected at load time. Surfaced at start-up;
/// the engine refuses to run.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("loot entry for `{item}` has non-positive weight {weight}")]
    NonPositiveWeight { item: String, weight: f64 },

    #[error("loot entry for `{item}` has min-amount {min} greater than max-amount {max}")]
    MinGreaterThanMax { item: String, min: u32, max: u32 },

    #[error("arena bounds invalid: radius must be positive, got {radius}")]
    InvalidBounds { radius: i64 },

    #[error("config value `{key}` rejected: {reason}")]
    BadConfigValue { key: String, reason: String },
}
