//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `HEALTH_PROBE_TIMEOUT_MS_DEFAULT` (not `DEFAULT_PROBE_TIMEOUT`)
//!
//! Every constant includes units in the name:
//! - _`BYTES_MAX/MIN` for size limits
//! - _`MS_DEFAULT/MAX` for millisecond durations
//! - _`COUNT_MAX` for quantity limits

// =============================================================================
// Health Monitoring
// =============================================================================

/// Default per-backend health probe timeout
pub const HEALTH_PROBE_TIMEOUT_MS_DEFAULT: u64 = 3_000;

/// Maximum configurable health probe timeout
pub const HEALTH_PROBE_TIMEOUT_MS_MAX: u64 = 30_000;

/// Number of backend variants in the closed adapter set
pub const BACKENDS_COUNT_MAX: usize = 3;

// =============================================================================
// Operation Deadlines
// =============================================================================

/// Default deadline bounding a full fan-out write
pub const WRITE_DEADLINE_MS_DEFAULT: u64 = 10_000;

/// Default deadline bounding a precedence-ordered read
pub const READ_DEADLINE_MS_DEFAULT: u64 = 5_000;

/// Maximum configurable operation deadline
pub const OP_DEADLINE_MS_MAX: u64 = 60_000;

// =============================================================================
// Record Limits
// =============================================================================

/// Maximum length of a user ID
pub const USER_ID_BYTES_MAX: usize = 256;

/// Maximum length of a track ID
pub const TRACK_ID_BYTES_MAX: usize = 256;

/// Maximum number of listening events in one append batch
pub const LISTENING_BATCH_COUNT_MAX: usize = 1_000;

/// Maximum serialized size of a user profile
pub const USER_PROFILE_BYTES_MAX: usize = 64 * 1024; // 64KB

// =============================================================================
// Recommendation Queries
// =============================================================================

/// Default number of recommendations returned
pub const RECOMMENDATIONS_LIMIT_DEFAULT: usize = 10;

/// Maximum number of recommendations returned
pub const RECOMMENDATIONS_LIMIT_MAX: usize = 100;

/// Most recent tracks included in a recommendation prompt
pub const RECOMMEND_HISTORY_TRACKS_MAX: usize = 20;

// =============================================================================
// Analytics
// =============================================================================

/// Base for human-readable size formatting (binary scale)
pub const ANALYTICS_SIZE_UNIT_BYTES: u64 = 1024;

/// Decimal places in human-readable sizes
pub const ANALYTICS_SIZE_DECIMALS_COUNT: usize = 2;

// =============================================================================
// LLM Provider Limits
// =============================================================================

/// Maximum prompt size accepted by a language model provider
pub const LLM_PROMPT_BYTES_MAX: usize = 100_000;

/// Maximum response size accepted from a language model provider
pub const LLM_RESPONSE_BYTES_MAX: usize = 1_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_ordering() {
        assert!(HEALTH_PROBE_TIMEOUT_MS_DEFAULT < WRITE_DEADLINE_MS_DEFAULT);
        assert!(READ_DEADLINE_MS_DEFAULT <= WRITE_DEADLINE_MS_DEFAULT);
        assert!(WRITE_DEADLINE_MS_DEFAULT <= OP_DEADLINE_MS_MAX);
    }

    #[test]
    fn test_limits_nonzero() {
        assert!(LISTENING_BATCH_COUNT_MAX > 0);
        assert!(RECOMMENDATIONS_LIMIT_DEFAULT <= RECOMMENDATIONS_LIMIT_MAX);
        assert_eq!(BACKENDS_COUNT_MAX, 3);
    }
}
