//! Send-strategy selection.
//!
//! Selection is a pure, total function of message length and configuration:
//! no hidden state, no browser dependency, exercised directly in tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::InputConfig;

/// Delivery strategy for a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One direct injection plus submit; no fallback.
    SafeSingle,
    /// Attempt a single injection; on failed verification, fall back to
    /// chunked delivery of the same message, at most once.
    TrySingleThenChunk,
    /// Split into paced chunks and submit once after the final chunk.
    SmartChunking,
}

impl Strategy {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SafeSingle => "safe_single",
            Self::TrySingleThenChunk => "try_single_then_chunk",
            Self::SmartChunking => "smart_chunking",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Select a delivery strategy from message length.
///
/// - `length <= safe_send_limit` → [`Strategy::SafeSingle`]
/// - `safe_send_limit < length <= chunk_threshold` → [`Strategy::TrySingleThenChunk`]
/// - `length > chunk_threshold` → [`Strategy::SmartChunking`]
#[must_use]
pub const fn select(length: usize, config: &InputConfig) -> Strategy {
    if length <= config.safe_send_limit {
        Strategy::SafeSingle
    } else if length <= config.chunk_threshold {
        Strategy::TrySingleThenChunk
    } else {
        Strategy::SmartChunking
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_boundary_values_with_defaults() {
        let config = InputConfig::default();

        // safe_send_limit = 150, chunk_threshold = 4000
        let cases = [
            (149, Strategy::SafeSingle),
            (150, Strategy::SafeSingle),
            (151, Strategy::TrySingleThenChunk),
            (4000, Strategy::TrySingleThenChunk),
            (4001, Strategy::SmartChunking),
        ];
        for (length, expected) in cases {
            assert_eq!(select(length, &config), expected, "length {length}");
        }
    }

    #[test]
    fn test_length_categories() {
        let config = InputConfig::default();

        assert_eq!(select(0, &config), Strategy::SafeSingle);
        assert_eq!(select(10, &config), Strategy::SafeSingle);
        assert_eq!(select(100, &config), Strategy::SafeSingle);
        assert_eq!(select(500, &config), Strategy::TrySingleThenChunk);
        assert_eq!(select(2000, &config), Strategy::TrySingleThenChunk);
        assert_eq!(select(8000, &config), Strategy::SmartChunking);
        assert_eq!(select(usize::MAX, &config), Strategy::SmartChunking);
    }

    #[test]
    fn test_custom_limits() {
        let config = InputConfig {
            safe_send_limit: 100,
            chunk_threshold: 1000,
            ..Default::default()
        };

        assert_eq!(select(99, &config), Strategy::SafeSingle);
        assert_eq!(select(101, &config), Strategy::TrySingleThenChunk);
        assert_eq!(select(1001, &config), Strategy::SmartChunking);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let config = InputConfig::default();
        for length in [0, 1, 150, 151, 4000, 4001, 32_000] {
            assert_eq!(select(length, &config), select(length, &config));
        }
    }

    #[test]
    fn test_strategy_labels() {
        assert_eq!(Strategy::SafeSingle.to_string(), "safe_single");
        assert_eq!(
            Strategy::TrySingleThenChunk.to_string(),
            "try_single_then_chunk"
        );
        assert_eq!(Strategy::SmartChunking.to_string(), "smart_chunking");
    }
}
