pub mod mock_surface;

use quill::InputConfig;

/// Configuration with short delays so scenario tests stay fast under the
/// paused test clock.
#[allow(dead_code)]
pub fn test_config() -> InputConfig {
    InputConfig {
        cleanup_delay_ms: 10,
        init_timeout_secs: 1,
        chunk_pacing_delay_ms: 20,
        ..InputConfig::default()
    }
}
