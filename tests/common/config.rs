//! Test configuration builders

use mediasheet::{CompletionPolicy, Config, FetchConfig};

/// Fetch settings suited to fast in-memory tests
pub fn test_fetch_config() -> FetchConfig {
    FetchConfig {
        max_concurrent_resolutions: 3,
        ..FetchConfig::default()
    }
}

/// Full configuration with a small selection limit
pub fn test_config(selected_limit: usize) -> Config {
    let mut config = Config::default();
    config.selection.selected_limit = selected_limit;
    config.fetch = test_fetch_config();
    config
}

/// Fetch settings that deliver nothing when any item fails
pub fn strict_fetch_config() -> FetchConfig {
    FetchConfig {
        completion_policy: CompletionPolicy::AllOrNothing,
        ..test_fetch_config()
    }
}
