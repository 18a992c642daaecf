//! Configuration types for mediasheet

use crate::error::{Error, Result};
use crate::network::{DeliveryQuality, NetworkStateProbe, requires_confirmation};
use crate::types::CompletionPolicy;
use serde::{Deserialize, Serialize};

/// Selection behavior configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SelectionConfig {
    /// Maximum number of items that can be selected at once (default: 9)
    #[serde(default = "default_selected_limit")]
    pub selected_limit: usize,

    /// Number of library items offered by the picker (default: 20)
    ///
    /// Not enforced by the selection model; carried for the presentation layer.
    #[serde(default = "default_displayed_limit")]
    pub displayed_limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            selected_limit: default_selected_limit(),
            displayed_limit: default_displayed_limit(),
        }
    }
}

/// Fetch behavior configuration (concurrency, progress presentation, failure policy)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    /// Maximum number of items resolved concurrently within one batch (default: 4)
    #[serde(default = "default_max_concurrent_resolutions")]
    pub max_concurrent_resolutions: usize,

    /// Lowest progress value forwarded once a batch has started (default: 0.15)
    ///
    /// Signals "in progress" rather than "not started" to the consumer. Must be
    /// within `[0, 1]`.
    #[serde(default = "default_progress_floor")]
    pub progress_floor: f64,

    /// Share of a video item's progress attributed to its image phase (default: 0.2)
    ///
    /// The remaining share covers the video export, which is usually much slower.
    #[serde(default = "default_video_image_share")]
    pub video_image_share: f64,

    /// Default failure policy for batches started without explicit options
    #[serde(default)]
    pub completion_policy: CompletionPolicy,

    /// Whether the "send originals" path is offered to the user (default: false)
    ///
    /// Consulted by [`FetchConfig::requires_confirmation`].
    #[serde(default)]
    pub offer_originals: bool,

    /// Capacity of the event broadcast channel (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_resolutions: default_max_concurrent_resolutions(),
            progress_floor: default_progress_floor(),
            video_image_share: default_video_image_share(),
            completion_policy: CompletionPolicy::default(),
            offer_originals: false,
            event_buffer: default_event_buffer(),
        }
    }
}

/// Main configuration for mediasheet
///
/// Fields are organized into logical sub-configs:
/// - [`selection`](SelectionConfig) - selection capacity
/// - [`fetch`](FetchConfig) - concurrency, progress floor, failure policy
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Selection settings
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Fetch settings
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Parse a JSON configuration and validate it
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        self.selection.validate()?;
        self.fetch.validate()
    }
}

impl SelectionConfig {
    /// Check that the selection settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.selected_limit == 0 {
            return Err(Error::config(
                "selected_limit",
                "selected_limit must be at least 1",
            ));
        }
        Ok(())
    }
}

impl FetchConfig {
    /// Whether sending at `quality` must first be confirmed by the user
    ///
    /// See [`requires_confirmation`](crate::network::requires_confirmation).
    pub fn requires_confirmation(
        &self,
        quality: DeliveryQuality,
        probe: &dyn NetworkStateProbe,
    ) -> bool {
        requires_confirmation(quality, self.offer_originals, probe)
    }

    /// Check that the fetch settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_resolutions == 0 {
            return Err(Error::config(
                "max_concurrent_resolutions",
                "max_concurrent_resolutions must be at least 1",
            ));
        }
        if !unit_interval(self.progress_floor) {
            return Err(Error::config(
                "progress_floor",
                format!(
                    "progress_floor must be within [0, 1], got {}",
                    self.progress_floor
                ),
            ));
        }
        if !unit_interval(self.video_image_share) {
            return Err(Error::config(
                "video_image_share",
                format!(
                    "video_image_share must be within [0, 1], got {}",
                    self.video_image_share
                ),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::config(
                "event_buffer",
                "event_buffer must be at least 1",
            ));
        }
        Ok(())
    }
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

fn default_selected_limit() -> usize {
    9
}

fn default_displayed_limit() -> usize {
    20
}

fn default_max_concurrent_resolutions() -> usize {
    4
}

fn default_progress_floor() -> f64 {
    0.15
}

fn default_video_image_share() -> f64 {
    0.2
}

fn default_event_buffer() -> usize {
    256
}
