//! Network state probing and the metered-connection confirmation decision.
//!
//! The coordinator executes whatever batch it is given; deciding whether to ask
//! the user before sending originals over a metered connection belongs to the
//! surrounding flow. This module gives that flow the pieces it needs.

use crate::types::FetchResult;
use crate::utils::format_size;
use serde::{Deserialize, Serialize};

/// Reports whether the current network connection is metered
pub trait NetworkStateProbe: Send + Sync {
    /// True when large transfers should be confirmed with the user
    fn is_metered(&self) -> bool;
}

/// Probe with a fixed answer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaticNetworkProbe {
    metered: bool,
}

impl StaticNetworkProbe {
    /// Probe that always reports `metered`
    pub fn new(metered: bool) -> Self {
        Self { metered }
    }
}

impl NetworkStateProbe for StaticNetworkProbe {
    fn is_metered(&self) -> bool {
        self.metered
    }
}

/// Quality requested by the user when sending
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryQuality {
    /// Display-sized payloads
    #[default]
    Optimized,
    /// Original-quality payloads
    Original,
}

/// Whether the user must confirm the send before the result is delivered
///
/// Only original-quality sends, when originals are offered at all, on a metered
/// connection require confirmation.
pub fn requires_confirmation(
    quality: DeliveryQuality,
    offer_originals: bool,
    probe: &dyn NetworkStateProbe,
) -> bool {
    quality == DeliveryQuality::Original && offer_originals && probe.is_metered()
}

/// Size summary shown when confirming a metered send
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSummary {
    /// Number of payloads about to be sent
    pub items: usize,
    /// Total size in bytes
    pub total_bytes: u64,
}

impl SendSummary {
    /// Summarize a completed fetch
    pub fn from_result(result: &FetchResult) -> Self {
        Self {
            items: result.len(),
            total_bytes: result.total_size_bytes(),
        }
    }

    /// Human-readable total size
    pub fn total_size(&self) -> String {
        format_size(self.total_bytes)
    }
}
