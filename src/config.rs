//! Capture configuration.
//!
//! The capability set chooses which side paths run for a PPDU. Changes are
//! latched at PPDU boundaries by the dispatcher so a PPDU already in flight
//! finishes under the configuration it started with.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// M-copy operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McopyMode {
    #[default]
    Disabled,
    /// Deliver every FCS-passing MPDU.
    Full,
    /// Deliver at most one MSDU per PPDU id.
    Single,
}

impl McopyMode {
    pub fn enabled(self) -> bool {
        self != McopyMode::Disabled
    }
}

/// Capability set controlling the monitor side paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Build and publish per-PPDU indications and peer stats.
    pub enhanced_stats: bool,
    pub mcopy: McopyMode,
    /// Correlate channel-frequency-response captures.
    pub cfr: bool,
    /// Raw first-MSDU delivery to the monitor interface.
    pub smart_mesh: bool,
    /// Publish raw hardware descriptors for every destination MSDU.
    pub pktlog_full: bool,
    /// Publish compressed beamforming report frames.
    pub pktlog_cbf: bool,
}

impl CaptureConfig {
    pub fn from_yaml(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Any capability that consumes PPDU status is on.
    pub fn any_status_consumer(self) -> bool {
        self.enhanced_stats || self.mcopy.enabled() || self.cfr || self.smart_mesh
    }
}
