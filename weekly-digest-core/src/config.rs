use chrono_tz::Tz;
use tracing::{debug, info};

use crate::week::{parse_time_zone, InvalidTimeZone, DEFAULT_TIME_ZONE};

/// Settings the merge engine is constructed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Zone used to place submissions into weeks when a request names none.
    pub default_time_zone: Tz,
}

impl EngineConfig {
    pub fn new(default_time_zone: Tz) -> Self {
        Self { default_time_zone }
    }

    pub fn from_time_zone_name(name: &str) -> Result<Self, InvalidTimeZone> {
        Ok(Self::new(parse_time_zone(name)?))
    }

    pub fn trace_loaded(&self) {
        info!(
            default_time_zone = %self.default_time_zone,
            "Loaded EngineConfig"
        );
        debug!(?self, "EngineConfig loaded (full debug)");
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_ZONE)
    }
}
