use std::fmt;
use std::path::Path;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::sky::ObserverSite;

/// Unit-wide configuration. Every field has a default, so a partial file
/// (or none at all) yields a runnable setup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    pub name: String,
    pub site: SiteConfig,
    pub horizons: HorizonConfig,
    pub timing: TimingConfig,
    pub scheduler: SchedulerConfig,
    pub max_transition_attempts: u32,
    pub run_once: bool,
    /// Subsystems replaced by simulators, e.g. `weather` or `night`.
    pub simulators: Vec<String>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            name: "ARGUS".to_string(),
            site: SiteConfig::default(),
            horizons: HorizonConfig::default(),
            timing: TimingConfig::default(),
            scheduler: SchedulerConfig::default(),
            max_transition_attempts: 5,
            run_once: false,
            simulators: Vec::new(),
        }
    }
}

/// Observatory location; defaults to Mauna Loa.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { latitude: 19.54, longitude: -155.58, elevation: 3400.0 }
    }
}

impl SiteConfig {
    pub fn observer_site(&self) -> ObserverSite {
        ObserverSite::new(self.latitude, self.longitude, self.elevation)
    }
}

/// Altitude limits in degrees. `horizon` is the minimum target altitude;
/// the rest are sun altitudes backing the state table's named horizons.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HorizonConfig {
    pub horizon: f64,
    pub flat: f64,
    pub focus: f64,
    pub observe: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self { horizon: 30.0, flat: -6.0, focus: -12.0, observe: -18.0 }
    }
}

impl HorizonConfig {
    /// The sun-altitude limit a named state-table horizon refers to.
    pub fn sun_limit(&self, name: &str) -> Option<f64> {
        match name {
            "flat" => Some(self.flat),
            "focus" => Some(self.focus),
            "observe" => Some(self.observe),
            _ => None,
        }
    }
}

/// Loop and hardware timing, as plain seconds in the file; the accessors
/// on [`UnitConfig`] hand out [`TimeDelta`]s.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub wait_delay: f64,
    pub retry_wait: f64,
    pub status_check_interval: f64,
    pub cancel_grace: f64,
    pub init_timeout: f64,
    pub slew_timeout: f64,
    pub park_timeout: f64,
    pub exposure_overhead: f64,
    pub safety_delay: f64,
    pub weather_stale: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            wait_delay: 180.0,
            retry_wait: 7.0,
            status_check_interval: 60.0,
            cancel_grace: 10.0,
            init_timeout: 300.0,
            slew_timeout: 300.0,
            park_timeout: 300.0,
            exposure_overhead: 30.0,
            safety_delay: 900.0,
            weather_stale: 180.0,
        }
    }
}

/// Weights and limits for the default constraint set.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub altitude_weight: f64,
    pub moon_weight: f64,
    pub duration_weight: f64,
    pub moon_min_separation: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            altitude_weight: 1.0,
            moon_weight: 1.0,
            duration_weight: 0.5,
            moon_min_separation: 15.0,
        }
    }
}

impl UnitConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn simulates(&self, what: &str) -> bool {
        self.simulators.iter().any(|s| s == what)
    }

    pub fn wait_delay(&self) -> TimeDelta { secs(self.timing.wait_delay) }
    pub fn retry_wait(&self) -> TimeDelta { secs(self.timing.retry_wait) }
    pub fn status_check_interval(&self) -> TimeDelta { secs(self.timing.status_check_interval) }
    pub fn cancel_grace(&self) -> TimeDelta { secs(self.timing.cancel_grace) }
    pub fn init_timeout(&self) -> TimeDelta { secs(self.timing.init_timeout) }
    pub fn slew_timeout(&self) -> TimeDelta { secs(self.timing.slew_timeout) }
    pub fn park_timeout(&self) -> TimeDelta { secs(self.timing.park_timeout) }
    pub fn exposure_overhead(&self) -> TimeDelta { secs(self.timing.exposure_overhead) }
    pub fn safety_delay(&self) -> TimeDelta { secs(self.timing.safety_delay) }
    pub fn weather_stale(&self) -> TimeDelta { secs(self.timing.weather_stale) }
}

#[allow(clippy::cast_possible_truncation)]
fn secs(value: f64) -> TimeDelta {
    TimeDelta::milliseconds((value * 1000.0) as i64)
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read configuration: {e}"),
            ConfigError::Parse(e) => write!(f, "could not parse configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self { ConfigError::Io(e) }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self { ConfigError::Parse(e) }
}
