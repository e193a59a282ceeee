use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

use crate::sky::{self, ObserverSite};

/// Latest word from the weather source, stamped so staleness is judgeable.
#[derive(Debug, Clone)]
pub struct WeatherReading {
    pub safe: bool,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl WeatherReading {
    pub fn good(detail: impl Into<String>) -> Self {
        Self { safe: true, detail: detail.into(), at: Utc::now() }
    }

    pub fn bad(detail: impl Into<String>) -> Self {
        Self { safe: false, detail: detail.into(), at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe(String),
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            SafetyVerdict::Safe => None,
            SafetyVerdict::Unsafe(reason) => Some(reason),
        }
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyVerdict::Safe => write!(f, "SAFE"),
            SafetyVerdict::Unsafe(reason) => write!(f, "UNSAFE ({reason})"),
        }
    }
}

/// Gatekeeper for everything that may only happen under a good sky.
///
/// Every call to [`SafetyMonitor::verdict`] re-evaluates all sources; no
/// verdict is ever cached. A bad or stale weather reading arms a cooldown,
/// so conditions must hold good for a while before operations resume. A
/// feed that has not delivered anything yet is unsafe on its own, without
/// arming the cooldown.
pub struct SafetyMonitor {
    site: ObserverSite,
    observe_horizon_deg: f64,
    weather_stale: TimeDelta,
    safety_delay: TimeDelta,
    simulate_night: bool,
    weather_rx: watch::Receiver<Option<WeatherReading>>,
    hardware_fault: Option<String>,
    cooldown_until: Option<DateTime<Utc>>,
}

impl SafetyMonitor {
    pub fn new(
        site: ObserverSite,
        observe_horizon_deg: f64,
        weather_stale: TimeDelta,
        safety_delay: TimeDelta,
        simulate_night: bool,
        weather_rx: watch::Receiver<Option<WeatherReading>>,
    ) -> Self {
        Self {
            site,
            observe_horizon_deg,
            weather_stale,
            safety_delay,
            simulate_night,
            weather_rx,
            hardware_fault: None,
            cooldown_until: None,
        }
    }

    /// Fresh verdict for `now`. Order matters: a hardware fault trumps
    /// everything, weather trouble (bad or stale) arms the cooldown, the
    /// cooldown must drain, and only then does darkness get a say.
    pub fn verdict(&mut self, now: DateTime<Utc>) -> SafetyVerdict {
        if let Some(fault) = &self.hardware_fault {
            return SafetyVerdict::Unsafe(format!("hardware fault: {fault}"));
        }
        let Some(reading) = self.weather_rx.borrow().clone() else {
            return SafetyVerdict::Unsafe("no weather data yet".to_string());
        };
        let age = now - reading.at;
        if age > self.weather_stale {
            self.cooldown_until = Some(now + self.safety_delay);
            return SafetyVerdict::Unsafe(format!(
                "weather data stale ({} s old)",
                age.num_seconds()
            ));
        }
        if !reading.safe {
            self.cooldown_until = Some(now + self.safety_delay);
            return SafetyVerdict::Unsafe(format!("weather: {}", reading.detail));
        }
        if let Some(until) = self.cooldown_until {
            if now < until {
                return SafetyVerdict::Unsafe(format!(
                    "conditions settling, {} s of cooldown left",
                    (until - now).num_seconds()
                ));
            }
            self.cooldown_until = None;
        }
        if !self.is_dark(now) {
            return SafetyVerdict::Unsafe("sun above observing horizon".to_string());
        }
        SafetyVerdict::Safe
    }

    pub fn is_dark(&self, now: DateTime<Utc>) -> bool {
        self.simulate_night || sky::sun_altitude_deg(self.site, now) <= self.observe_horizon_deg
    }

    /// Latches a fault until explicitly cleared. Used for hardware that
    /// ignored a cancellation request.
    pub fn flag_hardware_fault(&mut self, what: impl Into<String>) {
        self.hardware_fault = Some(what.into());
    }

    pub fn clear_hardware_fault(&mut self) {
        self.hardware_fault = None;
    }
}
