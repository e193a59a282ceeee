use chrono::{DateTime, TimeDelta, Utc};

use super::observation::Observation;
use crate::sky::{self, ObserverSite, SkyPos};

/// Verdict of one constraint for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    /// The candidate cannot be observed right now at all.
    Veto,
    /// Merit in `[0, 1]`, scaled by the constraint's weight when summed.
    Value(f64),
}

/// Sky snapshot a whole scheduling pass is judged against. Computed once
/// per pass so candidates compete under identical conditions.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext {
    pub time: DateTime<Utc>,
    pub site: ObserverSite,
    pub moon: SkyPos,
    pub end_of_night: DateTime<Utc>,
}

/// One pluggable scheduling criterion.
pub trait Constraint: Send + Sync {
    fn name(&self) -> &'static str;
    fn weight(&self) -> f64;
    fn score(&self, ctx: &ScoringContext, obs: &Observation) -> Score;
}

/// Rejects targets below the local altitude limit.
pub struct Altitude {
    weight: f64,
    min_altitude_deg: f64,
}

impl Altitude {
    pub fn new(weight: f64, min_altitude_deg: f64) -> Self {
        Self { weight, min_altitude_deg }
    }
}

impl Constraint for Altitude {
    fn name(&self) -> &'static str { "altitude" }
    fn weight(&self) -> f64 { self.weight }

    fn score(&self, ctx: &ScoringContext, obs: &Observation) -> Score {
        let alt = sky::altitude_deg(obs.position(), ctx.site, ctx.time);
        if alt < self.min_altitude_deg { Score::Veto } else { Score::Value(1.0) }
    }
}

/// Vetoes targets too close to the moon, otherwise prefers distance.
pub struct MoonAvoidance {
    weight: f64,
    min_separation_deg: f64,
}

impl MoonAvoidance {
    pub fn new(weight: f64, min_separation_deg: f64) -> Self {
        Self { weight, min_separation_deg }
    }
}

impl Constraint for MoonAvoidance {
    fn name(&self) -> &'static str { "moon_avoidance" }
    fn weight(&self) -> f64 { self.weight }

    fn score(&self, ctx: &ScoringContext, obs: &Observation) -> Score {
        let sep = sky::angular_separation_deg(obs.position(), ctx.moon);
        if sep < self.min_separation_deg {
            Score::Veto
        } else {
            Score::Value(sep / 180.0)
        }
    }
}

/// Checks a target stays above the altitude limit long enough to finish
/// its remaining exposures before dawn, preferring time to spare.
pub struct Duration {
    weight: f64,
    min_altitude_deg: f64,
}

impl Duration {
    pub fn new(weight: f64, min_altitude_deg: f64) -> Self {
        Self { weight, min_altitude_deg }
    }
}

impl Constraint for Duration {
    fn name(&self) -> &'static str { "duration" }
    fn weight(&self) -> f64 { self.weight }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, ctx: &ScoringContext, obs: &Observation) -> Score {
        let night_left = ctx.end_of_night - ctx.time;
        if night_left <= TimeDelta::zero() {
            return Score::Veto;
        }
        let above = sky::time_until_below(obs.position(), ctx.site, ctx.time, self.min_altitude_deg);
        // Circumpolar targets are capped by dawn alone.
        let usable = above.map_or(night_left, |t| t.min(night_left));
        if usable < obs.time_needed() {
            return Score::Veto;
        }
        let frac = usable.num_milliseconds() as f64 / night_left.num_milliseconds() as f64;
        Score::Value(frac.min(1.0))
    }
}
