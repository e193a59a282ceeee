use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::Deserialize;

use super::constraint::{Constraint, Score, ScoringContext};
use super::field::Field;
use super::observation::Observation;
use crate::sky::{PositionError, SkyPos};
use crate::{event, sched};

/// Dispatch-style scheduler: no plan is ever committed ahead of time,
/// the whole catalog is re-ranked each time the system asks what to do
/// next, so changing conditions reshuffle the night automatically.
pub struct Scheduler {
    catalog: Vec<Observation>,
    constraints: Vec<Box<dyn Constraint>>,
    current: Option<usize>,
    observed: Vec<(DateTime<Utc>, String)>,
}

impl Scheduler {
    pub fn new(
        catalog: Vec<Observation>,
        constraints: Vec<Box<dyn Constraint>>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for obs in &catalog {
            if !seen.insert(obs.name().to_string()) {
                return Err(CatalogError::DuplicateField(obs.name().to_string()));
            }
        }
        Ok(Self { catalog, constraints, current: None, observed: Vec::new() })
    }

    pub fn from_yaml(
        yaml: &str,
        constraints: Vec<Box<dyn Constraint>>,
    ) -> Result<Self, CatalogError> {
        let entries: Vec<RawEntry> = serde_yaml::from_str(yaml)?;
        let mut catalog = Vec::with_capacity(entries.len());
        for entry in entries {
            let position: SkyPos = entry.field.position.parse().map_err(|source| {
                CatalogError::BadPosition { field: entry.field.name.clone(), source }
            })?;
            let params = entry.observation;
            #[allow(clippy::cast_possible_truncation)]
            let exptime = TimeDelta::milliseconds((params.exptime * 1000.0) as i64);
            catalog.push(Observation::new(
                Field::new(entry.field.name, position),
                params.priority,
                exptime,
                params.min_nexp,
                params.exp_set_size,
                params.filter_name,
                params.tags,
            )?);
        }
        Self::new(catalog, constraints)
    }

    pub fn from_file(
        path: impl AsRef<Path>,
        constraints: Vec<Box<dyn Constraint>>,
    ) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml, constraints)
    }

    /// Picks the best observable target for the moment described by `ctx`.
    ///
    /// Every incomplete catalog entry is scored by all constraints against
    /// the same sky snapshot. A single veto removes a candidate; otherwise
    /// its merit is the weighted sum of the constraint values. Ties fall to
    /// the currently running observation first (a target switch costs a
    /// slew), then to higher priority, then to lexical field-name order so
    /// the outcome is reproducible.
    ///
    /// # Arguments
    /// * `ctx` - Sky snapshot all candidates are judged against.
    ///
    /// # Returns
    /// The chosen observation, or [`None`] when nothing is observable right
    /// now. A [`None`] is not terminal; callers are expected to wait and
    /// ask again.
    pub fn select(&mut self, ctx: &ScoringContext) -> Option<&Observation> {
        let best = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(_, obs)| !obs.is_complete())
            .filter_map(|(idx, obs)| self.aggregate(ctx, obs).map(|merit| (idx, merit)))
            .sorted_by(|a, b| self.rank(a, b))
            .next();
        match best {
            Some((idx, merit)) => {
                if self.current != Some(idx) {
                    self.catalog[idx].mark_started(ctx.time);
                    self.observed.push((ctx.time, self.catalog[idx].name().to_string()));
                    self.current = Some(idx);
                    sched!("selected {} (merit {merit:.3})", self.catalog[idx]);
                }
                Some(&self.catalog[idx])
            }
            None => {
                self.current = None;
                None
            }
        }
    }

    /// Weighted merit of one candidate, or [`None`] if any constraint
    /// vetoes it.
    fn aggregate(&self, ctx: &ScoringContext, obs: &Observation) -> Option<f64> {
        let mut merit = 0.0;
        for constraint in &self.constraints {
            match constraint.score(ctx, obs) {
                Score::Veto => {
                    event!("{} vetoed by {}", obs.name(), constraint.name());
                    return None;
                }
                Score::Value(value) => merit += constraint.weight() * value,
            }
        }
        Some(merit)
    }

    fn rank(&self, a: &(usize, f64), b: &(usize, f64)) -> Ordering {
        let (idx_a, merit_a) = *a;
        let (idx_b, merit_b) = *b;
        merit_b
            .total_cmp(&merit_a)
            .then_with(|| {
                let a_running = self.current == Some(idx_a);
                let b_running = self.current == Some(idx_b);
                b_running.cmp(&a_running)
            })
            .then_with(|| self.catalog[idx_b].priority().cmp(&self.catalog[idx_a].priority()))
            .then_with(|| self.catalog[idx_a].name().cmp(self.catalog[idx_b].name()))
    }

    /// Books one finished exposure on the current observation.
    pub fn record_exposure(&mut self) {
        if let Some(idx) = self.current {
            let obs = &mut self.catalog[idx];
            obs.record_exposure();
            if obs.is_complete() {
                sched!("{obs} finished its exposure request");
            }
        }
    }

    pub fn current_observation(&self) -> Option<&Observation> {
        self.current.map(|idx| &self.catalog[idx])
    }

    pub fn current_position(&self) -> Option<SkyPos> {
        self.current_observation().map(Observation::position)
    }

    pub fn has_pending(&self) -> bool {
        self.catalog.iter().any(|obs| !obs.is_complete())
    }

    pub fn completed_count(&self) -> usize {
        self.catalog.iter().filter(|obs| obs.is_complete()).count()
    }

    pub fn total_count(&self) -> usize { self.catalog.len() }

    pub fn exposures_total(&self) -> u32 {
        self.catalog.iter().map(Observation::exposures_taken).sum()
    }

    /// Clears per-night progress so the whole catalog is eligible again.
    pub fn reset_for_new_night(&mut self) {
        for obs in &mut self.catalog {
            obs.reset();
        }
        self.current = None;
        self.observed.clear();
    }

    /// Selection history of the night: when each sequence was picked up.
    pub fn observed_log(&self) -> &[(DateTime<Utc>, String)] { &self.observed }

    pub fn observation(&self, name: &str) -> Option<&Observation> {
        self.catalog.iter().find(|obs| obs.name() == name)
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    field: RawField,
    #[serde(default)]
    observation: RawParams,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    position: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawParams {
    priority: i16,
    exptime: f64,
    min_nexp: u32,
    exp_set_size: u32,
    filter_name: Option<String>,
    tags: Vec<String>,
}

impl Default for RawParams {
    fn default() -> Self {
        Self {
            priority: 100,
            exptime: 120.0,
            min_nexp: 60,
            exp_set_size: 10,
            filter_name: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    BadPosition { field: String, source: PositionError },
    BadExposure { field: String },
    ExposureSetMismatch { field: String, min_nexp: u32, exp_set_size: u32 },
    DuplicateField(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "could not read field catalog: {e}"),
            CatalogError::Parse(e) => write!(f, "could not parse field catalog: {e}"),
            CatalogError::BadPosition { field, source } => {
                write!(f, "field {field:?} has a bad position: {source}")
            }
            CatalogError::BadExposure { field } => {
                write!(f, "field {field:?} needs positive exposure settings")
            }
            CatalogError::ExposureSetMismatch { field, min_nexp, exp_set_size } => {
                write!(
                    f,
                    "field {field:?}: min_nexp {min_nexp} is not a multiple of exp_set_size {exp_set_size}"
                )
            }
            CatalogError::DuplicateField(name) => {
                write!(f, "field {name:?} appears more than once")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self { CatalogError::Io(e) }
}

impl From<serde_yaml::Error> for CatalogError {
    fn from(e: serde_yaml::Error) -> Self { CatalogError::Parse(e) }
}
