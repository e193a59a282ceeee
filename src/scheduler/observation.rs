use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use super::dispatch::CatalogError;
use super::field::Field;
use crate::sky::SkyPos;

/// One schedulable request: a field plus the exposure bookkeeping that
/// decides when it is finished.
///
/// Exposures come in sets of `exp_set_size`; the scheduler only considers
/// switching targets at a set boundary, so `min_nexp` must divide evenly
/// into sets. Progress survives deselection and only resets when a new
/// night begins.
#[derive(Debug, Clone)]
pub struct Observation {
    field: Field,
    priority: i16,
    exptime: TimeDelta,
    min_nexp: u32,
    exp_set_size: u32,
    filter_name: Option<String>,
    tags: Vec<String>,
    exposures_taken: u32,
    seq_time: Option<DateTime<Utc>>,
}

impl Observation {
    pub fn new(
        field: Field,
        priority: i16,
        exptime: TimeDelta,
        min_nexp: u32,
        exp_set_size: u32,
        filter_name: Option<String>,
        tags: Vec<String>,
    ) -> Result<Self, CatalogError> {
        if min_nexp == 0 || exp_set_size == 0 || exptime <= TimeDelta::zero() {
            return Err(CatalogError::BadExposure { field: field.name().to_string() });
        }
        if min_nexp % exp_set_size != 0 {
            return Err(CatalogError::ExposureSetMismatch {
                field: field.name().to_string(),
                min_nexp,
                exp_set_size,
            });
        }
        Ok(Self {
            field,
            priority,
            exptime,
            min_nexp,
            exp_set_size,
            filter_name,
            tags,
            exposures_taken: 0,
            seq_time: None,
        })
    }

    pub fn field(&self) -> &Field { &self.field }
    pub fn name(&self) -> &str { self.field.name() }
    pub fn position(&self) -> SkyPos { self.field.position() }
    pub fn priority(&self) -> i16 { self.priority }
    pub fn exptime(&self) -> TimeDelta { self.exptime }
    pub fn min_nexp(&self) -> u32 { self.min_nexp }
    pub fn exp_set_size(&self) -> u32 { self.exp_set_size }
    pub fn filter_name(&self) -> Option<&str> { self.filter_name.as_deref() }
    pub fn tags(&self) -> &[String] { &self.tags }
    pub fn exposures_taken(&self) -> u32 { self.exposures_taken }

    pub fn remaining(&self) -> u32 {
        self.min_nexp.saturating_sub(self.exposures_taken)
    }

    /// Open-shutter time still required to finish the request.
    #[allow(clippy::cast_possible_wrap)]
    pub fn time_needed(&self) -> TimeDelta {
        self.exptime * self.remaining() as i32
    }

    pub fn is_complete(&self) -> bool {
        self.exposures_taken >= self.min_nexp
    }

    /// True exactly between exposure sets, where a target switch is cheap.
    pub fn at_set_boundary(&self) -> bool {
        self.exposures_taken > 0 && self.exposures_taken % self.exp_set_size == 0
    }

    pub fn record_exposure(&mut self) {
        self.exposures_taken += 1;
    }

    /// Stamps the sequence start on first selection; later calls keep the
    /// original stamp.
    pub fn mark_started(&mut self, t: DateTime<Utc>) {
        if self.seq_time.is_none() {
            self.seq_time = Some(t);
        }
    }

    pub fn seq_time(&self) -> Option<DateTime<Utc>> { self.seq_time }

    pub fn reset(&mut self) {
        self.exposures_taken = 0;
        self.seq_time = None;
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{} exp, p{}]",
            self.field.name(),
            self.exposures_taken,
            self.min_nexp,
            self.priority
        )
    }
}
