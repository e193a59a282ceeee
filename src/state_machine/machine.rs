use std::collections::HashMap;
use std::fmt;

use super::state_table::{StateTable, StateTableError};

/// Trigger that is always honored regardless of conditions or horizons.
pub const TRIGGER_PARK: &str = "park";
/// States carrying this tag may keep running while conditions are unsafe.
pub const TAG_ALWAYS_SAFE: &str = "always_safe";

/// Capability probe consulted when a transition lists it as a condition.
pub type ConditionFn = Box<dyn Fn() -> bool + Send + Sync>;
/// Horizon gate: given a horizon name, reports whether the sky satisfies it.
pub type HorizonFn = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Table-driven state machine with per-trigger failure accounting.
///
/// The machine itself never sleeps or talks to hardware. Callers fire
/// triggers, inspect the error when a transition refuses, and decide how to
/// recover. Failed condition checks are counted per trigger so repeated
/// refusals can escalate; an unsatisfied horizon is not counted, since
/// waiting for the sky to darken is not a fault.
pub struct StateMachine {
    table: StateTable,
    current: String,
    attempts: HashMap<String, u32>,
    max_attempts: u32,
    conditions: HashMap<String, ConditionFn>,
    horizon_ok: HorizonFn,
}

impl StateMachine {
    /// Builds the machine in the table's initial state. Every condition
    /// named by the table must be present in `conditions`, otherwise a
    /// trigger could fail at runtime for a reason nobody registered.
    pub fn new(
        table: StateTable,
        max_attempts: u32,
        conditions: HashMap<String, ConditionFn>,
        horizon_ok: HorizonFn,
    ) -> Result<Self, StateTableError> {
        for tr in table.transitions() {
            for cond in tr.conditions() {
                if !conditions.contains_key(cond) {
                    return Err(StateTableError::UnknownCondition {
                        trigger: tr.trigger().to_string(),
                        condition: cond.clone(),
                    });
                }
            }
        }
        let current = table.initial().to_string();
        Ok(Self { table, current, attempts: HashMap::new(), max_attempts, conditions, horizon_ok })
    }

    /// Attempts to fire `trigger` from the current state.
    ///
    /// Transitions are tried in declaration order and the first whose source
    /// list contains the current state is taken. All its conditions must
    /// pass, then the destination's horizon (if any) must be satisfied. On
    /// success the trigger's failure count resets and the new state is
    /// returned.
    ///
    /// # Errors
    /// * [`TransitionError::NoMatchingTransition`] if nothing matches.
    /// * [`TransitionError::ConditionNotMet`] if a condition probe said no;
    ///   this charges one attempt against the trigger.
    /// * [`TransitionError::HorizonNotSatisfied`] if only the sky is not
    ///   ready yet; this does not charge an attempt.
    pub fn fire(&mut self, trigger: &str) -> Result<&str, TransitionError> {
        if trigger == TRIGGER_PARK {
            return self.force(TRIGGER_PARK);
        }
        let Some(tr) = self.table.transitions().iter().find(|tr| tr.matches(&self.current, trigger))
        else {
            return Err(TransitionError::NoMatchingTransition {
                state: self.current.clone(),
                trigger: trigger.to_string(),
            });
        };
        let dest = tr.dest().to_string();
        let conditions = tr.conditions().to_vec();
        let guard = tr.guard_horizon().map(str::to_string);
        for cond in &conditions {
            let passed = self.conditions.get(cond).is_some_and(|probe| probe());
            if !passed {
                let attempts = self.penalize(trigger);
                return Err(TransitionError::ConditionNotMet {
                    trigger: trigger.to_string(),
                    condition: cond.clone(),
                    attempts,
                });
            }
        }
        if let Some(horizon) = guard {
            if !(self.horizon_ok)(&horizon) {
                return Err(TransitionError::HorizonNotSatisfied {
                    trigger: trigger.to_string(),
                    horizon,
                });
            }
        }
        self.attempts.remove(trigger);
        self.current = dest;
        Ok(&self.current)
    }

    /// Applies the matching transition for `trigger` without evaluating
    /// conditions or horizon guards. Park requests route through here so a
    /// safety stop cannot be argued with.
    pub fn force(&mut self, trigger: &str) -> Result<&str, TransitionError> {
        let Some(tr) = self.table.transitions().iter().find(|tr| tr.matches(&self.current, trigger))
        else {
            return Err(TransitionError::NoMatchingTransition {
                state: self.current.clone(),
                trigger: trigger.to_string(),
            });
        };
        let dest = tr.dest().to_string();
        self.attempts.remove(trigger);
        self.current = dest;
        Ok(&self.current)
    }

    /// Charges one failed attempt against `trigger` and returns the new
    /// count. Hardware failures that surface outside a condition check are
    /// charged through here.
    pub fn penalize(&mut self, trigger: &str) -> u32 {
        let count = self.attempts.entry(trigger.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn attempts(&self, trigger: &str) -> u32 {
        self.attempts.get(trigger).copied().unwrap_or(0)
    }

    pub fn attempts_exhausted(&self, trigger: &str) -> bool {
        self.attempts(trigger) >= self.max_attempts
    }

    pub fn current_state(&self) -> &str { &self.current }

    pub fn current_is_tagged(&self, tag: &str) -> bool {
        self.table.is_tagged(&self.current, tag)
    }

    pub fn table(&self) -> &StateTable { &self.table }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    NoMatchingTransition { state: String, trigger: String },
    ConditionNotMet { trigger: String, condition: String, attempts: u32 },
    HorizonNotSatisfied { trigger: String, horizon: String },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::NoMatchingTransition { state, trigger } => {
                write!(f, "no transition for trigger {trigger:?} from state {state:?}")
            }
            TransitionError::ConditionNotMet { trigger, condition, attempts } => {
                write!(f, "condition {condition:?} blocked trigger {trigger:?} (attempt {attempts})")
            }
            TransitionError::HorizonNotSatisfied { trigger, horizon } => {
                write!(f, "horizon {horizon:?} not reached for trigger {trigger:?}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}
