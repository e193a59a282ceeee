//! Declarative state machine for the observing cycle: a YAML table of
//! states and triggered transitions, interpreted against runtime condition
//! probes and sky horizons.

mod machine;
mod state_table;

#[cfg(test)]
mod tests;

pub use machine::{
    ConditionFn, HorizonFn, StateMachine, TAG_ALWAYS_SAFE, TRIGGER_PARK, TransitionError,
};
pub use state_table::{StateTable, StateTableError, Transition};
