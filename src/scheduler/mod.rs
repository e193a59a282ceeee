//! Target selection. A field catalog is ranked by pluggable, weighted
//! constraints every time the control loop asks what to observe next;
//! nothing is planned further ahead than the answer to that question.

mod constraint;
mod dispatch;
mod field;
mod observation;


pub use constraint::{Altitude, Constraint, Duration, MoonAvoidance, Score, ScoringContext};
pub use dispatch::{CatalogError, Scheduler};
pub use field::Field;
pub use observation::Observation;
