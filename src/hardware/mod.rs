//! Hardware abstraction: mount and camera traits, a handle type for their
//! long-running operations, and the simulators the bench setup runs on.

mod camera;
mod mount;
mod observatory;
mod op;
mod sim;

#[cfg(test)]
mod tests;

pub use camera::Camera;
pub use mount::Mount;
pub use observatory::Observatory;
pub use op::{AsyncOp, OpStatus};
pub use sim::{SimCamera, SimMount, SimTimings};
