use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;

use super::camera::Camera;
use super::mount::Mount;
use super::op::{AsyncOp, OpStatus};
use crate::event;
use crate::sky::SkyPos;

/// Nominal durations for the simulated motions; each run jitters ±10 %.
#[derive(Debug, Clone, Copy)]
pub struct SimTimings {
    pub init_secs: f64,
    pub slew_secs: f64,
    pub park_secs: f64,
}

impl Default for SimTimings {
    fn default() -> Self {
        Self { init_secs: 2.0, slew_secs: 3.0, park_secs: 2.0 }
    }
}

fn jittered(secs: f64) -> Duration {
    let factor = rand::rng().random_range(0.9..1.1);
    Duration::from_secs_f64((secs * factor).max(0.0))
}

#[derive(Debug, Default)]
struct MountFlags {
    initialized: AtomicBool,
    tracking: AtomicBool,
    parked: AtomicBool,
}

/// Mount simulator: sleeps instead of moving, honors cancellation, and
/// keeps its flags the way a real driver would.
#[derive(Clone)]
pub struct SimMount {
    flags: Arc<MountFlags>,
    timings: SimTimings,
}

impl SimMount {
    pub fn new(timings: SimTimings) -> Self {
        Self { flags: Arc::new(MountFlags::default()), timings }
    }
}

#[async_trait]
impl Mount for SimMount {
    async fn initialize(&self) -> AsyncOp {
        let flags = self.flags.clone();
        let wait = jittered(self.timings.init_secs);
        AsyncOp::spawn("mount init", move |cancel, tx| async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = tx.send(OpStatus::Failed);
                }
                () = sleep(wait) => {
                    flags.initialized.store(true, Ordering::Relaxed);
                    let _ = tx.send(OpStatus::Done);
                }
            }
        })
    }

    async fn slew_to(&self, target: SkyPos) -> AsyncOp {
        // Tracking drops the moment the mount starts moving.
        self.flags.tracking.store(false, Ordering::Relaxed);
        event!("sim mount slewing to {target}");
        let flags = self.flags.clone();
        let wait = jittered(self.timings.slew_secs);
        AsyncOp::spawn("slew", move |cancel, tx| async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = tx.send(OpStatus::Failed);
                }
                () = sleep(wait) => {
                    flags.parked.store(false, Ordering::Relaxed);
                    flags.tracking.store(true, Ordering::Relaxed);
                    let _ = tx.send(OpStatus::Done);
                }
            }
        })
    }

    async fn park(&self) -> AsyncOp {
        self.flags.tracking.store(false, Ordering::Relaxed);
        let flags = self.flags.clone();
        let wait = jittered(self.timings.park_secs);
        AsyncOp::spawn("park", move |cancel, tx| async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    let _ = tx.send(OpStatus::Failed);
                }
                () = sleep(wait) => {
                    flags.parked.store(true, Ordering::Relaxed);
                    let _ = tx.send(OpStatus::Done);
                }
            }
        })
    }

    fn is_initialized(&self) -> bool { self.flags.initialized.load(Ordering::Relaxed) }
    fn is_tracking(&self) -> bool { self.flags.tracking.load(Ordering::Relaxed) }
    fn is_parked(&self) -> bool { self.flags.parked.load(Ordering::Relaxed) }
}

/// Camera simulator: an exposure is a flag and a sleep.
#[derive(Clone, Default)]
pub struct SimCamera {
    exposing: Arc<AtomicBool>,
}

impl SimCamera {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Camera for SimCamera {
    async fn expose(&self, duration: chrono::TimeDelta, field_name: &str) -> AsyncOp {
        self.exposing.store(true, Ordering::Relaxed);
        let wait = duration.to_std().unwrap_or_default();
        event!("sim camera exposing {} for {:.1} s", field_name, wait.as_secs_f64());
        let exposing = self.exposing.clone();
        AsyncOp::spawn("exposure", move |cancel, tx| async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    exposing.store(false, Ordering::Relaxed);
                    let _ = tx.send(OpStatus::Failed);
                }
                () = sleep(wait) => {
                    exposing.store(false, Ordering::Relaxed);
                    let _ = tx.send(OpStatus::Done);
                }
            }
        })
    }

    fn is_exposing(&self) -> bool { self.exposing.load(Ordering::Relaxed) }
}
