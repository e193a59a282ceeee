use std::time::Duration;

use chrono::TimeDelta;
use tokio::time::{Instant, sleep};

use super::*;
use crate::sky::SkyPos;

fn fast_timings() -> SimTimings {
    SimTimings { init_secs: 0.05, slew_secs: 0.05, park_secs: 0.05 }
}

/// Waits for the op to settle, cancelled or not, and returns what it
/// settled to.
async fn settle(op: &mut AsyncOp) -> OpStatus {
    op.acknowledged(Duration::from_secs(2)).await;
    op.poll()
}

#[tokio::test]
async fn test_init_then_slew_completes_and_tracks() {
    let mount = SimMount::new(fast_timings());
    assert!(!mount.is_initialized());
    let mut init = mount.initialize().await;
    assert_eq!(settle(&mut init).await, OpStatus::Done);
    assert!(mount.is_initialized());

    let mut slew = mount.slew_to(SkyPos::new(120.0, 45.0).unwrap()).await;
    assert_eq!(slew.poll(), OpStatus::Running);
    assert!(!mount.is_tracking());
    assert_eq!(settle(&mut slew).await, OpStatus::Done);
    assert!(mount.is_tracking());
    assert!(!mount.is_parked());
}

#[tokio::test]
async fn test_cancelled_slew_acknowledges_quickly() {
    let mount = SimMount::new(SimTimings { slew_secs: 30.0, ..fast_timings() });
    let mut slew = mount.slew_to(SkyPos::new(10.0, 10.0).unwrap()).await;
    let begun = Instant::now();
    slew.cancel();
    assert!(slew.acknowledged(Duration::from_millis(500)).await);
    assert!(begun.elapsed() < Duration::from_secs(1));
    assert_eq!(slew.poll(), OpStatus::Failed);
    assert!(!mount.is_tracking());
}

#[tokio::test]
async fn test_park_sets_flags() {
    let mount = SimMount::new(fast_timings());
    let mut park = mount.park().await;
    assert_eq!(settle(&mut park).await, OpStatus::Done);
    assert!(mount.is_parked());
    assert!(!mount.is_tracking());
}

#[tokio::test]
async fn test_exposure_lifecycle() {
    let camera = SimCamera::new();
    assert!(!camera.is_exposing());
    let mut exposure = camera.expose(TimeDelta::milliseconds(50), "bench field").await;
    assert!(camera.is_exposing());
    assert_eq!(settle(&mut exposure).await, OpStatus::Done);
    assert!(!camera.is_exposing());
}

#[tokio::test]
async fn test_cancelled_exposure_fails_and_frees_camera() {
    let camera = SimCamera::new();
    let mut exposure = camera.expose(TimeDelta::seconds(30), "deep field").await;
    exposure.cancel();
    assert!(exposure.acknowledged(Duration::from_millis(500)).await);
    assert_eq!(exposure.poll(), OpStatus::Failed);
    assert!(!camera.is_exposing());
}

#[tokio::test]
async fn test_unacknowledged_cancel_reports_false() {
    // An op that never looks at its token keeps running past the grace.
    let mut op = AsyncOp::spawn("stubborn", |_cancel, tx| async move {
        sleep(Duration::from_secs(30)).await;
        let _ = tx.send(OpStatus::Done);
    });
    op.cancel();
    assert!(!op.acknowledged(Duration::from_millis(100)).await);
    assert_eq!(op.poll(), OpStatus::Running);
    assert_eq!(op.what(), "stubborn");
}
