use async_trait::async_trait;
use chrono::TimeDelta;

use super::op::AsyncOp;

/// Science camera. One exposure at a time.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Opens the shutter for `duration`; `field_name` only feeds logs and
    /// frame metadata.
    async fn expose(&self, duration: TimeDelta, field_name: &str) -> AsyncOp;

    fn is_exposing(&self) -> bool;
}
