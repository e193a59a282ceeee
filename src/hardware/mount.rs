use async_trait::async_trait;

use super::op::AsyncOp;
use crate::sky::SkyPos;

/// Telescope mount. Motions return [`AsyncOp`] handles; the flag probes
/// answer instantly from driver state and back the state machine's
/// transition conditions.
#[async_trait]
pub trait Mount: Send + Sync {
    /// Powers up and homes the mount.
    async fn initialize(&self) -> AsyncOp;
    /// Slews to `target`, starting sidereal tracking on arrival.
    async fn slew_to(&self, target: SkyPos) -> AsyncOp;
    /// Drives to the park position. Tracking stops immediately.
    async fn park(&self) -> AsyncOp;

    fn is_initialized(&self) -> bool;
    fn is_tracking(&self) -> bool;
    fn is_parked(&self) -> bool;
}
