use std::sync::Arc;

use super::camera::Camera;
use super::mount::Mount;

/// The rig the control loop drives, behind trait objects so simulated and
/// real hardware are interchangeable.
pub struct Observatory {
    mount: Arc<dyn Mount>,
    camera: Arc<dyn Camera>,
}

impl Observatory {
    pub fn new(mount: Arc<dyn Mount>, camera: Arc<dyn Camera>) -> Self {
        Self { mount, camera }
    }

    pub fn mount(&self) -> &dyn Mount { self.mount.as_ref() }
    pub fn camera(&self) -> &dyn Camera { self.camera.as_ref() }

    /// Shared mount handle for condition probes that outlive `self`.
    pub fn mount_handle(&self) -> Arc<dyn Mount> { self.mount.clone() }
    /// Shared camera handle for condition probes that outlive `self`.
    pub fn camera_handle(&self) -> Arc<dyn Camera> { self.camera.clone() }
}
