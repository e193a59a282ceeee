use std::fmt;

use crate::sky::SkyPos;

/// A named patch of sky.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    position: SkyPos,
}

impl Field {
    pub fn new(name: impl Into<String>, position: SkyPos) -> Self {
        Self { name: name.into(), position }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn position(&self) -> SkyPos { self.position }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.position)
    }
}
