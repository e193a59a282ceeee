/// Geodetic location of the observatory. Longitude counts east-positive,
/// matching the sign convention of the sidereal time math in this module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverSite {
    latitude_deg: f64,
    longitude_deg: f64,
    elevation_m: f64,
}

impl ObserverSite {
    pub fn new(latitude_deg: f64, longitude_deg: f64, elevation_m: f64) -> Self {
        Self { latitude_deg, longitude_deg, elevation_m }
    }

    pub fn latitude_deg(&self) -> f64 { self.latitude_deg }
    pub fn longitude_deg(&self) -> f64 { self.longitude_deg }
    pub fn elevation_m(&self) -> f64 { self.elevation_m }
}
