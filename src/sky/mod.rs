//! Coordinates, observer geometry and the ephemeris routines the scheduler
//! and safety gates are built on.

mod ephem;
mod position;
mod site;

#[cfg(test)]
mod tests;

pub use ephem::{
    altitude_deg, angular_separation_deg, days_since_j2000, end_of_night, gmst_deg, julian_day,
    lst_deg, moon_position, sun_altitude_deg, sun_position, time_until_below,
};
pub use position::{PositionError, SkyPos};
pub use site::ObserverSite;
