//! Low-precision solar, lunar and sidereal ephemerides.
//!
//! Accuracy is on the order of arcminutes for the sun and a fraction of a
//! degree for the moon, which is plenty for horizon gating and separation
//! constraints. Nothing here models refraction, parallax or precession.

use chrono::{DateTime, TimeDelta, Utc};

use super::position::SkyPos;
use super::site::ObserverSite;

/// Julian day number of the UNIX epoch, 1970-01-01T00:00:00Z.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
/// Julian day number of the J2000.0 reference epoch.
const J2000_JD: f64 = 2_451_545.0;
/// Apparent sidereal motion of the sky in degrees per hour.
const SIDEREAL_RATE_DEG_PER_HOUR: f64 = 15.041_068_6;

#[allow(clippy::cast_precision_loss)]
pub fn julian_day(t: DateTime<Utc>) -> f64 {
    UNIX_EPOCH_JD + t.timestamp_millis() as f64 / 86_400_000.0
}

pub fn days_since_j2000(t: DateTime<Utc>) -> f64 {
    julian_day(t) - J2000_JD
}

/// Greenwich mean sidereal time in degrees, valid to a few arcseconds over
/// the decades around J2000.
pub fn gmst_deg(t: DateTime<Utc>) -> f64 {
    let n = days_since_j2000(t);
    (280.460_618_37 + 360.985_647_366_29 * n).rem_euclid(360.0)
}

pub fn lst_deg(site: ObserverSite, t: DateTime<Utc>) -> f64 {
    (gmst_deg(t) + site.longitude_deg()).rem_euclid(360.0)
}

fn obliquity_deg(n: f64) -> f64 {
    23.439 - 0.000_000_4 * n
}

/// Geocentric solar position from the Astronomical Almanac's low-precision
/// series (mean longitude plus the two largest equation-of-center terms).
pub fn sun_position(t: DateTime<Utc>) -> SkyPos {
    let n = days_since_j2000(t);
    let mean_lon = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anom = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    let ecl_lon = (mean_lon + 1.915 * mean_anom.sin() + 0.020 * (2.0 * mean_anom).sin())
        .rem_euclid(360.0)
        .to_radians();
    let obl = obliquity_deg(n).to_radians();
    let ra = (obl.cos() * ecl_lon.sin()).atan2(ecl_lon.cos());
    let dec = (obl.sin() * ecl_lon.sin()).asin();
    SkyPos::from_radians(ra, dec)
}

/// Geocentric lunar position keeping only the largest longitude term
/// (evection and friends dropped) and the largest latitude term.
pub fn moon_position(t: DateTime<Utc>) -> SkyPos {
    let n = days_since_j2000(t);
    let mean_lon = (218.316 + 13.176_396 * n).rem_euclid(360.0);
    let mean_anom = (134.963 + 13.064_993 * n).rem_euclid(360.0).to_radians();
    let arg_lat = (93.272 + 13.229_350 * n).rem_euclid(360.0).to_radians();
    let ecl_lon = (mean_lon + 6.289 * mean_anom.sin()).rem_euclid(360.0).to_radians();
    let ecl_lat = (5.128 * arg_lat.sin()).to_radians();
    let obl = obliquity_deg(n).to_radians();
    let ra = (ecl_lon.sin() * obl.cos() - ecl_lat.tan() * obl.sin()).atan2(ecl_lon.cos());
    let dec = (ecl_lat.sin() * obl.cos() + ecl_lat.cos() * obl.sin() * ecl_lon.sin()).asin();
    SkyPos::from_radians(ra, dec)
}

/// Altitude of `pos` above the horizon at `site`, in degrees.
pub fn altitude_deg(pos: SkyPos, site: ObserverSite, t: DateTime<Utc>) -> f64 {
    let hour_angle = (lst_deg(site, t) - pos.ra_deg()).to_radians();
    let lat = site.latitude_deg().to_radians();
    let dec = pos.dec_deg().to_radians();
    // Rounding can push the sine a hair past 1 at the zenith and nadir.
    (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos())
        .clamp(-1.0, 1.0)
        .asin()
        .to_degrees()
}

pub fn sun_altitude_deg(site: ObserverSite, t: DateTime<Utc>) -> f64 {
    altitude_deg(sun_position(t), site, t)
}

/// Great-circle separation between two positions via the haversine form,
/// which stays well-conditioned for nearby points.
pub fn angular_separation_deg(a: SkyPos, b: SkyPos) -> f64 {
    let dec_a = a.dec_deg().to_radians();
    let dec_b = b.dec_deg().to_radians();
    let half_dra = (b.ra_deg() - a.ra_deg()).to_radians() / 2.0;
    let half_ddec = (dec_b - dec_a) / 2.0;
    let h = half_ddec.sin().powi(2) + dec_a.cos() * dec_b.cos() * half_dra.sin().powi(2);
    (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
}

/// How long `pos` stays above `min_alt_deg` as seen from `site`.
///
/// # Returns
/// * `None` if the target is circumpolar at that altitude and never sets.
/// * `TimeDelta::zero()` if it is already below (or never rises above) the
///   altitude limit.
/// * Otherwise the sidereal-rate time until the target crosses the limit on
///   its way down.
#[allow(clippy::cast_possible_truncation)]
pub fn time_until_below(
    pos: SkyPos,
    site: ObserverSite,
    t: DateTime<Utc>,
    min_alt_deg: f64,
) -> Option<TimeDelta> {
    let lat = site.latitude_deg().to_radians();
    let dec = pos.dec_deg().to_radians();
    let cos_h0 = (min_alt_deg.to_radians().sin() - lat.sin() * dec.sin())
        / (lat.cos() * dec.cos());
    if cos_h0 < -1.0 {
        return None;
    }
    if cos_h0 > 1.0 {
        return Some(TimeDelta::zero());
    }
    let set_ha = cos_h0.acos().to_degrees();
    let hour_angle = (lst_deg(site, t) - pos.ra_deg()).rem_euclid(360.0);
    if hour_angle > set_ha && hour_angle < 360.0 - set_ha {
        return Some(TimeDelta::zero());
    }
    let to_go_deg = (set_ha - hour_angle).rem_euclid(360.0);
    let secs = to_go_deg / SIDEREAL_RATE_DEG_PER_HOUR * 3600.0;
    Some(TimeDelta::milliseconds((secs * 1000.0) as i64))
}

/// Time at which the sun next climbs back above `horizon_deg` after the
/// coming (or current) dark period.
///
/// Called during daylight this skips ahead to the next night first, so the
/// result is always the upcoming dawn. The scan is coarse with a fine
/// refinement pass and gives up 36 hours out, which only matters at polar
/// sites.
pub fn end_of_night(site: ObserverSite, t: DateTime<Utc>, horizon_deg: f64) -> DateTime<Utc> {
    const COARSE: TimeDelta = TimeDelta::minutes(5);
    const FINE: TimeDelta = TimeDelta::seconds(30);
    let limit = t + TimeDelta::hours(36);
    let mut cursor = t;
    while sun_altitude_deg(site, cursor) > horizon_deg {
        cursor += COARSE;
        if cursor >= limit {
            return limit;
        }
    }
    while sun_altitude_deg(site, cursor) <= horizon_deg {
        cursor += COARSE;
        if cursor >= limit {
            return limit;
        }
    }
    let mut dawn = cursor - COARSE;
    while sun_altitude_deg(site, dawn) <= horizon_deg {
        dawn += FINE;
    }
    dawn
}
