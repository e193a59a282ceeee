use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use super::*;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn close(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() < eps
}

fn hawaii() -> ObserverSite {
    ObserverSite::new(19.54, -155.58, 3400.0)
}

#[test]
fn test_julian_day_at_j2000() {
    let jd = julian_day(utc(2000, 1, 1, 12, 0, 0));
    assert!(close(jd, 2_451_545.0, 1e-6), "jd was {jd}");
    assert!(close(days_since_j2000(utc(2000, 1, 2, 12, 0, 0)), 1.0, 1e-6));
}

#[test]
fn test_gmst_against_published_value() {
    // GMST at 2000-01-01T00:00 UT is 6h39m52.27s.
    let gmst = gmst_deg(utc(2000, 1, 1, 0, 0, 0));
    assert!(close(gmst, 99.9678, 0.01), "gmst was {gmst}");
}

#[test]
fn test_lst_applies_east_longitude() {
    let t = utc(2024, 6, 1, 4, 30, 0);
    let greenwich = ObserverSite::new(0.0, 0.0, 0.0);
    let east = ObserverSite::new(0.0, 30.0, 0.0);
    let diff = (lst_deg(east, t) - lst_deg(greenwich, t)).rem_euclid(360.0);
    assert!(close(diff, 30.0, 1e-9), "diff was {diff}");
}

#[test]
fn test_sun_at_equinox_and_solstice() {
    // March equinox 2025 fell on 2025-03-20 09:01 UTC.
    let equinox = sun_position(utc(2025, 3, 20, 9, 1, 0));
    assert!(equinox.dec_deg().abs() < 0.5, "equinox dec {}", equinox.dec_deg());
    let ra_from_zero = equinox.ra_deg().min(360.0 - equinox.ra_deg());
    assert!(ra_from_zero < 2.0, "equinox ra {}", equinox.ra_deg());

    // December solstice 2024 fell on 2024-12-21 09:20 UTC.
    let solstice = sun_position(utc(2024, 12, 21, 9, 20, 0));
    assert!(close(solstice.dec_deg(), -23.43, 0.3), "solstice dec {}", solstice.dec_deg());
}

#[test]
fn test_moon_stays_in_declination_band() {
    let mut t = utc(2024, 1, 1, 0, 0, 0);
    for _ in 0..60 {
        let moon = moon_position(t);
        assert!(moon.dec_deg().abs() <= 30.0, "moon dec {} at {t}", moon.dec_deg());
        assert!((0.0..360.0).contains(&moon.ra_deg()));
        t += TimeDelta::days(1);
    }
}

#[test]
fn test_moon_sun_alignment_at_eclipse_and_opposition() {
    // Total solar eclipse maximum, 2024-04-08 18:17 UTC.
    let eclipse = utc(2024, 4, 8, 18, 17, 0);
    let sep = angular_separation_deg(sun_position(eclipse), moon_position(eclipse));
    assert!(sep < 3.0, "eclipse separation {sep}");

    // Full moon of 2024-04-23 23:49 UTC.
    let full = utc(2024, 4, 23, 23, 49, 0);
    let opp = angular_separation_deg(sun_position(full), moon_position(full));
    assert!(opp > 170.0, "full moon separation {opp}");
}

#[test]
fn test_altitude_is_ninety_at_zenith() {
    let site = hawaii();
    let t = utc(2026, 1, 10, 8, 0, 0);
    let zenith = SkyPos::new(lst_deg(site, t), site.latitude_deg()).unwrap();
    let alt = altitude_deg(zenith, site, t);
    assert!(alt > 89.9, "zenith altitude {alt}");
    let anti = SkyPos::new(lst_deg(site, t) + 180.0, -site.latitude_deg()).unwrap();
    assert!(altitude_deg(anti, site, t) < -89.9);
}

#[test]
fn test_angular_separation_extremes() {
    let north = SkyPos::new(0.0, 90.0).unwrap();
    let south = SkyPos::new(120.0, -90.0).unwrap();
    assert!(close(angular_separation_deg(north, south), 180.0, 1e-6));
    let a = SkyPos::new(10.0, 0.0).unwrap();
    let b = SkyPos::new(100.0, 0.0).unwrap();
    assert!(close(angular_separation_deg(a, b), 90.0, 1e-6));
    assert!(close(angular_separation_deg(a, a), 0.0, 1e-9));
}

#[test]
fn test_time_until_below_from_transit() {
    let site = ObserverSite::new(0.0, 0.0, 0.0);
    let t = utc(2025, 2, 1, 3, 0, 0);
    let transiting = SkyPos::new(lst_deg(site, t), 0.0).unwrap();
    let left = time_until_below(transiting, site, t, 0.0).unwrap();
    // An equatorial target at transit sets six sidereal hours later.
    let hours = left.num_seconds() as f64 / 3600.0;
    assert!((5.8..6.1).contains(&hours), "hours until set: {hours}");
}

#[test]
fn test_time_until_below_when_already_down() {
    let site = ObserverSite::new(0.0, 0.0, 0.0);
    let t = utc(2025, 2, 1, 3, 0, 0);
    let below = SkyPos::new(lst_deg(site, t) + 180.0, 0.0).unwrap();
    assert_eq!(time_until_below(below, site, t, 0.0), Some(TimeDelta::zero()));
    // A target that never clears the limit also reports zero time left.
    let low = SkyPos::new(lst_deg(site, t), 85.0).unwrap();
    assert_eq!(time_until_below(low, site, t, 20.0), Some(TimeDelta::zero()));
}

#[test]
fn test_time_until_below_circumpolar() {
    let site = ObserverSite::new(89.0, 0.0, 0.0);
    let pole_hugger = SkyPos::new(45.0, 89.0).unwrap();
    let t = utc(2025, 2, 1, 3, 0, 0);
    assert_eq!(time_until_below(pole_hugger, site, t, 10.0), None);
}

#[test]
fn test_end_of_night_lands_at_dawn() {
    let site = hawaii();
    // 22:00 local on the big island, well into astronomical night.
    let t = utc(2026, 1, 10, 8, 0, 0);
    assert!(sun_altitude_deg(site, t) < -18.0);
    let dawn = end_of_night(site, t, -18.0);
    assert!(dawn > t);
    assert!(dawn < t + TimeDelta::hours(16));
    let alt_at_dawn = sun_altitude_deg(site, dawn);
    assert!(alt_at_dawn > -18.0 && alt_at_dawn < -17.0, "dawn altitude {alt_at_dawn}");
}

#[test]
fn test_end_of_night_skips_daylight() {
    let site = hawaii();
    // 14:00 local, broad daylight: the result must be the next dawn, not now.
    let t = utc(2026, 1, 10, 0, 0, 0);
    assert!(sun_altitude_deg(site, t) > 0.0);
    let dawn = end_of_night(site, t, -18.0);
    assert!(dawn > t + TimeDelta::hours(4), "dawn {dawn}");
    let alt_at_dawn = sun_altitude_deg(site, dawn);
    assert!(alt_at_dawn > -18.0 && alt_at_dawn < -17.0, "dawn altitude {alt_at_dawn}");
}

#[test]
fn test_position_parses_sexagesimal() {
    let pos: SkyPos = "20h00m43.7135s +22d42m39.0645s".parse().unwrap();
    assert!(close(pos.ra_deg(), 300.182_139_6, 1e-4), "ra {}", pos.ra_deg());
    assert!(close(pos.dec_deg(), 22.710_851_25, 1e-4), "dec {}", pos.dec_deg());
    assert!(close(pos.ra_hours(), 20.012_142_6, 1e-4));

    let south: SkyPos = "05h30m00s -05d30m00s".parse().unwrap();
    assert!(close(south.ra_deg(), 82.5, 1e-9));
    assert!(close(south.dec_deg(), -5.5, 1e-9));
}

#[test]
fn test_position_parses_decimal_degrees() {
    let pos: SkyPos = "300.18 -22.71".parse().unwrap();
    assert!(close(pos.ra_deg(), 300.18, 1e-9));
    assert!(close(pos.dec_deg(), -22.71, 1e-9));
    // Right ascension normalizes into [0, 360).
    let wrapped = SkyPos::new(370.0, 0.0).unwrap();
    assert!(close(wrapped.ra_deg(), 10.0, 1e-9));
}

#[test]
fn test_position_rejects_bad_input() {
    assert!("".parse::<SkyPos>().is_err());
    assert!("10.0".parse::<SkyPos>().is_err());
    assert!("10.0 20.0 30.0".parse::<SkyPos>().is_err());
    assert!("nonsense garbage".parse::<SkyPos>().is_err());
    assert!("10h00m00s +95d00m00s".parse::<SkyPos>().is_err());
    assert!(SkyPos::new(0.0, -90.5).is_err());
}

#[test]
fn test_position_display_round_trips() {
    let pos = SkyPos::new(300.182_139_6, 22.710_851_25).unwrap();
    let rendered = pos.to_string();
    println!("rendered position: {rendered}");
    let back: SkyPos = rendered.parse().unwrap();
    assert!(close(back.ra_deg(), pos.ra_deg(), 0.01));
    assert!(close(back.dec_deg(), pos.dec_deg(), 0.01));
}
