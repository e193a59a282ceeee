use std::fmt;
use std::str::FromStr;

/// Equatorial position (ICRS-ish, no precession handling) in degrees.
///
/// Catalog entries accept either sexagesimal strings
/// (`"20h00m43.71s +22d42m39.07s"`) or plain decimal degrees. Right
/// ascension is normalized into `[0, 360)`; declinations outside
/// `[-90, 90]` are rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPos {
    ra_deg: f64,
    dec_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    Malformed(String),
    DecOutOfRange(String),
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::Malformed(s) => write!(f, "malformed position {s:?}"),
            PositionError::DecOutOfRange(s) => {
                write!(f, "declination outside [-90, 90] in {s:?}")
            }
        }
    }
}

impl std::error::Error for PositionError {}

impl SkyPos {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Result<Self, PositionError> {
        if !(-90.0..=90.0).contains(&dec_deg) {
            return Err(PositionError::DecOutOfRange(format!("{dec_deg}")));
        }
        Ok(Self { ra_deg: ra_deg.rem_euclid(360.0), dec_deg })
    }

    /// Builds a position from math results. Declination from an `asin` is in
    /// range by construction, so no validation happens here.
    pub(crate) fn from_radians(ra_rad: f64, dec_rad: f64) -> Self {
        Self {
            ra_deg: ra_rad.to_degrees().rem_euclid(360.0),
            dec_deg: dec_rad.to_degrees(),
        }
    }

    pub fn ra_deg(&self) -> f64 { self.ra_deg }
    pub fn dec_deg(&self) -> f64 { self.dec_deg }
    pub fn ra_hours(&self) -> f64 { self.ra_deg / 15.0 }
}

impl FromStr for SkyPos {
    type Err = PositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (ra_tok, dec_tok) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ra), Some(dec), None) => (ra, dec),
            _ => return Err(PositionError::Malformed(s.to_string())),
        };
        let ra_deg =
            parse_angle(ra_tok, 'h').ok_or_else(|| PositionError::Malformed(s.to_string()))?;
        let dec_deg =
            parse_angle(dec_tok, 'd').ok_or_else(|| PositionError::Malformed(s.to_string()))?;
        Self::new(ra_deg, dec_deg).map_err(|_| PositionError::DecOutOfRange(s.to_string()))
    }
}

impl fmt::Display for SkyPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ra_h = self.ra_hours();
        let (rh, rm, rs) = split_sexagesimal(ra_h);
        let sign = if self.dec_deg < 0.0 { '-' } else { '+' };
        let (dd, dm, ds) = split_sexagesimal(self.dec_deg.abs());
        write!(f, "{rh:02}h{rm:02}m{rs:04.1}s {sign}{dd:02}d{dm:02}m{ds:04.1}s")
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn split_sexagesimal(value: f64) -> (u32, u32, f64) {
    let whole = value.floor();
    let minutes_f = (value - whole) * 60.0;
    let minutes = minutes_f.floor();
    let seconds = (minutes_f - minutes) * 60.0;
    (whole as u32, minutes as u32, seconds)
}

/// Parses one angle token: sexagesimal with `major` as the leading unit
/// (`20h00m43.7s`, `+22d42m39s`, minutes and seconds optional) or a plain
/// decimal number of degrees. Hour-based tokens are scaled to degrees.
fn parse_angle(token: &str, major: char) -> Option<f64> {
    let (sign, body) = match token.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, token.strip_prefix('+').unwrap_or(token)),
    };
    if !body.contains(major) {
        return body.parse::<f64>().ok().map(|v| sign * v);
    }
    let (major_part, rest) = body.split_once(major)?;
    let major_val = major_part.parse::<f64>().ok()?;
    let (minutes, seconds) = if rest.is_empty() {
        (0.0, 0.0)
    } else {
        let (min_part, sec_rest) = rest.split_once('m')?;
        let minutes = min_part.parse::<f64>().ok()?;
        let seconds = if sec_rest.is_empty() {
            0.0
        } else {
            sec_rest.strip_suffix('s')?.parse::<f64>().ok()?
        };
        (minutes, seconds)
    };
    let magnitude = major_val + minutes / 60.0 + seconds / 3600.0;
    let scale = if major == 'h' { 15.0 } else { 1.0 };
    Some(sign * magnitude * scale)
}
