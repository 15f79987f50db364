//! Two-line element sets: parsing, checksums and generation.
//!
//! Fields are read by their fixed NORAD column positions. Generation produces
//! standard-layout lines with valid checksums for realistic LEO orbits.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use rand::Rng;

use super::kepler::{KeplerOrbit, PropagationError};
use crate::types::{EARTH_RADIUS_KM, MU_EARTH, SECONDS_PER_DAY};

/// Minimum length of a TLE line without its checksum column.
const TLE_BODY_LEN: usize = 68;

/// Two-digit epoch years at or above this pivot belong to the 1900s.
const EPOCH_YEAR_PIVOT: u32 = 57;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TleParseError {
    #[error("TLE line {0} is missing")]
    MissingLine(u8),

    #[error("TLE line {line} is too short ({len} < 68 columns)")]
    TooShort { line: u8, len: usize },

    #[error("TLE line {line} contains non-ASCII characters")]
    NotAscii { line: u8 },

    #[error("expected line number {expected}, found {found:?}")]
    WrongLineNumber { expected: u8, found: String },

    #[error("catalogue numbers differ between lines ({line1} vs {line2})")]
    CatalogMismatch { line1: u32, line2: u32 },

    #[error("checksum mismatch on line {line} (expected {expected}, found {found})")]
    Checksum { line: u8, expected: u32, found: u32 },

    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Parsed mean elements of one object.
#[derive(Clone, Debug, PartialEq)]
pub struct TwoLineElements {
    pub catalog_number: u32,
    pub classification: char,
    pub international_designator: String,
    pub epoch: DateTime<Utc>,
    /// B* drag term (1/earth radii)
    pub bstar: f64,
    pub inclination_deg: f64,
    pub raan_deg: f64,
    pub eccentricity: f64,
    pub argument_of_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
    pub mean_motion_rev_per_day: f64,
    pub revolution_number: u32,
}

impl TwoLineElements {
    /// Parse a line pair.
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TleParseError> {
        let l1 = line1.trim_end();
        let l2 = line2.trim_end();
        if l1.is_empty() {
            return Err(TleParseError::MissingLine(1));
        }
        if l2.is_empty() {
            return Err(TleParseError::MissingLine(2));
        }
        check_line(l1, 1)?;
        check_line(l2, 2)?;

        let catalog_1: u32 = parse_field(l1, 2..7, "catalogue number")?;
        let catalog_2: u32 = parse_field(l2, 2..7, "catalogue number")?;
        if catalog_1 != catalog_2 {
            return Err(TleParseError::CatalogMismatch {
                line1: catalog_1,
                line2: catalog_2,
            });
        }

        let classification = l1[7..8].chars().next().unwrap_or('U');
        let international_designator = l1[9..17].trim().to_string();

        let epoch_year: u32 = parse_field(l1, 18..20, "epoch year")?;
        let epoch_day: f64 = parse_field(l1, 20..32, "epoch day")?;
        let epoch = epoch_from_parts(epoch_year, epoch_day)?;
        let bstar = parse_exponent_field(&l1[53..61], "bstar")?;

        let inclination_deg: f64 = parse_field(l2, 8..16, "inclination")?;
        let raan_deg: f64 = parse_field(l2, 17..25, "raan")?;
        let ecc_digits = l2[26..33].trim();
        let eccentricity: f64 = format!("0.{ecc_digits}")
            .parse()
            .map_err(|_| invalid("eccentricity", ecc_digits))?;
        let argument_of_perigee_deg: f64 = parse_field(l2, 34..42, "argument of perigee")?;
        let mean_anomaly_deg: f64 = parse_field(l2, 43..51, "mean anomaly")?;
        let mean_motion_rev_per_day: f64 = parse_field(l2, 52..63, "mean motion")?;
        let revolution_number = l2[63..68].trim().parse().unwrap_or(0);

        if !(0.0..=180.0).contains(&inclination_deg) {
            return Err(invalid("inclination", &l2[8..16]));
        }

        Ok(Self {
            catalog_number: catalog_1,
            classification,
            international_designator,
            epoch,
            bstar,
            inclination_deg,
            raan_deg,
            eccentricity,
            argument_of_perigee_deg,
            mean_anomaly_deg,
            mean_motion_rev_per_day,
            revolution_number,
        })
    }

    /// Keplerian orbit for these mean elements.
    pub fn to_orbit(&self) -> Result<KeplerOrbit, PropagationError> {
        KeplerOrbit::from_mean_elements(
            self.inclination_deg,
            self.raan_deg,
            self.eccentricity,
            self.argument_of_perigee_deg,
            self.mean_anomaly_deg,
            self.mean_motion_rev_per_day,
        )
    }

    /// Format back into a standard line pair with checksums.
    pub fn to_lines(&self) -> (String, String) {
        let yy = self.epoch.year().rem_euclid(100);
        let day = day_of_year_fraction(&self.epoch);

        let line1_body = format!(
            "1 {:05}{} {:<8} {:02}{:012.8} {} {} {} 0 {:>4}",
            self.catalog_number,
            self.classification,
            self.international_designator,
            yy,
            day,
            " .00000000",
            " 00000-0",
            format_exponent_field(self.bstar),
            999,
        );
        let ecc_digits = (self.eccentricity * 1e7).round().min(9_999_999.0) as u32;
        let line2_body = format!(
            "2 {:05} {:8.4} {:8.4} {:07} {:8.4} {:8.4} {:11.8}{:5}",
            self.catalog_number,
            self.inclination_deg,
            self.raan_deg,
            ecc_digits,
            self.argument_of_perigee_deg,
            self.mean_anomaly_deg,
            self.mean_motion_rev_per_day,
            self.revolution_number % 100_000,
        );

        (append_checksum(&line1_body), append_checksum(&line2_body))
    }
}

/// Modulo-10 checksum over the first 68 columns; digits count their value and
/// minus signs count one.
pub fn checksum(line: &str) -> u32 {
    line.chars()
        .take(TLE_BODY_LEN)
        .map(|c| match c {
            '-' => 1,
            c => c.to_digit(10).unwrap_or(0),
        })
        .sum::<u32>()
        % 10
}

fn append_checksum(body: &str) -> String {
    format!("{body}{}", checksum(body))
}

fn check_line(line: &str, number: u8) -> Result<(), TleParseError> {
    if !line.is_ascii() {
        return Err(TleParseError::NotAscii { line: number });
    }
    if line.len() < TLE_BODY_LEN {
        return Err(TleParseError::TooShort {
            line: number,
            len: line.len(),
        });
    }
    let expected = if number == 1 { "1 " } else { "2 " };
    if &line[..2] != expected {
        return Err(TleParseError::WrongLineNumber {
            expected: number,
            found: line[..2].to_string(),
        });
    }
    // Checksum column is optional; verify it when present
    if let Some(found) = line[TLE_BODY_LEN..].chars().next().and_then(|c| c.to_digit(10)) {
        let expected = checksum(line);
        if found != expected {
            return Err(TleParseError::Checksum {
                line: number,
                expected,
                found,
            });
        }
    }
    Ok(())
}

fn invalid(field: &'static str, value: &str) -> TleParseError {
    TleParseError::InvalidField {
        field,
        value: value.to_string(),
    }
}

fn parse_field<T: std::str::FromStr>(
    line: &str,
    range: std::ops::Range<usize>,
    field: &'static str,
) -> Result<T, TleParseError> {
    let raw = &line[range];
    raw.trim().parse().map_err(|_| invalid(field, raw))
}

/// Parse the compact exponent notation used for B*: " 12345-4" = 0.12345e-4.
fn parse_exponent_field(raw: &str, field: &'static str) -> Result<f64, TleParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    let (sign, rest) = match s.as_bytes()[0] {
        b'-' => (-1.0, &s[1..]),
        b'+' => (1.0, &s[1..]),
        _ => (1.0, s),
    };
    let split = rest
        .rfind(['-', '+'])
        .filter(|&i| i > 0)
        .ok_or_else(|| invalid(field, raw))?;
    let mantissa: f64 = format!("0.{}", rest[..split].trim_start_matches('.'))
        .parse()
        .map_err(|_| invalid(field, raw))?;
    let exponent: i32 = rest[split..].parse().map_err(|_| invalid(field, raw))?;
    Ok(sign * mantissa * 10f64.powi(exponent))
}

/// Format a value in the compact exponent notation (8 columns).
fn format_exponent_field(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return " 00000-0".to_string();
    }
    let sign = if value < 0.0 { '-' } else { ' ' };
    let abs = value.abs();
    let mut exponent = abs.log10().floor() as i32 + 1;
    let mut digits = (abs / 10f64.powi(exponent) * 1e5).round() as u32;
    if digits >= 100_000 {
        digits /= 10;
        exponent += 1;
    }
    let exponent = exponent.clamp(-9, 9);
    let exp_sign = if exponent < 0 { '-' } else { '+' };
    format!("{sign}{digits:05}{exp_sign}{}", exponent.abs())
}

fn epoch_from_parts(two_digit_year: u32, day_of_year: f64) -> Result<DateTime<Utc>, TleParseError> {
    let year = if two_digit_year >= EPOCH_YEAR_PIVOT {
        1900 + two_digit_year
    } else {
        2000 + two_digit_year
    };
    if !(1.0..367.0).contains(&day_of_year) {
        return Err(invalid("epoch day", &day_of_year.to_string()));
    }
    let start = Utc
        .with_ymd_and_hms(year as i32, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| invalid("epoch year", &year.to_string()))?;
    let micros = ((day_of_year - 1.0) * SECONDS_PER_DAY * 1e6).round() as i64;
    Ok(start + Duration::microseconds(micros))
}

/// Day-of-year plus fraction of day, 1-based (TLE epoch convention).
pub fn day_of_year_fraction(dt: &DateTime<Utc>) -> f64 {
    let seconds = dt.num_seconds_from_midnight() as f64 + dt.nanosecond() as f64 * 1e-9;
    dt.ordinal() as f64 + seconds / SECONDS_PER_DAY
}

/// Mean motion (rev/day) of a circular orbit at the given altitude.
pub fn mean_motion_for_altitude(altitude_km: f64) -> f64 {
    let a = EARTH_RADIUS_KM + altitude_km;
    let period = std::f64::consts::TAU * (a.powi(3) / MU_EARTH).sqrt();
    SECONDS_PER_DAY / period
}

/// Randomised but realistic LEO orbital parameters.
#[derive(Clone, Debug)]
pub struct LeoParams {
    pub altitude_km: f64,
    pub inclination_deg: f64,
    pub eccentricity: f64,
    pub raan_deg: f64,
    pub argument_of_perigee_deg: f64,
    pub mean_anomaly_deg: f64,
}

/// (min altitude km, max altitude km, probability)
const ALTITUDE_BANDS: [(f64, f64, f64); 5] = [
    (160.0, 300.0, 0.15),
    (300.0, 500.0, 0.30),
    (500.0, 800.0, 0.40),
    (800.0, 1200.0, 0.10),
    (1200.0, 2000.0, 0.05),
];

/// (min inclination deg, max inclination deg, probability); includes a
/// sun-synchronous band near 98°.
const INCLINATION_BANDS: [(f64, f64, f64); 7] = [
    (0.0, 20.0, 0.05),
    (20.0, 45.0, 0.15),
    (45.0, 60.0, 0.20),
    (60.0, 80.0, 0.15),
    (80.0, 100.0, 0.30),
    (97.0, 99.0, 0.10),
    (100.0, 120.0, 0.05),
];

fn pick_band<R: Rng + ?Sized>(rng: &mut R, bands: &[(f64, f64, f64)]) -> f64 {
    let roll: f64 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0;
    for &(lo, hi, p) in bands {
        cumulative += p;
        if roll <= cumulative {
            return rng.gen_range(lo..hi);
        }
    }
    let (lo, hi, _) = bands[bands.len() - 1];
    rng.gen_range(lo..hi)
}

impl LeoParams {
    /// Draw parameters from weighted altitude and inclination bands.
    ///
    /// Lower orbits get smaller eccentricities (drag circularises them).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let altitude_km = pick_band(rng, &ALTITUDE_BANDS);
        let inclination_deg = pick_band(rng, &INCLINATION_BANDS);
        Self::with_shape(rng, altitude_km, inclination_deg)
    }

    /// Fixed altitude and inclination, random orientation.
    pub fn with_shape<R: Rng + ?Sized>(rng: &mut R, altitude_km: f64, inclination_deg: f64) -> Self {
        let max_ecc = if altitude_km < 400.0 {
            0.003
        } else if altitude_km < 800.0 {
            0.01
        } else {
            0.02
        };
        Self {
            altitude_km,
            inclination_deg,
            eccentricity: rng.gen_range(0.0001..max_ecc),
            raan_deg: rng.gen_range(0.0..360.0),
            argument_of_perigee_deg: rng.gen_range(0.0..360.0),
            mean_anomaly_deg: rng.gen_range(0.0..360.0),
        }
    }
}

/// Generate a complete element set for the given parameters.
pub fn generate_tle<R: Rng + ?Sized>(
    rng: &mut R,
    catalog_number: u32,
    params: &LeoParams,
    epoch: DateTime<Utc>,
) -> TwoLineElements {
    // Drag is stronger for lower orbits
    let bstar_exp = if params.altitude_km < 400.0 {
        -5.0
    } else if params.altitude_km < 800.0 {
        -6.0
    } else {
        -7.0
    };
    let bstar = 10f64.powf(rng.gen_range(bstar_exp..bstar_exp + 1.0));

    TwoLineElements {
        catalog_number: catalog_number % 100_000,
        classification: 'U',
        international_designator: format!("{:02}001A", epoch.year().rem_euclid(100)),
        epoch,
        bstar,
        inclination_deg: params.inclination_deg,
        raan_deg: params.raan_deg,
        eccentricity: params.eccentricity,
        argument_of_perigee_deg: params.argument_of_perigee_deg,
        mean_anomaly_deg: params.mean_anomaly_deg,
        mean_motion_rev_per_day: mean_motion_for_altitude(params.altitude_km),
        revolution_number: rng.gen_range(1..5000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::test_utils::fixtures::{ISS_LINE1, ISS_LINE2};

    #[test]
    fn test_parse_reference_tle() {
        let tle = TwoLineElements::parse(ISS_LINE1, ISS_LINE2).unwrap();

        assert_eq!(tle.catalog_number, 25544);
        assert_eq!(tle.classification, 'U');
        assert_eq!(tle.international_designator, "98067A");
        assert_eq!(tle.epoch.year(), 2008);
        assert_eq!(tle.epoch.ordinal(), 264);
        assert_relative_eq!(tle.inclination_deg, 51.6416);
        assert_relative_eq!(tle.raan_deg, 247.4627);
        assert_relative_eq!(tle.eccentricity, 0.0006703);
        assert_relative_eq!(tle.mean_motion_rev_per_day, 15.72125391);
        assert_relative_eq!(tle.bstar, -0.11606e-4, epsilon = 1e-12);
        assert_eq!(tle.revolution_number, 56353);
    }

    #[test]
    fn test_checksum_reference_lines() {
        assert_eq!(checksum(ISS_LINE1), 7);
        assert_eq!(checksum(ISS_LINE2), 7);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut bad = ISS_LINE1[..68].to_string();
        bad.push('3');
        let err = TwoLineElements::parse(&bad, ISS_LINE2).unwrap_err();
        assert_eq!(
            err,
            TleParseError::Checksum {
                line: 1,
                expected: 7,
                found: 3
            }
        );
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert_eq!(
            TwoLineElements::parse("", ISS_LINE2).unwrap_err(),
            TleParseError::MissingLine(1)
        );
        assert!(matches!(
            TwoLineElements::parse("1 25544U", ISS_LINE2),
            Err(TleParseError::TooShort { line: 1, .. })
        ));
        assert!(matches!(
            TwoLineElements::parse(ISS_LINE2, ISS_LINE1),
            Err(TleParseError::WrongLineNumber { expected: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_catalog_mismatch() {
        let line2 = ISS_LINE2.replacen("25544", "25545", 1);
        // Drop the now-stale checksum column
        let line2 = &line2[..68];
        assert_eq!(
            TwoLineElements::parse(ISS_LINE1, line2).unwrap_err(),
            TleParseError::CatalogMismatch {
                line1: 25544,
                line2: 25545
            }
        );
    }

    #[test]
    fn test_generated_lines_parse_back() {
        let mut rng = StdRng::seed_from_u64(7);
        let epoch = Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap();
        let params = LeoParams::random(&mut rng);
        let tle = generate_tle(&mut rng, 40001, &params, epoch);

        let (line1, line2) = tle.to_lines();
        assert_eq!(line1.len(), 69);
        assert_eq!(line2.len(), 69);

        let parsed = TwoLineElements::parse(&line1, &line2).unwrap();
        assert_eq!(parsed.catalog_number, 40001);
        assert_relative_eq!(parsed.inclination_deg, params.inclination_deg, epsilon = 1e-4);
        assert_relative_eq!(parsed.eccentricity, params.eccentricity, epsilon = 1e-7);
        assert_relative_eq!(
            parsed.mean_motion_rev_per_day,
            tle.mean_motion_rev_per_day,
            epsilon = 1e-8
        );
        assert!((parsed.epoch - epoch).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_mean_motion_for_iss_altitude() {
        // ~15.5 rev/day at 420 km
        assert_relative_eq!(mean_motion_for_altitude(420.0), 15.5, epsilon = 0.1);
    }

    #[test]
    fn test_exponent_field_formatting() {
        assert_eq!(format_exponent_field(-0.11606e-4), "-11606-4");
        assert_eq!(format_exponent_field(0.0), " 00000-0");
        let v = parse_exponent_field(&format_exponent_field(3.2e-6), "bstar").unwrap();
        assert_relative_eq!(v, 3.2e-6, epsilon = 1e-11);
    }

    #[test]
    fn test_leo_params_stay_in_leo() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..200 {
            let p = LeoParams::random(&mut rng);
            assert!((160.0..2000.0).contains(&p.altitude_km));
            assert!((0.0..120.0).contains(&p.inclination_deg));
            assert!(p.eccentricity < 0.02);
        }
    }
}
