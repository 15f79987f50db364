//! Kepler orbit solver using Newton's method for the Kepler equation.
//!
//! Propagates mean elements to an Earth-centred inertial state, including the
//! J2 secular drift of the node and perigee.

use bevy::math::DVec3;

use crate::types::{
    DEG_TO_RAD, EARTH_EQUATORIAL_RADIUS_KM, EARTH_RADIUS_KM, J2, MU_EARTH, SECONDS_PER_DAY,
};

/// Newton iterations before giving up on Kepler's equation.
const MAX_KEPLER_ITERATIONS: usize = 50;

/// Convergence tolerance on the eccentric anomaly (radians).
const KEPLER_TOLERANCE: f64 = 1e-12;

/// Failure reported by the propagation model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PropagationError {
    #[error("eccentricity {0} is not elliptical (must be in [0, 1))")]
    NonElliptical(f64),

    #[error("mean motion {0} rev/day must be positive")]
    InvalidMeanMotion(f64),

    #[error("orbit has decayed: perigee altitude {perigee_altitude_km:.1} km")]
    Decayed { perigee_altitude_km: f64 },

    #[error("Kepler's equation did not converge for M={mean_anomaly}, e={eccentricity}")]
    NoConvergence { mean_anomaly: f64, eccentricity: f64 },

    #[error("propagation produced a non-finite state")]
    NonFinite,
}

/// Position and velocity in the ECI frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateVector {
    /// Position in km
    pub position: DVec3,
    /// Velocity in km/s
    pub velocity: DVec3,
}

/// Keplerian mean elements referenced to an epoch.
/// Angles in radians, distances in km, time in seconds.
#[derive(Clone, Debug)]
pub struct KeplerOrbit {
    /// Semi-major axis in km
    pub semi_major_axis: f64,
    /// Eccentricity (dimensionless, 0 ≤ e < 1)
    pub eccentricity: f64,
    /// Inclination in radians
    pub inclination: f64,
    /// Right ascension of the ascending node at epoch in radians
    pub raan: f64,
    /// Argument of perigee at epoch in radians
    pub argument_of_perigee: f64,
    /// Mean anomaly at epoch in radians
    pub mean_anomaly_at_epoch: f64,
    /// Mean motion in radians per second
    pub mean_motion: f64,
}

impl KeplerOrbit {
    /// Build an orbit from TLE-style mean elements.
    ///
    /// # Arguments
    /// * `inclination_deg`, `raan_deg`, `argp_deg`, `mean_anomaly_deg` - angles in degrees
    /// * `eccentricity` - must be in [0, 1)
    /// * `mean_motion_rev_per_day` - revolutions per day, must be positive
    ///
    /// Rejects orbits whose perigee lies below the Earth's surface.
    pub fn from_mean_elements(
        inclination_deg: f64,
        raan_deg: f64,
        eccentricity: f64,
        argp_deg: f64,
        mean_anomaly_deg: f64,
        mean_motion_rev_per_day: f64,
    ) -> Result<Self, PropagationError> {
        if !(0.0..1.0).contains(&eccentricity) {
            return Err(PropagationError::NonElliptical(eccentricity));
        }
        if mean_motion_rev_per_day <= 0.0 || !mean_motion_rev_per_day.is_finite() {
            return Err(PropagationError::InvalidMeanMotion(mean_motion_rev_per_day));
        }

        let mean_motion = mean_motion_rev_per_day * std::f64::consts::TAU / SECONDS_PER_DAY;
        // Kepler's third law: a = (mu / n²)^(1/3)
        let semi_major_axis = (MU_EARTH / (mean_motion * mean_motion)).cbrt();

        let perigee_altitude_km = semi_major_axis * (1.0 - eccentricity) - EARTH_RADIUS_KM;
        if perigee_altitude_km <= 0.0 {
            return Err(PropagationError::Decayed { perigee_altitude_km });
        }

        Ok(Self {
            semi_major_axis,
            eccentricity,
            inclination: inclination_deg * DEG_TO_RAD,
            raan: raan_deg * DEG_TO_RAD,
            argument_of_perigee: argp_deg * DEG_TO_RAD,
            mean_anomaly_at_epoch: mean_anomaly_deg * DEG_TO_RAD,
            mean_motion,
        })
    }

    /// Solve Kepler's equation M = E - e*sin(E) for eccentric anomaly E
    /// using Newton's method.
    ///
    /// Returns an error when the iteration limit is hit without converging.
    pub fn solve_eccentric_anomaly(&self, mean_anomaly: f64) -> Result<f64, PropagationError> {
        // Normalize mean anomaly to [0, 2π)
        let m = mean_anomaly.rem_euclid(std::f64::consts::TAU);

        // Initial guess: E = M for low eccentricity, π for high e
        let mut e_anomaly = if self.eccentricity < 0.8 {
            m
        } else {
            std::f64::consts::PI
        };

        for _ in 0..MAX_KEPLER_ITERATIONS {
            let f = e_anomaly - self.eccentricity * e_anomaly.sin() - m;
            let f_prime = 1.0 - self.eccentricity * e_anomaly.cos();

            let delta = f / f_prime;
            e_anomaly -= delta;

            if delta.abs() < KEPLER_TOLERANCE {
                return Ok(e_anomaly);
            }
        }

        Err(PropagationError::NoConvergence {
            mean_anomaly: m,
            eccentricity: self.eccentricity,
        })
    }

    /// Compute true anomaly from eccentric anomaly.
    pub fn eccentric_to_true_anomaly(&self, eccentric_anomaly: f64) -> f64 {
        let e = self.eccentricity;
        let half_e = eccentric_anomaly / 2.0;

        // atan2 keeps the full quadrant
        let y = (1.0 + e).sqrt() * half_e.sin();
        let x = (1.0 - e).sqrt() * half_e.cos();
        2.0 * y.atan2(x)
    }

    /// Semi-latus rectum p = a(1 - e²) in km.
    fn semi_latus_rectum(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.eccentricity * self.eccentricity)
    }

    /// Secular J2 rates of (RAAN, argument of perigee) in rad/s.
    pub fn j2_rates(&self) -> (f64, f64) {
        let p = self.semi_latus_rectum();
        let factor = 1.5 * J2 * (EARTH_EQUATORIAL_RADIUS_KM / p).powi(2) * self.mean_motion;
        let cos_i = self.inclination.cos();
        let raan_rate = -factor * cos_i;
        let argp_rate = 0.5 * factor * (5.0 * cos_i * cos_i - 1.0);
        (raan_rate, argp_rate)
    }

    /// Propagate to `dt` seconds after epoch.
    pub fn propagate(&self, dt: f64) -> Result<StateVector, PropagationError> {
        let (raan_rate, argp_rate) = self.j2_rates();
        let raan = self.raan + raan_rate * dt;
        let argp = self.argument_of_perigee + argp_rate * dt;

        let mean_anomaly = self.mean_anomaly_at_epoch + self.mean_motion * dt;
        let e_anomaly = self.solve_eccentric_anomaly(mean_anomaly)?;
        let nu = self.eccentric_to_true_anomaly(e_anomaly);

        let e = self.eccentricity;
        let p = self.semi_latus_rectum();
        let r = p / (1.0 + e * nu.cos());
        let sqrt_mu_p = (MU_EARTH / p).sqrt();

        // Perifocal frame
        let pos_pf = DVec3::new(r * nu.cos(), r * nu.sin(), 0.0);
        let vel_pf = DVec3::new(-sqrt_mu_p * nu.sin(), sqrt_mu_p * (e + nu.cos()), 0.0);

        let position = perifocal_to_eci(pos_pf, raan, self.inclination, argp);
        let velocity = perifocal_to_eci(vel_pf, raan, self.inclination, argp);

        if !position.is_finite() || !velocity.is_finite() {
            return Err(PropagationError::NonFinite);
        }

        Ok(StateVector { position, velocity })
    }

    /// Orbital period in seconds.
    pub fn period(&self) -> f64 {
        std::f64::consts::TAU / self.mean_motion
    }
}

/// Rotate a perifocal vector into ECI: R3(-Ω) · R1(-i) · R3(-ω).
fn perifocal_to_eci(v: DVec3, raan: f64, inclination: f64, argp: f64) -> DVec3 {
    let (sin_o, cos_o) = raan.sin_cos();
    let (sin_i, cos_i) = inclination.sin_cos();
    let (sin_w, cos_w) = argp.sin_cos();

    let r11 = cos_o * cos_w - sin_o * sin_w * cos_i;
    let r12 = -cos_o * sin_w - sin_o * cos_w * cos_i;
    let r21 = sin_o * cos_w + cos_o * sin_w * cos_i;
    let r22 = -sin_o * sin_w + cos_o * cos_w * cos_i;
    let r31 = sin_w * sin_i;
    let r32 = cos_w * sin_i;

    DVec3::new(
        r11 * v.x + r12 * v.y,
        r21 * v.x + r22 * v.y,
        r31 * v.x + r32 * v.y,
    )
}
