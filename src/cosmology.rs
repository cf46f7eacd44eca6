use crate::units::{Quantity, UnitError, UnitRegistry};
use serde_derive::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 1 km/s/Mpc expressed in 1/s.
pub const KM_S_MPC_IN_PER_S: f64 = 3.24077929e-20;
pub const GRAVITATIONAL_CONSTANT: f64 = 4.51691362044e-39;
pub const GRAVITATIONAL_CONSTANT_UNITS: &str = "kpc**3/(Msun*s**2)";
pub const HUBBLE_UNITS: &str = "1/s";
pub const CRITICAL_DENSITY_UNITS: &str = "Msun/kpc**3";

/// Multiples of the critical density bounding a halo (M200, M500, M2500).
pub const OVERDENSITY_THRESHOLDS: [f64; 3] = [200.0, 500.0, 2500.0];

// Bryan & Norman (1998) style fit, the normalisation is 18 pi^2
const VIRIAL_NORMALISATION: f64 = 177.65287921960845;
const VIRIAL_AMPLITUDE: f64 = 0.4093;
const VIRIAL_EXPONENT: f64 = 0.9052;

const AGE_INTEGRATION_STEPS: usize = 2000;

/// Density parameters at z = 0.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Cosmology {
    pub omega_matter: f64,
    pub omega_lambda: f64,
    #[serde(default)]
    pub omega_curvature: f64,
    #[serde(default)]
    pub omega_radiation: f64,
}

impl Cosmology {
    pub fn new(omega_matter: f64, omega_lambda: f64) -> Cosmology {
        Cosmology {
            omega_matter,
            omega_lambda,
            omega_curvature: 0.,
            omega_radiation: 0.,
        }
    }

    pub fn with_curvature(self, omega_curvature: f64) -> Cosmology {
        Cosmology {
            omega_curvature,
            ..self
        }
    }

    pub fn with_radiation(self, omega_radiation: f64) -> Cosmology {
        Cosmology {
            omega_radiation,
            ..self
        }
    }

    /// E(z) = H(z) / H0
    pub fn expansion_factor(&self, redshift: f64) -> f64 {
        let zp1 = 1. + redshift;
        (self.omega_lambda
            + self.omega_curvature * zp1.powi(2)
            + self.omega_matter * zp1.powi(3)
            + self.omega_radiation * zp1.powi(4))
        .sqrt()
    }

    /// Matter density parameter at the given redshift.
    pub fn omega_matter_at(&self, redshift: f64) -> f64 {
        self.omega_matter * (1. + redshift).powi(3) / self.expansion_factor(redshift).powi(2)
    }

    /// Cosmic time elapsed since a = 0, in seconds.
    ///
    /// Integrates dt = da / (a H(a)) with the substitution a = u², which
    /// keeps the integrand smooth at the origin, using Simpson's rule.
    pub fn age(&self, hubble_constant: f64, scale_factor: f64) -> f64 {
        let upper = scale_factor.sqrt();
        let step = upper / AGE_INTEGRATION_STEPS as f64;
        let integrand = |u: f64| {
            if u == 0. {
                return 0.;
            }
            let a = u * u;
            2. / (u * self.expansion_factor(1. / a - 1.))
        };
        let inner: f64 = (1..AGE_INTEGRATION_STEPS)
            .map(|i| {
                let weight = if i % 2 == 1 { 4. } else { 2. };
                weight * integrand(i as f64 * step)
            })
            .sum();
        let integral = step / 3. * (integrand(0.) + inner + integrand(upper));
        integral / hubble_parameter_today(hubble_constant)
    }
}

/// H0 in 1/s for a dimensionless hubble constant h (H0 = 100 h km/s/Mpc).
pub fn hubble_parameter_today(hubble_constant: f64) -> f64 {
    hubble_constant * 100. * KM_S_MPC_IN_PER_S
}

pub fn gravitational_constant(registry: &UnitRegistry) -> Result<Quantity, UnitError> {
    registry.quantity(GRAVITATIONAL_CONSTANT, GRAVITATIONAL_CONSTANT_UNITS)
}

/// 3 H² / (8 π G), expressed in Msun/kpc³.
pub fn critical_density(
    hubble: &Quantity,
    gravitational_constant: &Quantity,
    registry: &UnitRegistry,
) -> Result<Quantity, UnitError> {
    let numerator = hubble.powi(2) * 3.;
    let denominator = gravitational_constant.clone() * (8. * PI);
    (&numerator / &denominator).in_units(registry, CRITICAL_DENSITY_UNITS)
}

/// Virial overdensity relative to the critical density, for a matter
/// density parameter `omega_matter_z` at the epoch of interest.
///
/// Ωm(z) ≥ 1 is treated as Einstein-de Sitter (x = 0), which also absorbs
/// rounding of Ωm(z) just above 1 in flat matter-only models.
pub fn virial_overdensity(omega_matter_z: f64) -> f64 {
    let x = (1. / omega_matter_z - 1.).max(0.);
    (VIRIAL_NORMALISATION * (1. + VIRIAL_AMPLITUDE * x.powf(VIRIAL_EXPONENT)) - 1.) * omega_matter_z
}
