//! Reader for the `info_XXXXX.txt` header RAMSES writes next to each output.
//!
//! ```text
//! ncpu        =         64
//! ndim        =          3
//! ...
//! boxlen      =  0.100000000000000E+01
//! time        = -0.152393286717453E+01
//! aexp        =  0.333333333333333E+00
//! H0          =  0.700000000000000E+02
//! ...
//! ordering type=hilbert
//! ```

use crate::cosmology::Cosmology;
use crate::dataset::{DatasetError, ParameterValue, SimulationDataset};
use crate::units::{Dimensions, Quantity, UnitRegistry};
use failure::{Error, ResultExt};
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref HEADER_LINE: Regex =
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(\S+)\s*$").unwrap();
}

#[derive(Debug, Clone)]
pub struct RamsesInfo {
    path: PathBuf,
    header: BTreeMap<String, ParameterValue>,
    registry: UnitRegistry,
}

fn parse_value(raw: &str) -> ParameterValue {
    if let Ok(i) = raw.parse::<i64>() {
        ParameterValue::Int(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        ParameterValue::Float(f)
    } else {
        ParameterValue::Str(raw.to_string())
    }
}

impl RamsesInfo {
    pub fn from_file(path: impl AsRef<Path>) -> Result<RamsesInfo, Error> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|_| format!("impossible to open {}", path.display()))?;
        let info = RamsesInfo::from_reader(std::io::BufReader::new(f), path)
            .with_context(|_| format!("invalid RAMSES info file {}", path.display()))?;
        Ok(info)
    }

    pub fn from_reader(reader: impl BufRead, path: impl Into<PathBuf>) -> Result<RamsesInfo, Error> {
        let mut header = BTreeMap::new();
        for line in reader.lines() {
            let line = line?;
            // the domain decomposition table follows, we do not need it
            if line.trim_start().starts_with("ordering") {
                break;
            }
            if let Some(caps) = HEADER_LINE.captures(&line) {
                header.insert(caps[1].to_string(), parse_value(&caps[2]));
            }
        }
        debug!("{} entries read from the RAMSES header", header.len());

        let mut info = RamsesInfo {
            path: path.into(),
            header,
            registry: UnitRegistry::default(),
        };
        info.registry = info.build_registry();
        Ok(info)
    }

    fn real(&self, key: &'static str) -> Result<f64, DatasetError> {
        let value = self
            .header
            .get(key)
            .ok_or(DatasetError::MissingField(key))?;
        value
            .as_f64()
            .ok_or_else(|| DatasetError::InvalidField(key.to_string(), value.to_string()))
    }

    /// Idealised runs are written with a non-negative time, H0 = 1 and
    /// aexp = 1. Anything else, including the z = 0 output of a cosmological
    /// run (time = 0, aexp = 1), is cosmological.
    pub fn is_cosmological(&self) -> bool {
        let idealised = self.real("time").map_or(false, |t| t >= 0.)
            && self.real("H0").map_or(false, |h| h == 1.)
            && self.real("aexp").map_or(false, |a| a == 1.);
        !idealised
    }

    fn build_registry(&self) -> UnitRegistry {
        let mut registry = UnitRegistry::with_scale_factor(self.real("aexp").unwrap_or(1.));
        let (l, d, t) = match (self.real("unit_l"), self.real("unit_d"), self.real("unit_t")) {
            (Ok(l), Ok(d), Ok(t)) => (l, d, t),
            _ => return registry,
        };
        let density = Dimensions {
            mass: 1,
            length: -3,
            ..Dimensions::DIMENSIONLESS
        };
        let velocity = Dimensions {
            length: 1,
            time: -1,
            ..Dimensions::DIMENSIONLESS
        };
        registry.register("code_length", l, Dimensions::LENGTH);
        registry.register("code_time", t, Dimensions::TIME);
        registry.register("code_density", d, density);
        registry.register("code_mass", d * l.powi(3), Dimensions::MASS);
        registry.register("code_velocity", l / t, velocity);
        registry
    }
}

impl SimulationDataset for RamsesInfo {
    fn current_redshift(&self) -> Result<f64, DatasetError> {
        Ok(1. / self.real("aexp")? - 1.)
    }

    /// Cosmic age for cosmological runs, the raw `time` in code units
    /// otherwise.
    fn current_time(&self) -> Result<Quantity, DatasetError> {
        if self.is_cosmological() {
            let cosmology = self.cosmology()?;
            let age = cosmology.age(self.hubble_constant()?, self.real("aexp")?);
            Ok(self.registry.quantity(age, "s")?.in_units(&self.registry, "Gyr")?)
        } else {
            Ok(self.registry.quantity(self.real("time")?, "code_time")?)
        }
    }

    fn omega_matter(&self) -> Result<f64, DatasetError> {
        self.real("omega_m")
    }

    fn omega_lambda(&self) -> Result<f64, DatasetError> {
        self.real("omega_l")
    }

    fn hubble_constant(&self) -> Result<f64, DatasetError> {
        Ok(self.real("H0")? / 100.)
    }

    fn domain_width(&self) -> Result<Vec<Quantity>, DatasetError> {
        let boxlen = self.real("boxlen")?;
        let ndim = self.real("ndim").unwrap_or(3.) as usize;
        let width = self.registry.quantity(boxlen, "code_length")?;
        Ok(vec![width; ndim])
    }

    fn fullpath(&self) -> Result<String, DatasetError> {
        Ok(self
            .path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default())
    }

    fn parameters(&self) -> Result<BTreeMap<String, ParameterValue>, DatasetError> {
        Ok(self.header.clone())
    }

    fn cosmology(&self) -> Result<Cosmology, DatasetError> {
        Ok(Cosmology::new(self.real("omega_m")?, self.real("omega_l")?)
            .with_curvature(self.real("omega_k").unwrap_or(0.)))
    }

    fn unit_registry(&self) -> &UnitRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const IDEALISED: &str = "ncpu        =          4
ndim        =          3
levelmin    =          7
levelmax    =         12
ngridmax    =     100000
nstep_coarse=        120

boxlen      =  0.100000000000000E+03
time        =  0.250000000000000E+01
aexp        =  0.100000000000000E+01
H0          =  0.100000000000000E+01
omega_m     =  0.100000000000000E+01
omega_l     =  0.000000000000000E+00
omega_k     =  0.000000000000000E+00
omega_b     =  0.000000000000000E+00
unit_l      =  0.308567758128200E+22
unit_d      =  0.677025430198932E-22
unit_t      =  0.470430312423675E+15

ordering type=hilbert
   DOMAIN   ind_min                 ind_max
       1   0.000000000000000E+00   0.134217728000000E+09
";

    fn idealised() -> RamsesInfo {
        RamsesInfo::from_reader(IDEALISED.as_bytes(), "/runs/galaxy/output_00012/info_00012.txt")
            .unwrap()
    }

    #[test]
    fn header_values_are_typed() {
        let info = idealised();
        let params = info.parameters().unwrap();
        assert_eq!(params["ncpu"], ParameterValue::Int(4));
        assert_eq!(params["nstep_coarse"], ParameterValue::Int(120));
        assert_eq!(params["boxlen"], ParameterValue::Float(100.));
        assert!(!params.contains_key("ordering"));
        assert!(!params.contains_key("DOMAIN"));
    }

    #[test]
    fn idealised_run_keeps_code_time() {
        let info = idealised();
        assert!(!info.is_cosmological());
        assert_eq!(info.current_redshift().unwrap(), 0.);
        let t = info.current_time().unwrap();
        assert_eq!(t.unit().symbol(), "code_time");
        assert_eq!(t.value(), 2.5);
        let myr = t.in_units(info.unit_registry(), "Myr").unwrap();
        assert_relative_eq!(myr.value(), 2.5 * 0.470430312423675e15 / 3.15576e13, max_relative = 1e-12);
    }

    #[test]
    fn domain_width_in_code_length() {
        let info = idealised();
        let width = info.domain_width().unwrap();
        assert_eq!(width.len(), 3);
        let kpc = width[0].in_units(info.unit_registry(), "kpc").unwrap();
        assert_relative_eq!(kpc.value(), 100., max_relative = 1e-6);
        assert_eq!(info.fullpath().unwrap(), "/runs/galaxy/output_00012");
    }

    #[test]
    fn truncated_header_reports_missing_field() {
        let info = RamsesInfo::from_reader("ncpu = 4\nboxlen = 1.0\n".as_bytes(), "info_00001.txt")
            .unwrap();
        match info.current_redshift() {
            Err(DatasetError::MissingField(f)) => assert_eq!(f, "aexp"),
            r => panic!("unexpected result {:?}", r),
        }
        // no unit_l, so code_length is not defined either
        assert!(matches!(info.domain_width(), Err(DatasetError::Unit(_))));
    }

    #[test]
    fn last_cosmological_output_reports_cosmic_age() {
        let header = IDEALISED
            .replace(
                "time        =  0.250000000000000E+01",
                "time        =  0.000000000000000E+00",
            )
            .replace(
                "H0          =  0.100000000000000E+01",
                "H0          =  0.700000000000000E+02",
            )
            .replace(
                "omega_m     =  0.100000000000000E+01",
                "omega_m     =  0.300000000000000E+00",
            )
            .replace(
                "omega_l     =  0.000000000000000E+00",
                "omega_l     =  0.700000000000000E+00",
            );
        let info = RamsesInfo::from_reader(header.as_bytes(), "info_00100.txt").unwrap();
        assert!(info.is_cosmological());
        assert_eq!(info.current_redshift().unwrap(), 0.);
        let t = info.current_time().unwrap();
        assert_eq!(t.unit().symbol(), "Gyr");
        assert!((t.value() - 13.47).abs() < 0.01, "age today {}", t);
    }
}
