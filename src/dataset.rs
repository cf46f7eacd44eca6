//! The contract a simulation snapshot has to fulfil to have its attributes
//! derived, and a JSON description implementing it.

use crate::cosmology::Cosmology;
use crate::units::{Quantity, UnitError, UnitRegistry};
use failure::{Error, Fail, ResultExt};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Fail)]
pub enum DatasetError {
    #[fail(display = "dataset has no attribute '{}'", _0)]
    MissingField(&'static str),
    #[fail(display = "invalid value for '{}': {}", _0, _1)]
    InvalidField(String, String),
    #[fail(display = "{}", _0)]
    Unit(#[cause] UnitError),
}

impl From<UnitError> for DatasetError {
    fn from(e: UnitError) -> Self {
        DatasetError::Unit(e)
    }
}

/// A run-time parameter of the simulation, copied verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParameterValue::Int(i) => Some(i as f64),
            ParameterValue::Float(f) => Some(f),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{}", b),
            ParameterValue::Int(i) => write!(f, "{}", i),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Str(s) => write!(f, "{}", s),
        }
    }
}

/// What the attribute derivation reads from a snapshot.
///
/// Accessors fail with [`DatasetError::MissingField`] when the snapshot does
/// not provide the value, nothing is validated beyond that.
pub trait SimulationDataset {
    fn current_redshift(&self) -> Result<f64, DatasetError>;
    fn current_time(&self) -> Result<Quantity, DatasetError>;
    fn omega_matter(&self) -> Result<f64, DatasetError>;
    fn omega_lambda(&self) -> Result<f64, DatasetError>;
    /// Dimensionless h, H0 = 100 h km/s/Mpc.
    fn hubble_constant(&self) -> Result<f64, DatasetError>;
    fn domain_width(&self) -> Result<Vec<Quantity>, DatasetError>;
    fn fullpath(&self) -> Result<String, DatasetError>;
    fn parameters(&self) -> Result<BTreeMap<String, ParameterValue>, DatasetError>;
    /// Density parameters at z = 0.
    fn cosmology(&self) -> Result<Cosmology, DatasetError>;
    fn unit_registry(&self) -> &UnitRegistry;
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuantityDescription {
    pub value: f64,
    pub units: String,
}

/// A snapshot described in a JSON document, every field being optional.
///
/// ```json
/// {
///   "current_redshift": 0.0,
///   "current_time": {"value": 13.47, "units": "Gyr"},
///   "omega_matter": 0.3,
///   "omega_lambda": 0.7,
///   "hubble_constant": 0.7,
///   "domain_width": [{"value": 100.0, "units": "Mpccm"}]
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SnapshotDescription {
    pub fullpath: Option<String>,
    pub current_redshift: Option<f64>,
    pub current_time: Option<QuantityDescription>,
    pub omega_matter: Option<f64>,
    pub omega_lambda: Option<f64>,
    pub hubble_constant: Option<f64>,
    pub domain_width: Option<Vec<QuantityDescription>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    /// When absent, a cosmology without curvature nor radiation is built
    /// from `omega_matter` and `omega_lambda`.
    pub cosmology: Option<Cosmology>,
    #[serde(skip)]
    registry: UnitRegistry,
}

impl SnapshotDescription {
    pub fn from_reader(reader: impl std::io::Read) -> Result<SnapshotDescription, Error> {
        let mut desc: SnapshotDescription = serde_json::from_reader(reader)?;
        desc.refresh_registry();
        Ok(desc)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<SnapshotDescription, Error> {
        let path = path.as_ref();
        let f = std::fs::File::open(path)
            .with_context(|_| format!("impossible to open {}", path.display()))?;
        let mut desc = SnapshotDescription::from_reader(std::io::BufReader::new(f))
            .with_context(|_| format!("invalid snapshot description {}", path.display()))?;
        if desc.fullpath.is_none() {
            desc.fullpath = path.parent().map(|p| p.display().to_string());
        }
        Ok(desc)
    }

    /// Comoving units depend on the redshift, the registry has to be rebuilt
    /// whenever it changes.
    pub fn refresh_registry(&mut self) {
        let scale_factor = self.current_redshift.map_or(1., |z| 1. / (1. + z));
        self.registry = UnitRegistry::with_scale_factor(scale_factor);
    }

    fn quantity(&self, q: &QuantityDescription) -> Result<Quantity, DatasetError> {
        Ok(self.registry.quantity(q.value, &q.units)?)
    }
}

impl SimulationDataset for SnapshotDescription {
    fn current_redshift(&self) -> Result<f64, DatasetError> {
        self.current_redshift
            .ok_or(DatasetError::MissingField("current_redshift"))
    }

    fn current_time(&self) -> Result<Quantity, DatasetError> {
        let t = self
            .current_time
            .as_ref()
            .ok_or(DatasetError::MissingField("current_time"))?;
        self.quantity(t)
    }

    fn omega_matter(&self) -> Result<f64, DatasetError> {
        self.omega_matter
            .ok_or(DatasetError::MissingField("omega_matter"))
    }

    fn omega_lambda(&self) -> Result<f64, DatasetError> {
        self.omega_lambda
            .ok_or(DatasetError::MissingField("omega_lambda"))
    }

    fn hubble_constant(&self) -> Result<f64, DatasetError> {
        self.hubble_constant
            .ok_or(DatasetError::MissingField("hubble_constant"))
    }

    fn domain_width(&self) -> Result<Vec<Quantity>, DatasetError> {
        self.domain_width
            .as_ref()
            .ok_or(DatasetError::MissingField("domain_width"))?
            .iter()
            .map(|q| self.quantity(q))
            .collect()
    }

    fn fullpath(&self) -> Result<String, DatasetError> {
        self.fullpath
            .clone()
            .ok_or(DatasetError::MissingField("fullpath"))
    }

    fn parameters(&self) -> Result<BTreeMap<String, ParameterValue>, DatasetError> {
        Ok(self.parameters.clone())
    }

    fn cosmology(&self) -> Result<Cosmology, DatasetError> {
        match self.cosmology {
            Some(c) => Ok(c),
            None => Ok(Cosmology::new(self.omega_matter()?, self.omega_lambda()?)),
        }
    }

    fn unit_registry(&self) -> &UnitRegistry {
        &self.registry
    }
}
