//! Cosmological attributes of a snapshot and their persistence.
//!
//! Layout written by [`SimulationAttributes::serialise`]:
//!
//! ```text
//! simulation_attributes/      one attribute per field
//!     units/                  field name -> unit expression, unit-bearing fields only
//!     parameters/             simulation parameters, verbatim
//! ```

use crate::cosmology::{
    critical_density, gravitational_constant, hubble_parameter_today, virial_overdensity,
    HUBBLE_UNITS, OVERDENSITY_THRESHOLDS,
};
use crate::dataset::{DatasetError, ParameterValue, SimulationDataset};
use crate::store::{AttrValue, Group, StoreError};
use crate::units::{Quantity, UnitError, UnitRegistry};
use failure::Fail;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;

pub const ATTRIBUTES_GROUP: &str = "simulation_attributes";
pub const UNITS_GROUP: &str = "units";
pub const PARAMETERS_GROUP: &str = "parameters";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    Str,
    Quantity,
    FloatArray,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Quantity(Quantity),
    FloatArray(Vec<f64>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match *self {
            FieldValue::Int(_) => FieldKind::Int,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Str(_) => FieldKind::Str,
            FieldValue::Quantity(_) => FieldKind::Quantity,
            FieldValue::FloatArray(_) => FieldKind::FloatArray,
        }
    }

    /// The stored attribute, and the unit expression to store aside for
    /// quantities.
    fn encode(self) -> (AttrValue, Option<String>) {
        match self {
            FieldValue::Int(i) => (AttrValue::Int(i), None),
            FieldValue::Float(f) => (AttrValue::Float(f), None),
            FieldValue::Bool(b) => (AttrValue::Bool(b), None),
            FieldValue::Str(s) => (AttrValue::Str(s), None),
            FieldValue::Quantity(q) => (
                AttrValue::Float(q.value()),
                Some(q.unit().symbol().to_string()),
            ),
            FieldValue::FloatArray(a) => (AttrValue::FloatArray(a), None),
        }
    }

    fn decode(value: &AttrValue) -> FieldValue {
        match value {
            AttrValue::Int(i) => FieldValue::Int(*i),
            AttrValue::Float(f) => FieldValue::Float(*f),
            AttrValue::Bool(b) => FieldValue::Bool(*b),
            AttrValue::Str(s) => FieldValue::Str(s.clone()),
            AttrValue::FloatArray(a) => FieldValue::FloatArray(a.clone()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Str(s) => write!(f, "{}", s),
            FieldValue::Quantity(q) => write!(f, "{}", q),
            FieldValue::FloatArray(a) => write!(f, "{:?}", a),
        }
    }
}

/// Persisted fields, with the kind each one is encoded as.
pub static FIELDS: [(&str, FieldKind); 15] = [
    ("redshift", FieldKind::Float),
    ("scale_factor", FieldKind::Float),
    ("time", FieldKind::Quantity),
    ("omega_matter", FieldKind::Float),
    ("omega_lambda", FieldKind::Float),
    ("hubble_constant", FieldKind::Float),
    ("boxsize", FieldKind::Quantity),
    ("E_z", FieldKind::Float),
    ("Om_z", FieldKind::Float),
    ("H_z", FieldKind::Quantity),
    ("G", FieldKind::Quantity),
    ("critical_density", FieldKind::Quantity),
    ("Densities", FieldKind::FloatArray),
    ("virial_overdensity", FieldKind::Float),
    ("fullpath", FieldKind::Str),
];

pub fn field_kind(name: &str) -> Option<FieldKind> {
    FIELDS.iter().find(|(n, _)| *n == name).map(|&(_, k)| k)
}

/// Unit registry at the epoch recorded in a store, so comoving units are
/// restored with the scale factor they were written with.
///
/// Falls back to a = 1 when the store holds no scale factor.
pub fn stored_unit_registry(root: &Group) -> UnitRegistry {
    let scale_factor = root
        .group(ATTRIBUTES_GROUP)
        .and_then(|group| group.attr("scale_factor"));
    match scale_factor {
        Some(AttrValue::Float(a)) if *a > 0. => UnitRegistry::with_scale_factor(*a),
        Some(AttrValue::Int(a)) if *a > 0 => UnitRegistry::with_scale_factor(*a as f64),
        _ => UnitRegistry::default(),
    }
}

#[derive(Debug, Fail)]
pub enum AttributesError {
    #[fail(display = "{}", _0)]
    Dataset(#[cause] DatasetError),
    #[fail(display = "{}", _0)]
    Unit(#[cause] UnitError),
    #[fail(display = "{}", _0)]
    Store(#[cause] StoreError),
    #[fail(display = "attribute '{}' should be {:?}, found {:?}", _0, _1, _2)]
    KindMismatch(String, FieldKind, FieldKind),
    #[fail(display = "unit given for '{}' but the attribute is missing", _0)]
    OrphanUnit(String),
    #[fail(display = "unit of '{}' should be a string, found {}", _0, _1)]
    InvalidUnit(String, &'static str),
    #[fail(display = "parameter '{}' cannot be a {}", _0, _1)]
    InvalidParameter(String, &'static str),
    #[fail(display = "the dataset domain width is empty")]
    EmptyDomain,
}

impl From<DatasetError> for AttributesError {
    fn from(e: DatasetError) -> Self {
        AttributesError::Dataset(e)
    }
}

impl From<UnitError> for AttributesError {
    fn from(e: UnitError) -> Self {
        AttributesError::Unit(e)
    }
}

impl From<StoreError> for AttributesError {
    fn from(e: StoreError) -> Self {
        AttributesError::Store(e)
    }
}

/// Attributes of a simulation snapshot. Every field is unset until
/// [`assign_attributes`](SimulationAttributes::assign_attributes) or
/// [`unpack`](SimulationAttributes::unpack) fills it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationAttributes {
    pub redshift: Option<f64>,
    pub scale_factor: Option<f64>,
    pub time: Option<Quantity>,
    pub omega_matter: Option<f64>,
    pub omega_lambda: Option<f64>,
    pub hubble_constant: Option<f64>,
    pub boxsize: Option<Quantity>,
    pub e_z: Option<f64>,
    pub om_z: Option<f64>,
    pub h_z: Option<Quantity>,
    pub g: Option<Quantity>,
    pub critical_density: Option<Quantity>,
    /// Critical density times 200, 500 and 2500, in Msun/kpc³.
    pub densities: Option<Vec<f64>>,
    pub virial_overdensity: Option<f64>,
    pub fullpath: Option<String>,
    pub parameters: BTreeMap<String, ParameterValue>,
    /// Attributes found in a store that are not one of the known fields.
    pub extra: BTreeMap<String, FieldValue>,
}

impl SimulationAttributes {
    pub fn new() -> SimulationAttributes {
        SimulationAttributes::default()
    }

    /// Derives every attribute from the dataset. The box size is expressed
    /// in `length_unit`.
    pub fn assign_attributes(
        &mut self,
        ds: &dyn SimulationDataset,
        length_unit: &str,
    ) -> Result<(), AttributesError> {
        let registry = ds.unit_registry();

        let redshift = ds.current_redshift()?;
        self.redshift = Some(redshift);
        self.scale_factor = Some(1. / (1. + redshift));
        self.time = Some(ds.current_time()?);
        self.omega_matter = Some(ds.omega_matter()?);
        self.omega_lambda = Some(ds.omega_lambda()?);
        self.fullpath = Some(ds.fullpath()?);
        let hubble_constant = ds.hubble_constant()?;
        self.hubble_constant = Some(hubble_constant);
        self.parameters = ds.parameters()?;
        let width = ds.domain_width()?;
        let boxsize = width.first().ok_or(AttributesError::EmptyDomain)?;
        self.boxsize = Some(boxsize.in_units(registry, length_unit)?);

        let h0 = registry.quantity(hubble_parameter_today(hubble_constant), HUBBLE_UNITS)?;
        let cosmology = ds.cosmology()?;
        let e_z = cosmology.expansion_factor(redshift);
        let om_z = cosmology.omega_matter_at(redshift);
        self.e_z = Some(e_z);
        self.om_z = Some(om_z);
        let h_z = h0 * e_z;
        let g = gravitational_constant(registry)?;
        let rho_crit = critical_density(&h_z, &g, registry)?;
        let delta_vir = virial_overdensity(om_z);
        if delta_vir.is_finite() {
            self.virial_overdensity = Some(delta_vir);
        } else {
            warn!("no virial overdensity for Om(z) = {}", om_z);
            self.virial_overdensity = None;
        }
        self.densities = Some(
            OVERDENSITY_THRESHOLDS
                .iter()
                .map(|threshold| threshold * rho_crit.value())
                .collect(),
        );
        debug!(
            "z = {}, E(z) = {}, critical density = {}",
            redshift, e_z, rho_crit
        );
        self.h_z = Some(h_z);
        self.g = Some(g);
        self.critical_density = Some(rho_crit);
        Ok(())
    }

    /// The populated fields, known ones first in declaration order, then the
    /// extra ones.
    pub fn fields(&self) -> Vec<(String, FieldValue)> {
        fn float(v: Option<f64>) -> Option<FieldValue> {
            v.map(FieldValue::Float)
        }
        fn quantity(v: &Option<Quantity>) -> Option<FieldValue> {
            v.clone().map(FieldValue::Quantity)
        }
        FIELDS
            .iter()
            .filter_map(|&(name, _)| {
                let value = match name {
                    "redshift" => float(self.redshift),
                    "scale_factor" => float(self.scale_factor),
                    "time" => quantity(&self.time),
                    "omega_matter" => float(self.omega_matter),
                    "omega_lambda" => float(self.omega_lambda),
                    "hubble_constant" => float(self.hubble_constant),
                    "boxsize" => quantity(&self.boxsize),
                    "E_z" => float(self.e_z),
                    "Om_z" => float(self.om_z),
                    "H_z" => quantity(&self.h_z),
                    "G" => quantity(&self.g),
                    "critical_density" => quantity(&self.critical_density),
                    "Densities" => self.densities.clone().map(FieldValue::FloatArray),
                    "virial_overdensity" => float(self.virial_overdensity),
                    "fullpath" => self.fullpath.clone().map(FieldValue::Str),
                    _ => None,
                };
                value.map(|v| (name.to_string(), v))
            })
            .chain(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect()
    }

    /// Sets a field from a decoded value.
    ///
    /// Integers are accepted for float fields, and a bare float for a
    /// quantity field becomes dimensionless. Unknown names go to `extra`.
    pub fn set_field(&mut self, name: &str, value: FieldValue) -> Result<(), AttributesError> {
        let expected = match field_kind(name) {
            Some(k) => k,
            None => {
                self.extra.insert(name.to_string(), value);
                return Ok(());
            }
        };
        let value = match (expected, value) {
            (FieldKind::Float, FieldValue::Int(i)) => FieldValue::Float(i as f64),
            (FieldKind::Quantity, FieldValue::Float(f)) => {
                warn!("no unit stored for '{}', it is restored as dimensionless", name);
                FieldValue::Quantity(Quantity::dimensionless(f))
            }
            (_, v) => v,
        };
        if value.kind() != expected {
            return Err(AttributesError::KindMismatch(
                name.to_string(),
                expected,
                value.kind(),
            ));
        }
        match (name, value) {
            ("redshift", FieldValue::Float(v)) => self.redshift = Some(v),
            ("scale_factor", FieldValue::Float(v)) => self.scale_factor = Some(v),
            ("time", FieldValue::Quantity(q)) => self.time = Some(q),
            ("omega_matter", FieldValue::Float(v)) => self.omega_matter = Some(v),
            ("omega_lambda", FieldValue::Float(v)) => self.omega_lambda = Some(v),
            ("hubble_constant", FieldValue::Float(v)) => self.hubble_constant = Some(v),
            ("boxsize", FieldValue::Quantity(q)) => self.boxsize = Some(q),
            ("E_z", FieldValue::Float(v)) => self.e_z = Some(v),
            ("Om_z", FieldValue::Float(v)) => self.om_z = Some(v),
            ("H_z", FieldValue::Quantity(q)) => self.h_z = Some(q),
            ("G", FieldValue::Quantity(q)) => self.g = Some(q),
            ("critical_density", FieldValue::Quantity(q)) => self.critical_density = Some(q),
            ("Densities", FieldValue::FloatArray(a)) => self.densities = Some(a),
            ("virial_overdensity", FieldValue::Float(v)) => self.virial_overdensity = Some(v),
            ("fullpath", FieldValue::Str(s)) => self.fullpath = Some(s),
            (name, v) => unreachable!("{} declared as {:?} but got {:?}", name, expected, v),
        }
        Ok(())
    }

    /// Writes the attributes in a new `simulation_attributes` group of `root`.
    pub fn serialise(&self, root: &mut Group) -> Result<(), AttributesError> {
        let group = root.create_group(ATTRIBUTES_GROUP)?;
        let mut units = BTreeMap::new();
        for (name, value) in self.fields() {
            let (attr, unit) = value.encode();
            if let Some(unit) = unit {
                units.insert(name.clone(), unit);
            }
            group.set_attr(name, attr);
        }

        let units_group = group.create_group(UNITS_GROUP)?;
        for (name, unit) in units {
            units_group.set_attr(name, AttrValue::Str(unit));
        }

        let parameters_group = group.create_group(PARAMETERS_GROUP)?;
        for (name, value) in &self.parameters {
            let attr = match value {
                ParameterValue::Bool(b) => AttrValue::Bool(*b),
                ParameterValue::Int(i) => AttrValue::Int(*i),
                ParameterValue::Float(f) => AttrValue::Float(*f),
                ParameterValue::Str(s) => AttrValue::Str(s.clone()),
            };
            parameters_group.set_attr(name.clone(), attr);
        }
        Ok(())
    }

    /// Restores the attributes written by [`serialise`](SimulationAttributes::serialise).
    ///
    /// Units are resolved with `registry`. A store without attributes is not
    /// an error, a warning is logged and `self` is left unchanged.
    pub fn unpack(&mut self, root: &Group, registry: &UnitRegistry) -> Result<(), AttributesError> {
        let group = match root.group(ATTRIBUTES_GROUP) {
            Some(g) => g,
            None => {
                warn!("simulation attributes not found in the store");
                return Ok(());
            }
        };

        let mut raw: BTreeMap<String, FieldValue> = group
            .attrs()
            .map(|(k, v)| (k.to_string(), FieldValue::decode(v)))
            .collect();

        // units are attached to the raw values read above
        if let Some(units) = group.group(UNITS_GROUP) {
            for (name, unit) in units.attrs() {
                let unit = match unit {
                    AttrValue::Str(s) => registry.parse(s)?,
                    other => {
                        return Err(AttributesError::InvalidUnit(
                            name.to_string(),
                            other.type_name(),
                        ))
                    }
                };
                let value = match raw.get(name) {
                    Some(FieldValue::Float(f)) => *f,
                    Some(FieldValue::Int(i)) => *i as f64,
                    Some(other) => {
                        return Err(AttributesError::KindMismatch(
                            name.to_string(),
                            FieldKind::Float,
                            other.kind(),
                        ))
                    }
                    None => return Err(AttributesError::OrphanUnit(name.to_string())),
                };
                raw.insert(name.to_string(), FieldValue::Quantity(Quantity::new(value, unit)));
            }
        }

        let mut parameters = BTreeMap::new();
        if let Some(params) = group.group(PARAMETERS_GROUP) {
            for (name, value) in params.attrs() {
                let value = match value {
                    AttrValue::Bool(b) => ParameterValue::Bool(*b),
                    AttrValue::Int(i) => ParameterValue::Int(*i),
                    AttrValue::Float(f) => ParameterValue::Float(*f),
                    AttrValue::Str(s) => ParameterValue::Str(s.clone()),
                    other => {
                        return Err(AttributesError::InvalidParameter(
                            name.to_string(),
                            other.type_name(),
                        ))
                    }
                };
                parameters.insert(name.to_string(), value);
            }
        }

        for (name, value) in raw {
            self.set_field(&name, value)?;
        }
        self.parameters = parameters;
        Ok(())
    }
}

impl fmt::Display for SimulationAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.fields() {
            writeln!(f, "{:>20}: {}", name, value)?;
        }
        if !self.parameters.is_empty() {
            writeln!(f, "parameters:")?;
            for (name, value) in &self.parameters {
                writeln!(f, "{:>20}: {}", name, value)?;
            }
        }
        Ok(())
    }
}
