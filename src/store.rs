//! Hierarchical attribute store: named groups holding typed attributes and
//! nested groups, the way HDF5 files lay out metadata.

use failure::Fail;
use serde_derive::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    FloatArray(Vec<f64>),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match *self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Bool(_) => "bool",
            AttrValue::Str(_) => "str",
            AttrValue::FloatArray(_) => "float array",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Bool(b) => write!(f, "{}", b),
            AttrValue::Str(s) => write!(f, "{:?}", s),
            AttrValue::FloatArray(a) => write!(f, "{:?}", a),
        }
    }
}

#[derive(Debug, Fail)]
pub enum StoreError {
    #[fail(display = "group '{}' already exists", _0)]
    GroupExists(String),
    #[fail(display = "group '{}' not found", _0)]
    GroupNotFound(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Group {
    #[serde(default)]
    attrs: BTreeMap<String, AttrValue>,
    #[serde(default)]
    groups: BTreeMap<String, Group>,
}

impl Group {
    pub fn new() -> Group {
        Group::default()
    }

    /// Adds an empty subgroup, failing if one with this name already exists.
    pub fn create_group(&mut self, name: &str) -> Result<&mut Group, StoreError> {
        match self.groups.entry(name.to_string()) {
            Entry::Occupied(_) => Err(StoreError::GroupExists(name.to_string())),
            Entry::Vacant(v) => Ok(v.insert(Group::default())),
        }
    }

    pub fn contains_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut Group> {
        self.groups.get_mut(name)
    }

    pub fn require_group(&self, name: &str) -> Result<&Group, StoreError> {
        self.group(name)
            .ok_or_else(|| StoreError::GroupNotFound(name.to_string()))
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: AttrValue) {
        self.attrs.insert(name.into(), value);
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.groups.is_empty()
    }
}
