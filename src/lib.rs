pub mod attributes;
pub mod cosmology;
pub mod dataset;
pub mod file_format;
pub mod ramses;
mod read;
pub mod store;
pub mod units;
mod write;

pub use crate::attributes::{FieldKind, FieldValue, SimulationAttributes};
pub use crate::cosmology::Cosmology;
pub use crate::dataset::{ParameterValue, SimulationDataset, SnapshotDescription};
pub use crate::ramses::RamsesInfo;
pub use crate::read::load_store_from_file;
pub use crate::store::{AttrValue, Group};
pub use crate::units::{Quantity, Unit, UnitRegistry};
pub use crate::write::write_store_to_file;

use crate::attributes::stored_unit_registry;
use crate::file_format::InputFormat;
use failure::Error;
use log::info;
use std::path::Path;

/// Open the snapshot metadata, the reader is chosen from the file name
pub fn load_dataset(input: impl AsRef<Path>) -> Result<Box<dyn SimulationDataset>, Error> {
    let input = input.as_ref();
    let dataset: Box<dyn SimulationDataset> = match InputFormat::from_filename(input)? {
        InputFormat::RamsesInfo => {
            info!("reading RAMSES info file {}", input.display());
            Box::new(RamsesInfo::from_file(input)?)
        }
        InputFormat::Description => {
            info!("reading snapshot description {}", input.display());
            Box::new(SnapshotDescription::from_file(input)?)
        }
    };
    Ok(dataset)
}

pub fn build_attributes(
    input: impl AsRef<Path>,
    length_unit: &str,
) -> Result<SimulationAttributes, Error> {
    let dataset = load_dataset(input)?;
    let mut attributes = SimulationAttributes::new();
    attributes.assign_attributes(dataset.as_ref(), length_unit)?;
    Ok(attributes)
}

/// Derive the attributes of a snapshot and write them to a new store file
pub fn extract_attributes(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    length_unit: &str,
) -> Result<SimulationAttributes, Error> {
    let attributes = build_attributes(input, length_unit)?;
    let mut store = Group::new();
    attributes.serialise(&mut store)?;
    write_store_to_file(&store, output)?;
    Ok(attributes)
}

/// Read back the attributes stored in a file
pub fn load_attributes_from_file(
    input: impl AsRef<Path>,
    registry: &UnitRegistry,
) -> Result<SimulationAttributes, Error> {
    let store = load_store_from_file(input)?;
    let mut attributes = SimulationAttributes::new();
    attributes.unpack(&store, registry)?;
    Ok(attributes)
}

/// Read back the attributes stored in a file, with comoving units resolved
/// at the scale factor stored alongside them
pub fn load_attributes_with_stored_registry(
    input: impl AsRef<Path>,
) -> Result<SimulationAttributes, Error> {
    let store = load_store_from_file(input)?;
    let registry = stored_unit_registry(&store);
    let mut attributes = SimulationAttributes::new();
    attributes.unpack(&store, &registry)?;
    Ok(attributes)
}
