use crate::file_format::StoreFormat;
use crate::store::Group;
use failure::{Error, ResultExt};
use std::path::Path;

/// Load an attribute store from a file
pub fn load_store_from_file(input: impl AsRef<Path>) -> Result<Group, Error> {
    let format = StoreFormat::from_filename(input.as_ref())?;
    let f = std::fs::File::open(input.as_ref())
        .with_context(|_| format!("impossible to open {}", input.as_ref().display()))?;
    let f = std::io::BufReader::new(f);
    load_store(f, format)
}

// Load an attribute store from a reader and a file format
fn load_store(reader: impl std::io::BufRead, format: StoreFormat) -> Result<Group, Error> {
    match format {
        StoreFormat::JsonGz => {
            let r = flate2::bufread::GzDecoder::new(reader);
            serde_json::from_reader(r).map_err(|e| failure::err_msg(e.to_string()))
        }
        StoreFormat::Json => {
            serde_json::from_reader(reader).map_err(|e| failure::err_msg(e.to_string()))
        }
    }
}
