use crate::file_format::StoreFormat;
use crate::store::Group;
use failure::{Error, ResultExt};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::info;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write an attribute store to a file, the encoding is deduced from the
/// file extension
pub fn write_store_to_file(store: &Group, output: impl AsRef<Path>) -> Result<(), Error> {
    let output = output.as_ref();
    let format = StoreFormat::from_filename(output)?;
    info!("writing the output file {}", output.display());
    let file = std::fs::File::create(output)
        .with_context(|_| format!("impossible to create {}", output.display()))?;
    let mut stream = BufWriter::new(file);
    match format {
        StoreFormat::JsonGz => {
            let mut e = GzEncoder::new(stream, Compression::default());
            serde_json::to_writer_pretty(&mut e, store)?;
            e.finish()?.flush()?;
        }
        StoreFormat::Json => {
            serde_json::to_writer_pretty(&mut stream, store)?;
            stream.flush()?;
        }
    };
    Ok(())
}
