use failure::Error;
use std::path::Path;

/// Encodings of an attribute store file.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum StoreFormat {
    Json,
    JsonGz,
}

static ALL_EXTENSIONS: [(&str, StoreFormat); 2] = [
    (".json", StoreFormat::Json),
    (".json.gz", StoreFormat::JsonGz),
];

/// Kinds of snapshot metadata the attributes can be derived from.
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum InputFormat {
    /// RAMSES `info_XXXXX.txt`
    RamsesInfo,
    /// JSON `SnapshotDescription`
    Description,
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|f| f.to_str())
}

impl StoreFormat {
    pub fn from_filename(filename: impl AsRef<Path>) -> Result<StoreFormat, Error> {
        ALL_EXTENSIONS
            .iter()
            .find(|&&(e, _)| file_name(filename.as_ref()).map_or(false, |f| f.ends_with(e)))
            .map(|&(_, f)| f)
            .ok_or_else(|| {
                let extensions_str = ALL_EXTENSIONS
                    .iter()
                    .map(|(e, _)| *e)
                    .collect::<Vec<_>>()
                    .join(", ");
                failure::err_msg(format!(
                    "Unable to detect the file format from filename '{}'. \
                     Accepted extensions are: {}",
                    filename.as_ref().display(),
                    extensions_str
                ))
            })
    }
}

impl InputFormat {
    pub fn from_filename(filename: impl AsRef<Path>) -> Result<InputFormat, Error> {
        match file_name(filename.as_ref()) {
            Some(f) if f.starts_with("info_") && f.ends_with(".txt") => Ok(InputFormat::RamsesInfo),
            Some(f) if f.ends_with(".json") => Ok(InputFormat::Description),
            _ => Err(failure::err_msg(format!(
                "Unable to detect the snapshot format of '{}'. \
                 Expected a RAMSES 'info_XXXXX.txt' or a '.json' description",
                filename.as_ref().display()
            ))),
        }
    }
}
