use failure::Error;
use log::{error, info};
use simattrs::{
    load_attributes_from_file, load_attributes_with_stored_registry, RamsesInfo, SimulationDataset,
};
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
#[structopt(name = "simattrs")]
enum Args {
    /// Derive the cosmological attributes of a snapshot and store them.
    #[structopt(name = "extract")]
    Extract {
        /// RAMSES info_XXXXX.txt file or JSON snapshot description.
        #[structopt(short = "i", long = "input", parse(from_os_str))]
        input: PathBuf,
        #[structopt(
            short = "o",
            long = "output",
            default_value = "simulation_attributes.json",
            parse(from_os_str),
            help = r#"Output file name. Format will be deduced from the file extension.
Accepted extensions are '.json', '.json.gz'
"#
        )]
        output: PathBuf,
        #[structopt(
            help = "unit the box size is expressed in",
            long = "length-unit",
            default_value = "kpc"
        )]
        length_unit: String,
    },
    /// Print the attributes held in a store file.
    #[structopt(name = "show")]
    Show {
        #[structopt(short = "i", long = "input", parse(from_os_str))]
        input: PathBuf,
        #[structopt(
            help = "RAMSES info file defining the code and comoving units",
            long = "info",
            parse(from_os_str)
        )]
        info: Option<PathBuf>,
    },
}

fn simattrs(args: Args) -> Result<(), Error> {
    match args {
        Args::Extract {
            input,
            output,
            length_unit,
        } => {
            let attributes = simattrs::extract_attributes(&input, &output, &length_unit)?;
            info!("Attributes of {}:\n{}", input.display(), attributes);
        }
        Args::Show { input, info } => {
            let attributes = match info {
                Some(info) => {
                    let info = RamsesInfo::from_file(info)?;
                    load_attributes_from_file(&input, info.unit_registry())?
                }
                None => load_attributes_with_stored_registry(&input)?,
            };
            print!("{}", attributes);
        }
    }
    Ok(())
}

fn init_logger() {
    let mut builder = env_logger::Builder::new();
    builder.filter(None, log::LevelFilter::Info);
    if let Ok(s) = std::env::var("RUST_LOG") {
        builder.parse(&s);
    }
    builder.init();
}

fn main() {
    init_logger();
    let args = Args::from_args();
    if let Err(e) = simattrs(args) {
        error!("simattrs in error! {:?}", e);
        e.iter_chain().for_each(|c| {
            error!("{}", c);
            if let Some(b) = c.backtrace() {
                error!("  - {}", b);
            }
        });

        std::process::exit(1);
    }
}
