//! Spicegen - SPICE3 device model translator
//!
//! # Usage
//!
//! ```bash
//! spicegen spice3f5/dio --itf dioitf.h --def diodefs.h --phases all --out-dir generated
//! ```

use std::path::PathBuf;

use clap::Parser;
use spicegen_core::{
    error::Result, translate, AcSource, DeviceConfig, Diagnostics, PhaseSet, TranslatorConfig,
};
use tracing_subscriber::EnvFilter;

/// SPICE3 device model translator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Folder holding the device's C sources
    #[arg(value_name = "DEVICE_FOLDER")]
    folder: PathBuf,

    /// File with the SPICEdev info structure
    #[arg(long)]
    itf: String,

    /// Definitions header of the device
    #[arg(long)]
    def: String,

    /// Symbol treated as defined by #ifdef/#ifndef blocks
    #[arg(short = 'D', long = "define", value_name = "SYMBOL")]
    defines: Vec<String>,

    /// File searched first for variables
    #[arg(long)]
    device_file: Option<String>,

    /// Phases to export, comma separated (setup, temperature, load, acload, pzload, truncate, all)
    #[arg(short, long, default_value = "setup,temperature,load,acload")]
    phases: PhaseSet,

    /// Entry point used for the AC load when both are present
    #[arg(long, default_value_t = AcSource::AcLoad)]
    ac_source: AcSource,

    /// Output directory for the generated classes
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Column at which generated lines are wrapped
    #[arg(long, default_value_t = spicegen_core::emit::DEFAULT_WRAP_COLUMN)]
    wrap_column: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut device = DeviceConfig::new(&args.folder, args.itf, args.def);
    for symbol in args.defines {
        device = device.define(symbol);
    }
    if let Some(file) = args.device_file {
        device = device.with_device_file(file);
    }
    let config = TranslatorConfig::new(device)
        .with_phases(args.phases)
        .with_ac_source(args.ac_source)
        .with_wrap_column(args.wrap_column);

    let mut diagnostics = Diagnostics::new();
    let translation = translate(&config, &mut diagnostics)?;
    translation.write_to(&args.out_dir)?;

    for diagnostic in diagnostics.drain() {
        eprintln!("warning: {}", diagnostic);
    }
    Ok(())
}
