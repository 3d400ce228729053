use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mass_peak_caller::{ConfigOverrides, PeaksFormat};

#[derive(Parser, Debug)]
#[command(author, version, about = "Get mass peaks from raw LifeScale data", long_about = None)]
pub struct Args {
    /// Configuration file. Defaults to the platform location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the experiments found in the raw-data folder, most recent first.
    List,
    /// Call mass peaks for one experiment.
    CallPeaks(CallPeaksArgs),
    /// Change where raw data is read from and how frequency maps to mass.
    Config(ConfigArgs),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl From<OutputFormat> for PeaksFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Csv => PeaksFormat::Csv,
            OutputFormat::Parquet => PeaksFormat::Parquet,
        }
    }
}

#[derive(Parser, Debug, Clone)]
pub struct CallPeaksArgs {
    /// Experiment label or key, as printed by `list`.
    pub experiment: String,

    /// Folder receiving the peaks, summary and configuration files.
    pub output_folder: PathBuf,

    /// Exported plate layout (PanelData.csv) used to turn vial ids into wells.
    #[arg(short = 'f', long)]
    pub metadata_file: Option<PathBuf>,

    /// File format of the peaks table.
    #[arg(long, default_value_t, value_enum)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    /// Folder holding the raw instrument files.
    #[arg(long)]
    pub raw_data_folder: Option<PathBuf>,

    /// Calibration in Hz/fg.
    #[arg(long)]
    pub mass_transformation: Option<f64>,

    /// Minimum mass of a peak in fg (at least 5 fg recommended).
    #[arg(short = 'm', long)]
    pub mass_cutoff: Option<f64>,

    /// Minimum peak width in samples.
    #[arg(short = 'w', long)]
    pub peak_width_cutoff: Option<f64>,

    /// Minimum distance between peaks in samples.
    #[arg(short = 'd', long)]
    pub peak_distance_cutoff: Option<f64>,
}

impl From<ConfigArgs> for ConfigOverrides {
    fn from(args: ConfigArgs) -> Self {
        ConfigOverrides {
            raw_data_folder: args.raw_data_folder,
            mass_transformation: args.mass_transformation,
            mass_cutoff: args.mass_cutoff,
            peak_width_cutoff: args.peak_width_cutoff,
            peak_distance_cutoff: args.peak_distance_cutoff,
        }
    }
}
