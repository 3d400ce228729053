use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use mass_peak_caller::synth::{write_raw_file, NoiseRng, WaveformSpec};

/// Write a synthetic experiment in the raw instrument layout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Destination folder (used as `raw_data_folder`).
    folder: PathBuf,

    #[arg(long, default_value = "assay")]
    name: String,

    /// Experiment stamp, `YYMMDD_HHMMSS`.
    #[arg(long, default_value = "200101_120000")]
    stamp: String,

    #[arg(long, default_value_t = 2)]
    vials: u32,

    #[arg(long, default_value_t = 1)]
    cycles: u32,

    /// Samples per file, startup samples included.
    #[arg(long, default_value_t = 8000)]
    samples: usize,

    /// Mass events per file.
    #[arg(long, default_value_t = 3)]
    events: usize,

    #[arg(long, default_value_t = 0.002)]
    noise: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = NoiseRng::new(args.seed);

    std::fs::create_dir_all(&args.folder)
        .with_context(|| format!("creating {}", args.folder.display()))?;

    let spacing = args.samples as f64 / (args.events + 1) as f64;
    let mut written = 0;
    for cycle in 1..=args.cycles {
        for vial in 1..=args.vials {
            // Masses between roughly 30 and 200 fg at the default calibration.
            let dips = (0..args.events)
                .map(|k| rng.dip(spacing * (k + 1) as f64, (4.0, 12.0), (0.17, 1.17)))
                .collect();
            let spec = WaveformSpec {
                samples: args.samples,
                baseline: 1000.0,
                dips,
                noise: args.noise,
            };

            let path = args
                .folder
                .join(format!("{}_{}_c{cycle}_v{vial}", args.name, args.stamp));
            write_raw_file(&path, &spec.render(&mut rng))?;
            written += 1;
        }
    }

    println!(
        "Wrote {written} raw files ({} samples each) to {}",
        args.samples,
        args.folder.display()
    );
    Ok(())
}
