use std::path::PathBuf;

use log::{info, warn};

use crate::config::Configuration;
use crate::data::loader::{read_measurements, RawFileName};
use crate::data::locator::{ExperimentList, ExperimentLocator};
use crate::data::metadata::{join_metadata, parse_metadata};
use crate::data::model::{ExperimentKey, PeakEvent, PeaksTable, SummaryRow};
use crate::data::summary::summarize;
use crate::error::{FileFailure, Result};
use crate::output::{Artifacts, OutputWriter, PeaksFormat, RunTimestamp};
use crate::signal::PeakDetector;

// ---------------------------------------------------------------------------
// Run inputs and results
// ---------------------------------------------------------------------------

/// Where a run writes and what it joins.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_folder: PathBuf,
    /// Plate layout table (`Id`, `Well`); vials stay unlabelled without it.
    pub metadata_file: Option<PathBuf>,
    pub format: PeaksFormat,
}

impl RunOptions {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            metadata_file: None,
            format: PeaksFormat::Csv,
        }
    }
}

/// Everything a run produced, including the files it had to skip.
#[derive(Debug)]
pub struct RunReport {
    pub experiment: ExperimentKey,
    pub measurements: usize,
    pub peaks: PeaksTable,
    pub summary: Vec<SummaryRow>,
    pub failures: Vec<FileFailure>,
    pub artifacts: Artifacts,
}

/// Peaks of a set of raw files together with the files that failed.
#[derive(Debug, Default)]
pub struct Detection {
    pub events: Vec<PeakEvent>,
    pub measurements: usize,
    pub failures: Vec<FileFailure>,
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Read and detect every file in `files`.
///
/// Files are processed in (cycle, vial) order. A file that cannot be named,
/// opened or decoded is recorded as a failure and the others carry on.
pub fn detect_files(config: &Configuration, files: Vec<PathBuf>) -> Detection {
    let mut detection = Detection::default();

    let mut named = Vec::with_capacity(files.len());
    for path in files {
        match RawFileName::parse(&path) {
            Ok(name) => named.push((name.cycle, name.measurement, path)),
            Err(error) => {
                warn!("Skipping {}: {error}", path.display());
                detection.failures.push(FileFailure { path, error });
            }
        }
    }
    named.sort();

    let detector = PeakDetector::new(config);
    let paths = named.into_iter().map(|(_, _, path)| path).collect();
    for result in read_measurements(paths) {
        match result {
            Ok(measurement) => {
                detection.measurements += 1;
                detection.events.extend(detector.detect(&measurement));
            }
            Err(failure) => {
                warn!("Failed to read {failure}");
                detection.failures.push(failure);
            }
        }
    }
    detection
}

/// Run the whole pipeline for one experiment.
///
/// `experiment` is a label or a machine key as listed by
/// [`ExperimentLocator::list_experiments`]. `timestamp` names every artifact
/// of the run.
pub fn call_peaks(
    config: &Configuration,
    experiment: &str,
    options: &RunOptions,
    timestamp: &RunTimestamp,
) -> Result<RunReport> {
    config.validate()?;

    let locator = ExperimentLocator::new(config.raw_data_path());
    let experiments = locator.list_experiments()?;
    let key = experiments.find(experiment)?.clone();
    info!("Calling peaks for {key}");

    // A broken metadata table is fatal, so read it before the raw files.
    let metadata = options
        .metadata_file
        .as_deref()
        .map(parse_metadata)
        .transpose()?;

    let files = locator.measurement_files(&key)?;
    let detection = detect_files(config, files);
    info!(
        "{} measurements, {} peaks, {} failed files",
        detection.measurements,
        detection.events.len(),
        detection.failures.len()
    );

    let mut peaks = PeaksTable::from_events(detection.events);
    if let Some(metadata) = &metadata {
        peaks = join_metadata(peaks, metadata);
    }
    let summary = summarize(&peaks);

    let artifacts = OutputWriter::new(&options.output_folder, timestamp, &key)
        .with_format(options.format)
        .write_all(&peaks, &summary, config)?;

    Ok(RunReport {
        experiment: key,
        measurements: detection.measurements,
        peaks,
        summary,
        failures: detection.failures,
        artifacts,
    })
}

/// Experiments available under the configured raw-data folder.
pub fn list_experiments(config: &Configuration) -> Result<ExperimentList> {
    ExperimentLocator::new(config.raw_data_path()).list_experiments()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::data::model::GroupKey;
    use crate::error::Error;
    use crate::synth::{write_raw_file, Dip, NoiseRng, WaveformSpec};

    const SAMPLES: usize = 8000;

    fn config(raw: &Path) -> Configuration {
        Configuration {
            mass_transformation: 0.01,
            mass_cutoff: 20.0,
            peak_width_cutoff: 5.0,
            peak_distance_cutoff: 5.0,
            raw_data_folder: raw.to_path_buf(),
        }
    }

    fn write_vial(raw: &Path, name: &str, center: f64, depth: f64) {
        let spec = WaveformSpec::clean(
            SAMPLES,
            250.0,
            vec![Dip {
                center,
                sigma: 15.0,
                depth,
            }],
        );
        write_raw_file(&raw.join(name), &spec.render(&mut NoiseRng::new(11))).unwrap();
    }

    fn two_vials(raw: &Path) {
        write_vial(raw, "assay_200101_120000_c1_v1", 2000.0, 0.5);
        write_vial(raw, "assay_200101_120000_c1_v2", 5000.0, 0.9);
    }

    fn timestamp() -> RunTimestamp {
        RunTimestamp::parse("20240102030405").unwrap()
    }

    #[test]
    fn end_to_end_two_vials() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        two_vials(raw.path());

        let report = call_peaks(
            &config(raw.path()),
            "assay_200101_120000",
            &RunOptions::new(out.path()),
            &timestamp(),
        )
        .unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.measurements, 2);
        assert_eq!(report.peaks.len(), 2);
        let masses: Vec<f64> = report.peaks.rows.iter().map(|r| r.event.event_mass).collect();
        assert!((masses[0] - 50.0).abs() < 1e-2, "{masses:?}");
        assert!((masses[1] - 90.0).abs() < 1e-2, "{masses:?}");

        assert_eq!(report.summary.len(), 2);
        assert!(report.summary.iter().all(|s| s.count == 1));
        assert_eq!(
            report.summary[0].key,
            GroupKey::Measurement { measurement: 1, cycle: 1 }
        );

        let peaks_csv = std::fs::read_to_string(&report.artifacts.peaks).unwrap();
        assert_eq!(peaks_csv.lines().count(), 3);
        let summary_csv = std::fs::read_to_string(&report.artifacts.summary).unwrap();
        assert_eq!(summary_csv.lines().count(), 3);
        assert!(report.artifacts.config.exists());
        assert!(report
            .artifacts
            .peaks
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("20240102030405_assay_200101_120000"));
    }

    #[test]
    fn identical_inputs_give_identical_peaks() {
        let raw = tempfile::tempdir().unwrap();
        two_vials(raw.path());
        let cfg = config(raw.path());

        let run = |out: &Path| {
            call_peaks(&cfg, "assay_200101_120000", &RunOptions::new(out), &timestamp())
                .unwrap()
        };
        let (a, b) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
        let first = run(a.path());
        let second = run(b.path());

        assert_eq!(first.peaks, second.peaks);
        assert_eq!(
            std::fs::read(&first.artifacts.peaks).unwrap(),
            std::fs::read(&second.artifacts.peaks).unwrap()
        );
    }

    #[test]
    fn bad_files_are_reported_not_fatal() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        two_vials(raw.path());
        std::fs::write(raw.path().join("assay_200101_120000_c1_v3"), [0u8; 13]).unwrap();
        std::fs::write(raw.path().join("assay_200101_120000_backup"), [0u8; 8]).unwrap();

        let report = call_peaks(
            &config(raw.path()),
            "assay 01/01/2020 12:00:00",
            &RunOptions::new(out.path()),
            &timestamp(),
        )
        .unwrap();

        assert_eq!(report.peaks.len(), 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.iter().any(FileFailure::is_name_mismatch));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f.error, Error::InvalidFileSize { size: 13, .. })));
    }

    #[test]
    fn metadata_labels_wells() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        two_vials(raw.path());
        let metadata = out.path().join("PanelData.csv");
        std::fs::write(&metadata, "Id,Well\n1,A1\n2,B12\n").unwrap();

        let options = RunOptions {
            metadata_file: Some(metadata),
            ..RunOptions::new(out.path())
        };
        let report =
            call_peaks(&config(raw.path()), "assay_200101_120000", &options, &timestamp()).unwrap();

        let wells: Vec<_> = report.peaks.rows.iter().map(|r| r.well.as_deref()).collect();
        assert_eq!(wells, [Some("A01"), Some("B12")]);
        assert_eq!(
            report.summary[0].key,
            GroupKey::Well { well: "A01".into(), cycle: 1 }
        );
        let header = std::fs::read_to_string(&report.artifacts.summary).unwrap();
        assert!(header.starts_with("Well,exp_cycle,count"));
    }

    #[test]
    fn broken_metadata_is_fatal() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        two_vials(raw.path());
        let metadata = out.path().join("PanelData.csv");
        std::fs::write(&metadata, "Vial,Label\n1,A1\n").unwrap();

        let options = RunOptions {
            metadata_file: Some(metadata),
            ..RunOptions::new(out.path())
        };
        let err = call_peaks(&config(raw.path()), "assay_200101_120000", &options, &timestamp())
            .unwrap_err();
        assert!(matches!(err, Error::MetadataParse { .. }));
    }

    #[test]
    fn quiet_vial_is_absent_from_summary() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_vial(raw.path(), "assay_200101_120000_c1_v1", 2000.0, 0.5);
        write_vial(raw.path(), "assay_200101_120000_c1_v2", 5000.0, 0.01);

        let report = call_peaks(
            &config(raw.path()),
            "assay_200101_120000",
            &RunOptions::new(out.path()),
            &timestamp(),
        )
        .unwrap();
        assert_eq!(report.measurements, 2);
        assert_eq!(report.peaks.len(), 1);
        assert_eq!(report.summary.len(), 1);
    }

    #[test]
    fn unknown_experiment_and_empty_folder() {
        let raw = tempfile::tempdir().unwrap();
        let out = RunOptions::new(raw.path().join("out"));
        let cfg = config(raw.path());

        assert!(matches!(
            call_peaks(&cfg, "assay_200101_120000", &out, &timestamp()),
            Err(Error::NoExperimentsFound { .. })
        ));

        two_vials(raw.path());
        assert!(matches!(
            call_peaks(&cfg, "other_200101_120000", &out, &timestamp()),
            Err(Error::UnknownExperiment(_))
        ));
    }
}
