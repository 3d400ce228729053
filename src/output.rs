use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt32Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Local, NaiveDateTime};
use log::info;
use parquet::arrow::ArrowWriter;

use crate::config::Configuration;
use crate::data::model::{ExperimentKey, GroupKey, PeaksTable, SummaryRow};
use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const PEAK_COLUMNS: [&str; 7] = [
    "exp_name",
    "exp_date",
    "exp_time",
    "exp_cycle",
    "exp_measurement",
    "event_index",
    "event_mass",
];

const SUMMARY_STAT_COLUMNS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

// ---------------------------------------------------------------------------
// RunTimestamp
// ---------------------------------------------------------------------------

/// `YYYYMMDDHHMMSS` stamp shared by every artifact of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTimestamp(String);

impl RunTimestamp {
    /// Local wall-clock time. Call once per run.
    pub fn now() -> Self {
        Self(Local::now().format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self(at.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn parse(stamp: &str) -> Result<Self> {
        NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .map(Self::from_datetime)
            .map_err(|e| Error::InvalidTimestamp {
                stamp: stamp.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// OutputWriter
// ---------------------------------------------------------------------------

/// File format of the peaks table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeaksFormat {
    #[default]
    Csv,
    Parquet,
}

/// Paths of the files written for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub peaks: PathBuf,
    pub summary: PathBuf,
    pub config: PathBuf,
}

/// Writes the artifacts of one run as `<timestamp>_<experiment>_<kind>.<ext>`.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    folder: PathBuf,
    stem: String,
    format: PeaksFormat,
}

impl OutputWriter {
    pub fn new(folder: impl Into<PathBuf>, timestamp: &RunTimestamp, experiment: &ExperimentKey) -> Self {
        Self {
            folder: folder.into(),
            stem: format!("{timestamp}_{}", experiment.key()),
            format: PeaksFormat::Csv,
        }
    }

    pub fn with_format(mut self, format: PeaksFormat) -> Self {
        self.format = format;
        self
    }

    fn artifact(&self, kind: &str, ext: &str) -> PathBuf {
        self.folder.join(format!("{}_{kind}.{ext}", self.stem))
    }

    pub fn peaks_path(&self) -> PathBuf {
        match self.format {
            PeaksFormat::Csv => self.artifact("peaks", "csv"),
            PeaksFormat::Parquet => self.artifact("peaks", "parquet"),
        }
    }

    pub fn summary_path(&self) -> PathBuf {
        self.artifact("summary", "csv")
    }

    pub fn config_path(&self) -> PathBuf {
        self.artifact("config", "json")
    }

    fn ensure_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.folder).map_err(|e| Error::io(&self.folder, e))
    }

    /// Write peaks, summary and configuration snapshot.
    pub fn write_all(
        &self,
        peaks: &PeaksTable,
        summary: &[SummaryRow],
        config: &Configuration,
    ) -> Result<Artifacts> {
        Ok(Artifacts {
            peaks: self.write_peaks(peaks)?,
            summary: self.write_summary(summary, peaks.any_well())?,
            config: self.write_config(config)?,
        })
    }

    pub fn write_peaks(&self, table: &PeaksTable) -> Result<PathBuf> {
        self.ensure_folder()?;
        let path = self.peaks_path();
        match self.format {
            PeaksFormat::Csv => write_peaks_csv(&path, table)?,
            PeaksFormat::Parquet => write_peaks_parquet(&path, table)?,
        }
        info!("Wrote {} peaks to {}", table.len(), path.display());
        Ok(path)
    }

    /// `by_well` picks the key column used when `summary` is empty.
    pub fn write_summary(&self, summary: &[SummaryRow], by_well: bool) -> Result<PathBuf> {
        self.ensure_folder()?;
        let path = self.summary_path();
        let by_well = summary
            .first()
            .map_or(by_well, |row| matches!(row.key, GroupKey::Well { .. }));

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        let key_column = if by_well { "Well" } else { "exp_measurement" };
        let mut header = vec![key_column, "exp_cycle"];
        header.extend(SUMMARY_STAT_COLUMNS);
        wtr.write_record(&header)?;

        for row in summary {
            let key = match &row.key {
                GroupKey::Well { well, .. } => well.clone(),
                GroupKey::Measurement { measurement, .. } => measurement.to_string(),
            };
            wtr.serialize((
                key,
                row.key.cycle(),
                row.count,
                row.mean,
                row.std,
                row.min,
                row.q25,
                row.q50,
                row.q75,
                row.max,
            ))?;
        }
        wtr.flush().map_err(|e| Error::io(&path, e))?;
        info!("Wrote {} summary groups to {}", summary.len(), path.display());
        Ok(path)
    }

    /// Snapshot of the configuration the run used.
    pub fn write_config(&self, config: &Configuration) -> Result<PathBuf> {
        self.ensure_folder()?;
        let path = self.config_path();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        serde_json::to_writer_pretty(file, config)?;
        Ok(path)
    }
}

fn write_peaks_csv(path: &Path, table: &PeaksTable) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut header = PEAK_COLUMNS.to_vec();
    if table.has_well_column {
        header.push("Well");
    }
    wtr.write_record(&header)?;

    for row in &table.rows {
        let e = &row.event;
        if table.has_well_column {
            wtr.serialize((
                &e.exp_name,
                &e.exp_date,
                &e.exp_time,
                e.exp_cycle,
                e.exp_measurement,
                e.event_index,
                e.event_mass,
                &row.well,
            ))?;
        } else {
            wtr.serialize(&row.event)?;
        }
    }
    wtr.flush().map_err(|e| Error::io(path, e))
}

fn write_peaks_parquet(path: &Path, table: &PeaksTable) -> Result<()> {
    let events = table.rows.iter().map(|r| &r.event);

    let mut fields = vec![
        Field::new("exp_name", DataType::Utf8, false),
        Field::new("exp_date", DataType::Utf8, false),
        Field::new("exp_time", DataType::Utf8, false),
        Field::new("exp_cycle", DataType::UInt32, false),
        Field::new("exp_measurement", DataType::UInt32, false),
        Field::new("event_index", DataType::UInt64, false),
        Field::new("event_mass", DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(events.clone().map(|e| &e.exp_name))),
        Arc::new(StringArray::from_iter_values(events.clone().map(|e| &e.exp_date))),
        Arc::new(StringArray::from_iter_values(events.clone().map(|e| &e.exp_time))),
        Arc::new(UInt32Array::from_iter_values(events.clone().map(|e| e.exp_cycle))),
        Arc::new(UInt32Array::from_iter_values(events.clone().map(|e| e.exp_measurement))),
        Arc::new(UInt64Array::from_iter_values(
            events.clone().map(|e| e.event_index as u64),
        )),
        Arc::new(Float64Array::from_iter_values(events.map(|e| e.event_mass))),
    ];
    if table.has_well_column {
        fields.push(Field::new("Well", DataType::Utf8, true));
        columns.push(Arc::new(StringArray::from(
            table.rows.iter().map(|r| r.well.as_deref()).collect::<Vec<_>>(),
        )));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
