use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// ExperimentKey – one instrument run
// ---------------------------------------------------------------------------

/// Identifies one experiment: its name plus the `YYMMDD` / `HHMMSS` stamps
/// taken from the raw file names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExperimentKey {
    pub name: String,
    pub date: String,
    pub time: String,
}

impl ExperimentKey {
    pub fn new(name: impl Into<String>, date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            time: time.into(),
        }
    }

    /// Machine key, `name_date6_time6`. Used in artifact names.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.name, self.date, self.time)
    }

    /// Start of the run, reading the date as `YYMMDD` in the 2000s.
    /// `None` when the stamps are not a valid calendar instant.
    pub fn started_at(&self) -> Option<NaiveDateTime> {
        let digits = |s: &str, range: std::ops::Range<usize>| -> Option<u32> {
            s.get(range)?.parse().ok()
        };
        let date = NaiveDate::from_ymd_opt(
            2000 + digits(&self.date, 0..2)? as i32,
            digits(&self.date, 2..4)?,
            digits(&self.date, 4..6)?,
        )?;
        let time = NaiveTime::from_hms_opt(
            digits(&self.time, 0..2)?,
            digits(&self.time, 2..4)?,
            digits(&self.time, 4..6)?,
        )?;
        Some(date.and_time(time))
    }

    /// Human readable label, `name MM/DD/YYYY HH:MM:SS`.
    pub fn label(&self) -> Option<String> {
        self.started_at()
            .map(|at| format!("{} {}", self.name, at.format("%m/%d/%Y %H:%M:%S")))
    }

    /// Most recent date first, then most recent time, then name.
    pub fn recency_order(a: &Self, b: &Self) -> Ordering {
        b.date
            .cmp(&a.date)
            .then_with(|| b.time.cmp(&a.time))
            .then_with(|| a.name.cmp(&b.name))
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

// ---------------------------------------------------------------------------
// Measurement – one raw file, transient
// ---------------------------------------------------------------------------

/// One vial in one cycle, as decoded from a single raw file.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub exp_name: String,
    pub exp_date: String,
    pub exp_time: String,
    pub exp_cycle: u32,
    /// Vial number.
    pub exp_measurement: u32,
    /// Frequency samples with the startup transient already removed.
    pub waveform: Vec<f64>,
}

// ---------------------------------------------------------------------------
// PeakEvent / PeaksTable
// ---------------------------------------------------------------------------

/// A detected mass event. Field order is the column order of the peaks table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakEvent {
    pub exp_name: String,
    pub exp_date: String,
    pub exp_time: String,
    pub exp_cycle: u32,
    pub exp_measurement: u32,
    /// Sample offset of the peak apex in the trimmed waveform.
    pub event_index: usize,
    /// Mass in fg.
    pub event_mass: f64,
}

impl PeakEvent {
    pub fn from_measurement(m: &Measurement, event_index: usize, event_mass: f64) -> Self {
        Self {
            exp_name: m.exp_name.clone(),
            exp_date: m.exp_date.clone(),
            exp_time: m.exp_time.clone(),
            exp_cycle: m.exp_cycle,
            exp_measurement: m.exp_measurement,
            event_index,
            event_mass,
        }
    }
}

/// A row of the peaks table: the event plus its well label after a join.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRow {
    pub event: PeakEvent,
    pub well: Option<String>,
}

/// All peaks of one experiment, in detection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeaksTable {
    pub rows: Vec<PeakRow>,
    /// Whether metadata was joined, i.e. whether the `Well` column exists.
    pub has_well_column: bool,
}

impl PeaksTable {
    pub fn from_events(events: Vec<PeakEvent>) -> Self {
        Self {
            rows: events
                .into_iter()
                .map(|event| PeakRow { event, well: None })
                .collect(),
            has_well_column: false,
        }
    }

    /// Number of peaks.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no peak was detected.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether at least one row carries a well label.
    pub fn any_well(&self) -> bool {
        self.rows.iter().any(|r| r.well.is_some())
    }
}

// ---------------------------------------------------------------------------
// Metadata / summary
// ---------------------------------------------------------------------------

/// One row of the plate layout table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub id: i64,
    pub well: Option<String>,
}

/// Summary grouping: by well label when the table was joined, by vial otherwise.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Well { well: String, cycle: u32 },
    Measurement { measurement: u32, cycle: u32 },
}

impl GroupKey {
    pub fn cycle(&self) -> u32 {
        match self {
            GroupKey::Well { cycle, .. } | GroupKey::Measurement { cycle, .. } => *cycle,
        }
    }
}

/// Descriptive statistics of `event_mass` for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key: GroupKey,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; undefined for a single peak.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}
