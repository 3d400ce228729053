use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use regex::Regex;

use super::model::Measurement;
use crate::error::{Error, FileFailure, Result};

/// Bytes per sample: raw payloads are flat IEEE-754 doubles.
pub const SAMPLE_BYTES: u64 = 8;

/// Leading samples recorded while the instrument settles. Discarded.
pub const STARTUP_SAMPLES: usize = 10;

// ---------------------------------------------------------------------------
// Raw file names
// ---------------------------------------------------------------------------

fn raw_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.+)_(\d{6})_(\d{6})_c(\d+)_v(\d+)$").expect("valid raw file pattern")
    })
}

/// The identifiers encoded in `<name>_<YYMMDD>_<HHMMSS>_c<cycle>_v<vial>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFileName {
    pub name: String,
    pub date: String,
    pub time: String,
    pub cycle: u32,
    pub measurement: u32,
}

impl RawFileName {
    pub fn parse(path: &Path) -> Result<Self> {
        let mismatch = || Error::FilenamePatternMismatch {
            path: path.to_path_buf(),
        };
        let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(mismatch)?;
        let caps = raw_file_pattern().captures(file_name).ok_or_else(mismatch)?;

        Ok(RawFileName {
            name: caps[1].to_string(),
            date: caps[2].to_string(),
            time: caps[3].to_string(),
            cycle: caps[4].parse().map_err(|_| mismatch())?,
            measurement: caps[5].parse().map_err(|_| mismatch())?,
        })
    }
}

// ---------------------------------------------------------------------------
// Waveform decoding
// ---------------------------------------------------------------------------

/// Decode a little-endian f64 payload, dropping the startup transient.
///
/// `path` only names the payload in errors. Empty payloads and payloads
/// ending in a partial sample are rejected.
pub fn decode_waveform(path: &Path, bytes: &[u8]) -> Result<Vec<f64>> {
    let size = bytes.len() as u64;
    if size == 0 || size % SAMPLE_BYTES != 0 {
        return Err(Error::InvalidFileSize {
            path: path.to_path_buf(),
            size,
        });
    }
    let mut samples = vec![0.0; bytes.len() / SAMPLE_BYTES as usize];
    LittleEndian::read_f64_into(bytes, &mut samples);
    Ok(samples.split_off(STARTUP_SAMPLES.min(samples.len())))
}

/// Read one raw file into a [`Measurement`].
pub fn read_measurement(path: &Path) -> Result<Measurement> {
    let name = RawFileName::parse(path)?;

    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let size = file.metadata().map_err(|e| Error::io(path, e))?.len();
    let mut bytes = Vec::with_capacity(size as usize);
    file.read_to_end(&mut bytes).map_err(|e| Error::io(path, e))?;

    let waveform = decode_waveform(path, &bytes)?;
    debug!(
        "Read {} (cycle {}, vial {}): {} samples",
        path.display(),
        name.cycle,
        name.measurement,
        waveform.len()
    );

    Ok(Measurement {
        exp_name: name.name,
        exp_date: name.date,
        exp_time: name.time,
        exp_cycle: name.cycle,
        exp_measurement: name.measurement,
        waveform,
    })
}

// ---------------------------------------------------------------------------
// Measurement iterator
// ---------------------------------------------------------------------------

/// Lazily reads a fixed list of raw files, one measurement per file.
///
/// Cloning the iterator restarts it from the same position.
#[derive(Debug, Clone)]
pub struct Measurements {
    paths: std::vec::IntoIter<PathBuf>,
}

impl Iterator for Measurements {
    type Item = std::result::Result<Measurement, FileFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.next()?;
        Some(read_measurement(&path).map_err(|error| FileFailure { path, error }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.paths.size_hint()
    }
}

/// Iterate over the measurements stored in `paths`, in the given order.
pub fn read_measurements(paths: Vec<PathBuf>) -> Measurements {
    Measurements {
        paths: paths.into_iter(),
    }
}
