//! Mass peak calling for raw resonant-mass-measurement recordings.
//!
//! Raw instrument files are grouped into experiments, decoded, smoothed and
//! searched for frequency dips; each dip becomes a mass event. Events can be
//! labelled with plate wells and are summarised per well (or vial) and cycle.

pub mod config;
pub mod data;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod signal;
pub mod synth;

pub use config::{ConfigOverrides, Configuration};
pub use error::{Error, FileFailure, Result};
pub use output::{PeaksFormat, RunTimestamp};
pub use pipeline::{call_peaks, list_experiments, RunOptions, RunReport};
