//! Data layer: core types, raw file discovery and reading, metadata, summaries.
//!
//! Architecture:
//! ```text
//!  raw-data folder (extensionless files)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ locator  │  file names → experiments, file list of one experiment
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader  │  raw f64 payload → Measurement
//!   └──────────┘
//!        │            (signal::PeakDetector → PeakEvent)
//!        ▼
//!   ┌──────────┐
//!   │ metadata │  optional Id/Well table → PeaksTable with wells
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ summary  │  per (well | vial, cycle) statistics
//!   └──────────┘
//! ```

pub mod loader;
pub mod locator;
pub mod metadata;
pub mod model;
pub mod summary;
