use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;

use super::model::ExperimentKey;
use crate::error::{Error, Result};

fn experiment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)_(\d{6})_(\d{6})").expect("valid experiment pattern"))
}

/// Split a raw file name into `(name, date6, time6)`.
pub fn experiment_stamp(file_name: &str) -> Option<(&str, &str, &str)> {
    let caps = experiment_pattern().captures(file_name)?;
    Some((
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str(),
        caps.get(3)?.as_str(),
    ))
}

/// Distinct start times of every (name, date6) pair.
fn group_runs<'a>(
    file_names: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<(String, String), BTreeSet<String>> {
    let mut runs: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    for file_name in file_names {
        if let Some((name, date, time)) = experiment_stamp(file_name) {
            runs.entry((name.to_string(), date.to_string()))
                .or_default()
                .insert(time.to_string());
        }
    }
    runs
}

// ---------------------------------------------------------------------------
// ExperimentList – what the front-end offers for selection
// ---------------------------------------------------------------------------

/// Experiments found in the raw-data folder, most recent first.
#[derive(Debug, Clone, Default)]
pub struct ExperimentList {
    pub experiments: Vec<ExperimentKey>,
}

impl ExperimentList {
    /// `name MM/DD/YYYY HH:MM:SS`, parallel to [`ExperimentList::keys`].
    pub fn labels(&self) -> Vec<String> {
        self.experiments
            .iter()
            .map(|e| e.label().unwrap_or_else(|| e.key()))
            .collect()
    }

    /// `name_date6_time6`, parallel to [`ExperimentList::labels`].
    pub fn keys(&self) -> Vec<String> {
        self.experiments.iter().map(ExperimentKey::key).collect()
    }

    /// Resolve a label or machine key chosen by the user.
    pub fn find(&self, selector: &str) -> Result<&ExperimentKey> {
        self.experiments
            .iter()
            .find(|e| e.key() == selector || e.label().as_deref() == Some(selector))
            .ok_or_else(|| Error::UnknownExperiment(selector.to_string()))
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ExperimentLocator
// ---------------------------------------------------------------------------

/// Scans a raw-data folder for instrument files.
///
/// Raw files carry no extension; anything with one (exports, notes, the
/// outputs of earlier runs) is ignored.
#[derive(Debug, Clone)]
pub struct ExperimentLocator {
    folder: PathBuf,
}

impl ExperimentLocator {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Extensionless regular files, sorted by name.
    fn raw_entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let read_dir = std::fs::read_dir(&self.folder).map_err(|e| Error::io(&self.folder, e))?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::io(&self.folder, e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_some() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                debug!("Skipping non UTF-8 file name {}", path.display());
                continue;
            };
            entries.push((name.to_string(), path));
        }
        entries.sort();
        Ok(entries)
    }

    /// Group raw files into experiments.
    ///
    /// Files sharing a name and a date belong to the same run; the run's time
    /// is the earliest time stamp among them.
    pub fn list_experiments(&self) -> Result<ExperimentList> {
        let entries = self.raw_entries()?;
        let runs = group_runs(entries.iter().map(|(file_name, _)| file_name.as_str()));

        let mut experiments: Vec<ExperimentKey> = runs
            .into_iter()
            .filter_map(|((name, date), times)| {
                if times.len() > 1 {
                    warn!(
                        "{name} on {date}: merging files started at {} into one experiment",
                        times.iter().cloned().collect::<Vec<_>>().join(", ")
                    );
                }
                let earliest = times.into_iter().next()?;
                Some(ExperimentKey::new(name, date, earliest))
            })
            .filter(|key| {
                let valid = key.started_at().is_some();
                if !valid {
                    warn!("Skipping {}: date/time stamp is not a valid instant", key.key());
                }
                valid
            })
            .collect();

        if experiments.is_empty() {
            return Err(Error::NoExperimentsFound {
                folder: self.folder.clone(),
            });
        }
        experiments.sort_by(ExperimentKey::recency_order);
        debug!("Found {} experiments in {}", experiments.len(), self.folder.display());
        Ok(ExperimentList { experiments })
    }

    /// Raw files belonging to one experiment, sorted by name.
    pub fn measurement_files(&self, experiment: &ExperimentKey) -> Result<Vec<PathBuf>> {
        Ok(self
            .raw_entries()?
            .into_iter()
            .filter(|(file_name, _)| {
                matches!(experiment_stamp(file_name),
                    Some((name, date, _)) if name == experiment.name && date == experiment.date)
            })
            .map(|(_, path)| path)
            .collect())
    }
}
