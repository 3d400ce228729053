use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Configuration – immutable for the duration of a run
// ---------------------------------------------------------------------------

/// Calibration and detection parameters for one peak-calling run.
///
/// Field names double as the keys of the persisted JSON object and of the
/// configuration snapshot written next to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Calibration factor in Hz per femtogram.
    pub mass_transformation: f64,
    /// Smallest reported mass in fg.
    pub mass_cutoff: f64,
    /// Minimum peak width, in samples, measured at half prominence.
    pub peak_width_cutoff: f64,
    /// Minimum distance between two peaks, in samples.
    pub peak_distance_cutoff: f64,
    /// Folder holding the extensionless raw instrument files. May start with `~`.
    pub raw_data_folder: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            mass_transformation: 0.00574,
            mass_cutoff: 20.0,
            peak_width_cutoff: 5.0,
            peak_distance_cutoff: 5.0,
            raw_data_folder: PathBuf::from(
                "~/research/lifescale_raw_data_test/development_raw_data_folder",
            ),
        }
    }
}

impl Configuration {
    /// Minimum prominence, in frequency-shift units, for a dip to count as a peak.
    pub fn prominence_threshold(&self) -> f64 {
        self.mass_cutoff * self.mass_transformation
    }

    /// Convert a peak prominence (Hz) into a mass (fg).
    pub fn prominence_to_mass(&self, prominence: f64) -> f64 {
        prominence / self.mass_transformation
    }

    /// The raw-data folder with a leading `~` resolved against the home directory.
    pub fn raw_data_path(&self) -> PathBuf {
        expand_home(&self.raw_data_folder)
    }

    /// Reject values the detector cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.mass_transformation.is_finite() && self.mass_transformation > 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "mass_transformation must be a positive number, got {}",
                self.mass_transformation
            )));
        }
        for (name, value) in [
            ("mass_cutoff", self.mass_cutoff),
            ("peak_width_cutoff", self.peak_width_cutoff),
            ("peak_distance_cutoff", self.peak_distance_cutoff),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfiguration(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Return a copy with every provided override applied.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Configuration {
        Configuration {
            mass_transformation: overrides
                .mass_transformation
                .unwrap_or(self.mass_transformation),
            mass_cutoff: overrides.mass_cutoff.unwrap_or(self.mass_cutoff),
            peak_width_cutoff: overrides.peak_width_cutoff.unwrap_or(self.peak_width_cutoff),
            peak_distance_cutoff: overrides
                .peak_distance_cutoff
                .unwrap_or(self.peak_distance_cutoff),
            raw_data_folder: overrides
                .raw_data_folder
                .clone()
                .unwrap_or_else(|| self.raw_data_folder.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Overrides – the explicit replacement for "whatever the caller passed"
// ---------------------------------------------------------------------------

/// A partial configuration; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub raw_data_folder: Option<PathBuf>,
    pub mass_transformation: Option<f64>,
    pub mass_cutoff: Option<f64>,
    pub peak_width_cutoff: Option<f64>,
    pub peak_distance_cutoff: Option<f64>,
}

impl ConfigOverrides {
    pub fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Resolve a leading `~` component. Other paths are returned unchanged.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let base = Configuration::default();
        let overrides = ConfigOverrides {
            mass_cutoff: Some(5.0),
            raw_data_folder: Some(PathBuf::from("/data/raw")),
            ..ConfigOverrides::default()
        };
        let merged = base.with_overrides(&overrides);

        assert_eq!(merged.mass_cutoff, 5.0);
        assert_eq!(merged.raw_data_folder, PathBuf::from("/data/raw"));
        assert_eq!(merged.mass_transformation, base.mass_transformation);
        assert_eq!(merged.peak_width_cutoff, base.peak_width_cutoff);
        assert_eq!(merged.peak_distance_cutoff, base.peak_distance_cutoff);
    }

    #[test]
    fn empty_overrides_are_identity() {
        let base = Configuration::default();
        assert!(ConfigOverrides::default().is_empty());
        assert_eq!(base.with_overrides(&ConfigOverrides::default()), base);
    }

    #[test]
    fn validation() {
        assert!(Configuration::default().validate().is_ok());

        let zero_calibration = Configuration {
            mass_transformation: 0.0,
            ..Configuration::default()
        };
        assert!(matches!(
            zero_calibration.validate(),
            Err(Error::InvalidConfiguration(_))
        ));

        let negative_width = Configuration {
            peak_width_cutoff: -1.0,
            ..Configuration::default()
        };
        assert!(negative_width.validate().is_err());
    }

    #[test]
    fn threshold_and_mass_conversion() {
        let config = Configuration {
            mass_transformation: 0.5,
            mass_cutoff: 10.0,
            ..Configuration::default()
        };
        assert_eq!(config.prominence_threshold(), 5.0);
        assert_eq!(config.prominence_to_mass(2.0), 4.0);
    }

    #[test]
    fn json_keys_match_persisted_layout() {
        let json = serde_json::to_value(Configuration::default()).unwrap();
        for key in [
            "mass_transformation",
            "mass_cutoff",
            "peak_width_cutoff",
            "peak_distance_cutoff",
            "raw_data_folder",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
    }

    #[test]
    fn home_expansion_leaves_absolute_paths_alone() {
        assert_eq!(expand_home(Path::new("/abs/raw")), PathBuf::from("/abs/raw"));
        if let Some(home) = home_dir() {
            assert_eq!(expand_home(Path::new("~/raw")), home.join("raw"));
        }
    }
}
