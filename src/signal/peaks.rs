use log::debug;

use super::savgol::SavitzkyGolay;
use crate::config::Configuration;
use crate::data::model::{Measurement, PeakEvent};

/// Smoothing window, in samples.
pub const SMOOTHING_WINDOW: usize = 5;
/// Degree of the smoothing polynomial.
pub const SMOOTHING_ORDER: usize = 3;
/// Widths are measured at this fraction of the prominence below the apex.
const WIDTH_REL_HEIGHT: f64 = 0.5;

// ---------------------------------------------------------------------------
// Peak geometry on a 1-D signal
// ---------------------------------------------------------------------------

/// A local maximum together with its prominence and width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
    /// Width at half prominence, in samples, linearly interpolated.
    pub width: f64,
}

/// Indices of local maxima. A flat top reports its middle sample, rounding
/// towards the left edge. Signal ends never qualify.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a higher one.
///
/// Peaks are visited from highest to lowest; on equal height the later peak
/// wins.
pub fn select_by_distance(x: &[f64], peaks: &[usize], distance: f64) -> Vec<usize> {
    let min_distance = distance.ceil().max(0.0) as usize;
    let mut keep = vec![true; peaks.len()];

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < min_distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < min_distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Prominence of the peak at `peak` plus the bases it was measured against.
///
/// Each side is walked until a strictly higher sample or the signal edge;
/// the lowest point reached is that side's base. The reference level is the
/// higher of the two bases.
pub fn prominence(x: &[f64], peak: usize) -> (f64, usize, usize) {
    let apex = x[peak];

    let mut left_base = peak;
    let mut left_min = apex;
    let mut i = peak;
    loop {
        if x[i] > apex {
            break;
        }
        if x[i] < left_min {
            left_min = x[i];
            left_base = i;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_base = peak;
    let mut right_min = apex;
    for (i, &v) in x.iter().enumerate().skip(peak) {
        if v > apex {
            break;
        }
        if v < right_min {
            right_min = v;
            right_base = i;
        }
    }

    (apex - left_min.max(right_min), left_base, right_base)
}

/// Width of a peak at `rel_height` of its prominence below the apex.
pub fn width_at(
    x: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
    rel_height: f64,
) -> f64 {
    let height = x[peak] - prominence * rel_height;

    let mut i = peak;
    while left_base < i && height < x[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if x[i] < height {
        left += (height - x[i]) / (x[i + 1] - x[i]);
    }

    let mut i = peak;
    while i < right_base && height < x[i] {
        i += 1;
    }
    let mut right = i as f64;
    if x[i] < height {
        right -= (height - x[i]) / (x[i - 1] - x[i]);
    }

    right - left
}

/// Peaks of `x` passing the distance, prominence and width constraints,
/// applied in that order. Results are in ascending index order.
pub fn find_peaks(x: &[f64], min_distance: f64, min_prominence: f64, min_width: f64) -> Vec<Peak> {
    let candidates = local_maxima(x);
    let spaced = select_by_distance(x, &candidates, min_distance);

    spaced
        .into_iter()
        .filter_map(|index| {
            let (prominence, left_base, right_base) = prominence(x, index);
            (prominence >= min_prominence).then_some((index, prominence, left_base, right_base))
        })
        .filter_map(|(index, prominence, left_base, right_base)| {
            let width = width_at(x, index, prominence, left_base, right_base, WIDTH_REL_HEIGHT);
            (width >= min_width).then_some(Peak {
                index,
                prominence,
                left_base,
                right_base,
                width,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// PeakDetector – waveform → mass events
// ---------------------------------------------------------------------------

/// Turns measurements into mass events using one configuration.
///
/// Frequency dips are the signal of interest, so detection runs on the
/// negated, smoothed waveform.
#[derive(Debug, Clone)]
pub struct PeakDetector {
    smoother: SavitzkyGolay,
    config: Configuration,
}

impl PeakDetector {
    pub fn new(config: &Configuration) -> Self {
        Self {
            smoother: SavitzkyGolay::new(SMOOTHING_WINDOW, SMOOTHING_ORDER)
                .expect("smoothing window is odd and longer than the polynomial order"),
            config: config.clone(),
        }
    }

    /// Dips of a raw waveform, as peaks of the inverted smoothed signal.
    pub fn find_dips(&self, waveform: &[f64]) -> Vec<Peak> {
        if waveform.len() < self.smoother.window() {
            return Vec::new();
        }
        let inverted: Vec<f64> = self
            .smoother
            .smooth(waveform)
            .into_iter()
            .map(|v| -v)
            .collect();
        find_peaks(
            &inverted,
            self.config.peak_distance_cutoff,
            self.config.prominence_threshold(),
            self.config.peak_width_cutoff,
        )
    }

    /// Mass events of one measurement, in ascending sample order.
    pub fn detect(&self, measurement: &Measurement) -> Vec<PeakEvent> {
        let events: Vec<PeakEvent> = self
            .find_dips(&measurement.waveform)
            .into_iter()
            .map(|peak| {
                PeakEvent::from_measurement(
                    measurement,
                    peak.index,
                    self.config.prominence_to_mass(peak.prominence),
                )
            })
            .collect();
        debug!(
            "cycle {} vial {}: {} peaks",
            measurement.exp_cycle,
            measurement.exp_measurement,
            events.len()
        );
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::STARTUP_SAMPLES;
    use crate::synth::{Dip, NoiseRng, WaveformSpec};

    fn config() -> Configuration {
        Configuration {
            mass_transformation: 0.01,
            mass_cutoff: 20.0,
            peak_width_cutoff: 5.0,
            peak_distance_cutoff: 5.0,
            ..Configuration::default()
        }
    }

    fn measurement(dips: Vec<Dip>, samples: usize) -> Measurement {
        let raw = WaveformSpec::clean(samples, 100.0, dips).render(&mut NoiseRng::new(7));
        Measurement {
            exp_name: "assay".into(),
            exp_date: "200101".into(),
            exp_time: "120000".into(),
            exp_cycle: 1,
            exp_measurement: 1,
            waveform: raw[STARTUP_SAMPLES..].to_vec(),
        }
    }

    #[test]
    fn local_maxima_handles_plateaus_and_edges() {
        let x = [5.0, 1.0, 3.0, 3.0, 3.0, 1.0, 2.0, 2.0, 1.0, 4.0];
        assert_eq!(local_maxima(&x), vec![3, 6]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn prominence_uses_higher_base() {
        //            0    1    2    3    4    5    6
        let x = [0.0, 3.0, 1.0, 2.0, 0.5, 4.0, 0.0];
        let (p, left, right) = prominence(&x, 3);
        assert_eq!(p, 1.0);
        assert_eq!((left, right), (2, 4));
        let (p, _, _) = prominence(&x, 5);
        assert_eq!(p, 4.0);
    }

    #[test]
    fn width_is_interpolated_at_half_prominence() {
        let x = [0.0, 1.0, 2.0, 1.0, 0.0];
        let (p, l, r) = prominence(&x, 2);
        assert_eq!(width_at(&x, 2, p, l, r, 0.5), 2.0);
    }

    #[test]
    fn distance_keeps_the_higher_peak() {
        let x = [0.0, 2.0, 0.0, 3.0, 0.0, 1.0, 0.0];
        assert_eq!(select_by_distance(&x, &[1, 3, 5], 3.0), vec![3]);
        assert_eq!(select_by_distance(&x, &[1, 3, 5], 2.0), vec![1, 3, 5]);
        assert_eq!(select_by_distance(&x, &[1, 3, 5], 0.0), vec![1, 3, 5]);
    }

    #[test]
    fn single_dip_gives_one_event_with_expected_mass() {
        let cfg = config();
        let depth = 0.8;
        let m = measurement(
            vec![Dip {
                center: 4000.0,
                sigma: 20.0,
                depth,
            }],
            8000,
        );
        let events = PeakDetector::new(&cfg).detect(&m);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_index, 4000);
        let expected = depth / cfg.mass_transformation;
        assert!(
            ((events[0].event_mass - expected) / expected).abs() < 1e-4,
            "{} vs {expected}",
            events[0].event_mass
        );
    }

    #[test]
    fn dips_closer_than_distance_merge() {
        let cfg = Configuration {
            peak_distance_cutoff: 50.0,
            ..config()
        };
        let dip = |center| Dip {
            center,
            sigma: 3.0,
            depth: 0.8,
        };
        let m = measurement(vec![dip(1000.0), dip(1020.0)], 3000);
        assert!(PeakDetector::new(&cfg).detect(&m).len() <= 1);

        let far = Configuration {
            peak_distance_cutoff: 5.0,
            ..cfg
        };
        assert_eq!(PeakDetector::new(&far).detect(&m).len(), 2);
    }

    #[test]
    fn dip_below_threshold_is_ignored() {
        let cfg = config();
        let m = measurement(
            vec![Dip {
                center: 500.0,
                sigma: 20.0,
                depth: cfg.prominence_threshold() * 0.9,
            }],
            1000,
        );
        assert!(PeakDetector::new(&cfg).detect(&m).is_empty());
    }

    #[test]
    fn narrow_dip_fails_width_cutoff() {
        let cfg = Configuration {
            peak_width_cutoff: 30.0,
            ..config()
        };
        let m = measurement(
            vec![Dip {
                center: 500.0,
                sigma: 3.0,
                depth: 1.0,
            }],
            1000,
        );
        assert!(PeakDetector::new(&cfg).detect(&m).is_empty());
    }

    #[test]
    fn detection_is_deterministic_and_ordered() {
        let cfg = config();
        let spec = WaveformSpec {
            samples: 5000,
            baseline: 100.0,
            dips: vec![
                Dip { center: 3000.0, sigma: 10.0, depth: 0.6 },
                Dip { center: 1000.0, sigma: 10.0, depth: 0.9 },
            ],
            noise: 0.005,
        };
        let raw = spec.render(&mut NoiseRng::new(3));
        let m = Measurement {
            waveform: raw[STARTUP_SAMPLES..].to_vec(),
            ..measurement(Vec::new(), 20)
        };
        let detector = PeakDetector::new(&cfg);
        let first = detector.detect(&m);
        assert_eq!(first, detector.detect(&m));
        assert!(first.windows(2).all(|w| w[0].event_index < w[1].event_index));
    }

    #[test]
    fn waveform_shorter_than_window_has_no_peaks() {
        let m = Measurement {
            waveform: vec![0.0, -1.0, 0.0],
            ..measurement(Vec::new(), 20)
        };
        assert!(PeakDetector::new(&config()).detect(&m).is_empty());
    }
}
