/// Savitzky–Golay smoothing filter.
///
/// Every output sample is the value at that position of a least-squares
/// polynomial fitted to the surrounding window. The first and last
/// `window / 2` samples are taken from the polynomial fitted to the first and
/// last complete window, so the output has the input's length and no padding
/// artefacts.
#[derive(Debug, Clone)]
pub struct SavitzkyGolay {
    window: usize,
    /// Rows of the least-squares projection matrix: row `r` evaluates the
    /// fitted polynomial at window position `r`.
    projection: Vec<Vec<f64>>,
}

impl SavitzkyGolay {
    /// `None` unless `window` is odd and larger than `polyorder`.
    pub fn new(window: usize, polyorder: usize) -> Option<Self> {
        if window % 2 == 0 || polyorder >= window {
            return None;
        }
        let half = (window / 2) as f64;
        let terms = polyorder + 1;

        // Vandermonde matrix on positions centred at zero.
        let vander: Vec<Vec<f64>> = (0..window)
            .map(|j| {
                let t = j as f64 - half;
                (0..terms).map(|k| t.powi(k as i32)).collect()
            })
            .collect();

        let mut normal = vec![vec![0.0; terms]; terms];
        for row in &vander {
            for k in 0..terms {
                for l in 0..terms {
                    normal[k][l] += row[k] * row[l];
                }
            }
        }
        let inverse = invert(normal)?;

        let projection = (0..window)
            .map(|r| {
                (0..window)
                    .map(|j| {
                        let mut acc = 0.0;
                        for k in 0..terms {
                            for l in 0..terms {
                                acc += vander[r][k] * inverse[k][l] * vander[j][l];
                            }
                        }
                        acc
                    })
                    .collect()
            })
            .collect();

        Some(Self { window, projection })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Smooth `x`. Signals shorter than the window are returned unchanged.
    pub fn smooth(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        let w = self.window;
        if n < w {
            return x.to_vec();
        }
        let half = w / 2;
        let apply = |row: &[f64], start: usize| -> f64 {
            row.iter().zip(&x[start..start + w]).map(|(c, v)| c * v).sum()
        };

        let mut out = Vec::with_capacity(n);
        for i in 0..half {
            out.push(apply(&self.projection[i], 0));
        }
        let centre = &self.projection[half];
        for i in half..n - half {
            out.push(apply(centre, i - half));
        }
        for i in n - half..n {
            out.push(apply(&self.projection[i - (n - w)], n - w));
        }
        out
    }
}

/// Gauss–Jordan inversion with partial pivoting.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&p, &q| a[p][col].abs().total_cmp(&a[q][col].abs()))?;
        if a[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        a.swap(col, pivot);
        inv.swap(col, pivot);

        let scale = a[col][col];
        for j in 0..n {
            a[col][j] /= scale;
            inv[col][j] /= scale;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn centre_coefficients_for_window_5_order_3() {
        let sg = SavitzkyGolay::new(5, 3).unwrap();
        let expected = [-3.0, 12.0, 17.0, 12.0, -3.0].map(|c| c / 35.0);
        for (c, e) in sg.projection[2].iter().zip(expected) {
            assert!(close(*c, e), "{c} != {e}");
        }
    }

    #[test]
    fn preserves_cubic_polynomials_everywhere() {
        let sg = SavitzkyGolay::new(5, 3).unwrap();
        let x: Vec<f64> = (0..20)
            .map(|i| {
                let t = i as f64;
                0.5 * t.powi(3) - 2.0 * t * t + t - 7.0
            })
            .collect();
        let y = sg.smooth(&x);
        assert_eq!(y.len(), x.len());
        for (a, b) in x.iter().zip(&y) {
            assert!((a - b).abs() < 1e-6 * a.abs().max(1.0), "{a} vs {b}");
        }
    }

    #[test]
    fn damps_single_sample_spike() {
        let sg = SavitzkyGolay::new(5, 3).unwrap();
        let mut x = vec![0.0; 11];
        x[5] = 35.0;
        let y = sg.smooth(&x);
        assert!(close(y[5], 17.0));
        assert!(close(y[4], 12.0));
        assert!(close(y[3], -3.0));
    }

    #[test]
    fn rejects_invalid_shapes() {
        assert!(SavitzkyGolay::new(4, 2).is_none());
        assert!(SavitzkyGolay::new(5, 5).is_none());
    }

    #[test]
    fn short_input_is_unchanged() {
        let sg = SavitzkyGolay::new(5, 3).unwrap();
        assert_eq!(sg.smooth(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }
}
