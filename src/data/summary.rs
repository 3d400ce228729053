use std::collections::BTreeMap;

use super::model::{GroupKey, PeakRow, PeaksTable, SummaryRow};

/// Grouping key of one row, or `None` when the row cannot be grouped.
fn group_key(row: &PeakRow, by_well: bool) -> Option<GroupKey> {
    let cycle = row.event.exp_cycle;
    if by_well {
        row.well.as_ref().map(|well| GroupKey::Well {
            well: well.clone(),
            cycle,
        })
    } else {
        Some(GroupKey::Measurement {
            measurement: row.event.exp_measurement,
            cycle,
        })
    }
}

/// Per-group statistics of `event_mass`.
///
/// Groups are (well, cycle) as soon as any row carries a well label, and
/// (vial, cycle) otherwise; rows without a well are left out of well groups.
/// Output is sorted by key. Only groups with at least one peak exist.
pub fn summarize(table: &PeaksTable) -> Vec<SummaryRow> {
    let by_well = table.any_well();
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(key) = group_key(row, by_well) {
            groups.entry(key).or_default().push(row.event.event_mass);
        }
    }

    groups
        .into_iter()
        .map(|(key, masses)| describe(key, masses))
        .collect()
}

fn describe(key: GroupKey, mut values: Vec<f64>) -> SummaryRow {
    values.sort_by(f64::total_cmp);
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    SummaryRow {
        key,
        count,
        mean,
        std,
        min: values[0],
        q25: quantile(&values, 0.25),
        q50: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values[count - 1],
    }
}

/// Linearly interpolated quantile of sorted, non-empty data.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
