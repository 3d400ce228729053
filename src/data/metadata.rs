use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use log::{debug, warn};

use super::model::{MetadataEntry, PeakRow, PeaksTable};
use crate::error::{Error, Result};

pub const ID_COLUMN: &str = "Id";
pub const WELL_COLUMN: &str = "Well";

// ---------------------------------------------------------------------------
// Well labels
// ---------------------------------------------------------------------------

/// Zero-pad the numeric part of a plate coordinate to two digits.
///
/// The label is split after its leading alphabetic run; whatever follows is
/// left-padded with `0` to width 2 (`A1` → `A01`, `AA5` → `AA05`, `B12` stays).
pub fn normalize_well(label: &str) -> String {
    let split = label
        .char_indices()
        .find(|(_, c)| !c.is_alphabetic())
        .map_or(label.len(), |(i, _)| i);
    let (letters, rest) = label.split_at(split);
    format!("{letters}{rest:0>2}")
}

// ---------------------------------------------------------------------------
// Metadata table
// ---------------------------------------------------------------------------

/// Integer value of an `Id` cell. Spreadsheet exports often write `1.0`.
fn coerce_id(raw: &str) -> Option<i64> {
    if let Ok(id) = raw.parse::<i64>() {
        return Some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Read the plate layout table from a CSV file.
///
/// Only the `Id` and `Well` columns are used; anything else in the export is
/// ignored.
pub fn parse_metadata(path: &Path) -> Result<Vec<MetadataEntry>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read_metadata(file, path)
}

/// Like [`parse_metadata`] for an already opened source; `source` names it in errors.
pub fn read_metadata<R: Read>(input: R, source: &Path) -> Result<Vec<MetadataEntry>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| Error::metadata(source, format!("reading CSV headers: {e}")))?
        .clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::metadata(source, format!("missing '{name}' column")))
    };
    let id_idx = column(ID_COLUMN)?;
    let well_idx = column(WELL_COLUMN)?;

    let mut entries = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| Error::metadata(source, format!("CSV row {row_no}: {e}")))?;

        let raw_id = record.get(id_idx).unwrap_or("").trim();
        let id = coerce_id(raw_id).ok_or_else(|| {
            Error::metadata(source, format!("row {row_no}: Id '{raw_id}' is not an integer"))
        })?;
        let well = record
            .get(well_idx)
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string);

        entries.push(MetadataEntry { id, well });
    }
    debug!("Read {} metadata rows from {}", entries.len(), source.display());
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Left join of the peaks on `exp_measurement == Id`.
///
/// Every peak is kept. A vial listed several times yields one row per listing,
/// in table order; an unlisted vial gets no well. Matched wells are normalized.
pub fn join_metadata(table: PeaksTable, metadata: &[MetadataEntry]) -> PeaksTable {
    let mut wells_by_id: BTreeMap<i64, Vec<Option<String>>> = BTreeMap::new();
    for entry in metadata {
        wells_by_id
            .entry(entry.id)
            .or_default()
            .push(entry.well.as_deref().map(normalize_well));
    }

    let mut unmatched = 0usize;
    let mut rows = Vec::with_capacity(table.rows.len());
    for row in table.rows {
        match wells_by_id.get(&i64::from(row.event.exp_measurement)) {
            Some(wells) => {
                for well in wells {
                    rows.push(PeakRow {
                        event: row.event.clone(),
                        well: well.clone(),
                    });
                }
            }
            None => {
                unmatched += 1;
                rows.push(PeakRow {
                    event: row.event,
                    well: None,
                });
            }
        }
    }
    if unmatched > 0 {
        warn!("{unmatched} peaks belong to vials missing from the metadata table");
    }

    PeaksTable {
        rows,
        has_well_column: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::PeakEvent;

    fn event(vial: u32, index: usize) -> PeakEvent {
        PeakEvent {
            exp_name: "assay".into(),
            exp_date: "200101".into(),
            exp_time: "120000".into(),
            exp_cycle: 1,
            exp_measurement: vial,
            event_index: index,
            event_mass: 100.0,
        }
    }

    fn read(text: &str) -> Result<Vec<MetadataEntry>> {
        read_metadata(text.as_bytes(), Path::new("PanelData.csv"))
    }

    #[test]
    fn well_normalization() {
        assert_eq!(normalize_well("A1"), "A01");
        assert_eq!(normalize_well("B12"), "B12");
        assert_eq!(normalize_well("AA5"), "AA05");
        assert_eq!(normalize_well("H"), "H00");
        assert_eq!(normalize_well("1A"), "1A");
    }

    #[test]
    fn reads_id_and_well_ignoring_other_columns() {
        let entries = read("Sample,Id,Well\nctrl, 1 ,A1\nko,2,\n").unwrap();
        assert_eq!(
            entries,
            vec![
                MetadataEntry { id: 1, well: Some("A1".into()) },
                MetadataEntry { id: 2, well: None },
            ]
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = read("Id,Sample\n1,x\n").unwrap_err();
        assert!(matches!(err, Error::MetadataParse { ref reason, .. } if reason.contains("Well")));
        assert!(read("Well\nA1\n").is_err());
    }

    #[test]
    fn non_integer_id_is_an_error() {
        for bad in ["Id,Well\nabc,A1\n", "Id,Well\n1.5,A1\n", "Id,Well\nNaN,A1\n", "Id,Well\ninf,A1\n"] {
            assert!(matches!(read(bad), Err(Error::MetadataParse { .. })), "{bad:?}");
        }
    }

    #[test]
    fn whole_float_ids_are_integers() {
        let entries = read("Id,Well\n1.0,A1\n2.0,B2\n-3,C3\n").unwrap();
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, [1, 2, -3]);
        assert_eq!(entries[1].well.as_deref(), Some("B2"));
    }

    #[test]
    fn left_join_keeps_unmatched_rows() {
        let table = PeaksTable::from_events(vec![event(1, 10), event(2, 20), event(3, 30)]);
        let metadata = vec![
            MetadataEntry { id: 1, well: Some("A1".into()) },
            MetadataEntry { id: 3, well: Some("C12".into()) },
        ];
        let joined = join_metadata(table, &metadata);

        assert!(joined.has_well_column);
        let wells: Vec<_> = joined.rows.iter().map(|r| r.well.as_deref()).collect();
        assert_eq!(wells, [Some("A01"), None, Some("C12")]);
    }

    #[test]
    fn duplicated_ids_duplicate_rows() {
        let table = PeaksTable::from_events(vec![event(1, 10)]);
        let metadata = vec![
            MetadataEntry { id: 1, well: Some("A1".into()) },
            MetadataEntry { id: 1, well: Some("B1".into()) },
        ];
        let joined = join_metadata(table, &metadata);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.rows[1].well.as_deref(), Some("B01"));
    }
}
