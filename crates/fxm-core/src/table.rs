//! Experiment-wide measurement table with filter columns and TSV
//! persistence.
//!
//! Rows accumulate across analysis units (one unit per image/mask pair) and
//! keep their source path, matching the persisted format downstream tools
//! consume. Filter columns are appended after measurement; they never
//! mutate measurement fields.

use std::io::{self, BufRead, Write};

use serde::Serialize;

use crate::outlier::OutlierColumn;
use crate::volume::Measurement;

/// Measurement column names, in persisted order.
pub const MEASUREMENT_HEADERS: [&str; 10] = [
    "Path",
    "ID",
    "Center X",
    "Center Y",
    "Pillar Height",
    "Pixel Size",
    "Background",
    "Surface",
    "Intensity",
    "Volume",
];

// ── Error type ─────────────────────────────────────────────────────────────

/// Errors raised by table mutation and TSV parsing.
#[derive(Debug)]
pub enum TableError {
    Io(io::Error),
    /// A required measurement column is absent from the header.
    MissingColumn { name: String },
    /// A cell could not be parsed into its column type.
    Parse {
        line: usize,
        column: String,
        value: String,
    },
    /// A filter column's length disagrees with the row count.
    LengthMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "table I/O error: {}", e),
            Self::MissingColumn { name } => write!(f, "missing column '{}'", name),
            Self::Parse {
                line,
                column,
                value,
            } => write!(
                f,
                "line {}: cannot parse '{}' in column '{}'",
                line, value, column
            ),
            Self::LengthMismatch { expected, got } => write!(
                f,
                "filter column length {} does not match {} table rows",
                got, expected
            ),
        }
    }
}

impl std::error::Error for TableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TableError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ── Table ──────────────────────────────────────────────────────────────────

/// A named boolean column (true = object rejected by that filter).
#[derive(Debug, Clone, Serialize)]
pub struct FilterColumn {
    pub name: String,
    pub flags: Vec<bool>,
}

/// Ordered collection of measurements with per-row source paths and
/// appended filter columns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MeasurementTable {
    measurements: Vec<Measurement>,
    paths: Vec<String>,
    filters: Vec<FilterColumn>,
}

impl MeasurementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn filters(&self) -> &[FilterColumn] {
        &self.filters
    }

    /// Append the measurements of one analysis unit, tagged with its source
    /// path. Object IDs stay unit-local, as in the persisted format.
    pub fn append(&mut self, measurements: Vec<Measurement>, path: &str) {
        self.paths
            .extend(std::iter::repeat(path.to_string()).take(measurements.len()));
        self.measurements.extend(measurements);
    }

    /// Volume column of the whole table, in row order.
    pub fn volumes(&self) -> Vec<f64> {
        self.measurements.iter().map(|m| m.volume_um3).collect()
    }

    /// Append a filter column. Fails when the flag count does not match the
    /// row count.
    pub fn push_filter(
        &mut self,
        name: impl Into<String>,
        flags: Vec<bool>,
    ) -> Result<(), TableError> {
        if flags.len() != self.len() {
            return Err(TableError::LengthMismatch {
                expected: self.len(),
                got: flags.len(),
            });
        }
        self.filters.push(FilterColumn {
            name: name.into(),
            flags,
        });
        Ok(())
    }

    /// Append the classification column produced by the outlier filter.
    pub fn push_outlier_column(&mut self, column: &OutlierColumn) -> Result<(), TableError> {
        self.push_filter(column.name.clone(), column.flags.clone())
    }

    /// Volumes of the rows a filter column accepted (flag is false), or
    /// `None` when no column carries that name.
    pub fn accepted_volumes(&self, filter_name: &str) -> Option<Vec<f64>> {
        let filter = self.filters.iter().find(|f| f.name == filter_name)?;
        Some(
            self.measurements
                .iter()
                .zip(filter.flags.iter())
                .filter(|(_, &flagged)| !flagged)
                .map(|(m, _)| m.volume_um3)
                .collect(),
        )
    }

    /// Write the table as tab-separated values with a header row.
    pub fn write_tsv<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let mut header: Vec<&str> = MEASUREMENT_HEADERS.to_vec();
        header.extend(self.filters.iter().map(|f| f.name.as_str()));
        writeln!(w, "{}", header.join("\t"))?;

        for (i, m) in self.measurements.iter().enumerate() {
            write!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                self.paths[i],
                m.id,
                m.center_row,
                m.center_col,
                m.chamber_height_um,
                m.pixel_size_um,
                m.background,
                m.surface,
                m.intensity,
                m.volume_um3,
            )?;
            for filter in &self.filters {
                write!(w, "\t{}", filter.flags.get(i).copied().unwrap_or(false))?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    /// Parse a table previously produced by [`Self::write_tsv`].
    ///
    /// Header columns beyond the measurement set are read back as boolean
    /// filter columns, in header order.
    pub fn read_tsv<R: BufRead>(r: R) -> Result<Self, TableError> {
        let mut lines = r.lines().enumerate();
        let (_, header_line) = lines.next().ok_or_else(|| TableError::MissingColumn {
            name: MEASUREMENT_HEADERS[0].to_string(),
        })?;
        let header_line = header_line?;
        let header: Vec<&str> = header_line.split('\t').collect();

        let mut indices = [0usize; MEASUREMENT_HEADERS.len()];
        for (slot, name) in indices.iter_mut().zip(MEASUREMENT_HEADERS.iter()) {
            *slot = header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| TableError::MissingColumn {
                    name: name.to_string(),
                })?;
        }
        let filter_columns: Vec<(usize, String)> = header
            .iter()
            .enumerate()
            .filter(|(_, h)| !MEASUREMENT_HEADERS.contains(h))
            .map(|(i, h)| (i, h.to_string()))
            .collect();

        let mut table = Self::new();
        let mut filters: Vec<FilterColumn> = filter_columns
            .iter()
            .map(|(_, name)| FilterColumn {
                name: name.clone(),
                flags: Vec::new(),
            })
            .collect();

        for (line_idx, line) in lines {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let cells: Vec<&str> = line.split('\t').collect();
            let cell = |col: usize, name: &str| {
                cells.get(col).copied().ok_or_else(|| TableError::Parse {
                    line: line_idx + 1,
                    column: name.to_string(),
                    value: String::new(),
                })
            };
            let parse_f64 = |col: usize, name: &str| -> Result<f64, TableError> {
                let v = cell(col, name)?;
                v.parse().map_err(|_| TableError::Parse {
                    line: line_idx + 1,
                    column: name.to_string(),
                    value: v.to_string(),
                })
            };

            let path = cell(indices[0], "Path")?.to_string();
            let id = cell(indices[1], "ID")?
                .parse()
                .map_err(|_| TableError::Parse {
                    line: line_idx + 1,
                    column: "ID".to_string(),
                    value: cells[indices[1]].to_string(),
                })?;
            let surface = cell(indices[7], "Surface")?
                .parse()
                .map_err(|_| TableError::Parse {
                    line: line_idx + 1,
                    column: "Surface".to_string(),
                    value: cells[indices[7]].to_string(),
                })?;

            table.measurements.push(Measurement {
                id,
                center_row: parse_f64(indices[2], "Center X")?,
                center_col: parse_f64(indices[3], "Center Y")?,
                chamber_height_um: parse_f64(indices[4], "Pillar Height")?,
                pixel_size_um: parse_f64(indices[5], "Pixel Size")?,
                background: parse_f64(indices[6], "Background")?,
                surface,
                intensity: parse_f64(indices[8], "Intensity")?,
                volume_um3: parse_f64(indices[9], "Volume")?,
            });
            table.paths.push(path);

            for ((col, name), filter) in filter_columns.iter().zip(filters.iter_mut()) {
                let v = cell(*col, name)?;
                let flag = match v {
                    "true" | "True" => true,
                    "false" | "False" => false,
                    _ => {
                        return Err(TableError::Parse {
                            line: line_idx + 1,
                            column: name.clone(),
                            value: v.to_string(),
                        })
                    }
                };
                filter.flags.push(flag);
            }
        }

        table.filters = filters;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlier::classify_outliers;

    fn sample_measurement(id: usize, volume: f64) -> Measurement {
        Measurement {
            id,
            center_row: 100.5 + id as f64,
            center_col: 200.25,
            chamber_height_um: 5.6,
            pixel_size_um: 0.325,
            background: 150.0,
            surface: 2500,
            intensity: 100.0,
            volume_um3: volume,
        }
    }

    fn sample_table() -> MeasurementTable {
        let mut table = MeasurementTable::new();
        table.append(
            vec![sample_measurement(0, 10.0), sample_measurement(1, 20.0)],
            "/data/exp1/pos1",
        );
        table.append(vec![sample_measurement(0, 1000.0)], "/data/exp1/pos2");
        table
    }

    #[test]
    fn append_tags_rows_with_their_path() {
        let table = sample_table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.paths()[0], "/data/exp1/pos1");
        assert_eq!(table.paths()[2], "/data/exp1/pos2");
        assert_eq!(table.volumes(), vec![10.0, 20.0, 1000.0]);
    }

    #[test]
    fn filter_length_is_checked() {
        let mut table = sample_table();
        let err = table.push_filter("Bad", vec![true]).unwrap_err();
        assert!(matches!(
            err,
            TableError::LengthMismatch {
                expected: 3,
                got: 1
            }
        ));
        assert!(table.push_filter("Ok", vec![false, false, true]).is_ok());
    }

    #[test]
    fn accepted_volumes_drops_flagged_rows() {
        let mut table = sample_table();
        table
            .push_filter("AutoFilterIQR_1", vec![false, false, true])
            .unwrap();
        assert_eq!(
            table.accepted_volumes("AutoFilterIQR_1").unwrap(),
            vec![10.0, 20.0]
        );
        assert!(table.accepted_volumes("NoSuchFilter").is_none());
    }

    #[test]
    fn tsv_round_trip_preserves_table() {
        let mut table = sample_table();
        let cols = classify_outliers(&table.volumes(), &[1.0, 1.5]);
        for col in &cols {
            table.push_outlier_column(col).unwrap();
        }

        let mut buf = Vec::new();
        table.write_tsv(&mut buf).unwrap();
        let parsed = MeasurementTable::read_tsv(buf.as_slice()).unwrap();

        assert_eq!(parsed.len(), table.len());
        assert_eq!(parsed.paths(), table.paths());
        for (a, b) in parsed
            .measurements()
            .iter()
            .zip(table.measurements().iter())
        {
            assert_eq!(a.id, b.id);
            assert_eq!(a.center_row, b.center_row);
            assert_eq!(a.surface, b.surface);
            assert_eq!(a.volume_um3, b.volume_um3);
        }
        assert_eq!(parsed.filters().len(), 2);
        assert_eq!(parsed.filters()[0].name, "AutoFilterIQR_1");
        assert_eq!(parsed.filters()[0].flags, table.filters()[0].flags);
        assert_eq!(parsed.filters()[1].name, "AutoFilterIQR_1.5");
    }

    #[test]
    fn missing_column_is_reported() {
        let bad = "Path\tID\tVolume\n/p\t0\t1.0\n";
        let err = MeasurementTable::read_tsv(bad.as_bytes()).unwrap_err();
        assert!(matches!(err, TableError::MissingColumn { .. }));
    }

    #[test]
    fn malformed_cell_is_reported_with_line() {
        let mut buf = Vec::new();
        sample_table().write_tsv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap().replace("2500", "many");
        let err = MeasurementTable::read_tsv(text.as_bytes()).unwrap_err();
        match err {
            TableError::Parse { column, .. } => assert_eq!(column, "Surface"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
