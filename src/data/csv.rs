//! CSV format dataset implementation
//!
//! Supports loading datasets from CSV files where:
//! - The last column is the label (positive = target, zero or negative = background)
//! - All other columns are dense features
//! - First row can be headers (automatically detected)
//!
//! Unlabeled observation files for scoring are read with [`load_observations`].

use crate::core::{ClassLabel, Dataset, KMSDError, Result, Sample};
use nalgebra::DMatrix;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for CSV format files
#[derive(Debug, Clone)]
pub struct CSVDataset {
    samples: Vec<Sample>,
    dimensions: usize,
}

impl CSVDataset {
    /// Load a dataset from a CSV file
    ///
    /// The last column is assumed to be the label.
    /// Headers are automatically detected if present.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(KMSDError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader with header auto-detection
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, true)
    }

    /// Load a dataset from a reader with explicit header option
    pub fn from_reader_with_options<R: BufRead>(
        reader: R,
        auto_detect_header: bool,
    ) -> Result<Self> {
        let rows = read_rows(reader, auto_detect_header, 2)?;

        let mut samples = Vec::with_capacity(rows.len());
        let mut dimensions = None;
        for (line_num, mut fields) in rows {
            let label_value = fields.pop().ok_or_else(|| {
                KMSDError::ParseError(format!("Line {line_num} has no label column"))
            })?;
            check_width(&mut dimensions, fields.len(), line_num)?;
            samples.push(Sample::new(fields, ClassLabel::from_value(label_value)));
        }

        Ok(CSVDataset {
            samples,
            dimensions: dimensions.unwrap_or(0),
        })
    }

    /// All samples in file order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset for CSVDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.dimensions
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<ClassLabel> {
        self.samples.iter().map(|s| s.label).collect()
    }
}

/// Load an observation matrix (one row per line) from a CSV file
///
/// With `drop_label` the trailing column is discarded, so labeled files can be
/// scored directly.
pub fn load_observations<P: AsRef<Path>>(path: P, drop_label: bool) -> Result<DMatrix<f64>> {
    let file = File::open(path).map_err(KMSDError::IoError)?;
    observations_from_reader(BufReader::new(file), drop_label)
}

/// Read an observation matrix from CSV text
pub fn observations_from_reader<R: BufRead>(reader: R, drop_label: bool) -> Result<DMatrix<f64>> {
    let min_fields = if drop_label { 2 } else { 1 };
    let rows = read_rows(reader, true, min_fields)?;

    let mut dimensions = None;
    let mut values = Vec::new();
    for (line_num, mut fields) in rows {
        if drop_label {
            fields.pop();
        }
        check_width(&mut dimensions, fields.len(), line_num)?;
        values.extend(fields);
    }

    let dim = dimensions.unwrap_or(0);
    let n = if dim == 0 { 0 } else { values.len() / dim };
    Ok(DMatrix::from_row_slice(n, dim, &values))
}

/// Parse numeric rows, skipping blanks, `#` comments and an optional header.
/// Returns 1-based line numbers alongside the parsed fields.
fn read_rows<R: BufRead>(
    reader: R,
    auto_detect_header: bool,
    min_fields: usize,
) -> Result<Vec<(usize, Vec<f64>)>> {
    let mut rows = Vec::new();
    let mut first_data_line = true;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(KMSDError::IoError)?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if first_data_line {
            first_data_line = false;
            if auto_detect_header && is_header_line(line) {
                continue;
            }
        }

        rows.push((idx + 1, parse_data_line(line, idx + 1, min_fields)?));
    }

    if rows.is_empty() {
        return Err(KMSDError::EmptyDataset);
    }
    Ok(rows)
}

/// Check if a line appears to be a header
fn is_header_line(line: &str) -> bool {
    let fields: Vec<&str> = line.split(',').collect();

    // Most fields failing to parse as numbers means column names
    let non_numeric_count = fields
        .iter()
        .filter(|field| field.trim().parse::<f64>().is_err())
        .count();

    non_numeric_count * 2 > fields.len()
}

fn parse_data_line(line: &str, line_num: usize, min_fields: usize) -> Result<Vec<f64>> {
    let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();

    if fields.len() < min_fields {
        return Err(KMSDError::ParseError(format!(
            "Line {line_num} has too few fields: {line}"
        )));
    }

    fields
        .iter()
        .enumerate()
        .map(|(col, field)| {
            field.parse::<f64>().map_err(|_| {
                KMSDError::ParseError(format!(
                    "Invalid value at line {line_num}, column {}: {field}",
                    col + 1
                ))
            })
        })
        .collect()
}

fn check_width(expected: &mut Option<usize>, width: usize, line_num: usize) -> Result<()> {
    match *expected {
        None => {
            *expected = Some(width);
            Ok(())
        }
        Some(dim) if dim == width => Ok(()),
        Some(dim) => Err(KMSDError::ParseError(format!(
            "Line {line_num} has {width} features, expected {dim}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_csv_basic() {
        let data = "1.0,2.0,1\n3.0,4.0,0\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 2);

        let sample1 = dataset.get_sample(0);
        assert_eq!(sample1.label, ClassLabel::Target);
        assert_eq!(sample1.features, vec![1.0, 2.0]);

        let sample2 = dataset.get_sample(1);
        assert_eq!(sample2.label, ClassLabel::Background);
        assert_eq!(sample2.features, vec![3.0, 4.0]);
    }

    #[test]
    fn test_csv_with_headers() {
        let data = "feature1,feature2,label\n1.0,2.0,1\n3.0,4.0,0\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.len(), 2); // Headers should be skipped
        assert_eq!(
            dataset.get_labels(),
            vec![ClassLabel::Target, ClassLabel::Background]
        );
    }

    #[test]
    fn test_csv_keeps_zero_features() {
        let data = "1.0,0.0,2.0,1\n0.0,3.0,0.0,0\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(dataset.get_sample(0).features, vec![1.0, 0.0, 2.0]);
        assert_eq!(dataset.get_sample(1).features, vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_csv_label_conversion() {
        let data = "1.0,2.0,0.5\n3.0,4.0,-1\n5.0,6.0,0\n7.0,8.0,+1\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(
            dataset.get_labels(),
            vec![
                ClassLabel::Target,
                ClassLabel::Background,
                ClassLabel::Background,
                ClassLabel::Target
            ]
        );
    }

    #[test]
    fn test_csv_empty_lines_and_comments() {
        let data = "# Comment\n1.0,2.0,1\n\n3.0,4.0,0\n";
        let dataset = CSVDataset::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_csv_invalid_format() {
        // Too few fields
        let result = CSVDataset::from_reader(Cursor::new("1.0\n"));
        assert!(result.is_err());

        // Invalid number
        let result = CSVDataset::from_reader(Cursor::new("1.0,2.0,0\n1.0,abc,1\n"));
        assert!(matches!(result, Err(KMSDError::ParseError(_))));

        // Ragged rows
        let result = CSVDataset::from_reader(Cursor::new("1.0,2.0,1\n1.0,0\n"));
        assert!(matches!(result, Err(KMSDError::ParseError(_))));

        // Nothing but a header
        let result = CSVDataset::from_reader(Cursor::new("x,y,label\n"));
        assert!(matches!(result, Err(KMSDError::EmptyDataset)));
    }

    #[test]
    fn test_csv_manual_header_control() {
        let data = "1.0,2.0,1\n3.0,4.0,0\n";
        let dataset = CSVDataset::from_reader_with_options(Cursor::new(data), false).unwrap();
        assert_eq!(dataset.len(), 2);
    }

    #[test]
    fn test_is_header_line() {
        assert!(is_header_line("feature1,feature2,label"));
        assert!(is_header_line("x1,x2,x3,y"));
        assert!(!is_header_line("1.0,2.0,3.0,1"));
        assert!(!is_header_line("1"));
    }

    #[test]
    fn test_observations_unlabeled() {
        let data = "x,y\n1.0,2.0\n3.0,4.0\n5.0,6.0\n";
        let observations = observations_from_reader(Cursor::new(data), false).unwrap();
        assert_eq!(
            observations,
            DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
    }

    #[test]
    fn test_observations_drop_label() {
        let data = "1.0,2.0,1\n3.0,4.0,0\n";
        let observations = observations_from_reader(Cursor::new(data), true).unwrap();
        assert_eq!(observations.shape(), (2, 2));
        assert_eq!(observations[(1, 1)], 4.0);
    }

    #[test]
    fn test_observations_single_column() {
        let observations = observations_from_reader(Cursor::new("0.5\n1.5\n"), false).unwrap();
        assert_eq!(observations.shape(), (2, 1));
    }
}
