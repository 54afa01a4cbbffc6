//! CSV input and output
//!
//! The input table carries `gestation, parity, age, height, weight, smoke,
//! bwt` (any further columns are ignored). Results are written one row per
//! processed record, with prediction columns left empty on failure.

use crate::error::DatasetError;
use crate::models::MaternalRecord;
use crate::predictor::BatchRun;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Column order of the results file
pub const OUTPUT_COLUMNS: [&str; 14] = [
    "row",
    "gestation",
    "parity",
    "age",
    "height",
    "weight",
    "smoke",
    "bwt",
    "actual_weight_grams",
    "predicted_weight_grams",
    "risk_level",
    "absolute_error_grams",
    "extraction_strategy",
    "clinical_note",
];

#[derive(Debug, Deserialize)]
struct InputRow {
    gestation: f64,
    parity: f64,
    age: f64,
    height: f64,
    weight: f64,
    smoke: f64,
    bwt: f64,
}

impl InputRow {
    fn into_record(self) -> Result<MaternalRecord, String> {
        let positive = [
            ("gestation", self.gestation),
            ("height", self.height),
            ("weight", self.weight),
            ("bwt", self.bwt),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be a positive number, got {}", name, value));
            }
        }
        if !self.age.is_finite() || self.age < 0.0 {
            return Err(format!("age must be a non-negative number, got {}", self.age));
        }
        if !self.parity.is_finite() || self.parity < 0.0 {
            return Err(format!("parity must be a non-negative number, got {}", self.parity));
        }
        let smoker = match self.smoke {
            s if s == 0.0 => false,
            s if s == 1.0 => true,
            other => return Err(format!("smoke must be 0 or 1, got {}", other)),
        };

        Ok(MaternalRecord {
            gestation_days: self.gestation,
            parity: self.parity.trunc() as u32,
            age_years: self.age,
            height_in: self.height,
            weight_lb: self.weight,
            smoker,
            birth_weight_oz: self.bwt,
        })
    }
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    row: usize,
    gestation: f64,
    parity: u32,
    age: f64,
    height: f64,
    weight: f64,
    smoke: u8,
    bwt: f64,
    actual_weight_grams: f64,
    predicted_weight_grams: Option<f64>,
    risk_level: Option<&'static str>,
    absolute_error_grams: Option<f64>,
    extraction_strategy: Option<&'static str>,
    clinical_note: Option<&'a str>,
}

/// Load at most `limit` records from a CSV file; `0` loads every row
pub fn load_records(path: impl AsRef<Path>, limit: usize) -> Result<Vec<MaternalRecord>, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let records = read_records(file, limit)?;
    info!(
        event = "dataset_loaded",
        path = %path.display(),
        records = records.len(),
        "Loaded maternal records"
    );
    Ok(records)
}

/// Read records from any CSV source with a header row
pub fn read_records<R: Read>(reader: R, limit: usize) -> Result<Vec<MaternalRecord>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for result in reader.records() {
        if limit > 0 && records.len() >= limit {
            break;
        }
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let parsed: InputRow = row
            .deserialize(Some(&headers))
            .map_err(|e| DatasetError::InvalidRecord {
                line,
                reason: e.to_string(),
            })?;
        let record = parsed
            .into_record()
            .map_err(|reason| DatasetError::InvalidRecord { line, reason })?;
        records.push(record);
    }
    Ok(records)
}

/// Write the results of a batch run to a CSV file
pub fn write_results(path: impl AsRef<Path>, run: &BatchRun) -> Result<(), DatasetError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })?;
    write_results_to(file, run)?;
    info!(
        event = "results_written",
        path = %path.display(),
        rows = run.entries.len(),
        "Saved prediction results"
    );
    Ok(())
}

/// Write the results of a batch run to any sink
pub fn write_results_to<W: Write>(writer: W, run: &BatchRun) -> Result<(), DatasetError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(OUTPUT_COLUMNS)?;

    for entry in &run.entries {
        let prediction = entry.prediction();
        writer.serialize(OutputRow {
            row: entry.index + 1,
            gestation: entry.record.gestation_days,
            parity: entry.record.parity,
            age: entry.record.age_years,
            height: entry.record.height_in,
            weight: entry.record.weight_lb,
            smoke: u8::from(entry.record.smoker),
            bwt: entry.record.birth_weight_oz,
            actual_weight_grams: entry.actual_weight_grams,
            predicted_weight_grams: prediction.map(|p| p.weight_grams),
            risk_level: prediction.map(|p| p.risk_level.as_str()),
            absolute_error_grams: entry.absolute_error_grams,
            extraction_strategy: prediction.map(|p| p.extraction_strategy.as_str()),
            clinical_note: prediction.map(|p| p.clinical_note.as_str()),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionStrategy, PredictionResult, RiskLevel};
    use crate::predictor::{BatchEntry, BatchSummary, RecordOutcome};
    use chrono::Utc;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
case,bwt,gestation,parity,age,height,weight,smoke
1,120,284,0,27,62,100,0
2,113,282,0,33,64,135,0
3,128,279,0,28,64,115,1
";

    #[test]
    fn test_read_records_ignores_extra_columns() {
        let records = read_records(SAMPLE.as_bytes(), 0).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].gestation_days, 284.0);
        assert_eq!(records[0].birth_weight_oz, 120.0);
        assert!(!records[0].smoker);
        assert!(records[2].smoker);
    }

    #[test]
    fn test_limit_keeps_first_rows() {
        let records = read_records(SAMPLE.as_bytes(), 2).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].age_years, 33.0);
    }

    #[test]
    fn test_parity_is_truncated() {
        let csv = "gestation,parity,age,height,weight,smoke,bwt\n280,1.0,30,65,150,0,110\n";
        let records = read_records(csv.as_bytes(), 0).unwrap();
        assert_eq!(records[0].parity, 1);
    }

    #[test]
    fn test_rejects_invalid_smoke_with_line() {
        let csv = "gestation,parity,age,height,weight,smoke,bwt\n\
                   280,0,30,65,150,0,110\n\
                   280,0,30,65,150,2,110\n";
        match read_records(csv.as_bytes(), 0) {
            Err(DatasetError::InvalidRecord { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("smoke"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_positive_gestation() {
        let csv = "gestation,parity,age,height,weight,smoke,bwt\n0,0,30,65,150,0,110\n";
        assert!(matches!(
            read_records(csv.as_bytes(), 0),
            Err(DatasetError::InvalidRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_missing_values() {
        let csv = "gestation,parity,age,height,weight,smoke,bwt\n280,0,NA,65,150,0,110\n";
        assert!(matches!(
            read_records(csv.as_bytes(), 0),
            Err(DatasetError::InvalidRecord { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_records_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let records = load_records(file.path(), 10).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_records("/nonexistent/babies.csv", 0).unwrap_err();
        assert!(matches!(err, DatasetError::Open { .. }));
    }

    fn sample_run() -> BatchRun {
        let records = read_records(SAMPLE.as_bytes(), 2).unwrap();
        let entries = vec![
            BatchEntry::new(
                0,
                records[0].clone(),
                RecordOutcome::Decoded {
                    prediction: PredictionResult::new(
                        3300.0,
                        RiskLevel::Low,
                        "Term pregnancy, normal growth",
                        ExtractionStrategy::Direct,
                    ),
                },
                12,
            ),
            BatchEntry::new(
                1,
                records[1].clone(),
                RecordOutcome::TransportFailed {
                    error: "timeout".into(),
                },
                12,
            ),
        ];
        let summary = BatchSummary::from_entries(&entries);
        BatchRun {
            model: "test-model".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            cancelled: false,
            entries,
            summary,
        }
    }

    #[test]
    fn test_write_results_leaves_failures_empty() {
        let mut buffer = Vec::new();
        write_results_to(&mut buffer, &sample_run()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], OUTPUT_COLUMNS.join(","));
        // 120 oz -> 3402 g
        assert_eq!(
            lines[1],
            "1,284.0,0,27.0,62.0,100.0,0,120.0,3402.0,3300.0,LOW,102.0,direct,\"Term pregnancy, normal growth\""
        );
        // 113 oz -> 3203 g
        assert_eq!(lines[2], "2,282.0,0,33.0,64.0,135.0,0,113.0,3203.0,,,,,");
    }

    #[test]
    fn test_write_results_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        write_results(&path, &sample_run()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }
}
