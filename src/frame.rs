use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;

use crate::ergast::DriverRecord;
use crate::error::Result;

lazy_static! {
    /// Column layout of the drivers table. Fixed up front so that an empty
    /// run still produces a frame downstream writers can handle.
    pub static ref DRIVER_SCHEMA: SchemaRef = Arc::new(Schema::new(vec![
        Field::new("driver_id", DataType::Utf8, false),
        Field::new("code", DataType::Utf8, true),
        Field::new("permanent_number", DataType::Utf8, true),
        Field::new("given_name", DataType::Utf8, false),
        Field::new("family_name", DataType::Utf8, false),
        Field::new("date_of_birth", DataType::Utf8, false),
        Field::new("nationality", DataType::Utf8, false),
        Field::new("grid_year", DataType::Utf8, false),
    ]));
}

/// Handle on the frame engine, created by the caller and passed to the
/// ingestion node rather than looked up globally.
#[derive(Debug, Clone)]
pub struct FrameContext {
    name: String,
    schema: SchemaRef,
}

impl FrameContext {
    pub fn new(name: &str) -> FrameContext {
        FrameContext {
            name: name.to_owned(),
            schema: DRIVER_SCHEMA.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn create_frame(&self, records: &[DriverRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            return Ok(RecordBatch::new_empty(self.schema()));
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(records.iter().map(|r| r.driver_id.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.code.as_deref()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.permanent_number.as_deref()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.given_name.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.family_name.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.date_of_birth.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.nationality.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(records.iter().map(|r| r.grid_year.as_str()).collect::<Vec<_>>())),
        ];

        Ok(RecordBatch::try_new(self.schema(), columns)?)
    }
}

/// Row count per `grid_year`, in season order.
pub fn rows_per_season(frame: &RecordBatch) -> Result<BTreeMap<String, usize>> {
    let column = frame
        .column_by_name("grid_year")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| ArrowError::SchemaError("frame has no utf8 grid_year column".to_owned()))?;

    let mut counts = BTreeMap::new();
    for i in 0..column.len() {
        if column.is_valid(i) {
            *counts.entry(column.value(i).to_owned()).or_insert(0) += 1;
        }
    }

    Ok(counts)
}

pub fn write_parquet<P: AsRef<Path>>(frame: &RecordBatch, path: P) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;

    let mut writer = ArrowWriter::try_new(file, frame.schema(), None)?;
    writer.write(frame)?;
    writer.close()?;

    info!("Wrote {} drivers to {}", frame.num_rows(), path.display());
    Ok(())
}

#[cfg(test)]
fn record(driver_id: &str, grid_year: &str, permanent_number: Option<&str>) -> DriverRecord {
    DriverRecord {
        driver_id: driver_id.to_owned(),
        code: None,
        permanent_number: permanent_number.map(|n| n.to_owned()),
        given_name: "Given".to_owned(),
        family_name: "Family".to_owned(),
        date_of_birth: "1970-01-01".to_owned(),
        nationality: "Italian".to_owned(),
        grid_year: grid_year.to_owned(),
    }
}

#[test]
fn test_create_frame() {
    let context = FrameContext::new("test");
    let frame = context
        .create_frame(&[record("ascari", "1952", None), record("ascari", "1953", Some("5"))])
        .unwrap();

    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.schema(), *DRIVER_SCHEMA);

    let numbers = frame.column_by_name("permanent_number").unwrap();
    assert!(numbers.is_null(0));
    assert!(numbers.is_valid(1));

    let counts = rows_per_season(&frame).unwrap();
    assert_eq!(counts.get("1952"), Some(&1));
    assert_eq!(counts.get("1953"), Some(&1));
}

#[test]
fn test_create_frame_empty_keeps_schema() {
    let frame = FrameContext::new("test").create_frame(&[]).unwrap();

    assert_eq!(frame.num_rows(), 0);
    assert_eq!(frame.num_columns(), 8);
    assert_eq!(frame.schema(), *DRIVER_SCHEMA);
    assert!(rows_per_season(&frame).unwrap().is_empty());
}

#[test]
fn test_write_parquet() {
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drivers.parquet");
    let frame = FrameContext::new("test")
        .create_frame(&[record("clark", "1963", None), record("hill", "1963", None), record("clark", "1965", None)])
        .unwrap();

    write_parquet(&frame, &path).unwrap();

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap().build().unwrap();
    let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
    assert_eq!(rows, 3);
}

#[test]
fn test_write_parquet_empty_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.parquet");

    let frame = FrameContext::new("test").create_frame(&[]).unwrap();
    write_parquet(&frame, &path).unwrap();

    assert!(path.exists());
}
