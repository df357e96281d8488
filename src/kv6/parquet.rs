//! The columnar output contract for KV6 records.
//!
//! One fixed 18-column schema shared by every writer: the record type plus
//! the 17 KV6 fields, all field columns nullable. Files are written with
//! Zstd compression, v2 data pages and row groups capped at [`MAX_CHUNK`],
//! as `<path>.part` renamed into place on success, with a JSON sidecar.

use crate::kv6::model::{Kv6Field, Kv6Record};
use crate::sidecar::ChunkMeta;
use arrow::array::{
    ArrayRef, Date32Builder, Int16Builder, Int32Builder, StringBuilder, TimestampSecondBuilder,
    UInt16Builder, UInt32Builder, UInt8Builder,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, SecondsFormat, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{WriterProperties, WriterVersion};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Upper bound on buffered rows per chunk and on row-group length.
pub const MAX_CHUNK: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Arc::new(Schema::new(vec![
                Field::new("type", DataType::Utf8, false),
                Field::new("data_owner_code", DataType::Utf8, true),
                Field::new("line_planning_number", DataType::Utf8, true),
                Field::new("operating_day", DataType::Date32, true),
                Field::new("journey_number", DataType::UInt32, true),
                Field::new("reinforcement_number", DataType::UInt8, true),
                Field::new(
                    "timestamp",
                    DataType::Timestamp(TimeUnit::Second, None),
                    true,
                ),
                Field::new("source", DataType::Utf8, true),
                Field::new("punctuality", DataType::Int16, true),
                Field::new("user_stop_code", DataType::Utf8, true),
                Field::new("passage_sequence_number", DataType::UInt16, true),
                Field::new("vehicle_number", DataType::UInt32, true),
                Field::new("block_code", DataType::UInt32, true),
                Field::new("wheelchair_accessible", DataType::Utf8, true),
                Field::new("number_of_coaches", DataType::UInt8, true),
                Field::new("rd_y", DataType::Int32, true),
                Field::new("rd_x", DataType::Int32, true),
                Field::new("distance_since_last_user_stop", DataType::UInt32, true),
            ]))
        })
        .clone()
}

/// Builds the output batch for a slice of records. Records that fail the
/// shape check are skipped with a warning; per-record field presence decides
/// nullity, with the `-1` coordinate sentinels emitted as null.
pub fn records_to_batch(records: &[Kv6Record]) -> Result<RecordBatch, WriteError> {
    let mut types = StringBuilder::new();
    let mut data_owner_codes = StringBuilder::new();
    let mut line_planning_numbers = StringBuilder::new();
    let mut operating_days = Date32Builder::new();
    let mut journey_numbers = UInt32Builder::new();
    let mut reinforcement_numbers = UInt8Builder::new();
    let mut timestamps = TimestampSecondBuilder::new();
    let mut sources = StringBuilder::new();
    let mut punctualities = Int16Builder::new();
    let mut user_stop_codes = StringBuilder::new();
    let mut passage_sequence_numbers = UInt16Builder::new();
    let mut vehicle_numbers = UInt32Builder::new();
    let mut block_codes = UInt32Builder::new();
    let mut wheelchair_accessibles = StringBuilder::new();
    let mut number_of_coaches = UInt8Builder::new();
    let mut rd_ys = Int32Builder::new();
    let mut rd_xs = Int32Builder::new();
    let mut distance_since_last_user_stops = UInt32Builder::new();

    for record in records {
        if !record.is_valid() {
            log::warn!(
                "skipping {} record with missing required fields",
                record.record_type.element_name()
            );
            continue;
        }
        let used = record.emitted_fields();
        let has = |f: Kv6Field| used.contains(f);

        types.append_value(record.record_type.element_name());
        data_owner_codes.append_option(
            has(Kv6Field::DataOwnerCode).then(|| record.data_owner_code.as_str()),
        );
        line_planning_numbers.append_option(
            has(Kv6Field::LinePlanningNumber).then(|| record.line_planning_number.as_str()),
        );
        operating_days.append_option(
            has(Kv6Field::OperatingDay)
                .then(|| record.operating_day.to_unix_days())
                .flatten(),
        );
        journey_numbers.append_option(has(Kv6Field::JourneyNumber).then_some(record.journey_number));
        reinforcement_numbers.append_option(
            has(Kv6Field::ReinforcementNumber).then_some(record.reinforcement_number),
        );
        timestamps.append_option(
            has(Kv6Field::Timestamp)
                .then(|| record.timestamp.to_unix_seconds())
                .flatten(),
        );
        sources.append_option(has(Kv6Field::Source).then(|| record.source.as_str()));
        punctualities.append_option(has(Kv6Field::Punctuality).then_some(record.punctuality));
        user_stop_codes
            .append_option(has(Kv6Field::UserStopCode).then(|| record.user_stop_code.as_str()));
        passage_sequence_numbers.append_option(
            has(Kv6Field::PassageSequenceNumber).then_some(record.passage_sequence_number),
        );
        vehicle_numbers
            .append_option(has(Kv6Field::VehicleNumber).then_some(record.vehicle_number));
        block_codes.append_option(has(Kv6Field::BlockCode).then_some(record.block_code));
        wheelchair_accessibles.append_option(
            has(Kv6Field::WheelchairAccessible).then(|| record.wheelchair_accessible.as_str()),
        );
        number_of_coaches
            .append_option(has(Kv6Field::NumberOfCoaches).then_some(record.number_of_coaches));
        rd_ys.append_option(has(Kv6Field::RdY).then_some(record.rd_y));
        rd_xs.append_option(has(Kv6Field::RdX).then_some(record.rd_x));
        distance_since_last_user_stops.append_option(
            has(Kv6Field::DistanceSinceLastUserStop)
                .then_some(record.distance_since_last_user_stop),
        );
    }

    let columns: Vec<ArrayRef> = vec![
        Arc::new(types.finish()),
        Arc::new(data_owner_codes.finish()),
        Arc::new(line_planning_numbers.finish()),
        Arc::new(operating_days.finish()),
        Arc::new(journey_numbers.finish()),
        Arc::new(reinforcement_numbers.finish()),
        Arc::new(timestamps.finish()),
        Arc::new(sources.finish()),
        Arc::new(punctualities.finish()),
        Arc::new(user_stop_codes.finish()),
        Arc::new(passage_sequence_numbers.finish()),
        Arc::new(vehicle_numbers.finish()),
        Arc::new(block_codes.finish()),
        Arc::new(wheelchair_accessibles.finish()),
        Arc::new(number_of_coaches.finish()),
        Arc::new(rd_ys.finish()),
        Arc::new(rd_xs.finish()),
        Arc::new(distance_since_last_user_stops.finish()),
    ];
    Ok(RecordBatch::try_new(schema(), columns)?)
}

/// Min and max record timestamps (epoch seconds) over a chunk; `(0, 0)` when
/// no record carries a timestamp.
pub fn min_max_timestamps(records: &[Kv6Record]) -> (i64, i64) {
    let mut min = i64::MAX;
    let mut max = 0;
    for record in records {
        if !record.presence.contains(Kv6Field::Timestamp) {
            continue;
        }
        let Some(seconds) = record.timestamp.to_unix_seconds() else {
            continue;
        };
        min = min.min(seconds);
        max = max.max(seconds);
    }
    if min == i64::MAX {
        return (0, 0);
    }
    (min, max)
}

/// The chunk file name for a flush at `at`: `oeuf-<RFC 3339 with offset>.parquet`.
pub fn chunk_file_name(at: DateTime<Utc>) -> String {
    format!(
        "oeuf-{}.parquet",
        at.to_rfc3339_opts(SecondsFormat::Secs, false)
    )
}

fn append_os(path: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Writes `batch` to `path` (via `.part` + rename) using the shared writer
/// parameters.
pub fn write_batch(batch: &RecordBatch, path: &Path) -> Result<(), WriteError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::default()))
        .set_writer_version(WriterVersion::PARQUET_2_0)
        .set_max_row_group_size(MAX_CHUNK)
        .set_created_by("oeuf".to_string())
        .build();

    let part = append_os(path, ".part");
    let result = (|| {
        let file = fs::File::create(&part)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
        Ok(())
    })();
    if let Err(err) = result {
        let _ = fs::remove_file(&part);
        return Err(err);
    }
    fs::rename(&part, path).map_err(|err| {
        let _ = fs::remove_file(&part);
        err.into()
    })
}

/// Writes one chunk of records as a Parquet file plus sidecar. The sidecar
/// lands only after the data file is complete.
pub fn write_chunk(records: &[Kv6Record], path: &Path) -> Result<ChunkMeta, WriteError> {
    let batch = records_to_batch(records)?;
    write_batch(&batch, path)?;

    let (min_timestamp, max_timestamp) = min_max_timestamps(records);
    let meta = ChunkMeta {
        min_timestamp,
        max_timestamp,
        rows_written: batch.num_rows() as i64,
    };
    meta.write_for(path)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv6::model::{FieldSet, Kv6RecordType};
    use crate::time::{Date, Timestamp};
    use arrow::array::{Array, Int32Array, StringArray, TimestampSecondArray};
    use chrono::TimeZone;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn delay(journey_number: u32, ts: &str) -> Kv6Record {
        let mut record = Kv6Record::new(Kv6RecordType::Delay);
        record.data_owner_code = "CXX".into();
        record.line_planning_number = "M300".into();
        record.operating_day = Date { year: 2024, month: 6, day: 1 };
        record.journey_number = journey_number;
        record.reinforcement_number = 0;
        record.timestamp = Timestamp::parse(ts).unwrap();
        record.source = "SERVER".into();
        record.punctuality = -30;
        record.presence = Kv6RecordType::Delay.required_fields();
        record
    }

    fn arrival_with_sentinel_position() -> Kv6Record {
        let mut record = Kv6Record::new(Kv6RecordType::Arrival);
        record.data_owner_code = "CXX".into();
        record.line_planning_number = "M300".into();
        record.operating_day = Date { year: 2024, month: 6, day: 1 };
        record.journey_number = 2045;
        record.reinforcement_number = 0;
        record.user_stop_code = "10002".into();
        record.passage_sequence_number = 0;
        record.timestamp = Timestamp::parse("2024-06-01T12:01:00Z").unwrap();
        record.source = "VEHICLE".into();
        record.vehicle_number = 8401;
        record.punctuality = 45;
        record.rd_x = -1;
        record.rd_y = -1;
        record.presence = Kv6RecordType::Arrival
            .required_fields()
            .union(FieldSet::EMPTY.with(Kv6Field::RdX).with(Kv6Field::RdY));
        record
    }

    #[test]
    fn chunk_file_name_is_rfc3339_with_offset() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(chunk_file_name(at), "oeuf-2024-06-01T12:00:00+00:00.parquet");
    }

    #[test]
    fn batch_has_schema_and_nulls_sentinels() {
        let records = vec![delay(2045, "2024-06-01T12:00:00Z"), arrival_with_sentinel_position()];
        let batch = records_to_batch(&records).unwrap();
        assert_eq!(batch.schema(), schema());
        assert_eq!(batch.num_rows(), 2);

        let types = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(types.value(0), "DELAY");
        assert_eq!(types.value(1), "ARRIVAL");

        let rd_x = batch
            .column(16)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        // DELAY has no position; ARRIVAL sent the -1 sentinel.
        assert!(rd_x.is_null(0));
        assert!(rd_x.is_null(1));

        let timestamps = batch
            .column(6)
            .as_any()
            .downcast_ref::<TimestampSecondArray>()
            .unwrap();
        assert_eq!(timestamps.value(0), 1717243200);
    }

    #[test]
    fn invalid_records_are_skipped() {
        let mut bad = delay(1, "2024-06-01T12:00:00Z");
        bad.presence.remove(Kv6Field::Punctuality);
        let batch = records_to_batch(&[bad, delay(2, "2024-06-01T12:00:00Z")]).unwrap();
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn chunk_roundtrips_through_parquet_with_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oeuf-test.parquet");
        let records = vec![
            delay(1, "2024-06-01T12:00:30Z"),
            delay(2, "2024-06-01T12:00:00Z"),
            arrival_with_sentinel_position(),
        ];
        let meta = write_chunk(&records, &path).unwrap();
        assert_eq!(meta.rows_written, 3);
        assert_eq!(meta.min_timestamp, 1717243200);
        assert_eq!(meta.max_timestamp, 1717243260);
        assert_eq!(ChunkMeta::read_for(&path).unwrap(), meta);
        assert!(!append_os(&path, ".part").exists());

        let file = fs::File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, meta.rows_written as usize);
    }

    #[test]
    fn empty_chunk_has_zero_timestamps() {
        assert_eq!(min_max_timestamps(&[]), (0, 0));
        let mut record = Kv6Record::new(Kv6RecordType::OnPath);
        record.presence = FieldSet::EMPTY;
        assert_eq!(min_max_timestamps(&[record]), (0, 0));
    }
}
