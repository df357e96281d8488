//! Joins a KV6 Parquet batch with KV1 timetable data.
//!
//! For every row, the cumulative distance from the start of its journey is
//! derived from the journey pattern's ordered timing links and the `LINK`
//! distances, and local-calendar columns (ISO day of week, local date,
//! seconds since local midnight in Europe/Amsterdam) are added for the
//! record timestamp.

use crate::kv1::types::{Kv1JourneyPatternKey, Kv1LinkKey, Kv1Records};
use crate::kv1::Kv1Index;
use crate::time::{local_calendar, AMSTERDAM};
use ahash::{AHashMap, AHashSet};
use arrow::array::{
    Array, ArrayRef, Date32Builder, Int64Builder, StringArray, Time32SecondBuilder,
    TimestampSecondArray, UInt32Array, UInt32Builder,
};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AugmentError {
    #[error("arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("unexpected input schema: {0}")]
    Schema(String),
    #[error("write: {0}")]
    Write(#[from] crate::kv6::parquet::WriteError),
}

/// The identity of a journey as KV6 sees it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BasicJourneyKey {
    pub data_owner_code: String,
    pub line_planning_number: String,
    pub journey_number: u32,
}

/// `(journey, user stop the vehicle last passed)` -> distance in meters from
/// the start of the journey to that stop.
pub type DistanceMap = AHashMap<(BasicJourneyKey, String), f64>;

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, AugmentError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref())
        .ok_or_else(|| AugmentError::Schema(format!("column {name} missing or not utf8")))
}

fn u32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, AugmentError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref())
        .ok_or_else(|| AugmentError::Schema(format!("column {name} missing or not uint32")))
}

fn timestamp_col(batch: &RecordBatch) -> Result<&TimestampSecondArray, AugmentError> {
    let column = batch
        .column_by_name("timestamp")
        .ok_or_else(|| AugmentError::Schema("column timestamp missing".to_string()))?;
    if *column.data_type() != DataType::Timestamp(TimeUnit::Second, None) {
        return Err(AugmentError::Schema(format!(
            "column timestamp has type {}, expected second-resolution naive timestamp",
            column.data_type()
        )));
    }
    column
        .as_any()
        .downcast_ref()
        .ok_or_else(|| AugmentError::Schema("column timestamp failed to downcast".to_string()))
}

/// The distinct `(data_owner_code, line_planning_number, journey_number)`
/// triples present in a batch. Rows with nulls in the triple are skipped.
pub fn basic_journeys(batch: &RecordBatch) -> Result<AHashSet<BasicJourneyKey>, AugmentError> {
    let data_owner_codes = string_col(batch, "data_owner_code")?;
    let line_planning_numbers = string_col(batch, "line_planning_number")?;
    let journey_numbers = u32_col(batch, "journey_number")?;

    let mut journeys = AHashSet::new();
    for i in 0..batch.num_rows() {
        if data_owner_codes.is_null(i)
            || line_planning_numbers.is_null(i)
            || journey_numbers.is_null(i)
        {
            continue;
        }
        journeys.insert(BasicJourneyKey {
            data_owner_code: data_owner_codes.value(i).to_string(),
            line_planning_number: line_planning_numbers.value(i).to_string(),
            journey_number: journey_numbers.value(i),
        });
    }
    Ok(journeys)
}

/// Walks each requested journey's pattern in timing-link order, accumulating
/// `LINK` distances, and returns the distance from journey start to every
/// stop at which a link of the pattern begins.
///
/// `records` must already be linked: the transport type for `LINK` lookup
/// comes from each journey pattern's line.
pub fn make_distance_map(
    records: &Kv1Records,
    index: &Kv1Index,
    journeys: &AHashSet<BasicJourneyKey>,
) -> DistanceMap {
    let mut journey_index: AHashMap<&BasicJourneyKey, usize> = AHashMap::new();
    let mut jopatili_index: AHashMap<Kv1JourneyPatternKey, Vec<(usize, f64)>> = AHashMap::new();

    for (i, pujo) in records.public_journeys.iter().enumerate() {
        let journey = BasicJourneyKey {
            data_owner_code: pujo.key.data_owner_code.to_string(),
            line_planning_number: pujo.key.line_planning_number.to_string(),
            journey_number: pujo.key.journey_number as u32,
        };
        if let Some(key) = journeys.get(&journey) {
            journey_index.insert(key, i);
            jopatili_index.insert(
                Kv1JourneyPatternKey {
                    data_owner_code: pujo.key.data_owner_code.clone(),
                    line_planning_number: pujo.key.line_planning_number.clone(),
                    journey_pattern_code: pujo.journey_pattern_code.clone(),
                },
                Vec::new(),
            );
        }
    }

    for (i, jopatili) in records.journey_pattern_timing_links.iter().enumerate() {
        let jopa_key = Kv1JourneyPatternKey {
            data_owner_code: jopatili.key.data_owner_code.clone(),
            line_planning_number: jopatili.key.line_planning_number.clone(),
            journey_pattern_code: jopatili.key.journey_pattern_code.clone(),
        };
        if let Some(timing_links) = jopatili_index.get_mut(&jopa_key) {
            timing_links.push((i, 0.0));
        }
    }

    for (jopa_key, timing_links) in &mut jopatili_index {
        timing_links.sort_by_key(|&(i, _)| {
            records.journey_pattern_timing_links[i].key.timing_link_order
        });

        let transport_type = index
            .journey_patterns
            .get(jopa_key)
            .and_then(|&i| records.journey_patterns[i].line)
            .map(|i| records.lines[i].transport_type.clone());
        let Some(transport_type) = transport_type else {
            log::warn!(
                "no line found for journey pattern {}/{}; distances unavailable",
                jopa_key.line_planning_number,
                jopa_key.journey_pattern_code
            );
            continue;
        };

        for i in 1..timing_links.len() {
            let prev = &records.journey_pattern_timing_links[timing_links[i - 1].0];
            let link_distance = index
                .links
                .get(&Kv1LinkKey {
                    data_owner_code: prev.key.data_owner_code.clone(),
                    user_stop_code_begin: prev.user_stop_code_begin.clone(),
                    user_stop_code_end: prev.user_stop_code_end.clone(),
                    transport_type: transport_type.clone(),
                })
                .map(|&l| records.links[l].distance)
                .unwrap_or_else(|| {
                    log::warn!(
                        "no link {} -> {} ({transport_type}); counting zero distance",
                        prev.user_stop_code_begin,
                        prev.user_stop_code_end
                    );
                    0.0
                });
            timing_links[i].1 = timing_links[i - 1].1 + link_distance;
        }
    }

    let mut distances = DistanceMap::default();
    for journey in journeys {
        let Some(&pujo_idx) = journey_index.get(journey) else {
            log::warn!(
                "no public journey found for [{}] {}/{}",
                journey.data_owner_code,
                journey.line_planning_number,
                journey.journey_number
            );
            continue;
        };
        let pujo = &records.public_journeys[pujo_idx];
        let jopa_key = Kv1JourneyPatternKey {
            data_owner_code: pujo.key.data_owner_code.clone(),
            line_planning_number: pujo.key.line_planning_number.clone(),
            journey_pattern_code: pujo.journey_pattern_code.clone(),
        };
        for &(jopatili_idx, distance) in &jopatili_index[&jopa_key] {
            let begin = &records.journey_pattern_timing_links[jopatili_idx].user_stop_code_begin;
            distances.insert((journey.clone(), begin.to_string()), distance);
        }
    }
    distances
}

/// Appends the four augmented columns to a KV6 batch.
pub fn augment_batch(
    batch: &RecordBatch,
    distances: &DistanceMap,
) -> Result<RecordBatch, AugmentError> {
    let data_owner_codes = string_col(batch, "data_owner_code")?;
    let line_planning_numbers = string_col(batch, "line_planning_number")?;
    let journey_numbers = u32_col(batch, "journey_number")?;
    let user_stop_codes = string_col(batch, "user_stop_code")?;
    let distance_since_last_user_stops = u32_col(batch, "distance_since_last_user_stop")?;
    let timestamps = timestamp_col(batch)?;

    let mut distance_builder = UInt32Builder::new();
    let mut day_of_week_builder = Int64Builder::new();
    let mut date_builder = Date32Builder::new();
    let mut local_time_builder = Time32SecondBuilder::new();

    for i in 0..batch.num_rows() {
        let journey_known = !data_owner_codes.is_null(i)
            && !line_planning_numbers.is_null(i)
            && !journey_numbers.is_null(i)
            && !user_stop_codes.is_null(i);
        let start_distance = if journey_known {
            let key = (
                BasicJourneyKey {
                    data_owner_code: data_owner_codes.value(i).to_string(),
                    line_planning_number: line_planning_numbers.value(i).to_string(),
                    journey_number: journey_numbers.value(i),
                },
                user_stop_codes.value(i).to_string(),
            );
            distances.get(&key).copied()
        } else {
            None
        };
        match start_distance {
            Some(distance) => {
                let since_stop = if distance_since_last_user_stops.is_null(i) {
                    0
                } else {
                    distance_since_last_user_stops.value(i)
                };
                distance_builder.append_value(since_stop + distance as u32);
            }
            None => distance_builder.append_null(),
        }

        let cal = if timestamps.is_null(i) {
            None
        } else {
            local_calendar(timestamps.value(i), AMSTERDAM)
        };
        match cal {
            Some(cal) => {
                day_of_week_builder.append_value(cal.iso_day_of_week);
                date_builder.append_value(cal.unix_days);
                local_time_builder.append_value(cal.seconds_since_midnight);
            }
            None => {
                day_of_week_builder.append_null();
                date_builder.append_null();
                local_time_builder.append_null();
            }
        }
    }

    let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
    fields.push(Arc::new(Field::new(
        "distance_since_start_of_journey",
        DataType::UInt32,
        true,
    )));
    fields.push(Arc::new(Field::new(
        "timestamp_iso_day_of_week",
        DataType::Int64,
        true,
    )));
    fields.push(Arc::new(Field::new("timestamp_date", DataType::Date32, true)));
    fields.push(Arc::new(Field::new(
        "timestamp_local_time",
        DataType::Time32(TimeUnit::Second),
        true,
    )));

    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    columns.push(Arc::new(distance_builder.finish()));
    columns.push(Arc::new(day_of_week_builder.finish()));
    columns.push(Arc::new(date_builder.finish()));
    columns.push(Arc::new(local_time_builder.finish()));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Reads a whole Parquet file into one batch.
pub fn read_parquet(path: &Path) -> Result<RecordBatch, AugmentError> {
    let file = fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    let schema = match batches.first() {
        Some(batch) => batch.schema(),
        None => crate::kv6::parquet::schema(),
    };
    Ok(concat_batches(&schema, &batches)?)
}

/// The full augmentation pass: read a KV6 file, join against the linked KV1
/// records, write the augmented file.
pub fn augment_file(
    input: &Path,
    output: &Path,
    records: &Kv1Records,
    index: &Kv1Index,
) -> Result<(), AugmentError> {
    let batch = read_parquet(input)?;
    log::info!("input file has {} rows", batch.num_rows());

    let journeys = basic_journeys(&batch)?;
    log::info!("found {} distinct journeys", journeys.len());
    let distances = make_distance_map(records, index, &journeys);
    log::info!("distance map has {} keys", distances.len());

    let augmented = augment_batch(&batch, &distances)?;
    crate::kv6::parquet::write_batch(&augmented, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv1::{link_records, testutil, Kv1Index};
    use crate::kv6::model::{Kv6Field, Kv6Record, Kv6RecordType};
    use crate::kv6::parquet::records_to_batch;
    use crate::time::{Date, Timestamp};
    use arrow::array::{Date32Array, Int64Array, Time32SecondArray};

    fn on_route(stop: &str, distance_since_last_user_stop: u32) -> Kv6Record {
        let mut record = Kv6Record::new(Kv6RecordType::OnRoute);
        record.data_owner_code = "CXX".into();
        record.line_planning_number = "M300".into();
        record.operating_day = Date { year: 2024, month: 6, day: 1 };
        record.journey_number = 2045;
        record.reinforcement_number = 0;
        record.user_stop_code = stop.into();
        record.passage_sequence_number = 0;
        record.timestamp = Timestamp::parse("2024-06-01T12:00:00Z").unwrap();
        record.source = "VEHICLE".into();
        record.vehicle_number = 8401;
        record.punctuality = 0;
        record.rd_x = 137500;
        record.rd_y = 455400;
        record.distance_since_last_user_stop = distance_since_last_user_stop;
        record.presence = Kv6RecordType::OnRoute
            .required_fields()
            .with(Kv6Field::DistanceSinceLastUserStop);
        record
    }

    fn linked_fixture() -> (crate::kv1::Kv1Records, Kv1Index) {
        let mut records = testutil::fixture();
        let index = Kv1Index::build(&records);
        link_records(&mut records, &index);
        (records, index)
    }

    #[test]
    fn distance_accumulates_over_links() {
        let (records, index) = linked_fixture();
        let batch = records_to_batch(&[on_route("10002", 100)]).unwrap();
        let journeys = basic_journeys(&batch).unwrap();
        assert_eq!(journeys.len(), 1);

        let distances = make_distance_map(&records, &index, &journeys);
        // Stop 10001 starts the journey; stop 10002 sits one 500 m link in.
        let journey = journeys.iter().next().unwrap().clone();
        assert_eq!(distances[&(journey.clone(), "10001".to_string())], 0.0);
        assert_eq!(distances[&(journey.clone(), "10002".to_string())], 500.0);

        let augmented = augment_batch(&batch, &distances).unwrap();
        let distance_col = augmented
            .column_by_name("distance_since_start_of_journey")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(distance_col.value(0), 600);
    }

    #[test]
    fn unknown_journey_gets_null_distance() {
        let (records, index) = linked_fixture();
        let mut stray = on_route("10002", 100);
        stray.journey_number = 9999;
        let batch = records_to_batch(&[stray]).unwrap();
        let journeys = basic_journeys(&batch).unwrap();
        let distances = make_distance_map(&records, &index, &journeys);
        assert!(distances.is_empty());

        let augmented = augment_batch(&batch, &distances).unwrap();
        let distance_col = augmented
            .column_by_name("distance_since_start_of_journey")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert!(distance_col.is_null(0));
    }

    #[test]
    fn calendar_columns_are_amsterdam_local() {
        let (records, index) = linked_fixture();
        let batch = records_to_batch(&[on_route("10002", 0)]).unwrap();
        let journeys = basic_journeys(&batch).unwrap();
        let distances = make_distance_map(&records, &index, &journeys);
        let augmented = augment_batch(&batch, &distances).unwrap();

        // 2024-06-01T12:00:00Z is 14:00 CEST on a Saturday.
        let dow = augmented
            .column_by_name("timestamp_iso_day_of_week")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(dow.value(0), 6);
        let date = augmented
            .column_by_name("timestamp_date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(
            date.value(0),
            Date { year: 2024, month: 6, day: 1 }.to_unix_days().unwrap()
        );
        let local_time = augmented
            .column_by_name("timestamp_local_time")
            .unwrap()
            .as_any()
            .downcast_ref::<Time32SecondArray>()
            .unwrap();
        assert_eq!(local_time.value(0), 14 * 3600);
    }

    #[test]
    fn augment_file_roundtrip() {
        let (records, index) = linked_fixture();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("oeuf-input.parquet");
        let output = dir.path().join("oeuf-augmented.parquet");

        let batch = records_to_batch(&[on_route("10002", 100), on_route("10001", 50)]).unwrap();
        crate::kv6::parquet::write_batch(&batch, &input).unwrap();

        augment_file(&input, &output, &records, &index).unwrap();
        let augmented = read_parquet(&output).unwrap();
        assert_eq!(augmented.num_rows(), 2);
        let distance_col = augmented
            .column_by_name("distance_since_start_of_journey")
            .unwrap()
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(distance_col.value(0), 600);
        // 50 m past the first stop of the journey.
        assert_eq!(distance_col.value(1), 50);
    }
}
