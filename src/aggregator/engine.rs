//! Streaming aggregation engine
//!
//! Rows are folded into per-key accumulators held in a sharded concurrent
//! map. Each key is `(floored timestamp, dimension tuple)`.
//!
//! # Flush Semantics
//!
//! ```text
//! producers ──aggregate()──▶ DashMap<key, accumulators> ──get_rows()──▶ rows
//!                              (entry lock per row)       (remove per key)
//! ```
//!
//! A row updates all of its metrics while holding the key's entry, and a
//! flush removes each key under the same shard lock. Every update therefore
//! lands in exactly one flush: either in the entry that was removed, or in a
//! fresh entry created after the removal.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{AggregatorError, AggregatorResult};
use super::number::NumberAggregator;
use super::schema::MetricSchema;
use crate::row::{InputRow, Value};

/// `(floored timestamp, dimension values in schema order)`
type AggregationKey = (i64, Vec<Option<String>>);

/// One flushed bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    /// Bucket start, in the unit of the input timestamps
    pub timestamp: i64,
    /// Timestamp, dimension and metric columns by name
    pub columns: HashMap<String, Value>,
}

impl AggregatedRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }
}

impl InputRow for AggregatedRow {
    fn get_column(&self, name: &str) -> Option<&Value> {
        self.columns.get(name)
    }
}

/// Concurrent time-bucketed aggregator
#[derive(Debug)]
pub struct StreamingAggregator {
    schema: MetricSchema,
    granularity_ms: i64,
    /// Physical metrics with a fresh accumulator each
    templates: Vec<(String, NumberAggregator)>,
    buckets: DashMap<AggregationKey, Vec<NumberAggregator>>,
    skipped_fields: AtomicU64,
}

impl StreamingAggregator {
    /// Create an aggregator flooring timestamps to `granularity_ms`
    ///
    /// The granularity must use the same unit as the row timestamps.
    pub fn new(schema: MetricSchema, granularity_ms: i64) -> AggregatorResult<Self> {
        if granularity_ms <= 0 {
            return Err(AggregatorError::InvalidGranularity(granularity_ms));
        }
        let templates = schema.physical_metrics();
        Ok(Self {
            schema,
            granularity_ms,
            templates,
            buckets: DashMap::new(),
            skipped_fields: AtomicU64::new(0),
        })
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn granularity_ms(&self) -> i64 {
        self.granularity_ms
    }

    /// Number of buckets waiting for the next flush
    pub fn pending_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Metric values skipped for having the wrong type, since creation
    pub fn skipped_fields(&self) -> u64 {
        self.skipped_fields.load(Ordering::Relaxed)
    }

    /// Fold one row into its bucket
    ///
    /// Absent or null metric values contribute nothing. A value of the wrong
    /// type is skipped for that metric only; the rest of the row is kept.
    pub fn aggregate<R: InputRow + ?Sized>(&self, row: &R) -> AggregatorResult<()> {
        let timestamp = row
            .get_column(&self.schema.timestamp_column)
            .and_then(|v| {
                v.as_i64()
                    .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            })
            .ok_or_else(|| AggregatorError::MissingTimestamp {
                column: self.schema.timestamp_column.clone(),
            })?;
        let floored = timestamp
            .div_euclid(self.granularity_ms)
            .checked_mul(self.granularity_ms)
            .ok_or(AggregatorError::TimestampOutOfRange(timestamp))?;

        let dimensions: Vec<Option<String>> = self
            .schema
            .dimensions
            .iter()
            .map(|d| row.get_column(d).and_then(Value::to_dimension))
            .collect();

        let values: Vec<Option<&Value>> = self
            .templates
            .iter()
            .map(|(name, _)| row.get_column(name).filter(|v| !v.is_null()))
            .collect();

        let mut rejected = Vec::new();
        {
            let mut entry = self
                .buckets
                .entry((floored, dimensions))
                .or_insert_with(|| self.templates.iter().map(|(_, agg)| *agg).collect());

            for (i, (acc, value)) in entry.iter_mut().zip(&values).enumerate() {
                if let Some(value) = value {
                    if !acc.update(value) {
                        rejected.push(i);
                    }
                }
            }
        }

        for i in rejected {
            self.skipped_fields.fetch_add(1, Ordering::Relaxed);
            if let (Some((name, _)), Some(Some(value))) = (self.templates.get(i), values.get(i)) {
                warn!(
                    metric = %name,
                    value_type = value.type_name(),
                    timestamp,
                    "Skipping metric value with unexpected type"
                );
            }
        }
        Ok(())
    }

    /// Drain every bucket into output rows, ordered by timestamp then
    /// dimensions
    ///
    /// Rows that arrive during the drain land either in this flush or the
    /// next one, never both.
    pub fn get_rows(&self) -> Vec<AggregatedRow> {
        let keys: Vec<AggregationKey> = self.buckets.iter().map(|e| e.key().clone()).collect();

        let mut drained: Vec<(AggregationKey, Vec<NumberAggregator>)> =
            keys.into_iter().filter_map(|k| self.buckets.remove(&k)).collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));

        debug!(rows = drained.len(), "Flushed aggregation buckets");

        drained
            .into_iter()
            .map(|(key, accumulators)| self.to_row(key, accumulators))
            .collect()
    }

    fn to_row(&self, key: AggregationKey, accumulators: Vec<NumberAggregator>) -> AggregatedRow {
        let (timestamp, dimensions) = key;
        let mut columns = HashMap::with_capacity(1 + dimensions.len() + accumulators.len());
        columns.insert(self.schema.timestamp_column.clone(), Value::Long(timestamp));
        for (name, value) in self.schema.dimensions.iter().zip(dimensions) {
            columns.insert(name.clone(), value.map(Value::String).unwrap_or(Value::Null));
        }
        for ((name, _), acc) in self.templates.iter().zip(&accumulators) {
            columns.insert(name.clone(), acc.value());
        }
        AggregatedRow { timestamp, columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::MetricKind;
    use crate::filter::compile_filter;
    use crate::row::row_of;
    use std::sync::atomic::AtomicBool;

    fn schema() -> MetricSchema {
        MetricSchema::new("ts")
            .with_dimension("host")
            .with_metric("val", MetricKind::Sum)
            .with_metric("hits", MetricKind::Count)
            .with_metric("ratio", MetricKind::PostAggregation)
    }

    #[test]
    fn test_invalid_granularity() {
        assert_eq!(
            StreamingAggregator::new(schema(), 0).unwrap_err(),
            AggregatorError::InvalidGranularity(0)
        );
        assert!(StreamingAggregator::new(schema(), -10).is_err());
    }

    #[test]
    fn test_rows_in_same_bucket_are_summed() {
        let agg = StreamingAggregator::new(schema(), 10_000).unwrap();
        agg.aggregate(&row_of([("ts", Value::Long(1000)), ("host", "A".into()), ("val", Value::Long(5))]))
            .unwrap();
        agg.aggregate(&row_of([("ts", Value::Long(9000)), ("host", "A".into()), ("val", Value::Long(7))]))
            .unwrap();

        let rows = agg.get_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, 0);
        assert_eq!(rows[0].get("host"), Some(&Value::from("A")));
        assert_eq!(rows[0].get("val"), Some(&Value::Long(12)));
        assert_eq!(rows[0].get("hits"), Some(&Value::Long(2)));
        assert_eq!(rows[0].get("ratio"), None);
    }

    #[test]
    fn test_flush_drains_everything() {
        let agg = StreamingAggregator::new(schema(), 10_000).unwrap();
        for ts in [1_000, 2_000, 11_000, 12_000] {
            for host in ["A", "B"] {
                agg.aggregate(&row_of([
                    ("ts", Value::Long(ts)),
                    ("host", host.into()),
                    ("val", Value::Long(1)),
                ]))
                .unwrap();
            }
        }

        let rows = agg.get_rows();
        assert_eq!(rows.len(), 4);
        let order: Vec<(i64, Option<&Value>)> = rows.iter().map(|r| (r.timestamp, r.get("host"))).collect();
        assert_eq!(order[0], (0, Some(&Value::from("A"))));
        assert_eq!(order[3], (10_000, Some(&Value::from("B"))));
        assert!(rows.iter().all(|r| r.get("val") == Some(&Value::Long(2))));

        assert!(agg.get_rows().is_empty());
        assert_eq!(agg.pending_buckets(), 0);
    }

    #[test]
    fn test_negative_timestamps_floor_down() {
        let agg = StreamingAggregator::new(schema(), 1000).unwrap();
        agg.aggregate(&row_of([("ts", Value::Long(-1))])).unwrap();
        let rows = agg.get_rows();
        assert_eq!(rows[0].timestamp, -1000);
        assert_eq!(rows[0].get("host"), Some(&Value::Null));
        assert_eq!(rows[0].get("val"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_timestamp() {
        let agg = StreamingAggregator::new(schema(), 1000).unwrap();
        let err = agg.aggregate(&row_of([("val", Value::Long(1))])).unwrap_err();
        assert_eq!(
            err,
            AggregatorError::MissingTimestamp {
                column: "ts".to_string()
            }
        );
        assert_eq!(agg.pending_buckets(), 0);
    }

    #[test]
    fn test_unusable_timestamps_are_rejected() {
        let agg = StreamingAggregator::new(schema(), 1000).unwrap();
        let err = agg
            .aggregate(&row_of([("ts", Value::Long(i64::MIN)), ("val", Value::Long(1))]))
            .unwrap_err();
        assert_eq!(err, AggregatorError::TimestampOutOfRange(i64::MIN));

        for ts in [f64::NAN, f64::INFINITY] {
            let err = agg.aggregate(&row_of([("ts", Value::Double(ts))])).unwrap_err();
            assert!(matches!(err, AggregatorError::MissingTimestamp { .. }), "{}", ts);
        }
        assert_eq!(agg.pending_buckets(), 0);

        agg.aggregate(&row_of([("ts", Value::Double(1500.7))])).unwrap();
        assert_eq!(agg.get_rows()[0].timestamp, 1000);
    }

    #[test]
    fn test_equal_map_dimensions_share_a_bucket() {
        let schema = MetricSchema::new("ts")
            .with_dimension("tags")
            .with_metric("hits", MetricKind::Count);
        let agg = StreamingAggregator::new(schema, 1000).unwrap();

        for _ in 0..20 {
            let tags: HashMap<String, Value> = ["env", "region", "host", "service", "version", "zone"]
                .iter()
                .map(|k| (k.to_string(), Value::from(format!("{}-1", k))))
                .collect();
            agg.aggregate(&row_of([
                ("ts", Value::Long(10)),
                ("tags", Value::Map(tags)),
                ("hits", Value::Long(1)),
            ]))
            .unwrap();
        }

        let rows = agg.get_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("hits"), Some(&Value::Long(20)));
    }

    #[test]
    fn test_type_mismatch_skips_only_that_field() {
        let agg = StreamingAggregator::new(schema(), 1000).unwrap();
        agg.aggregate(&row_of([
            ("ts", Value::Long(0)),
            ("val", Value::from("oops")),
            ("hits", Value::Long(1)),
        ]))
        .unwrap();
        agg.aggregate(&row_of([("ts", Value::Long(1)), ("val", Value::Long(3))]))
            .unwrap();

        let rows = agg.get_rows();
        assert_eq!(rows[0].get("val"), Some(&Value::Long(3)));
        assert_eq!(rows[0].get("hits"), Some(&Value::Long(1)));
        assert_eq!(agg.skipped_fields(), 1);
    }

    #[test]
    fn test_output_rows_can_be_filtered() {
        let agg = StreamingAggregator::new(schema(), 1000).unwrap();
        for (host, val) in [("A", 1), ("B", 50)] {
            agg.aggregate(&row_of([("ts", Value::Long(0)), ("host", host.into()), ("val", Value::Long(val))]))
                .unwrap();
        }
        let heavy = compile_filter("val > 10").unwrap();
        let kept: Vec<AggregatedRow> = agg.get_rows().into_iter().filter(|r| heavy.evaluate(r)).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].get("host"), Some(&Value::from("B")));
    }

    #[test]
    fn test_concurrent_flushes_lose_nothing() {
        const PRODUCERS: i64 = 4;
        const ROWS: i64 = 5_000;

        let agg = StreamingAggregator::new(schema(), 100).unwrap();
        let done = AtomicBool::new(false);
        let mut flushed = Vec::new();

        std::thread::scope(|s| {
            let producers: Vec<_> = (0..PRODUCERS)
                .map(|p| {
                    let agg = &agg;
                    s.spawn(move || {
                        for i in 0..ROWS {
                            let host = if i % 2 == 0 { "A" } else { "B" };
                            agg.aggregate(&row_of([
                                ("ts", Value::Long(i % 300)),
                                ("host", host.into()),
                                ("val", Value::Long(p + 1)),
                            ]))
                            .unwrap();
                        }
                    })
                })
                .collect();

            let consumer = s.spawn(|| {
                let mut rows = Vec::new();
                while !done.load(Ordering::Acquire) {
                    rows.extend(agg.get_rows());
                    std::thread::yield_now();
                }
                rows
            });

            for producer in producers {
                producer.join().unwrap();
            }
            done.store(true, Ordering::Release);
            flushed.extend(consumer.join().unwrap());
        });
        flushed.extend(agg.get_rows());

        let hits: i64 = flushed.iter().filter_map(|r| r.get("hits")?.as_i64()).sum();
        let total: i64 = flushed.iter().filter_map(|r| r.get("val")?.as_i64()).sum();
        assert_eq!(hits, PRODUCERS * ROWS);
        assert_eq!(total, (1..=PRODUCERS).sum::<i64>() * ROWS);
    }
}
