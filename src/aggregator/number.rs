//! Per-metric accumulators

use std::cmp::Ordering;

use crate::row::Value;

/// Numeric metric value; stays integral until a double is seen or a sum
/// overflows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Long(i64),
    Double(f64),
}

impl Number {
    /// Numeric view of a row value; numeric strings are accepted
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Long(v) => Some(Number::Long(*v)),
            Value::Double(v) => Some(Number::Double(*v)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Number::Long)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(Number::Double))
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Long(v) => *v as f64,
            Number::Double(v) => *v,
        }
    }

    fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Long(a), Number::Long(b)) => a
                .checked_add(b)
                .map(Number::Long)
                .unwrap_or(Number::Double(a as f64 + b as f64)),
            (a, b) => Number::Double(a.as_f64() + b.as_f64()),
        }
    }

    fn compare(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Long(a), Number::Long(b)) => a.cmp(b),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Long(v) => Value::Long(v),
            Number::Double(v) => Value::Double(v),
        }
    }
}

/// Running reduction of one metric within one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberAggregator {
    Sum(Option<Number>),
    Min(Option<Number>),
    Max(Option<Number>),
    /// Number of non-null values seen
    Count(i64),
}

impl NumberAggregator {
    /// Fold a value in. Returns `false`, leaving the accumulator untouched,
    /// when the value has the wrong type for this reduction.
    pub fn update(&mut self, value: &Value) -> bool {
        if let NumberAggregator::Count(n) = self {
            *n += 1;
            return true;
        }

        let Some(number) = Number::from_value(value) else {
            return false;
        };
        match self {
            NumberAggregator::Sum(acc) => {
                *acc = Some(acc.map_or(number, |a| a.add(number)));
            }
            NumberAggregator::Min(acc) => {
                if acc.map_or(true, |a| number.compare(&a) == Ordering::Less) {
                    *acc = Some(number);
                }
            }
            NumberAggregator::Max(acc) => {
                if acc.map_or(true, |a| number.compare(&a) == Ordering::Greater) {
                    *acc = Some(number);
                }
            }
            NumberAggregator::Count(_) => {}
        }
        true
    }

    /// Accumulated value; `Null` when nothing was folded in
    pub fn value(&self) -> Value {
        match self {
            NumberAggregator::Sum(acc) | NumberAggregator::Min(acc) | NumberAggregator::Max(acc) => {
                acc.map(Value::from).unwrap_or(Value::Null)
            }
            NumberAggregator::Count(n) => Value::Long(*n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(mut agg: NumberAggregator, values: &[Value]) -> NumberAggregator {
        for v in values {
            agg.update(v);
        }
        agg
    }

    #[test]
    fn test_sum_stays_integral() {
        let agg = fold(NumberAggregator::Sum(None), &[Value::Long(5), Value::from("7")]);
        assert_eq!(agg.value(), Value::Long(12));

        let agg = fold(NumberAggregator::Sum(None), &[Value::Long(1), Value::Double(0.5)]);
        assert_eq!(agg.value(), Value::Double(1.5));
    }

    #[test]
    fn test_sum_overflow_widens() {
        let agg = fold(NumberAggregator::Sum(None), &[Value::Long(i64::MAX), Value::Long(1)]);
        assert!(matches!(agg.value(), Value::Double(_)));
    }

    #[test]
    fn test_min_max() {
        let values = [Value::Long(3), Value::Double(-1.5), Value::Long(10)];
        assert_eq!(fold(NumberAggregator::Min(None), &values).value(), Value::Double(-1.5));
        assert_eq!(fold(NumberAggregator::Max(None), &values).value(), Value::Long(10));
        assert_eq!(NumberAggregator::Max(None).value(), Value::Null);
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut agg = NumberAggregator::Sum(None);
        assert!(agg.update(&Value::Long(2)));
        assert!(!agg.update(&Value::from("not a number")));
        assert!(!agg.update(&Value::Bool(true)));
        assert_eq!(agg.value(), Value::Long(2));

        let mut count = NumberAggregator::Count(0);
        assert!(count.update(&Value::from("anything")));
        assert_eq!(count.value(), Value::Long(1));
    }
}
