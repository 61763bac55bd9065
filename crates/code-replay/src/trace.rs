//! Recorded traces.
//!
//! A trace is an ordered list of `[delta, action]` pairs, where `delta` is the time (in
//! milliseconds) elapsed since the previous entry. The delta encoding keeps serialized traces
//! small; on load the deltas are summed once into cumulative times so that replay can compare
//! entries against the playback position directly.

use crate::error::TraceError;
use serde::de::{self, DeserializeOwned};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One trace entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry<A> {
    /// Time elapsed since the previous entry (or since capture start for the first one).
    pub delta: f64,
    /// The recorded action.
    pub action: A,
}

/// An immutable, validated, delta-encoded trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace<A> {
    entries: Vec<TraceEntry<A>>,
    /// Cumulative time of each entry (prefix sums of the deltas).
    times: Vec<f64>,
}

impl<A> Trace<A> {
    /// Build a trace from `(delta, action)` pairs.
    ///
    /// Every delta must be finite and non-negative, which makes the cumulative times
    /// non-decreasing.
    pub fn new(pairs: Vec<(f64, A)>) -> Result<Self, TraceError> {
        let mut entries = Vec::with_capacity(pairs.len());
        let mut times = Vec::with_capacity(pairs.len());
        let mut total = 0.0;

        for (index, (delta, action)) in pairs.into_iter().enumerate() {
            if !delta.is_finite() || delta < 0.0 {
                return Err(TraceError::InvalidDelta { index, delta });
            }
            total += delta;
            times.push(total);
            entries.push(TraceEntry { delta, action });
        }

        Ok(Self { entries, times })
    }

    /// An empty trace.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            times: Vec::new(),
        }
    }

    /// Delta-encode absolute `(time, action)` pairs, rounding each delta to `precision`
    /// decimal digits.
    ///
    /// Absolute times are expected to be non-decreasing; a backwards step is encoded as a
    /// zero delta.
    pub fn from_absolute(absolute: Vec<(f64, A)>, precision: u32) -> Self {
        let mut pairs = Vec::with_capacity(absolute.len());
        let mut previous = 0.0;
        for (time, action) in absolute {
            let delta = round_to(time - previous, precision).max(0.0);
            previous = time;
            pairs.push((delta, action));
        }

        let mut times = Vec::with_capacity(pairs.len());
        let mut total = 0.0;
        let entries = pairs
            .into_iter()
            .map(|(delta, action)| {
                total += delta;
                times.push(total);
                TraceEntry { delta, action }
            })
            .collect();
        Self { entries, times }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the trace has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in order.
    pub fn entries(&self) -> &[TraceEntry<A>] {
        &self.entries
    }

    /// The action of entry `index`.
    pub fn action(&self, index: usize) -> Option<&A> {
        self.entries.get(index).map(|e| &e.action)
    }

    /// Cumulative time of entry `index`.
    pub fn time(&self, index: usize) -> Option<f64> {
        self.times.get(index).copied()
    }

    /// Cumulative times of all entries.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Time of the last entry, or `None` for an empty trace.
    pub fn duration(&self) -> Option<f64> {
        self.times.last().copied()
    }

    /// Number of entries whose cumulative time is `<= progress`.
    pub fn count_at(&self, progress: f64) -> usize {
        self.times.partition_point(|&t| t <= progress)
    }

    /// Iterate over `(cumulative_time, action)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &A)> {
        self.times
            .iter()
            .copied()
            .zip(self.entries.iter().map(|e| &e.action))
    }

    /// Consume the trace, returning its `(delta, action)` pairs.
    pub fn into_pairs(self) -> Vec<(f64, A)> {
        self.entries
            .into_iter()
            .map(|e| (e.delta, e.action))
            .collect()
    }
}

impl<A: DeserializeOwned> Trace<A> {
    /// Parse a trace from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let pairs: Vec<(f64, A)> = serde_json::from_str(json)?;
        Self::new(pairs)
    }
}

impl<A: Serialize> Trace<A> {
    /// Serialize the trace to its compact JSON form.
    pub fn to_json(&self) -> Result<String, TraceError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<A> Default for Trace<A> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<A: Serialize> Serialize for Trace<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(&(entry.delta, &entry.action))?;
        }
        seq.end()
    }
}

impl<'de, A: Deserialize<'de>> Deserialize<'de> for Trace<A> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pairs = Vec::<(f64, A)>::deserialize(deserializer)?;
        Trace::new(pairs).map_err(de::Error::custom)
    }
}

pub(crate) fn round_to(value: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_times() {
        let trace = Trace::new(vec![(0.0, 'a'), (100.0, 'b'), (50.5, 'c')]).unwrap();
        assert_eq!(trace.times(), &[0.0, 100.0, 150.5]);
        assert_eq!(trace.duration(), Some(150.5));
        assert_eq!(trace.count_at(99.9), 1);
        assert_eq!(trace.count_at(100.0), 2);
        assert_eq!(trace.count_at(-1.0), 0);
    }

    #[test]
    fn test_empty_trace_has_no_duration() {
        let trace: Trace<char> = Trace::empty();
        assert!(trace.is_empty());
        assert_eq!(trace.duration(), None);
    }

    #[test]
    fn test_negative_delta_rejected() {
        let err = Trace::new(vec![(0.0, 'a'), (-3.0, 'b')]).unwrap_err();
        assert!(matches!(err, TraceError::InvalidDelta { index: 1, .. }));

        let err = Trace::new(vec![(f64::NAN, 'a')]).unwrap_err();
        assert!(matches!(err, TraceError::InvalidDelta { index: 0, .. }));
    }

    #[test]
    fn test_from_absolute_rounds_deltas() {
        let trace = Trace::from_absolute(vec![(10.004, 'a'), (20.3333, 'b'), (20.3333, 'c')], 2);
        let deltas: Vec<f64> = trace.entries().iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![10.0, 10.33, 0.0]);
    }

    #[test]
    fn test_json_round_trip_shape() {
        let trace: Trace<String> = Trace::from_json(r#"[[0,"a"],[12.5,"b"]]"#).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.to_json().unwrap(), r#"[[0.0,"a"],[12.5,"b"]]"#);
    }

    #[test]
    fn test_json_rejects_negative_delta() {
        let err = Trace::<String>::from_json(r#"[[0,"a"],[-1,"b"]]"#).unwrap_err();
        assert!(matches!(err, TraceError::InvalidDelta { index: 1, .. }));
    }
}
