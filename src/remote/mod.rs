//! Remote-read wire messages
//!
//! Protobuf messages (hand-declared with `prost`, no build script) that also
//! serialize to JSON with the same field names:
//!
//! ```text
//! FilterRequest { db=1, rp=2, measurement=3, field=4, where=5, slimit=6, limit=7 }
//! ReadResponse  { results=1: [QueryResult { timeseries=1: [TimeSeries] }] }
//! TimeSeries    { labels=1: [LabelPair { name=1, value=2 }], samples=2: [Sample { value=1, timestamp_ms=2 }] }
//! ```

pub mod codec;

use prost::Message;
use serde::{Deserialize, Serialize};

use crate::storage::Tags;

pub use codec::{
    compress, decode_filter, decode_response, decode_series, decompress, encode_filter,
    encode_response, encode_series, CodecError, CodecResult, Compression, Format,
    CONTENT_ENCODING_LZ4, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF,
};

/// A raw read: where to read, what to filter on, how much to return
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRequest {
    #[prost(string, tag = "1")]
    pub db: String,
    #[prost(string, tag = "2")]
    pub rp: String,
    #[prost(string, tag = "3")]
    pub measurement: String,
    #[prost(string, tag = "4")]
    pub field: String,
    #[prost(string, tag = "5")]
    #[serde(rename = "where")]
    pub where_clause: String,
    /// Maximum number of series, zero or negative for unlimited
    #[prost(int64, tag = "6")]
    pub slimit: i64,
    /// Maximum number of samples, zero or negative for unlimited
    #[prost(int64, tag = "7")]
    pub limit: i64,
}

impl FilterRequest {
    pub fn new(db: impl Into<String>, measurement: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            measurement: measurement.into(),
            ..Default::default()
        }
    }

    /// Builder method: set retention policy
    pub fn rp(mut self, rp: impl Into<String>) -> Self {
        self.rp = rp.into();
        self
    }

    /// Builder method: set field
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }

    /// Builder method: set the where clause
    pub fn filter(mut self, where_clause: impl Into<String>) -> Self {
        self.where_clause = where_clause.into();
        self
    }

    /// Builder method: set series and sample limits
    pub fn limits(mut self, slimit: i64, limit: i64) -> Self {
        self.slimit = slimit;
        self.limit = limit;
        self
    }
}

/// One sample, timestamp in milliseconds
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct Sample {
    #[prost(double, tag = "1")]
    #[serde(with = "float_value")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp_ms: i64,
}

/// JSON has no NaN or infinity, so those travel as the strings
/// `"NaN"`, `"+Inf"` and `"-Inf"`
mod float_value {
    use serde::{de, Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_sign_positive() {
            serializer.serialize_str("+Inf")
        } else {
            serializer.serialize_str("-Inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }

    struct FloatVisitor;

    impl<'de> de::Visitor<'de> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or one of \"NaN\", \"+Inf\", \"-Inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
            Ok(v as f64)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
            match v {
                "NaN" => Ok(f64::NAN),
                "+Inf" | "Inf" => Ok(f64::INFINITY),
                "-Inf" => Ok(f64::NEG_INFINITY),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }
    }
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct LabelPair {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// Labels plus samples ascending by timestamp
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct TimeSeries {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub labels: Vec<LabelPair>,
    #[prost(message, repeated, tag = "2")]
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Empty series labelled with `tags`, in tag order
    pub fn with_labels(tags: &Tags) -> Self {
        Self {
            labels: tags
                .iter()
                .map(|t| LabelPair {
                    name: t.key.clone(),
                    value: t.value.clone(),
                })
                .collect(),
            samples: Vec::new(),
        }
    }
}

#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct QueryResult {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub timeseries: Vec<TimeSeries>,
}

/// Response to a buffered read; always carries exactly one result
#[derive(Clone, PartialEq, Message, Serialize, Deserialize)]
pub struct ReadResponse {
    #[prost(message, repeated, tag = "1")]
    #[serde(default)]
    pub results: Vec<QueryResult>,
}

impl ReadResponse {
    /// Response holding a single result with `timeseries`
    pub fn single(timeseries: Vec<TimeSeries>) -> Self {
        Self {
            results: vec![QueryResult { timeseries }],
        }
    }

    /// Series of the first result
    pub fn timeseries(&self) -> &[TimeSeries] {
        self.results
            .first()
            .map(|r| r.timeseries.as_slice())
            .unwrap_or(&[])
    }

    /// Total samples across all series
    pub fn sample_count(&self) -> usize {
        self.results
            .iter()
            .flat_map(|r| r.timeseries.iter())
            .map(|s| s.samples.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Tag;

    #[test]
    fn test_filter_request_json_field_names() {
        let req = FilterRequest::new("telegraf", "cpu")
            .filter("host = 'a'")
            .limits(2, 0);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["where"], "host = 'a'");
        assert_eq!(json["slimit"], 2);

        let back: FilterRequest = serde_json::from_str(r#"{"db":"x","measurement":"m"}"#).unwrap();
        assert_eq!(back.db, "x");
        assert_eq!(back.limit, 0);
        assert!(back.where_clause.is_empty());
    }

    #[test]
    fn test_filter_request_protobuf() {
        let req = FilterRequest::new("telegraf", "cpu").rp("autogen").field("usage");
        let bytes = req.encode_to_vec();
        assert_eq!(FilterRequest::decode(bytes.as_slice()).unwrap(), req);
    }

    #[test]
    fn test_with_labels_keeps_order() {
        let tags = Tags::new(vec![Tag::new("zone", "1"), Tag::new("host", "a")]);
        let series = TimeSeries::with_labels(&tags);
        let names: Vec<&str> = series.labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["zone", "host"]);
        assert!(series.samples.is_empty());
    }

    #[test]
    fn test_response_helpers() {
        let empty = ReadResponse::single(Vec::new());
        assert_eq!(empty.results.len(), 1);
        assert!(empty.timeseries().is_empty());

        let series = TimeSeries {
            labels: Vec::new(),
            samples: vec![
                Sample { value: 1.0, timestamp_ms: 1 },
                Sample { value: 2.0, timestamp_ms: 2 },
            ],
        };
        assert_eq!(ReadResponse::single(vec![series]).sample_count(), 2);
    }
}
