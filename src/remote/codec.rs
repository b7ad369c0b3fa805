//! Payload codec
//!
//! Content negotiation plus encoding of wire messages:
//!
//! - `Accept: application/x-protobuf` selects protobuf, anything else JSON
//! - `Accept-Encoding` listing `lz4` selects LZ4 frame compression

use prost::Message;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

use crate::remote::{FilterRequest, ReadResponse, TimeSeries};

pub const CONTENT_TYPE_PROTOBUF: &str = "application/x-protobuf";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_LZ4: &str = "lz4";

/// Errors from encoding, decoding or (de)compressing payloads
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Protobuf,
    #[default]
    Json,
}

impl Format {
    /// Pick the format from an `Accept` header value
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(value)
                if value
                    .split(',')
                    .any(|part| media_type(part).eq_ignore_ascii_case(CONTENT_TYPE_PROTOBUF)) =>
            {
                Format::Protobuf
            }
            _ => Format::Json,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Protobuf => CONTENT_TYPE_PROTOBUF,
            Format::Json => CONTENT_TYPE_JSON,
        }
    }
}

/// Payload compression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

impl Compression {
    /// Pick compression from an `Accept-Encoding` header value
    pub fn from_accept_encoding(accept_encoding: Option<&str>) -> Self {
        match accept_encoding {
            Some(value)
                if value
                    .split(',')
                    .any(|part| media_type(part).eq_ignore_ascii_case(CONTENT_ENCODING_LZ4)) =>
            {
                Compression::Lz4
            }
            _ => Compression::None,
        }
    }

    /// Value for the `Content-Encoding` header, if any
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Lz4 => Some(CONTENT_ENCODING_LZ4),
        }
    }
}

/// Strip parameters such as `;q=0.9` and whitespace
fn media_type(part: &str) -> &str {
    part.split(';').next().unwrap_or("").trim()
}

fn encode<M: Message + Serialize>(message: &M, format: Format) -> CodecResult<Vec<u8>> {
    match format {
        Format::Protobuf => Ok(message.encode_to_vec()),
        Format::Json => Ok(serde_json::to_vec(message)?),
    }
}

fn decode<M: Message + Default + DeserializeOwned>(data: &[u8], format: Format) -> CodecResult<M> {
    match format {
        Format::Protobuf => Ok(M::decode(data)?),
        Format::Json => Ok(serde_json::from_slice(data)?),
    }
}

pub fn encode_response(response: &ReadResponse, format: Format) -> CodecResult<Vec<u8>> {
    encode(response, format)
}

pub fn decode_response(data: &[u8], format: Format) -> CodecResult<ReadResponse> {
    decode(data, format)
}

pub fn encode_series(series: &TimeSeries, format: Format) -> CodecResult<Vec<u8>> {
    encode(series, format)
}

pub fn decode_series(data: &[u8], format: Format) -> CodecResult<TimeSeries> {
    decode(data, format)
}

pub fn encode_filter(filter: &FilterRequest, format: Format) -> CodecResult<Vec<u8>> {
    encode(filter, format)
}

pub fn decode_filter(data: &[u8], format: Format) -> CodecResult<FilterRequest> {
    decode(data, format)
}

/// Compress `data` as an LZ4 frame
pub fn compress(data: &[u8], compression: Compression) -> CodecResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => {
            let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::with_capacity(data.len() / 2));
            encoder.write_all(data)?;
            encoder
                .finish()
                .map_err(|e| CodecError::Compression(e.to_string()))
        }
    }
}

/// Reverse of [`compress`]
pub fn decompress(data: &[u8], compression: Compression) -> CodecResult<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Lz4 => {
            let mut decoder = lz4_flex::frame::FrameDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::Compression(e.to_string()))?;
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{LabelPair, Sample};

    fn response() -> ReadResponse {
        ReadResponse::single(vec![
            TimeSeries {
                labels: vec![
                    LabelPair { name: "host".into(), value: "a".into() },
                    LabelPair { name: "dc".into(), value: "fra".into() },
                ],
                samples: vec![
                    Sample { value: 0.5, timestamp_ms: 1_000 },
                    Sample { value: -2.0, timestamp_ms: 2_000 },
                ],
            },
            TimeSeries {
                labels: vec![LabelPair { name: "host".into(), value: "b".into() }],
                samples: vec![Sample { value: 7.0, timestamp_ms: 1_500 }],
            },
        ])
    }

    #[test]
    fn test_negotiation() {
        assert_eq!(Format::from_accept(Some("application/x-protobuf")), Format::Protobuf);
        assert_eq!(
            Format::from_accept(Some("text/html, application/x-protobuf;q=0.9")),
            Format::Protobuf
        );
        assert_eq!(Format::from_accept(Some("application/json")), Format::Json);
        assert_eq!(Format::from_accept(None), Format::Json);

        assert_eq!(Compression::from_accept_encoding(Some("gzip, lz4")), Compression::Lz4);
        assert_eq!(Compression::from_accept_encoding(Some("gzip")), Compression::None);
        assert_eq!(Compression::Lz4.content_encoding(), Some("lz4"));
        assert_eq!(Compression::None.content_encoding(), None);
    }

    #[test]
    fn test_protobuf_response_round_trip() {
        let original = response();
        let bytes = encode_response(&original, Format::Protobuf).unwrap();
        assert_eq!(decode_response(&bytes, Format::Protobuf).unwrap(), original);
    }

    #[test]
    fn test_json_response_round_trip() {
        let original = response();
        let bytes = encode_response(&original, Format::Json).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"timestamp_ms\":1000"));
        assert_eq!(decode_response(&bytes, Format::Json).unwrap(), original);
    }

    #[test]
    fn test_json_non_finite_round_trip() {
        let series = TimeSeries {
            labels: Vec::new(),
            samples: vec![
                Sample { value: f64::NAN, timestamp_ms: 1 },
                Sample { value: f64::INFINITY, timestamp_ms: 2 },
                Sample { value: f64::NEG_INFINITY, timestamp_ms: 3 },
                Sample { value: 1.25, timestamp_ms: 4 },
            ],
        };

        let bytes = encode_series(&series, Format::Json).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#""value":"NaN""#));
        assert!(text.contains(r#""value":"+Inf""#));
        assert!(text.contains(r#""value":"-Inf""#));
        assert!(text.contains(r#""value":1.25"#));

        let decoded = decode_series(&bytes, Format::Json).unwrap();
        let values: Vec<f64> = decoded.samples.iter().map(|s| s.value).collect();
        assert!(values[0].is_nan());
        assert_eq!(values[1..], [f64::INFINITY, f64::NEG_INFINITY, 1.25]);
    }

    #[test]
    fn test_json_sample_value_forms() {
        let decoded = decode_series(
            br#"{"samples":[{"value":3,"timestamp_ms":1},{"value":"Inf","timestamp_ms":2}]}"#,
            Format::Json,
        )
        .unwrap();
        assert_eq!(decoded.samples[0].value, 3.0);
        assert_eq!(decoded.samples[1].value, f64::INFINITY);

        assert!(matches!(
            decode_series(br#"{"samples":[{"value":"lots","timestamp_ms":1}]}"#, Format::Json),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_lz4_round_trip() {
        let payload = encode_response(&response(), Format::Json).unwrap();
        let compressed = compress(&payload, Compression::Lz4).unwrap();
        assert_ne!(compressed, payload);
        assert_eq!(decompress(&compressed, Compression::Lz4).unwrap(), payload);
        assert_eq!(compress(&payload, Compression::None).unwrap(), payload);
    }

    #[test]
    fn test_corrupt_payloads() {
        assert!(matches!(
            decode_response(b"{not json", Format::Json),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            decode_filter(&[0xff, 0xff, 0xff], Format::Protobuf),
            Err(CodecError::Decode(_))
        ));
        assert!(decompress(b"definitely not lz4", Compression::Lz4).is_err());
    }
}
