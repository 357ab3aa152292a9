//! Typed publication datagrams
//!
//! A publication is a fixed 50-byte null-padded topic name, a one-byte type
//! tag and a tag-dependent payload:
//!
//! ```text
//! 0 - INT         1-byte sign, u32 big-endian magnitude
//! 1 - SHORT_REAL  u16 big-endian, interpreted as hundredths
//! 2 - FLOAT       1-byte sign, u32 big-endian magnitude, 1-byte exponent
//! 3 - STRING      up to 1500 bytes, null-terminated
//! ```
//!
//! Values render with integer arithmetic only, so the canonical text is
//! exact for every representable input.

use std::net::SocketAddr;

use bytes::{BufMut, BytesMut};

use crate::error::WireError;
use super::{take_name, TEXT_MAX, TOPIC_FIELD};

const TAG_INT: u8 = 0;
const TAG_SHORT_REAL: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_STRING: u8 = 3;

/// The typed value carried by a publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed 32-bit integer, sign carried separately from the magnitude
    Int { negative: bool, magnitude: u32 },
    /// Unsigned fixed-point number in hundredths
    ShortReal(u16),
    /// Signed decimal: magnitude divided by 10^exponent
    Float {
        negative: bool,
        magnitude: u32,
        exponent: u8,
    },
    /// Free-form text, at most [`TEXT_MAX`] bytes
    Text(String),
}

impl Value {
    /// Wire type name used in the rendered form
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int { .. } => "INT",
            Value::ShortReal(_) => "SHORT_REAL",
            Value::Float { .. } => "FLOAT",
            Value::Text(_) => "STRING",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Value::Int { .. } => TAG_INT,
            Value::ShortReal(_) => TAG_SHORT_REAL,
            Value::Float { .. } => TAG_FLOAT,
            Value::Text(_) => TAG_STRING,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int {
                negative,
                magnitude,
            } => {
                if *negative {
                    write!(f, "-")?;
                }
                write!(f, "{}", magnitude)
            }
            Value::ShortReal(hundredths) => {
                write!(f, "{}.{:02}", hundredths / 100, hundredths % 100)
            }
            Value::Float {
                negative,
                magnitude,
                exponent,
            } => {
                if *negative {
                    write!(f, "-")?;
                }
                let exp = *exponent as usize;
                if exp == 0 {
                    return write!(f, "{}", magnitude);
                }
                // Zero-pad so the decimal point always has a leading digit.
                let digits = format!("{:0>width$}", magnitude, width = exp + 1);
                let split = digits.len() - exp;
                write!(f, "{}.{}", &digits[..split], &digits[split..])
            }
            Value::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A decoded publication: topic plus typed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub topic: String,
    pub value: Value,
}

impl Datagram {
    pub fn new(topic: impl Into<String>, value: Value) -> Self {
        Self {
            topic: topic.into(),
            value,
        }
    }

    /// Decode a raw datagram
    ///
    /// Short reads and unknown tags are errors; the caller drops them
    /// silently. Trailing bytes beyond the typed payload are ignored.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < TOPIC_FIELD + 1 {
            return Err(WireError::Truncated {
                need: TOPIC_FIELD + 1,
                have: buf.len(),
            });
        }

        let topic = take_name(&buf[..TOPIC_FIELD])?;
        let tag = buf[TOPIC_FIELD];
        let payload = &buf[TOPIC_FIELD + 1..];

        let value = match tag {
            TAG_INT => {
                let p = need(payload, 5)?;
                Value::Int {
                    negative: p[0] != 0,
                    magnitude: u32::from_be_bytes([p[1], p[2], p[3], p[4]]),
                }
            }
            TAG_SHORT_REAL => {
                let p = need(payload, 2)?;
                Value::ShortReal(u16::from_be_bytes([p[0], p[1]]))
            }
            TAG_FLOAT => {
                let p = need(payload, 6)?;
                Value::Float {
                    negative: p[0] != 0,
                    magnitude: u32::from_be_bytes([p[1], p[2], p[3], p[4]]),
                    exponent: p[5],
                }
            }
            TAG_STRING => {
                let cut = payload.len().min(TEXT_MAX);
                let end = payload[..cut]
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(cut);
                // Publishers are unreliable; tolerate broken encodings.
                Value::Text(String::from_utf8_lossy(&payload[..end]).into_owned())
            }
            other => return Err(WireError::UnknownTag(other)),
        };

        Ok(Self { topic, value })
    }

    /// Encode to the raw datagram layout
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(TOPIC_FIELD + 1 + 6);
        let topic = self.topic.as_bytes();
        buf.put_slice(topic);
        buf.put_bytes(0, TOPIC_FIELD - topic.len());
        buf.put_u8(self.value.tag());
        match &self.value {
            Value::Int {
                negative,
                magnitude,
            } => {
                buf.put_u8(u8::from(*negative));
                buf.put_u32(*magnitude);
            }
            Value::ShortReal(hundredths) => buf.put_u16(*hundredths),
            Value::Float {
                negative,
                magnitude,
                exponent,
            } => {
                buf.put_u8(u8::from(*negative));
                buf.put_u32(*magnitude);
                buf.put_u8(*exponent);
            }
            Value::Text(text) => {
                buf.put_slice(text.as_bytes());
                buf.put_u8(0);
            }
        }
        buf
    }

    /// Canonical rendered form delivered to subscribers
    pub fn render(&self, source: SocketAddr) -> String {
        format!(
            "{}:{} - {} - {} - {}",
            source.ip(),
            source.port(),
            self.topic,
            self.value.type_name(),
            self.value
        )
    }
}

fn need(payload: &[u8], len: usize) -> Result<&[u8], WireError> {
    if payload.len() < len {
        return Err(WireError::Truncated {
            need: len,
            have: payload.len(),
        });
    }
    Ok(&payload[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(topic: &str, tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; TOPIC_FIELD];
        buf[..topic.len()].copy_from_slice(topic.as_bytes());
        buf.push(tag);
        buf.extend_from_slice(payload);
        buf
    }

    fn source() -> SocketAddr {
        "10.0.0.1:5000".parse().unwrap()
    }

    #[test]
    fn test_int_negative() {
        let buf = raw("temp", TAG_INT, &[1, 0x00, 0x00, 0x00, 0x2A]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(
            dgram.render(source()),
            "10.0.0.1:5000 - temp - INT - -42"
        );
    }

    #[test]
    fn test_int_positive() {
        let buf = raw("temp", TAG_INT, &[0, 0x00, 0x01, 0x00, 0x00]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(dgram.value.to_string(), "65536");
    }

    #[test]
    fn test_short_real() {
        let buf = raw("p", TAG_SHORT_REAL, &[0x07, 0xD1]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert!(dgram.render(source()).ends_with("p - SHORT_REAL - 20.01"));
    }

    #[test]
    fn test_short_real_small_fraction() {
        let buf = raw("p", TAG_SHORT_REAL, &[0x00, 0x05]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(dgram.value.to_string(), "0.05");
    }

    #[test]
    fn test_float() {
        let buf = raw("v", TAG_FLOAT, &[0, 0x00, 0x00, 0x04, 0xD2, 2]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert!(dgram.render(source()).ends_with("v - FLOAT - 12.34"));
    }

    #[test]
    fn test_float_magnitude_smaller_than_exponent() {
        let value = Value::Float {
            negative: true,
            magnitude: 5,
            exponent: 3,
        };
        assert_eq!(value.to_string(), "-0.005");
    }

    #[test]
    fn test_float_zero_exponent() {
        let value = Value::Float {
            negative: false,
            magnitude: 1234,
            exponent: 0,
        };
        assert_eq!(value.to_string(), "1234");
    }

    #[test]
    fn test_string_stops_at_null() {
        let mut payload = b"hello world".to_vec();
        payload.push(0);
        payload.extend_from_slice(b"trailing junk");
        let buf = raw("chat", TAG_STRING, &payload);
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(dgram.value, Value::Text("hello world".into()));
    }

    #[test]
    fn test_string_without_terminator() {
        let buf = raw("chat", TAG_STRING, b"unterminated");
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(dgram.value, Value::Text("unterminated".into()));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let buf = raw("x", 9, &[0; 8]);
        assert_eq!(Datagram::decode(&buf), Err(WireError::UnknownTag(9)));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let buf = raw("x", TAG_INT, &[1, 0x00]);
        assert!(matches!(
            Datagram::decode(&buf),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            Datagram::decode(&[0u8; 12]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_int_trailing_garbage_ignored() {
        let buf = raw("t", TAG_INT, &[0, 0, 0, 0, 7, 0xDE, 0xAD]);
        let dgram = Datagram::decode(&buf).unwrap();
        assert_eq!(dgram.value.to_string(), "7");
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cases = [
            Datagram::new("temp", Value::Int { negative: true, magnitude: 42 }),
            Datagram::new("p", Value::ShortReal(2001)),
            Datagram::new(
                "v",
                Value::Float { negative: false, magnitude: 1234, exponent: 2 },
            ),
            Datagram::new("chat", Value::Text("hello".into())),
        ];
        for dgram in cases {
            let decoded = Datagram::decode(&dgram.encode()).unwrap();
            assert_eq!(decoded, dgram);
        }
    }
}
