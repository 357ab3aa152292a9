//! Stream frames exchanged with subscribers
//!
//! Every frame starts with a one-byte tag. All subscriber-originated frames
//! and the broker's control replies have fixed-size, zero-filled payloads;
//! DATA declares its payload with a u16 big-endian length so the rendered
//! publication can vary up to [`DATA_MAX`] bytes.
//!
//! ```text
//! 0 - CONNECT      sub→brk  50-byte identity
//! 1 - SUBSCRIBE    sub→brk  50-byte topic + 1-byte SF flag
//! 2 - UNSUBSCRIBE  sub→brk  u32 topic id
//! 3 - TOPIC_ID     brk→sub  50-byte topic + u32 id
//! 4 - CONFIRM_U    brk→sub  u32 topic id
//! 5 - DATA         brk→sub  u16 length + rendered publication
//! 6 - CONNECT_DUP  brk→sub  empty
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WireError};
use super::{take_name, DATA_MAX, IDENTITY_FIELD, TOPIC_FIELD};

const TAG_CONNECT: u8 = 0;
const TAG_SUBSCRIBE: u8 = 1;
const TAG_UNSUBSCRIBE: u8 = 2;
const TAG_TOPIC_ID: u8 = 3;
const TAG_CONFIRM_U: u8 = 4;
const TAG_DATA: u8 = 5;
const TAG_CONNECT_DUP: u8 = 6;

/// A decoded stream frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Subscriber presents its durable identity
    Connect { identity: String },
    /// Register interest in a topic, optionally with store-and-forward
    Subscribe { topic: String, sf: bool },
    /// Drop interest in a topic, addressed by id
    Unsubscribe { topic_id: u32 },
    /// Broker announces the id assigned to a topic name
    TopicId { topic: String, topic_id: u32 },
    /// Broker confirms an unsubscribe
    ConfirmUnsubscribe { topic_id: u32 },
    /// One rendered publication
    Data { text: String },
    /// Identity already online; this connection will be closed
    ConnectDup,
}

/// How a frame's payload length is determined from its tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLen {
    Fixed(usize),
    LengthPrefixed,
}

/// Payload sizing for a tag, or an error for tags outside the protocol
pub fn payload_len(tag: u8) -> std::result::Result<PayloadLen, WireError> {
    match tag {
        TAG_CONNECT => Ok(PayloadLen::Fixed(IDENTITY_FIELD)),
        TAG_SUBSCRIBE => Ok(PayloadLen::Fixed(TOPIC_FIELD + 1)),
        TAG_UNSUBSCRIBE | TAG_CONFIRM_U => Ok(PayloadLen::Fixed(4)),
        TAG_TOPIC_ID => Ok(PayloadLen::Fixed(TOPIC_FIELD + 4)),
        TAG_DATA => Ok(PayloadLen::LengthPrefixed),
        TAG_CONNECT_DUP => Ok(PayloadLen::Fixed(0)),
        other => Err(WireError::UnknownTag(other)),
    }
}

impl Frame {
    fn tag(&self) -> u8 {
        match self {
            Frame::Connect { .. } => TAG_CONNECT,
            Frame::Subscribe { .. } => TAG_SUBSCRIBE,
            Frame::Unsubscribe { .. } => TAG_UNSUBSCRIBE,
            Frame::TopicId { .. } => TAG_TOPIC_ID,
            Frame::ConfirmUnsubscribe { .. } => TAG_CONFIRM_U,
            Frame::Data { .. } => TAG_DATA,
            Frame::ConnectDup => TAG_CONNECT_DUP,
        }
    }

    /// Encode to the on-wire layout, tag included
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + TOPIC_FIELD + 4);
        buf.put_u8(self.tag());
        match self {
            Frame::Connect { identity } => put_name(&mut buf, identity, IDENTITY_FIELD),
            Frame::Subscribe { topic, sf } => {
                put_name(&mut buf, topic, TOPIC_FIELD);
                buf.put_u8(u8::from(*sf));
            }
            Frame::Unsubscribe { topic_id } | Frame::ConfirmUnsubscribe { topic_id } => {
                buf.put_u32(*topic_id);
            }
            Frame::TopicId { topic, topic_id } => {
                put_name(&mut buf, topic, TOPIC_FIELD);
                buf.put_u32(*topic_id);
            }
            Frame::Data { text } => {
                debug_assert!(text.len() <= DATA_MAX);
                buf.put_u16(text.len() as u16);
                buf.put_slice(text.as_bytes());
            }
            Frame::ConnectDup => {}
        }
        buf.freeze()
    }

    /// Decode from a tag and its extracted payload
    ///
    /// For fixed-size frames, `payload` may be longer than the layout;
    /// trailing bytes are ignored. For DATA, `payload` is exactly the
    /// declared bytes.
    pub fn decode(tag: u8, payload: &[u8]) -> std::result::Result<Self, WireError> {
        let fixed = |len: usize| -> std::result::Result<&[u8], WireError> {
            if payload.len() < len {
                return Err(WireError::Truncated {
                    need: len,
                    have: payload.len(),
                });
            }
            Ok(&payload[..len])
        };

        match tag {
            TAG_CONNECT => Ok(Frame::Connect {
                identity: take_name(fixed(IDENTITY_FIELD)?)?,
            }),
            TAG_SUBSCRIBE => {
                let p = fixed(TOPIC_FIELD + 1)?;
                Ok(Frame::Subscribe {
                    topic: take_name(&p[..TOPIC_FIELD])?,
                    sf: p[TOPIC_FIELD] != 0,
                })
            }
            TAG_UNSUBSCRIBE => {
                let p = fixed(4)?;
                Ok(Frame::Unsubscribe {
                    topic_id: u32::from_be_bytes([p[0], p[1], p[2], p[3]]),
                })
            }
            TAG_TOPIC_ID => {
                let p = fixed(TOPIC_FIELD + 4)?;
                Ok(Frame::TopicId {
                    topic: take_name(&p[..TOPIC_FIELD])?,
                    topic_id: u32::from_be_bytes([
                        p[TOPIC_FIELD],
                        p[TOPIC_FIELD + 1],
                        p[TOPIC_FIELD + 2],
                        p[TOPIC_FIELD + 3],
                    ]),
                })
            }
            TAG_CONFIRM_U => {
                let p = fixed(4)?;
                Ok(Frame::ConfirmUnsubscribe {
                    topic_id: u32::from_be_bytes([p[0], p[1], p[2], p[3]]),
                })
            }
            TAG_DATA => {
                let text = std::str::from_utf8(payload)
                    .map_err(|_| WireError::InvalidName)?;
                Ok(Frame::Data {
                    text: text.to_owned(),
                })
            }
            TAG_CONNECT_DUP => Ok(Frame::ConnectDup),
            other => Err(WireError::UnknownTag(other)),
        }
    }
}

fn put_name(buf: &mut BytesMut, name: &str, width: usize) {
    let bytes = name.as_bytes();
    debug_assert!(bytes.len() <= width);
    buf.put_slice(bytes);
    buf.put_bytes(0, width - bytes.len());
}

/// Read one frame from a stream
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary. EOF inside a
/// frame, an unknown tag or an oversized DATA length are errors; the
/// connection cannot be resynchronized past them.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut tag = [0u8; 1];
    match reader.read_exact(&mut tag).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = match payload_len(tag[0])? {
        PayloadLen::Fixed(len) => len,
        PayloadLen::LengthPrefixed => {
            let mut prefix = [0u8; 2];
            reader.read_exact(&mut prefix).await?;
            let len = u16::from_be_bytes(prefix) as usize;
            if len > DATA_MAX {
                return Err(WireError::Oversized {
                    len,
                    max: DATA_MAX,
                }
                .into());
            }
            len
        }
    };

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Frame::decode(tag[0], &payload)?))
}

/// Write one frame to a stream
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_frames() {
        let frames = [
            Frame::Connect { identity: "sub1".into() },
            Frame::Subscribe { topic: "weather".into(), sf: true },
            Frame::Subscribe { topic: "weather".into(), sf: false },
            Frame::Unsubscribe { topic_id: 7 },
            Frame::TopicId { topic: "weather".into(), topic_id: 7 },
            Frame::ConfirmUnsubscribe { topic_id: 7 },
            Frame::Data { text: "10.0.0.1:5000 - t - INT - 1".into() },
            Frame::ConnectDup,
        ];
        for frame in frames {
            let encoded = frame.encode();
            let tag = encoded[0];
            let payload = match payload_len(tag).unwrap() {
                PayloadLen::Fixed(_) => &encoded[1..],
                PayloadLen::LengthPrefixed => &encoded[3..],
            };
            assert_eq!(Frame::decode(tag, payload).unwrap(), frame);
        }
    }

    #[test]
    fn test_fixed_fields_are_zero_filled() {
        let encoded = Frame::Connect { identity: "ab".into() }.encode();
        assert_eq!(encoded.len(), 1 + IDENTITY_FIELD);
        assert!(encoded[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_tolerates_trailing_garbage() {
        let mut payload = vec![0u8; TOPIC_FIELD + 1];
        payload[..4].copy_from_slice(b"news");
        payload[TOPIC_FIELD] = 1;
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let frame = Frame::decode(TAG_SUBSCRIBE, &payload).unwrap();
        assert_eq!(frame, Frame::Subscribe { topic: "news".into(), sf: true });
    }

    #[test]
    fn test_decode_truncated_payload() {
        assert!(matches!(
            Frame::decode(TAG_UNSUBSCRIBE, &[0, 0]),
            Err(WireError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert_eq!(payload_len(42), Err(WireError::UnknownTag(42)));
        assert!(Frame::decode(42, &[]).is_err());
    }

    #[tokio::test]
    async fn test_stream_read_write() {
        let frames = vec![
            Frame::Connect { identity: "sub1".into() },
            Frame::Data { text: "line one".into() },
            Frame::ConnectDup,
        ];
        let mut buf = Vec::new();
        for frame in &frames {
            write_frame(&mut buf, frame).await.unwrap();
        }

        let mut cursor = std::io::Cursor::new(buf);
        for expected in &frames {
            let got = read_frame(&mut cursor).await.unwrap().unwrap();
            assert_eq!(&got, expected);
        }
        assert!(read_frame(&mut cursor).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_an_error() {
        let encoded = Frame::Connect { identity: "sub1".into() }.encode();
        let mut cursor = std::io::Cursor::new(encoded[..10].to_vec());
        assert!(read_frame(&mut cursor).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_data_rejected() {
        let mut buf = vec![TAG_DATA];
        buf.extend_from_slice(&(DATA_MAX as u16 + 1).to_be_bytes());
        buf.extend_from_slice(&[b'x'; 16]);
        let mut cursor = std::io::Cursor::new(buf);
        assert!(read_frame(&mut cursor).await.is_err());
    }
}
