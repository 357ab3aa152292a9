//! Wire formats for both transports
//!
//! Two formats flow through the broker:
//!
//! - [`datagram`]: the typed publication format posted by publishers over
//!   UDP. Fixed 50-byte topic field, a one-byte type tag and a
//!   type-dependent payload, decoded into [`Datagram`] and rendered to the
//!   canonical `"<ip>:<port> - <topic> - <TYPE> - <value>"` text.
//! - [`frame`]: the stream messages exchanged with subscribers over TCP.
//!   One-byte tag, fixed-size zero-filled payloads, except DATA which
//!   declares its length.
//!
//! Decoders tolerate trailing garbage beyond the declared payload; encoders
//! zero-fill unused bytes of fixed-size fields.

pub mod datagram;
pub mod frame;

pub use datagram::{Datagram, Value};
pub use frame::{Frame, PayloadLen};

/// Width of the fixed topic field in datagrams and stream frames
pub const TOPIC_FIELD: usize = 50;

/// Width of the fixed identity field in CONNECT frames
pub const IDENTITY_FIELD: usize = 50;

/// Maximum STRING publication payload
pub const TEXT_MAX: usize = 1500;

/// Maximum datagram size: topic field + tag + largest payload
pub const DATAGRAM_MAX: usize = TOPIC_FIELD + 1 + TEXT_MAX;

/// Maximum rendered publication carried in a DATA frame
pub const DATA_MAX: usize = 1596;

/// Validate a topic or identity name taken off the wire
///
/// Names are registry keys and journal file names, so path characters and
/// the dot entries are rejected along with empty and oversized values.
pub(crate) fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= TOPIC_FIELD
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control)
}

/// Extract a null-terminated name from a fixed-size field
pub(crate) fn take_name(field: &[u8]) -> Result<String, crate::error::WireError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let name = std::str::from_utf8(&field[..end])
        .map_err(|_| crate::error::WireError::InvalidName)?;
    if !valid_name(name) {
        return Err(crate::error::WireError::InvalidName);
    }
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_name_rejects_path_characters() {
        assert!(!valid_name("weather/bucharest"));
        assert!(!valid_name("..\\escape"));
        assert!(!valid_name(".."));
        assert!(!valid_name(""));
        assert!(valid_name("upb.sensors.temp"));
        assert!(valid_name("a"));
    }

    #[test]
    fn test_valid_name_rejects_oversized() {
        let long = "x".repeat(TOPIC_FIELD + 1);
        assert!(!valid_name(&long));
        let exact = "x".repeat(TOPIC_FIELD);
        assert!(valid_name(&exact));
    }

    #[test]
    fn test_take_name_stops_at_null() {
        let mut field = [0u8; 10];
        field[..4].copy_from_slice(b"temp");
        field[6] = b'x'; // garbage after the terminator
        assert_eq!(take_name(&field).unwrap(), "temp");
    }

    #[test]
    fn test_take_name_rejects_invalid_utf8() {
        let field = [0xff, 0xfe, 0x00, 0x00];
        assert!(take_name(&field).is_err());
    }
}
