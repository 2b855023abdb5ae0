// ============================================
// File: crates/sealwire-core/src/protocol/codec.rs
// ============================================
//! # Codec Primitives
//!
//! ## Creation Reason
//! Every structure on the wire is built from the same pieces: big-endian
//! integers of 1, 2 or 3 bytes and byte strings prefixed by such an
//! integer. This module holds checked readers and writers for those
//! pieces and the `WireMessage` trait implemented by handshake payloads.
//!
//! ## Main Functionality
//! - `WireMessage`: encode/decode interface for handshake payload types
//! - Checked `get_*` readers over `bytes::Bytes`
//! - Length-prefixed `put_*` writers over `bytes::BytesMut`
//!
//! ## Wire Format
//! All multi-byte integers are big-endian.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always check `remaining()` before a `Buf::get_*` call, they panic
//! - Writers reject bodies that do not fit their length prefix
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FramingError, Result};
use crate::protocol::handshake::{encode_handshake, HandshakeType};

/// Largest value of a 24-bit length field.
pub const MAX_U24: usize = (1 << 24) - 1;

// ============================================
// WireMessage Trait
// ============================================

/// A handshake payload with a fixed handshake type.
pub trait WireMessage: Sized {
    /// Handshake type carried in the message header.
    const TYPE: HandshakeType;

    /// Short name used in error messages.
    const NAME: &'static str;

    /// Appends the payload bytes.
    ///
    /// # Errors
    /// A field exceeds its length prefix.
    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()>;

    /// Parses the payload, consuming from `buf`.
    ///
    /// # Errors
    /// `Framing` on any structural problem.
    fn decode_payload(buf: &mut Bytes) -> Result<Self>;

    /// Encodes the payload on its own.
    ///
    /// # Errors
    /// See [`WireMessage::encode_payload`].
    fn to_payload(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_payload(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Encodes the payload wrapped in a handshake header.
    ///
    /// # Errors
    /// See [`WireMessage::encode_payload`] and [`encode_handshake`].
    fn to_handshake_bytes(&self) -> Result<Bytes> {
        let payload = self.to_payload()?;
        encode_handshake(Self::TYPE, &payload)
    }

    /// Parses a complete payload; trailing bytes are an error.
    ///
    /// # Errors
    /// `Framing` if the payload is malformed or has trailing bytes.
    fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut buf = Bytes::copy_from_slice(payload);
        let msg = Self::decode_payload(&mut buf)?;
        if buf.has_remaining() {
            return Err(FramingError::malformed(
                Self::NAME,
                format!("{} trailing bytes", buf.remaining()),
            )
            .into());
        }
        Ok(msg)
    }
}

// ============================================
// Readers
// ============================================

fn ensure(buf: &Bytes, needed: usize, context: &'static str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(FramingError::truncated(context, needed, buf.remaining()).into());
    }
    Ok(())
}

/// Reads one byte.
pub(crate) fn get_u8(buf: &mut Bytes, context: &'static str) -> Result<u8> {
    ensure(buf, 1, context)?;
    Ok(buf.get_u8())
}

/// Reads a big-endian `u16`.
pub(crate) fn get_u16(buf: &mut Bytes, context: &'static str) -> Result<u16> {
    ensure(buf, 2, context)?;
    Ok(buf.get_u16())
}

/// Reads a big-endian 24-bit integer.
pub(crate) fn get_u24(buf: &mut Bytes, context: &'static str) -> Result<usize> {
    ensure(buf, 3, context)?;
    let hi = usize::from(buf.get_u8());
    let lo = usize::from(buf.get_u16());
    Ok((hi << 16) | lo)
}

/// Reads exactly `len` bytes.
pub(crate) fn get_bytes(buf: &mut Bytes, len: usize, context: &'static str) -> Result<Bytes> {
    ensure(buf, len, context)?;
    Ok(buf.split_to(len))
}

/// Reads a byte string with a 1-byte length prefix.
pub(crate) fn get_vec8(buf: &mut Bytes, context: &'static str) -> Result<Bytes> {
    let len = usize::from(get_u8(buf, context)?);
    get_bytes(buf, len, context)
}

/// Reads a byte string with a 2-byte length prefix.
pub(crate) fn get_vec16(buf: &mut Bytes, context: &'static str) -> Result<Bytes> {
    let len = usize::from(get_u16(buf, context)?);
    get_bytes(buf, len, context)
}

/// Reads a byte string with a 3-byte length prefix.
pub(crate) fn get_vec24(buf: &mut Bytes, context: &'static str) -> Result<Bytes> {
    let len = get_u24(buf, context)?;
    get_bytes(buf, len, context)
}

// ============================================
// Writers
// ============================================

/// Writes a big-endian 24-bit integer.
pub(crate) fn put_u24(buf: &mut BytesMut, value: usize, context: &'static str) -> Result<()> {
    if value > MAX_U24 {
        return Err(FramingError::malformed(context, format!("{value} does not fit in 24 bits")).into());
    }
    // Bounded by MAX_U24 above.
    #[allow(clippy::cast_possible_truncation)]
    {
        buf.put_u8((value >> 16) as u8);
        buf.put_u16(value as u16);
    }
    Ok(())
}

/// Writes a byte string with a 1-byte length prefix.
pub(crate) fn put_vec8(buf: &mut BytesMut, data: &[u8], context: &'static str) -> Result<()> {
    let len = u8::try_from(data.len())
        .map_err(|_| FramingError::malformed(context, format!("{} bytes exceeds u8 prefix", data.len())))?;
    buf.put_u8(len);
    buf.put_slice(data);
    Ok(())
}

/// Writes a byte string with a 2-byte length prefix.
pub(crate) fn put_vec16(buf: &mut BytesMut, data: &[u8], context: &'static str) -> Result<()> {
    let len = u16::try_from(data.len())
        .map_err(|_| FramingError::malformed(context, format!("{} bytes exceeds u16 prefix", data.len())))?;
    buf.put_u16(len);
    buf.put_slice(data);
    Ok(())
}

/// Writes a byte string with a 3-byte length prefix.
pub(crate) fn put_vec24(buf: &mut BytesMut, data: &[u8], context: &'static str) -> Result<()> {
    put_u24(buf, data.len(), context)?;
    buf.put_slice(data);
    Ok(())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_u24_roundtrip() {
        let mut buf = BytesMut::new();
        put_u24(&mut buf, 0x01_02_03, "test").unwrap();
        assert_eq!(&buf[..], &[1, 2, 3]);

        let mut bytes = buf.freeze();
        assert_eq!(get_u24(&mut bytes, "test").unwrap(), 0x01_02_03);
    }

    #[test]
    fn test_u24_overflow_rejected() {
        let mut buf = BytesMut::new();
        assert!(put_u24(&mut buf, MAX_U24 + 1, "test").is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_read_is_malformed() {
        let mut bytes = Bytes::from_static(&[0x00]);
        let err = get_u16(&mut bytes, "field").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Framing(FramingError::Malformed { context: "field", .. })
        ));
    }

    #[test]
    fn test_vec8_prefix_limits() {
        let mut buf = BytesMut::new();
        assert!(put_vec8(&mut buf, &[0u8; 256], "id").is_err());
        put_vec8(&mut buf, b"abc", "id").unwrap();
        assert_eq!(&buf[..], &[3, b'a', b'b', b'c']);

        let mut bytes = buf.freeze();
        assert_eq!(&get_vec8(&mut bytes, "id").unwrap()[..], b"abc");
    }

    #[test]
    fn test_vec16_declared_length_past_end() {
        let mut bytes = Bytes::from_static(&[0x00, 0x05, 1, 2]);
        assert!(get_vec16(&mut bytes, "list").is_err());
    }
}
