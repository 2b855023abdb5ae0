// ============================================
// File: crates/sealwire-core/src/protocol/messages.rs
// ============================================
//! # Handshake Payloads
//!
//! ## Creation Reason
//! Typed views of the handshake message bodies exchanged by the
//! connection state machine.
//!
//! ## Main Functionality
//! - `ClientHello`: version, random, session id, cipher list, compression
//!   methods, extensions
//! - `ServerHello`: the responder's selection
//! - `Certificate`: opaque public-key blob
//! - `CertificateVerify`: signature over the transcript
//! - `Finished`: MAC over the transcript
//!
//! ## Wire Format
//! ```text
//! ClientHello: version (2) | random (32) | sid_len (1) + sid
//!              | ciphers_len (2) + cipher (2)* | comp_count (1) + method (1)*
//!              | ext_len (2) + extensions
//! ServerHello: version (2) | random (32) | sid_len (1) + sid
//!              | cipher (2) | compression (1) | ext_len (2) + extensions
//! Certificate: len (3) + opaque key
//! CertificateVerify: scheme (2) | sig_len (2) + signature
//! Finished:    verify_data (32)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `from_payload` rejects trailing bytes; hellos must be parsed exactly
//! - Session ids longer than 32 bytes are malformed
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::RngCore;

use crate::error::{FramingError, Result};
use crate::protocol::codec::{
    get_bytes, get_u16, get_u8, get_vec16, get_vec24, get_vec8, put_vec16, put_vec24, put_vec8, WireMessage,
};
use crate::protocol::extensions::{decode_extensions, encode_extensions, Extension};
use crate::protocol::handshake::HandshakeType;
use crate::protocol::suites::CipherSuite;
use crate::protocol::version::ProtocolVersion;

// ============================================
// Constants
// ============================================

/// Size of the hello random.
pub const RANDOM_SIZE: usize = 32;

/// Largest legacy session id.
pub const MAX_SESSION_ID_SIZE: usize = 32;

/// Size of Finished verify data (HMAC-SHA256).
pub const VERIFY_DATA_SIZE: usize = 32;

/// The only compression method.
pub const COMPRESSION_NULL: u8 = 0;

/// Signature scheme code for Ed25519.
pub const SCHEME_ED25519: u16 = 0x0807;

/// Fresh 32-byte hello random from the OS generator.
#[must_use]
pub fn generate_random() -> [u8; RANDOM_SIZE] {
    let mut random = [0u8; RANDOM_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut random);
    random
}

fn get_random(buf: &mut Bytes, context: &'static str) -> Result<[u8; RANDOM_SIZE]> {
    let bytes = get_bytes(buf, RANDOM_SIZE, context)?;
    let mut random = [0u8; RANDOM_SIZE];
    random.copy_from_slice(&bytes);
    Ok(random)
}

fn get_session_id(buf: &mut Bytes, context: &'static str) -> Result<Bytes> {
    let sid = get_vec8(buf, context)?;
    if sid.len() > MAX_SESSION_ID_SIZE {
        return Err(FramingError::malformed(context, format!("session id of {} bytes", sid.len())).into());
    }
    Ok(sid)
}

fn get_extensions(buf: &mut Bytes, context: &'static str) -> Result<Vec<Extension>> {
    // A hello may legitimately end right after the fixed fields.
    if !buf.has_remaining() {
        return Ok(Vec::new());
    }
    let block = get_vec16(buf, context)?;
    decode_extensions(block)
}

// ============================================
// ClientHello
// ============================================

/// Initiator's opening message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    /// Highest version the initiator supports.
    pub version: ProtocolVersion,
    /// Fresh random.
    pub random: [u8; RANDOM_SIZE],
    /// Legacy session id (echoed by the responder).
    pub session_id: Bytes,
    /// Offered suites, most preferred first.
    pub cipher_suites: Vec<CipherSuite>,
    /// Offered compression methods.
    pub compression_methods: Vec<u8>,
    /// Extensions in order.
    pub extensions: Vec<Extension>,
}

impl WireMessage for ClientHello {
    const TYPE: HandshakeType = HandshakeType::ClientHello;
    const NAME: &'static str = "ClientHello";

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.version.as_u16());
        buf.put_slice(&self.random);
        put_vec8(buf, &self.session_id, Self::NAME)?;

        let mut suites = BytesMut::with_capacity(self.cipher_suites.len() * 2);
        for suite in &self.cipher_suites {
            suites.put_u16(suite.as_u16());
        }
        put_vec16(buf, &suites, Self::NAME)?;
        put_vec8(buf, &self.compression_methods, Self::NAME)?;
        encode_extensions(&self.extensions, buf)
    }

    fn decode_payload(buf: &mut Bytes) -> Result<Self> {
        let version = ProtocolVersion(get_u16(buf, Self::NAME)?);
        let random = get_random(buf, Self::NAME)?;
        let session_id = get_session_id(buf, Self::NAME)?;

        let mut suites = get_vec16(buf, Self::NAME)?;
        if suites.len() % 2 != 0 {
            return Err(FramingError::malformed(Self::NAME, "odd cipher suite list length").into());
        }
        let mut cipher_suites = Vec::with_capacity(suites.len() / 2);
        while suites.has_remaining() {
            cipher_suites.push(CipherSuite(suites.get_u16()));
        }

        let compression_methods = get_vec8(buf, Self::NAME)?.to_vec();
        if compression_methods.is_empty() {
            return Err(FramingError::malformed(Self::NAME, "no compression methods").into());
        }

        let extensions = get_extensions(buf, Self::NAME)?;

        Ok(Self {
            version,
            random,
            session_id,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }
}

// ============================================
// ServerHello
// ============================================

/// Responder's parameter selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    /// Selected version.
    pub version: ProtocolVersion,
    /// Fresh random.
    pub random: [u8; RANDOM_SIZE],
    /// Echo of the initiator's session id.
    pub session_id: Bytes,
    /// Selected suite.
    pub cipher_suite: CipherSuite,
    /// Selected compression method.
    pub compression_method: u8,
    /// Extensions in order.
    pub extensions: Vec<Extension>,
}

impl WireMessage for ServerHello {
    const TYPE: HandshakeType = HandshakeType::ServerHello;
    const NAME: &'static str = "ServerHello";

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.version.as_u16());
        buf.put_slice(&self.random);
        put_vec8(buf, &self.session_id, Self::NAME)?;
        buf.put_u16(self.cipher_suite.as_u16());
        buf.put_u8(self.compression_method);
        encode_extensions(&self.extensions, buf)
    }

    fn decode_payload(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            version: ProtocolVersion(get_u16(buf, Self::NAME)?),
            random: get_random(buf, Self::NAME)?,
            session_id: get_session_id(buf, Self::NAME)?,
            cipher_suite: CipherSuite(get_u16(buf, Self::NAME)?),
            compression_method: get_u8(buf, Self::NAME)?,
            extensions: get_extensions(buf, Self::NAME)?,
        })
    }
}

// ============================================
// Certificate
// ============================================

/// Responder's raw public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Opaque key bytes handed to the verifier.
    pub public_key: Bytes,
}

impl WireMessage for Certificate {
    const TYPE: HandshakeType = HandshakeType::Certificate;
    const NAME: &'static str = "Certificate";

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        put_vec24(buf, &self.public_key, Self::NAME)
    }

    fn decode_payload(buf: &mut Bytes) -> Result<Self> {
        let public_key = get_vec24(buf, Self::NAME)?;
        if public_key.is_empty() {
            return Err(FramingError::malformed(Self::NAME, "empty public key").into());
        }
        Ok(Self { public_key })
    }
}

// ============================================
// CertificateVerify
// ============================================

/// Signature proving possession of the certificate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    /// Signature scheme code.
    pub scheme: u16,
    /// Signature bytes.
    pub signature: Bytes,
}

impl WireMessage for CertificateVerify {
    const TYPE: HandshakeType = HandshakeType::CertificateVerify;
    const NAME: &'static str = "CertificateVerify";

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.scheme);
        put_vec16(buf, &self.signature, Self::NAME)
    }

    fn decode_payload(buf: &mut Bytes) -> Result<Self> {
        Ok(Self {
            scheme: get_u16(buf, Self::NAME)?,
            signature: get_vec16(buf, Self::NAME)?,
        })
    }
}

// ============================================
// Finished
// ============================================

/// MAC over the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// HMAC output.
    pub verify_data: [u8; VERIFY_DATA_SIZE],
}

impl WireMessage for Finished {
    const TYPE: HandshakeType = HandshakeType::Finished;
    const NAME: &'static str = "Finished";

    fn encode_payload(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_slice(&self.verify_data);
        Ok(())
    }

    fn decode_payload(buf: &mut Bytes) -> Result<Self> {
        let bytes = get_bytes(buf, VERIFY_DATA_SIZE, Self::NAME)?;
        let mut verify_data = [0u8; VERIFY_DATA_SIZE];
        verify_data.copy_from_slice(&bytes);
        Ok(Self { verify_data })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::protocol::handshake::decode_handshake;

    fn sample_client_hello() -> ClientHello {
        ClientHello {
            version: ProtocolVersion::TLS13,
            random: [0x11; RANDOM_SIZE],
            session_id: Bytes::new(),
            cipher_suites: vec![
                CipherSuite::TLS_AES_256_GCM_SHA384,
                CipherSuite::TLS_AES_128_GCM_SHA256,
                CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
            ],
            compression_methods: vec![COMPRESSION_NULL],
            extensions: vec![Extension::server_name("localhost").unwrap()],
        }
    }

    #[test]
    fn test_client_hello_layout() {
        let hello = sample_client_hello();
        let payload = hello.to_payload().unwrap();

        assert_eq!(&payload[..2], &[0x03, 0x04]);
        assert_eq!(&payload[2..34], &[0x11; 32]);
        assert_eq!(payload[34], 0, "empty session id");
        assert_eq!(&payload[35..37], &[0x00, 0x06]);
        assert_eq!(&payload[37..43], &[0x13, 0x02, 0x13, 0x01, 0x13, 0x03]);
        assert_eq!(&payload[43..45], &[0x01, 0x00], "one compression method: null");

        assert_eq!(ClientHello::from_payload(&payload).unwrap(), hello);
    }

    #[test]
    fn test_client_hello_as_handshake() {
        let hello = sample_client_hello();
        let bytes = hello.to_handshake_bytes().unwrap();
        let (msg, _) = decode_handshake(&bytes).unwrap();
        assert_eq!(msg.msg_type, HandshakeType::ClientHello);
        assert_eq!(ClientHello::from_payload(&msg.payload).unwrap(), hello);
    }

    #[test]
    fn test_server_hello_roundtrip() {
        let hello = ServerHello {
            version: ProtocolVersion::TLS13,
            random: [0x22; RANDOM_SIZE],
            session_id: Bytes::from_static(&[7; 8]),
            cipher_suite: CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
            compression_method: COMPRESSION_NULL,
            extensions: Vec::new(),
        };
        let payload = hello.to_payload().unwrap();
        assert_eq!(ServerHello::from_payload(&payload).unwrap(), hello);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut payload = Finished { verify_data: [9; 32] }.to_payload().unwrap().to_vec();
        payload.push(0);
        assert!(matches!(
            Finished::from_payload(&payload),
            Err(CoreError::Framing(FramingError::Malformed { context: "Finished", .. }))
        ));
    }

    #[test]
    fn test_short_finished_rejected() {
        assert!(Finished::from_payload(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_oversized_session_id_rejected() {
        let mut payload = vec![0x03, 0x04];
        payload.extend_from_slice(&[0u8; 32]);
        payload.push(33);
        payload.extend_from_slice(&[0u8; 33]);
        assert!(ClientHello::from_payload(&payload).is_err());
    }

    #[test]
    fn test_certificate_verify_roundtrip() {
        let cv = CertificateVerify {
            scheme: SCHEME_ED25519,
            signature: Bytes::from(vec![5u8; 64]),
        };
        let payload = cv.to_payload().unwrap();
        assert_eq!(&payload[..4], &[0x08, 0x07, 0x00, 0x40]);
        assert_eq!(CertificateVerify::from_payload(&payload).unwrap(), cv);

        let cert = Certificate {
            public_key: Bytes::from(vec![1u8; 32]),
        };
        assert_eq!(Certificate::from_payload(&cert.to_payload().unwrap()).unwrap(), cert);
    }

    #[test]
    fn test_random_is_fresh() {
        assert_ne!(generate_random(), generate_random());
    }
}
