// ============================================
// File: crates/sealwire-core/src/protocol/extensions.rs
// ============================================
//! # Hello Extensions
//!
//! ## Creation Reason
//! Hellos carry an ordered list of `type | length | data` extensions. The
//! engine understands four of them (server name, supported groups, ALPN,
//! key share) and carries the rest opaquely.
//!
//! ## Wire Format
//! ```text
//! extension      = type (2) | length (2) | data
//! server_name    = list_len (2) | name_type (1) = 0 | name_len (2) | name
//! supported_groups = list_len (2) | group (2)*
//! alpn           = list_len (2) | (proto_len (1) | proto)*
//! key_share (CH) = list_len (2) | (group (2) | key_len (2) | key)*
//! key_share (SH) = group (2) | key_len (2) | key
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `decode_extensions` does not reject duplicate types; the connection
//!   checks `has_duplicates` on each hello
//! - A declared length past the end of the block is `TruncatedExtension`
//!
//! ## Last Modified
//! v0.1.0 - Initial extension support

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FramingError, Result};
use crate::protocol::codec::{get_u16, get_u8, get_vec16, get_vec8, put_vec16, put_vec8};
use crate::protocol::suites::NamedGroup;

// ============================================
// ExtensionType
// ============================================

/// Extension type codes understood by the engine.
pub mod extension_type {
    /// Server Name Indication.
    pub const SERVER_NAME: u16 = 0;
    /// Supported key-exchange groups.
    pub const SUPPORTED_GROUPS: u16 = 10;
    /// Application-Layer Protocol Negotiation.
    pub const ALPN: u16 = 16;
    /// Ephemeral key shares.
    pub const KEY_SHARE: u16 = 51;
}

const HOST_NAME_TYPE: u8 = 0;

// ============================================
// Extension
// ============================================

/// One extension entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Type code.
    pub extension_type: u16,
    /// Extension body.
    pub data: Bytes,
}

impl Extension {
    /// Creates an extension from raw parts.
    pub fn new(extension_type: u16, data: impl Into<Bytes>) -> Self {
        Self {
            extension_type,
            data: data.into(),
        }
    }

    /// `server_name` with a single host name.
    ///
    /// # Errors
    /// Host name longer than 65535 bytes.
    pub fn server_name(host: &str) -> Result<Self> {
        let mut entry = BytesMut::new();
        entry.put_u8(HOST_NAME_TYPE);
        put_vec16(&mut entry, host.as_bytes(), "server_name")?;
        let mut data = BytesMut::new();
        put_vec16(&mut data, &entry, "server_name")?;
        Ok(Self::new(extension_type::SERVER_NAME, data.freeze()))
    }

    /// `supported_groups` in preference order.
    ///
    /// # Errors
    /// List longer than the length prefix allows.
    pub fn supported_groups(groups: &[NamedGroup]) -> Result<Self> {
        let mut list = BytesMut::with_capacity(groups.len() * 2);
        for group in groups {
            list.put_u16(group.as_u16());
        }
        let mut data = BytesMut::new();
        put_vec16(&mut data, &list, "supported_groups")?;
        Ok(Self::new(extension_type::SUPPORTED_GROUPS, data.freeze()))
    }

    /// `alpn` with protocols in preference order.
    ///
    /// # Errors
    /// An empty or over-long protocol name.
    pub fn alpn<S: AsRef<str>>(protocols: &[S]) -> Result<Self> {
        let mut list = BytesMut::new();
        for proto in protocols {
            let proto = proto.as_ref().as_bytes();
            if proto.is_empty() {
                return Err(FramingError::malformed("alpn", "empty protocol name").into());
            }
            put_vec8(&mut list, proto, "alpn")?;
        }
        let mut data = BytesMut::new();
        put_vec16(&mut data, &list, "alpn")?;
        Ok(Self::new(extension_type::ALPN, data.freeze()))
    }

    /// Client `key_share` carrying one or more entries.
    ///
    /// # Errors
    /// Entries longer than the length prefix allows.
    pub fn client_key_share(entries: &[KeyShareEntry]) -> Result<Self> {
        let mut list = BytesMut::new();
        for entry in entries {
            entry.encode(&mut list)?;
        }
        let mut data = BytesMut::new();
        put_vec16(&mut data, &list, "key_share")?;
        Ok(Self::new(extension_type::KEY_SHARE, data.freeze()))
    }

    /// Server `key_share` carrying the selected entry.
    ///
    /// # Errors
    /// Key longer than the length prefix allows.
    pub fn server_key_share(entry: &KeyShareEntry) -> Result<Self> {
        let mut data = BytesMut::new();
        entry.encode(&mut data)?;
        Ok(Self::new(extension_type::KEY_SHARE, data.freeze()))
    }
}

// ============================================
// KeyShareEntry
// ============================================

/// A group and public value offered for key exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyShareEntry {
    /// Group of the public value.
    pub group: NamedGroup,
    /// Encoded public value.
    pub key_exchange: Bytes,
}

impl KeyShareEntry {
    /// Creates an entry.
    pub fn new(group: NamedGroup, key_exchange: impl Into<Bytes>) -> Self {
        Self {
            group,
            key_exchange: key_exchange.into(),
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.group.as_u16());
        put_vec16(buf, &self.key_exchange, "key_share entry")
    }

    fn decode(buf: &mut Bytes) -> Result<Self> {
        let group = NamedGroup(get_u16(buf, "key_share entry")?);
        let key_exchange = get_vec16(buf, "key_share entry")?;
        if key_exchange.is_empty() {
            return Err(FramingError::malformed("key_share entry", "empty key").into());
        }
        Ok(Self { group, key_exchange })
    }
}

// ============================================
// List Encoding / Decoding
// ============================================

/// Appends `extensions` as a 2-byte-length-prefixed block.
///
/// # Errors
/// An extension body or the block exceeds 65535 bytes.
pub fn encode_extensions(extensions: &[Extension], buf: &mut BytesMut) -> Result<()> {
    let mut block = BytesMut::new();
    for ext in extensions {
        block.put_u16(ext.extension_type);
        put_vec16(&mut block, &ext.data, "extension")?;
    }
    put_vec16(buf, &block, "extensions")
}

/// Parses an extension block (without its outer length prefix).
///
/// # Errors
/// - `TruncatedExtension` if an entry declares more data than remains
/// - `Malformed` if fewer than 4 bytes remain for an entry header
pub fn decode_extensions(mut block: Bytes) -> Result<Vec<Extension>> {
    let mut extensions = Vec::new();
    while block.has_remaining() {
        let extension_type = get_u16(&mut block, "extension header")?;
        let declared = usize::from(get_u16(&mut block, "extension header")?);
        if declared > block.remaining() {
            return Err(FramingError::TruncatedExtension {
                extension_type,
                declared,
                remaining: block.remaining(),
            }
            .into());
        }
        let data = block.split_to(declared);
        extensions.push(Extension { extension_type, data });
    }
    Ok(extensions)
}

/// First extension of the given type.
#[must_use]
pub fn find_extension(extensions: &[Extension], extension_type: u16) -> Option<&Extension> {
    extensions.iter().find(|e| e.extension_type == extension_type)
}

/// Returns `true` if any type appears more than once.
#[must_use]
pub fn has_duplicates(extensions: &[Extension]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(extensions.len());
    extensions.iter().any(|e| !seen.insert(e.extension_type))
}

// ============================================
// Typed Parsers
// ============================================

fn ensure_consumed(buf: &Bytes, context: &'static str) -> Result<()> {
    if buf.has_remaining() {
        return Err(FramingError::malformed(context, format!("{} trailing bytes", buf.remaining())).into());
    }
    Ok(())
}

/// Host name from a `server_name` body.
///
/// # Errors
/// Malformed body, unknown name type or non-UTF-8 name.
pub fn parse_server_name(data: &[u8]) -> Result<String> {
    let mut body = Bytes::copy_from_slice(data);
    let mut list = get_vec16(&mut body, "server_name")?;
    ensure_consumed(&body, "server_name")?;

    let name_type = get_u8(&mut list, "server_name")?;
    if name_type != HOST_NAME_TYPE {
        return Err(FramingError::malformed("server_name", format!("unknown name type {name_type}")).into());
    }
    let name = get_vec16(&mut list, "server_name")?;
    ensure_consumed(&list, "server_name")?;

    String::from_utf8(name.to_vec())
        .map_err(|_| FramingError::malformed("server_name", "host name is not UTF-8").into())
}

/// Groups from a `supported_groups` body.
///
/// # Errors
/// Malformed body or odd list length.
pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<NamedGroup>> {
    let mut body = Bytes::copy_from_slice(data);
    let mut list = get_vec16(&mut body, "supported_groups")?;
    ensure_consumed(&body, "supported_groups")?;
    if list.len() % 2 != 0 {
        return Err(FramingError::malformed("supported_groups", "odd list length").into());
    }

    let mut groups = Vec::with_capacity(list.len() / 2);
    while list.has_remaining() {
        groups.push(NamedGroup(list.get_u16()));
    }
    Ok(groups)
}

/// Protocol names from an `alpn` body.
///
/// # Errors
/// Malformed body, empty entry or non-UTF-8 name.
pub fn parse_alpn(data: &[u8]) -> Result<Vec<String>> {
    let mut body = Bytes::copy_from_slice(data);
    let mut list = get_vec16(&mut body, "alpn")?;
    ensure_consumed(&body, "alpn")?;

    let mut protocols = Vec::new();
    while list.has_remaining() {
        let proto = get_vec8(&mut list, "alpn")?;
        if proto.is_empty() {
            return Err(FramingError::malformed("alpn", "empty protocol name").into());
        }
        let proto = String::from_utf8(proto.to_vec())
            .map_err(|_| FramingError::malformed("alpn", "protocol name is not UTF-8"))?;
        protocols.push(proto);
    }
    Ok(protocols)
}

/// Entries from a client `key_share` body.
///
/// # Errors
/// Malformed body or entry.
pub fn parse_client_key_shares(data: &[u8]) -> Result<Vec<KeyShareEntry>> {
    let mut body = Bytes::copy_from_slice(data);
    let mut list = get_vec16(&mut body, "key_share")?;
    ensure_consumed(&body, "key_share")?;

    let mut entries = Vec::new();
    while list.has_remaining() {
        entries.push(KeyShareEntry::decode(&mut list)?);
    }
    Ok(entries)
}

/// Entry from a server `key_share` body.
///
/// # Errors
/// Malformed body or trailing bytes.
pub fn parse_server_key_share(data: &[u8]) -> Result<KeyShareEntry> {
    let mut body = Bytes::copy_from_slice(data);
    let entry = KeyShareEntry::decode(&mut body)?;
    ensure_consumed(&body, "key_share")?;
    Ok(entry)
}

// ============================================
// Tests
// ============================================
