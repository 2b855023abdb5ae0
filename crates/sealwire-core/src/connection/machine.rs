// ============================================
// File: crates/sealwire-core/src/connection/machine.rs
// ============================================
//! # Connection State Machine
//!
//! ## Creation Reason
//! Drives one side of a handshake from raw bytes to an authenticated,
//! encrypted channel. Performs no I/O: callers feed received bytes and
//! act on the returned [`Action`]s.
//!
//! ## Main Logical Flow
//! ```text
//! Initiator                                      Responder
//!   start ── ClientHello ──────────────────────►  (WaitingClientHello)
//!                                                 negotiate, key share
//!         ◄────────────────────────── ServerHello
//!         ◄──── {Certificate, CertificateVerify} (if a signer is set)
//!         ◄──────────────────────────── {Finished}
//!   verify, derive application keys
//!         ── {Finished} ─────────────────────────► verify
//!   Connected                                     Connected
//!
//!   {..} = protected with handshake traffic keys
//! ```
//!
//! ## Error Model
//! - `Err` from a method means caller misuse (`InvalidState`); state is
//!   unchanged
//! - Protocol failures inside `feed` produce `Emit(fatal alert)` followed
//!   by `Abort(error)` and move the connection to `Aborted`
//! - A partial record or handshake message is never an error
//!
//! ## ⚠️ Important Note for Next Developer
//! - Verify data is computed over the transcript BEFORE the Finished
//!   itself is appended
//! - Read keys only change with an empty handshake buffer
//! - Never log key material; the observer only sees phases and alerts
//!
//! ## Last Modified
//! v0.1.0 - Initial state machine

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use sealwire_common::{ConnectionId, SecretBytes};

use crate::alert::{Alert, AlertDescription};
use crate::config::ConnectionConfig;
use crate::crypto::aead::{cipher_for_suite, AeadCipher, RecordProtection};
use crate::crypto::auth::signature_context;
use crate::crypto::key_exchange::{compute_shared_secret, generate_keypair, GroupParams, KeyPair};
use crate::crypto::key_schedule::KeySchedule;
use crate::crypto::transcript::Transcript;
use crate::error::{CoreError, FramingError, Result};
use crate::protocol::codec::WireMessage;
use crate::protocol::extensions::{
    extension_type, find_extension, has_duplicates, parse_alpn, parse_client_key_shares, parse_server_key_share,
    parse_server_name, Extension, KeyShareEntry,
};
use crate::protocol::handshake::{decode_handshake, peek_body_len, HandshakeType, HANDSHAKE_HEADER_SIZE};
use crate::protocol::messages::{
    generate_random, Certificate, CertificateVerify, ClientHello, Finished, ServerHello, COMPRESSION_NULL,
};
use crate::protocol::record::ContentType;
use crate::protocol::suites::{CipherSuite, NamedGroup};
use crate::protocol::version::ProtocolVersion;

use super::action::Action;
use super::observer::AlertDirection;
use super::record_layer::RecordLayer;
use super::state::{HandshakePhase, Negotiated, Role};

// ============================================
// Internal State
// ============================================

/// What the initiator put in its ClientHello.
struct ClientOffer {
    session_id: Bytes,
    cipher_suites: Vec<CipherSuite>,
    group: NamedGroup,
    keypair: KeyPair,
    alpn: Vec<String>,
}

/// Initiator's progress through the responder's optional authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerAuth {
    Pending,
    CertificateReceived,
    Signed { checked: bool },
}

// ============================================
// Connection
// ============================================

/// One side of a secure connection.
///
/// # Example
/// ```
/// use sealwire_core::connection::{Action, Connection, HandshakePhase};
/// use sealwire_core::config::ConnectionConfig;
///
/// let mut client = Connection::initiator(ConnectionConfig::default()).unwrap();
/// let mut server = Connection::responder(ConnectionConfig::default()).unwrap();
///
/// let mut to_server: Vec<u8> = Vec::new();
/// for action in client.start().unwrap() {
///     if let Action::Emit(bytes) = action {
///         to_server.extend_from_slice(&bytes);
///     }
/// }
/// server.start().unwrap();
///
/// let mut to_client: Vec<u8> = Vec::new();
/// for action in server.feed(&to_server).unwrap() {
///     if let Action::Emit(bytes) = action {
///         to_client.extend_from_slice(&bytes);
///     }
/// }
///
/// let mut finished: Vec<u8> = Vec::new();
/// for action in client.feed(&to_client).unwrap() {
///     if let Action::Emit(bytes) = action {
///         finished.extend_from_slice(&bytes);
///     }
/// }
/// server.feed(&finished).unwrap();
///
/// assert_eq!(client.phase(), HandshakePhase::Connected);
/// assert_eq!(server.phase(), HandshakePhase::Connected);
/// ```
pub struct Connection {
    id: ConnectionId,
    role: Role,
    phase: HandshakePhase,
    config: ConnectionConfig,
    records: RecordLayer,
    handshake_buffer: BytesMut,
    transcript: Transcript,
    key_schedule: Option<KeySchedule>,
    offer: Option<ClientOffer>,
    negotiated: Negotiated,
    peer_auth: PeerAuth,
    pending_read: Option<RecordProtection>,
    outbound: BytesMut,
}

impl Connection {
    // ========================================
    // Construction
    // ========================================

    /// Creates a connection in `Init`.
    ///
    /// # Errors
    /// `Config` if the engine settings do not validate.
    pub fn new(role: Role, config: ConnectionConfig) -> Result<Self> {
        config.engine.validate()?;
        let records = RecordLayer::new(ProtocolVersion::TLS12, config.engine.limits.max_fragment_size);
        Ok(Self {
            id: ConnectionId::generate(),
            role,
            phase: HandshakePhase::Init,
            config,
            records,
            handshake_buffer: BytesMut::new(),
            transcript: Transcript::new(),
            key_schedule: None,
            offer: None,
            negotiated: Negotiated::default(),
            peer_auth: PeerAuth::Pending,
            pending_read: None,
            outbound: BytesMut::new(),
        })
    }

    /// Creates the initiating side.
    ///
    /// # Errors
    /// See [`Connection::new`].
    pub fn initiator(config: ConnectionConfig) -> Result<Self> {
        Self::new(Role::Initiator, config)
    }

    /// Creates the responding side.
    ///
    /// # Errors
    /// See [`Connection::new`].
    pub fn responder(config: ConnectionConfig) -> Result<Self> {
        Self::new(Role::Responder, config)
    }

    // ========================================
    // Accessors
    // ========================================

    /// Connection identifier used in logs.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Role of this side.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Returns `true` once application data can flow.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == HandshakePhase::Connected
    }

    /// Parameters agreed so far.
    #[must_use]
    pub fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    /// Handshake transcript so far.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Key schedule, once the shared secret is known.
    #[must_use]
    pub fn key_schedule(&self) -> Option<&KeySchedule> {
        self.key_schedule.as_ref()
    }

    // ========================================
    // Public Operations
    // ========================================

    /// Starts the handshake. The initiator emits its ClientHello; the
    /// responder starts waiting for one.
    ///
    /// # Errors
    /// `InvalidState` unless in `Init`.
    pub fn start(&mut self) -> Result<Vec<Action>> {
        if self.phase != HandshakePhase::Init {
            return Err(CoreError::invalid_state("start", "Init phase"));
        }

        let result = match self.role {
            Role::Initiator => self.send_client_hello(),
            Role::Responder => {
                self.set_phase(HandshakePhase::WaitingClientHello);
                Ok(())
            }
        };

        match result {
            Ok(()) => Ok(self.collect(Vec::new())),
            Err(e) => Ok(self.abort(e, Vec::new())),
        }
    }

    /// Processes bytes received from the peer.
    ///
    /// # Errors
    /// `InvalidState` before `start` or after the connection ended.
    /// Protocol failures are reported as `Action::Abort`, not as `Err`.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Action>> {
        match self.phase {
            HandshakePhase::Init => return Err(CoreError::invalid_state("feed", "started connection")),
            HandshakePhase::Closed | HandshakePhase::Aborted => {
                return Err(CoreError::invalid_state("feed", "open connection"));
            }
            _ => {}
        }

        trace!(conn = %self.id.short(), len = data.len(), "Feeding bytes");
        self.records.push_inbound(data);

        let mut events = Vec::new();
        match self.process_records(&mut events) {
            Ok(()) => Ok(self.collect(events)),
            Err(e) => Ok(self.abort(e, events)),
        }
    }

    /// Seals application data into one or more records.
    ///
    /// # Errors
    /// `InvalidState` unless `Connected`; `Encryption` if the write
    /// sequence number is exhausted.
    pub fn send(&mut self, payload: &[u8]) -> Result<Bytes> {
        if self.phase != HandshakePhase::Connected {
            return Err(CoreError::invalid_state("send", "Connected phase"));
        }
        self.records.write_record(ContentType::ApplicationData, payload)
    }

    /// Feeds bytes and returns the application data they carried.
    ///
    /// Bytes the engine wanted to emit (a fatal alert) are dropped; use
    /// [`feed`](Self::feed) when they matter.
    ///
    /// # Errors
    /// `InvalidState` as for `feed`, or the error that aborted the
    /// connection (`AuthenticationFailure` for a tampered record).
    pub fn receive(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut plaintext = Vec::new();
        for action in self.feed(data)? {
            match action {
                Action::ApplicationData(bytes) => plaintext.extend_from_slice(&bytes),
                Action::Abort(e) => return Err(e),
                _ => {}
            }
        }
        Ok(plaintext)
    }

    /// Sends `close_notify` and moves to `Closed`.
    ///
    /// # Errors
    /// `InvalidState` before `start` or after the connection ended.
    pub fn close(&mut self) -> Result<Bytes> {
        if self.phase == HandshakePhase::Init || self.phase.is_terminal() {
            return Err(CoreError::invalid_state("close", "open connection"));
        }
        let alert = Alert::close_notify();
        let bytes = self.records.write_record(ContentType::Alert, &alert.encode())?;
        self.config
            .observer
            .on_alert(self.id, self.role, alert, AlertDirection::Sent);
        self.set_phase(HandshakePhase::Closed);
        Ok(bytes)
    }

    /// Reports that the peer closed the byte stream. Clean once
    /// `Connected`; an abort before that.
    pub fn on_end_of_stream(&mut self) -> Vec<Action> {
        match self.phase {
            HandshakePhase::Connected => {
                self.set_phase(HandshakePhase::Closed);
                vec![Action::Closed]
            }
            HandshakePhase::Closed => vec![Action::Closed],
            HandshakePhase::Aborted => Vec::new(),
            phase => {
                let error = CoreError::UnexpectedEndOfStream {
                    phase: phase.to_string(),
                };
                self.abort(error, Vec::new())
            }
        }
    }

    // ========================================
    // Record Dispatch
    // ========================================

    fn process_records(&mut self, events: &mut Vec<Action>) -> Result<()> {
        while !self.phase.is_terminal() {
            let Some(record) = self.records.next_record()? else {
                break;
            };
            match record.content_type {
                ContentType::ChangeCipherSpec => self.on_change_cipher_spec(&record.payload)?,
                ContentType::Alert => self.on_alert(&record.payload, events)?,
                ContentType::Handshake => self.on_handshake_record(&record.payload, events)?,
                ContentType::ApplicationData => self.on_application_data(record.payload, events)?,
            }
        }
        Ok(())
    }

    fn on_change_cipher_spec(&mut self, payload: &[u8]) -> Result<()> {
        if self.phase == HandshakePhase::Connected {
            return Err(CoreError::out_of_order(self.phase, "ChangeCipherSpec"));
        }
        if payload != [0x01] {
            return Err(FramingError::malformed("change_cipher_spec", "payload must be 0x01").into());
        }
        trace!(conn = %self.id.short(), "Ignoring ChangeCipherSpec");
        Ok(())
    }

    fn on_alert(&mut self, payload: &[u8], events: &mut Vec<Action>) -> Result<()> {
        let alert = Alert::decode(payload)?;
        self.config
            .observer
            .on_alert(self.id, self.role, alert, AlertDirection::Received);

        if alert.is_close_notify() {
            if self.phase == HandshakePhase::Connected {
                self.set_phase(HandshakePhase::Closed);
                events.push(Action::Closed);
                return Ok(());
            }
            return Err(CoreError::PeerAlert {
                description: AlertDescription::CloseNotify,
            });
        }
        if alert.is_fatal() {
            return Err(CoreError::PeerAlert {
                description: alert.description,
            });
        }

        debug!(conn = %self.id.short(), %alert, "Ignoring warning alert");
        Ok(())
    }

    fn on_application_data(&mut self, payload: Bytes, events: &mut Vec<Action>) -> Result<()> {
        if self.phase != HandshakePhase::Connected {
            return Err(CoreError::out_of_order(self.phase, "application data"));
        }
        events.push(Action::ApplicationData(payload));
        Ok(())
    }

    fn on_handshake_record(&mut self, payload: &[u8], events: &mut Vec<Action>) -> Result<()> {
        if !self.phase.is_handshaking() {
            return Err(CoreError::out_of_order(self.phase, "handshake record"));
        }
        if payload.is_empty() {
            return Err(FramingError::malformed("handshake", "empty handshake record").into());
        }
        self.handshake_buffer.extend_from_slice(payload);

        while !self.handshake_buffer.is_empty() {
            if !self.phase.is_handshaking() {
                return Err(CoreError::out_of_order(self.phase, "handshake data"));
            }
            if self.handshake_buffer.len() >= HANDSHAKE_HEADER_SIZE {
                let len = peek_body_len(&self.handshake_buffer);
                let max = self.config.engine.limits.max_handshake_message_size;
                if len > max {
                    return Err(FramingError::HandshakeTooLarge { len, max }.into());
                }
            }

            let (message, consumed) = match decode_handshake(&self.handshake_buffer) {
                Ok(decoded) => decoded,
                Err(e) if e.is_retryable() => break,
                Err(e) => return Err(e),
            };
            let raw = self.handshake_buffer.split_to(consumed).freeze();
            self.on_handshake_message(message.msg_type, &message.payload, raw, events)?;
        }
        Ok(())
    }

    fn on_handshake_message(
        &mut self,
        msg_type: HandshakeType,
        payload: &[u8],
        raw: Bytes,
        events: &mut Vec<Action>,
    ) -> Result<()> {
        trace!(conn = %self.id.short(), phase = %self.phase, %msg_type, "Handshake message");
        match (self.role, self.phase, msg_type) {
            (Role::Responder, HandshakePhase::WaitingClientHello, HandshakeType::ClientHello) => {
                self.on_client_hello(payload, raw)
            }
            (Role::Initiator, HandshakePhase::ClientHelloSent, HandshakeType::ServerHello) => {
                self.on_server_hello(payload, raw)
            }
            (Role::Initiator, HandshakePhase::KeyExchangePending, HandshakeType::Certificate)
                if self.peer_auth == PeerAuth::Pending =>
            {
                self.on_certificate(payload, raw)
            }
            (Role::Initiator, HandshakePhase::KeyExchangePending, HandshakeType::CertificateVerify)
                if self.peer_auth == PeerAuth::CertificateReceived =>
            {
                self.on_certificate_verify(payload, raw)
            }
            (Role::Initiator, HandshakePhase::KeyExchangePending, HandshakeType::Finished) => {
                self.on_server_finished(payload, raw, events)
            }
            (Role::Responder, HandshakePhase::KeyExchangePending, HandshakeType::Finished) => {
                self.on_client_finished(payload, raw, events)
            }
            (_, phase, msg_type) => Err(CoreError::out_of_order(phase, msg_type)),
        }
    }

    // ========================================
    // Initiator
    // ========================================

    fn send_client_hello(&mut self) -> Result<()> {
        let engine = Arc::clone(&self.config.engine);
        let group = *engine
            .protocol
            .groups
            .first()
            .ok_or_else(|| CoreError::config("protocol.groups", "cannot be empty"))?;
        let params = GroupParams::for_named_group(group).ok_or(CoreError::NegotiationFailed {
            what: "key exchange group",
        })?;
        let keypair = generate_keypair(&params)?;

        let mut extensions = Vec::with_capacity(4);
        if let Some(name) = &engine.extensions.server_name {
            extensions.push(Extension::server_name(name)?);
        }
        if !engine.extensions.alpn.is_empty() {
            extensions.push(Extension::alpn(&engine.extensions.alpn)?);
        }
        extensions.push(Extension::supported_groups(&engine.protocol.groups)?);
        extensions.push(Extension::client_key_share(&[KeyShareEntry::new(
            group,
            keypair.public_key().to_vec(),
        )])?);

        let hello = ClientHello {
            version: engine.protocol.max_version,
            random: generate_random(),
            session_id: Bytes::new(),
            cipher_suites: engine.protocol.cipher_suites.clone(),
            compression_methods: vec![COMPRESSION_NULL],
            extensions,
        };
        self.send_message(&hello)?;

        self.negotiated.server_name.clone_from(&engine.extensions.server_name);
        self.offer = Some(ClientOffer {
            session_id: hello.session_id,
            cipher_suites: hello.cipher_suites,
            group,
            keypair,
            alpn: engine.extensions.alpn.clone(),
        });
        self.set_phase(HandshakePhase::ClientHelloSent);
        Ok(())
    }

    fn on_server_hello(&mut self, payload: &[u8], raw: Bytes) -> Result<()> {
        let hello = ServerHello::from_payload(payload)?;
        let engine = Arc::clone(&self.config.engine);
        let offer = self
            .offer
            .take()
            .ok_or_else(|| CoreError::invalid_state("ServerHello processing", "ClientHello sent"))?;

        if hello.version < engine.protocol.min_version || hello.version > engine.protocol.max_version {
            return Err(CoreError::ProtocolVersion {
                got: hello.version.as_u16(),
            });
        }
        if hello.session_id != offer.session_id {
            return Err(CoreError::illegal_parameter("session id not echoed"));
        }
        if !offer.cipher_suites.contains(&hello.cipher_suite) {
            return Err(CoreError::illegal_parameter(format!(
                "cipher suite {} was not offered",
                hello.cipher_suite
            )));
        }
        if hello.compression_method != COMPRESSION_NULL {
            return Err(CoreError::illegal_parameter("compression must be null"));
        }
        if has_duplicates(&hello.extensions) {
            return Err(CoreError::illegal_parameter("duplicate extension in ServerHello"));
        }

        let key_share = find_extension(&hello.extensions, extension_type::KEY_SHARE)
            .ok_or(CoreError::MissingExtension { name: "key_share" })?;
        let share = parse_server_key_share(&key_share.data)?;
        if share.group != offer.group {
            return Err(CoreError::illegal_parameter(format!(
                "key share for {} but {} was offered",
                share.group, offer.group
            )));
        }

        let alpn = match find_extension(&hello.extensions, extension_type::ALPN) {
            Some(ext) => {
                let mut selected = parse_alpn(&ext.data)?;
                if selected.len() != 1 || !offer.alpn.contains(&selected[0]) {
                    return Err(CoreError::illegal_parameter("ALPN selection was not offered"));
                }
                selected.pop()
            }
            None => None,
        };

        let shared = compute_shared_secret(&offer.keypair, &share.key_exchange, offer.keypair.group())?;
        drop(offer);

        self.transcript.append(raw);
        self.negotiated.version = Some(hello.version);
        self.negotiated.cipher_suite = Some(hello.cipher_suite);
        self.negotiated.group = Some(share.group);
        self.negotiated.alpn = alpn;
        self.records.set_version(hello.version);
        self.set_phase(HandshakePhase::ServerHelloReceived);

        self.install_handshake_keys(shared)?;
        self.set_phase(HandshakePhase::KeyExchangePending);
        Ok(())
    }

    fn on_certificate(&mut self, payload: &[u8], raw: Bytes) -> Result<()> {
        let certificate = Certificate::from_payload(payload)?;
        self.transcript.append(raw);
        self.negotiated.peer_public_key = Some(certificate.public_key);
        self.peer_auth = PeerAuth::CertificateReceived;
        Ok(())
    }

    fn on_certificate_verify(&mut self, payload: &[u8], raw: Bytes) -> Result<()> {
        let verify = CertificateVerify::from_payload(payload)?;
        let hash = self.transcript.current_hash();

        let checked = match (&self.config.verifier, &self.negotiated.peer_public_key) {
            (Some(verifier), Some(public_key)) => {
                let signed = signature_context(&hash);
                if !verifier.verify(verify.scheme, &signed, &verify.signature, public_key) {
                    return Err(CoreError::verification_failed("CertificateVerify signature rejected"));
                }
                true
            }
            (Some(_), None) => {
                return Err(CoreError::verification_failed("CertificateVerify without Certificate"));
            }
            (None, _) => {
                debug!(conn = %self.id.short(), "No verifier configured, responder signature not checked");
                false
            }
        };

        self.transcript.append(raw);
        self.peer_auth = PeerAuth::Signed { checked };
        Ok(())
    }

    fn on_server_finished(&mut self, payload: &[u8], raw: Bytes, events: &mut Vec<Action>) -> Result<()> {
        match self.peer_auth {
            PeerAuth::CertificateReceived => {
                return Err(CoreError::verification_failed("Certificate without CertificateVerify"));
            }
            PeerAuth::Pending | PeerAuth::Signed { checked: false } if self.config.verifier.is_some() => {
                return Err(CoreError::verification_failed("responder did not authenticate"));
            }
            _ => {}
        }

        let finished = Finished::from_payload(payload)?;
        let hash = self.transcript.current_hash();
        self.schedule()?
            .verify_finished(Role::Responder, &hash, &finished.verify_data)?;
        self.transcript.append(raw);
        self.set_phase(HandshakePhase::HandshakeVerified);

        let hash = self.transcript.current_hash();
        let key_len = self.suite_cipher()?.key_len();
        let schedule = self.schedule()?;
        schedule.derive_master()?;
        let application = schedule.application_traffic_keys(&hash, key_len)?;
        let verify_data = schedule.compute_finished(Role::Initiator, &hash)?;
        self.send_message(&Finished { verify_data })?;

        let write = self.protection(application.client_key, application.client_iv)?;
        let read = self.protection(application.server_key, application.server_iv)?;
        self.records.install_write(write);
        self.install_read(read)?;

        self.set_phase(HandshakePhase::Connected);
        events.push(Action::Complete);
        Ok(())
    }

    // ========================================
    // Responder
    // ========================================

    fn on_client_hello(&mut self, payload: &[u8], raw: Bytes) -> Result<()> {
        let hello = ClientHello::from_payload(payload)?;
        self.transcript.append(raw);

        if has_duplicates(&hello.extensions) {
            return Err(CoreError::illegal_parameter("duplicate extension in ClientHello"));
        }

        let engine = Arc::clone(&self.config.engine);
        let protocol = &engine.protocol;
        let version = ProtocolVersion::negotiate(hello.version, protocol.min_version, protocol.max_version)?;
        let suite = hello
            .cipher_suites
            .iter()
            .copied()
            .find(|s| s.is_implemented() && protocol.cipher_suites.contains(s))
            .ok_or(CoreError::NegotiationFailed { what: "cipher suite" })?;
        if !hello.compression_methods.contains(&COMPRESSION_NULL) {
            return Err(CoreError::illegal_parameter("null compression not offered"));
        }

        let key_share = find_extension(&hello.extensions, extension_type::KEY_SHARE)
            .ok_or(CoreError::MissingExtension { name: "key_share" })?;
        let share = parse_client_key_shares(&key_share.data)?
            .into_iter()
            .find(|entry| entry.group.is_implemented() && protocol.groups.contains(&entry.group))
            .ok_or(CoreError::NegotiationFailed {
                what: "key exchange group",
            })?;

        let alpn = select_alpn(&hello.extensions, &engine.extensions.alpn)?;
        if let Some(ext) = find_extension(&hello.extensions, extension_type::SERVER_NAME) {
            self.negotiated.server_name = Some(parse_server_name(&ext.data)?);
        }

        let params = GroupParams::for_named_group(share.group).ok_or(CoreError::NegotiationFailed {
            what: "key exchange group",
        })?;
        let keypair = generate_keypair(&params)?;
        let shared = compute_shared_secret(&keypair, &share.key_exchange, &params)?;

        self.negotiated.version = Some(version);
        self.negotiated.cipher_suite = Some(suite);
        self.negotiated.group = Some(share.group);
        self.negotiated.alpn.clone_from(&alpn);
        self.records.set_version(version);
        debug!(
            conn = %self.id.short(),
            %version,
            %suite,
            group = %share.group,
            alpn = ?alpn,
            "Parameters negotiated"
        );

        let mut extensions = vec![Extension::server_key_share(&KeyShareEntry::new(
            share.group,
            keypair.public_key().to_vec(),
        ))?];
        if let Some(protocol) = &alpn {
            extensions.push(Extension::alpn(&[protocol.as_str()])?);
        }
        let server_hello = ServerHello {
            version,
            random: generate_random(),
            session_id: hello.session_id,
            cipher_suite: suite,
            compression_method: COMPRESSION_NULL,
            extensions,
        };
        self.send_message(&server_hello)?;
        drop(keypair);
        self.set_phase(HandshakePhase::ServerHelloSent);

        self.install_handshake_keys(shared)?;

        if let Some(signer) = self.config.signer.clone() {
            self.send_message(&Certificate {
                public_key: Bytes::from(signer.public_key()),
            })?;
            let signed = signature_context(&self.transcript.current_hash());
            let signature = signer.sign(&signed)?;
            self.send_message(&CertificateVerify {
                scheme: signer.scheme(),
                signature: Bytes::from(signature),
            })?;
        }

        let hash = self.transcript.current_hash();
        let verify_data = self.schedule()?.compute_finished(Role::Responder, &hash)?;
        self.send_message(&Finished { verify_data })?;

        let hash = self.transcript.current_hash();
        let key_len = self.suite_cipher()?.key_len();
        let schedule = self.schedule()?;
        schedule.derive_master()?;
        let application = schedule.application_traffic_keys(&hash, key_len)?;
        let write = self.protection(application.server_key, application.server_iv)?;
        self.records.install_write(write);
        self.pending_read = Some(self.protection(application.client_key, application.client_iv)?);

        self.set_phase(HandshakePhase::KeyExchangePending);
        Ok(())
    }

    fn on_client_finished(&mut self, payload: &[u8], raw: Bytes, events: &mut Vec<Action>) -> Result<()> {
        let finished = Finished::from_payload(payload)?;
        let hash = self.transcript.current_hash();
        self.schedule()?
            .verify_finished(Role::Initiator, &hash, &finished.verify_data)?;
        self.transcript.append(raw);
        self.set_phase(HandshakePhase::HandshakeVerified);

        let read = self
            .pending_read
            .take()
            .ok_or_else(|| CoreError::invalid_state("client Finished processing", "application keys derived"))?;
        self.install_read(read)?;

        self.set_phase(HandshakePhase::Connected);
        events.push(Action::Complete);
        Ok(())
    }

    // ========================================
    // Helpers
    // ========================================

    /// Derives the handshake secret and switches both directions to
    /// handshake traffic keys over the transcript so far.
    fn install_handshake_keys(&mut self, shared: SecretBytes) -> Result<()> {
        let key_len = self.suite_cipher()?.key_len();
        let mut schedule = KeySchedule::new();
        schedule.derive_handshake(shared)?;
        let keys = schedule.handshake_traffic_keys(&self.transcript.current_hash(), key_len)?;
        self.key_schedule = Some(schedule);

        let (read, write) = match self.role {
            Role::Initiator => (
                self.protection(keys.server_key, keys.server_iv)?,
                self.protection(keys.client_key, keys.client_iv)?,
            ),
            Role::Responder => (
                self.protection(keys.client_key, keys.client_iv)?,
                self.protection(keys.server_key, keys.server_iv)?,
            ),
        };
        self.install_read(read)?;
        self.records.install_write(write);
        Ok(())
    }

    fn install_read(&mut self, protection: RecordProtection) -> Result<()> {
        if !self.handshake_buffer.is_empty() {
            return Err(CoreError::out_of_order(self.phase, "handshake data spanning a key change"));
        }
        self.records.install_read(protection);
        Ok(())
    }

    fn send_message<M: WireMessage>(&mut self, message: &M) -> Result<()> {
        let bytes = message.to_handshake_bytes()?;
        self.transcript.append(bytes.clone());
        let records = self.records.write_record(ContentType::Handshake, &bytes)?;
        self.outbound.extend_from_slice(&records);
        trace!(conn = %self.id.short(), message = M::NAME, len = bytes.len(), "Queued handshake message");
        Ok(())
    }

    fn schedule(&mut self) -> Result<&mut KeySchedule> {
        self.key_schedule
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("key derivation", "shared secret computed"))
    }

    fn suite_cipher(&self) -> Result<Box<dyn AeadCipher>> {
        let suite = self
            .negotiated
            .cipher_suite
            .ok_or_else(|| CoreError::invalid_state("record protection", "cipher suite negotiated"))?;
        cipher_for_suite(suite).ok_or(CoreError::NegotiationFailed { what: "cipher suite" })
    }

    fn protection(&self, key: SecretBytes, iv: SecretBytes) -> Result<RecordProtection> {
        RecordProtection::new(self.suite_cipher()?, key, iv)
    }

    fn set_phase(&mut self, to: HandshakePhase) {
        let from = self.phase;
        self.phase = to;
        self.config.observer.on_phase_change(self.id, self.role, from, to);
    }

    /// Turns accumulated output plus events into the returned action list.
    fn collect(&mut self, events: Vec<Action>) -> Vec<Action> {
        let mut actions = Vec::with_capacity(events.len() + 2);
        if !self.outbound.is_empty() {
            actions.push(Action::Emit(self.outbound.split().freeze()));
        }
        let waiting = events.is_empty();
        actions.extend(events);
        if waiting && !self.phase.is_terminal() {
            actions.push(Action::NeedMoreData);
        }
        actions
    }

    /// Moves to `Aborted`, queueing a fatal alert when the error has one.
    fn abort(&mut self, error: CoreError, mut events: Vec<Action>) -> Vec<Action> {
        if let Some(description) = error.to_alert() {
            let alert = Alert::fatal(description);
            match self.records.write_record(ContentType::Alert, &alert.encode()) {
                Ok(bytes) => {
                    self.outbound.extend_from_slice(&bytes);
                    self.config
                        .observer
                        .on_alert(self.id, self.role, alert, AlertDirection::Sent);
                }
                Err(e) => debug!(conn = %self.id.short(), error = %e, "Could not encode fatal alert"),
            }
        }

        self.config.observer.on_error(self.id, self.role, &error);
        self.set_phase(HandshakePhase::Aborted);
        self.handshake_buffer.clear();
        self.offer = None;
        self.pending_read = None;

        events.push(Action::Abort(error));
        self.collect(events)
    }
}

/// Responder ALPN choice: the first protocol in the initiator's list that
/// we also support. No extension, or none configured locally, selects
/// nothing.
fn select_alpn(extensions: &[Extension], ours: &[String]) -> Result<Option<String>> {
    let Some(ext) = find_extension(extensions, extension_type::ALPN) else {
        return Ok(None);
    };
    let offered = parse_alpn(&ext.data)?;
    if ours.is_empty() {
        return Ok(None);
    }
    offered
        .into_iter()
        .find(|p| ours.contains(p))
        .map(Some)
        .ok_or(CoreError::NoApplicationProtocol)
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("phase", &self.phase)
            .field("negotiated", &self.negotiated)
            .field("transcript", &self.transcript)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
