// ============================================
// File: crates/sealwire-core/src/config.rs
// ============================================
//! # Engine Configuration
//!
//! ## Creation Reason
//! Everything a connection negotiates is driven by configuration: the
//! version window, the suites and groups offered or accepted, optional
//! extensions, record limits and the pinned responder key.
//!
//! ## Main Functionality
//! - `EngineConfig`: serialisable settings (TOML)
//! - `ConnectionConfig`: shared `EngineConfig` plus runtime collaborators
//!   (signer, verifier, observer)
//!
//! ## Configuration Sections
//! - `protocol`: version window, cipher suites, groups (preference order)
//! - `extensions`: server_name, ALPN protocols
//! - `limits`: outgoing fragment size, largest handshake message
//! - `auth`: pinned Ed25519 responder key (base64)
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [protocol]
//! min_version = "1.2"
//! max_version = "1.3"
//! cipher_suites = ["TLS_CHACHA20_POLY1305_SHA256", "TLS_AES_128_GCM_SHA256"]
//! groups = ["x25519", "modp3072"]
//!
//! [extensions]
//! server_name = "relay.example"
//! alpn = ["sealwire/1"]
//!
//! [limits]
//! max_fragment_size = 16384
//! max_handshake_message_size = 65536
//!
//! [auth]
//! pinned_server_key = "base64 Ed25519 public key"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The first configured group is the one the initiator sends a key share for
//! - Unimplemented suites/groups parse (so configs stay portable) but fail
//!   validation
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use sealwire_common::logging::init_logging;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing::level_filters::LevelFilter;

use crate::connection::observer::{ConnectionObserver, TracingObserver};
use crate::crypto::auth::{HandshakeSigner, HandshakeVerifier, PinnedKeyVerifier};
use crate::error::{CoreError, Result};
use crate::protocol::suites::{CipherSuite, NamedGroup};
use crate::protocol::version::ProtocolVersion;

/// Largest plaintext carried by one record.
pub const MAX_FRAGMENT_SIZE: usize = 16_384;

// ============================================
// EngineConfig
// ============================================

/// Settings shared by every connection of an endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Negotiation parameters.
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Optional hello extensions.
    #[serde(default)]
    pub extensions: ExtensionsConfig,

    /// Record and message limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Responder authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::config(&path_str, e.to_string()))?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            CoreError::Config { field, reason } if field == "<toml>" => CoreError::config(path_str, reason),
            other => other,
        })?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Parses and validates configuration from a string.
    ///
    /// # Errors
    /// `Config` on a parse or validation failure.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CoreError::config("<toml>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        self.extensions.validate()?;
        self.limits.validate()?;
        self.auth.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Installs the global `tracing` subscriber at `logging.level`.
    ///
    /// `RUST_LOG` takes precedence. Returns `false` if a subscriber was
    /// already installed.
    pub fn init_logging(&self) -> bool {
        init_logging(&self.logging.level)
    }

    /// Serializes configuration to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

// ============================================
// ProtocolConfig
// ============================================

/// Negotiation parameters, in preference order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Lowest acceptable version.
    #[serde(default = "default_min_version")]
    pub min_version: ProtocolVersion,

    /// Highest version offered.
    #[serde(default = "default_max_version")]
    pub max_version: ProtocolVersion,

    /// Cipher suites offered (initiator) or accepted (responder).
    #[serde(default = "default_cipher_suites")]
    pub cipher_suites: Vec<CipherSuite>,

    /// Key-exchange groups; the first gets the initiator's key share.
    #[serde(default = "default_groups")]
    pub groups: Vec<NamedGroup>,
}

fn default_min_version() -> ProtocolVersion {
    ProtocolVersion::TLS12
}

fn default_max_version() -> ProtocolVersion {
    ProtocolVersion::TLS13
}

fn default_cipher_suites() -> Vec<CipherSuite> {
    vec![
        CipherSuite::TLS_CHACHA20_POLY1305_SHA256,
        CipherSuite::TLS_AES_128_GCM_SHA256,
    ]
}

fn default_groups() -> Vec<NamedGroup> {
    vec![NamedGroup::X25519, NamedGroup::MODP3072]
}

impl ProtocolConfig {
    fn validate(&self) -> Result<()> {
        for (field, version) in [
            ("protocol.min_version", self.min_version),
            ("protocol.max_version", self.max_version),
        ] {
            if !version.is_known() {
                return Err(CoreError::config(field, format!("unknown version {version}")));
            }
        }
        if self.min_version > self.max_version {
            return Err(CoreError::config(
                "protocol.min_version",
                "cannot exceed protocol.max_version",
            ));
        }

        if self.cipher_suites.is_empty() {
            return Err(CoreError::config("protocol.cipher_suites", "cannot be empty"));
        }
        if let Some(suite) = self.cipher_suites.iter().find(|s| !s.is_implemented()) {
            return Err(CoreError::config(
                "protocol.cipher_suites",
                format!("{suite} is not supported"),
            ));
        }

        if self.groups.is_empty() {
            return Err(CoreError::config("protocol.groups", "cannot be empty"));
        }
        if let Some(group) = self.groups.iter().find(|g| !g.is_implemented()) {
            return Err(CoreError::config("protocol.groups", format!("{group} is not supported")));
        }

        Ok(())
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_version: default_min_version(),
            max_version: default_max_version(),
            cipher_suites: default_cipher_suites(),
            groups: default_groups(),
        }
    }
}

// ============================================
// ExtensionsConfig
// ============================================

/// Optional hello extensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Host name sent by the initiator.
    #[serde(default)]
    pub server_name: Option<String>,

    /// ALPN protocols in preference order. Empty disables ALPN.
    #[serde(default)]
    pub alpn: Vec<String>,
}

impl ExtensionsConfig {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.server_name {
            if name.is_empty() || name.len() > usize::from(u16::MAX) - 3 {
                return Err(CoreError::config("extensions.server_name", "length out of range"));
            }
        }
        if self.alpn.iter().any(|p| p.is_empty() || p.len() > usize::from(u8::MAX)) {
            return Err(CoreError::config(
                "extensions.alpn",
                "protocol names must be 1-255 bytes",
            ));
        }
        Ok(())
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Record and message limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest plaintext per outgoing record.
    #[serde(default = "default_max_fragment_size")]
    pub max_fragment_size: usize,

    /// Largest accepted handshake message body.
    #[serde(default = "default_max_handshake_message_size")]
    pub max_handshake_message_size: usize,
}

fn default_max_fragment_size() -> usize {
    MAX_FRAGMENT_SIZE
}

fn default_max_handshake_message_size() -> usize {
    65_536
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_fragment_size == 0 || self.max_fragment_size > MAX_FRAGMENT_SIZE {
            return Err(CoreError::config(
                "limits.max_fragment_size",
                format!("must be between 1 and {MAX_FRAGMENT_SIZE}"),
            ));
        }
        if self.max_handshake_message_size < 1024 {
            return Err(CoreError::config(
                "limits.max_handshake_message_size",
                "must be at least 1024",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_fragment_size: default_max_fragment_size(),
            max_handshake_message_size: default_max_handshake_message_size(),
        }
    }
}

// ============================================
// AuthConfig
// ============================================

/// Responder authentication settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Base64 Ed25519 key the responder must sign with (initiator side).
    #[serde(default)]
    pub pinned_server_key: Option<String>,
}

impl AuthConfig {
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.pinned_server_key {
            PinnedKeyVerifier::from_base64(key)?;
        }
        Ok(())
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    fn validate(&self) -> Result<()> {
        self.level
            .parse::<LevelFilter>()
            .map(|_| ())
            .map_err(|_| CoreError::config("logging.level", format!("unknown level '{}'", self.level)))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// ConnectionConfig
// ============================================

/// Per-connection configuration: shared settings plus collaborators.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Shared engine settings.
    pub engine: Arc<EngineConfig>,
    /// Responder signing key; enables Certificate + CertificateVerify.
    pub signer: Option<Arc<dyn HandshakeSigner>>,
    /// Initiator trust decision; when set, the responder must authenticate.
    pub verifier: Option<Arc<dyn HandshakeVerifier>>,
    /// Receives phase changes, alerts and errors.
    pub observer: Arc<dyn ConnectionObserver>,
}

impl ConnectionConfig {
    /// Builds a configuration from shared settings. A pinned key in
    /// `[auth]` installs a `PinnedKeyVerifier`.
    ///
    /// # Errors
    /// `Config` if the settings do not validate.
    pub fn new(engine: Arc<EngineConfig>) -> Result<Self> {
        engine.validate()?;
        let verifier: Option<Arc<dyn HandshakeVerifier>> = match &engine.auth.pinned_server_key {
            Some(key) => Some(Arc::new(PinnedKeyVerifier::from_base64(key)?)),
            None => None,
        };
        Ok(Self {
            engine,
            signer: None,
            verifier,
            observer: Arc::new(TracingObserver),
        })
    }

    /// Sets the responder signing key.
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn HandshakeSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Sets the initiator verifier, replacing any pinned key.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn HandshakeVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Sets the observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ConnectionObserver>) -> Self {
        self.observer = observer;
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            engine: Arc::new(EngineConfig::default()),
            signer: None,
            verifier: None,
            observer: Arc::new(TracingObserver),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("signer", &self.signer.is_some())
            .field("verifier", &self.verifier.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
