// ============================================
// File: crates/sealwire-core/src/crypto/key_schedule.rs
// ============================================
//! # Key Schedule
//!
//! ## Creation Reason
//! Turns one ephemeral shared secret into every key the connection uses,
//! in fixed stages, each bound to the transcript at the point it is used.
//!
//! ## Main Logical Flow
//! ```text
//! Initial ──derive_early──► Early      early     = Extract(0^32, 0^32)
//!         ──derive_handshake(ss)──► Handshake
//!                                      handshake = Extract(Derive(early, "derived", H("")), ss)
//!         ──derive_master──► Master    master    = Extract(Derive(hs, "derived", H("")), 0^32)
//! ```
//! Traffic keys come from the handshake secret (transcript through
//! ServerHello) and from the master secret (transcript through the
//! server Finished). Finished keys come from the handshake secret.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Stages only move forward; calling out of order is `InvalidState`
//! - Every output is also recorded in `derived_keys` under a stable label
//! - The shared secret is taken by value and dropped (zeroized) here
//!
//! ## Last Modified
//! v0.1.0 - Initial key schedule

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use sealwire_common::SecretBytes;

use crate::connection::Role;
use crate::error::{CoreError, Result};

use super::kdf::{self, TrafficKeys};
use super::HASH_SIZE;

// ============================================
// ScheduleStage
// ============================================

/// How far the schedule has advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScheduleStage {
    /// Nothing derived yet.
    Initial,
    /// Early secret available.
    Early,
    /// Handshake secret available.
    Handshake,
    /// Master secret available.
    Master,
}

impl fmt::Display for ScheduleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initial => "Initial",
            Self::Early => "Early",
            Self::Handshake => "Handshake",
            Self::Master => "Master",
        };
        f.write_str(name)
    }
}

// ============================================
// KeySchedule
// ============================================

/// Staged secrets of one connection.
pub struct KeySchedule {
    stage: ScheduleStage,
    early_secret: Option<SecretBytes>,
    handshake_secret: Option<SecretBytes>,
    master_secret: Option<SecretBytes>,
    derived_keys: BTreeMap<String, SecretBytes>,
}

impl Default for KeySchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySchedule {
    /// Creates an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stage: ScheduleStage::Initial,
            early_secret: None,
            handshake_secret: None,
            master_secret: None,
            derived_keys: BTreeMap::new(),
        }
    }

    /// Current stage.
    #[must_use]
    pub fn stage(&self) -> ScheduleStage {
        self.stage
    }

    // ========================================
    // Stage Transitions
    // ========================================

    /// `Initial → Early`.
    ///
    /// # Errors
    /// `InvalidState` if already past `Initial`.
    pub fn derive_early(&mut self) -> Result<()> {
        self.require(ScheduleStage::Initial, "derive_early")?;
        self.early_secret = Some(kdf::extract(None, &[0u8; HASH_SIZE]));
        self.stage = ScheduleStage::Early;
        debug!(stage = %self.stage, "Key schedule advanced");
        Ok(())
    }

    /// `Early → Handshake`, consuming the shared secret. Runs
    /// [`derive_early`](Self::derive_early) first if still `Initial`.
    ///
    /// # Errors
    /// `InvalidState` if already past `Early`; `KeyDerivation` on HKDF failure.
    pub fn derive_handshake(&mut self, shared_secret: SecretBytes) -> Result<()> {
        if self.stage == ScheduleStage::Initial {
            self.derive_early()?;
        }
        self.require(ScheduleStage::Early, "derive_handshake")?;

        let early = secret_at(self.early_secret.as_ref(), "early")?;
        let salt = kdf::derive_secret(early, "derived", &kdf::empty_hash())?;
        self.handshake_secret = Some(kdf::extract(Some(salt.expose()), shared_secret.expose()));
        self.stage = ScheduleStage::Handshake;
        debug!(stage = %self.stage, "Key schedule advanced");
        Ok(())
    }

    /// `Handshake → Master`.
    ///
    /// # Errors
    /// `InvalidState` unless at `Handshake`.
    pub fn derive_master(&mut self) -> Result<()> {
        self.require(ScheduleStage::Handshake, "derive_master")?;

        let handshake = secret_at(self.handshake_secret.as_ref(), "handshake")?;
        let salt = kdf::derive_secret(handshake, "derived", &kdf::empty_hash())?;
        self.master_secret = Some(kdf::extract(Some(salt.expose()), &[0u8; HASH_SIZE]));
        self.stage = ScheduleStage::Master;
        debug!(stage = %self.stage, "Key schedule advanced");
        Ok(())
    }

    // ========================================
    // Derived Keys
    // ========================================

    /// Handshake traffic keys over `H(ClientHello‖ServerHello)`.
    ///
    /// # Errors
    /// `InvalidState` before the handshake secret exists.
    pub fn handshake_traffic_keys(&mut self, transcript_hash: &[u8], key_len: usize) -> Result<TrafficKeys> {
        let secret = secret_at(self.handshake_secret.as_ref(), "handshake")?;
        let keys = kdf::derive_traffic_keys(secret, transcript_hash, key_len)?;
        self.record_traffic_keys("handshake", &keys);
        Ok(keys)
    }

    /// Application traffic keys over the transcript through the server
    /// Finished.
    ///
    /// # Errors
    /// `InvalidState` before the master secret exists.
    pub fn application_traffic_keys(&mut self, transcript_hash: &[u8], key_len: usize) -> Result<TrafficKeys> {
        let secret = secret_at(self.master_secret.as_ref(), "master")?;
        let keys = kdf::derive_traffic_keys(secret, transcript_hash, key_len)?;
        self.record_traffic_keys("application", &keys);
        Ok(keys)
    }

    /// Finished key for the side that sends the Finished.
    ///
    /// # Errors
    /// `InvalidState` before the handshake secret exists.
    pub fn finished_key(&mut self, sender: Role) -> Result<SecretBytes> {
        let label = match sender {
            Role::Initiator => "c finished",
            Role::Responder => "s finished",
        };
        let secret = secret_at(self.handshake_secret.as_ref(), "handshake")?;
        let key = kdf::expand_label(secret, label, &[], HASH_SIZE)?;
        self.derived_keys.insert(label.replace(' ', "_") + "_key", key.clone());
        Ok(key)
    }

    /// Verify data `sender` must put in its Finished.
    ///
    /// # Errors
    /// See [`finished_key`](Self::finished_key).
    pub fn compute_finished(&mut self, sender: Role, transcript_hash: &[u8]) -> Result<[u8; HASH_SIZE]> {
        let key = self.finished_key(sender)?;
        kdf::finished_mac(&key, transcript_hash)
    }

    /// Checks a received Finished in constant time.
    ///
    /// # Errors
    /// `HandshakeVerificationFailed` on mismatch.
    pub fn verify_finished(&mut self, sender: Role, transcript_hash: &[u8], received: &[u8]) -> Result<()> {
        let key = self.finished_key(sender)?;
        kdf::verify_finished_mac(&key, transcript_hash, received)
    }

    // ========================================
    // Accessors
    // ========================================

    /// Early secret, once derived.
    #[must_use]
    pub fn early_secret(&self) -> Option<&SecretBytes> {
        self.early_secret.as_ref()
    }

    /// Handshake secret, once derived.
    #[must_use]
    pub fn handshake_secret(&self) -> Option<&SecretBytes> {
        self.handshake_secret.as_ref()
    }

    /// Master secret, once derived.
    #[must_use]
    pub fn master_secret(&self) -> Option<&SecretBytes> {
        self.master_secret.as_ref()
    }

    /// Looks up recorded key material by label.
    #[must_use]
    pub fn derived_key(&self, label: &str) -> Option<&SecretBytes> {
        self.derived_keys.get(label)
    }

    /// Labels of everything derived so far, sorted.
    pub fn derived_labels(&self) -> impl Iterator<Item = &str> {
        self.derived_keys.keys().map(String::as_str)
    }

    // ========================================
    // Internal
    // ========================================

    fn require(&self, stage: ScheduleStage, operation: &str) -> Result<()> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(CoreError::invalid_state(
                format!("{operation} (schedule at {})", self.stage),
                format!("{stage} stage"),
            ))
        }
    }

    fn record_traffic_keys(&mut self, phase: &str, keys: &TrafficKeys) {
        for (suffix, material) in [
            ("client_key", &keys.client_key),
            ("server_key", &keys.server_key),
            ("client_iv", &keys.client_iv),
            ("server_iv", &keys.server_iv),
        ] {
            self.derived_keys
                .insert(format!("{phase}_{suffix}"), material.clone());
        }
    }
}

fn secret_at<'a>(secret: Option<&'a SecretBytes>, name: &str) -> Result<&'a SecretBytes> {
    secret.ok_or_else(|| CoreError::invalid_state(format!("use of {name} secret"), format!("{name} secret derived")))
}

impl fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySchedule")
            .field("stage", &self.stage)
            .field("derived_keys", &self.derived_keys.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::kdf::sha256;

    fn schedule_with(shared: &[u8]) -> KeySchedule {
        let mut ks = KeySchedule::new();
        ks.derive_handshake(SecretBytes::from_slice(shared)).unwrap();
        ks
    }

    #[test]
    fn test_stages_advance_in_order() {
        let mut ks = KeySchedule::new();
        assert_eq!(ks.stage(), ScheduleStage::Initial);
        assert!(ks.derive_master().is_err());

        ks.derive_early().unwrap();
        assert!(ks.early_secret().is_some());
        assert!(ks.derive_early().is_err());

        ks.derive_handshake(SecretBytes::from_slice(&[7u8; 32])).unwrap();
        assert_eq!(ks.stage(), ScheduleStage::Handshake);

        ks.derive_master().unwrap();
        assert_eq!(ks.stage(), ScheduleStage::Master);
        assert!(ks.master_secret().is_some());
    }

    #[test]
    fn test_deterministic() {
        let mut a = schedule_with(b"the same shared secret");
        let mut b = schedule_with(b"the same shared secret");
        let hash = sha256(b"hello");

        assert_eq!(a.handshake_secret(), b.handshake_secret());
        let ka = a.handshake_traffic_keys(&hash, 16).unwrap();
        let kb = b.handshake_traffic_keys(&hash, 16).unwrap();
        assert_eq!(ka.client_key, kb.client_key);
        assert_eq!(ka.server_iv, kb.server_iv);
    }

    #[test]
    fn test_shared_secret_sensitivity() {
        let a = schedule_with(b"secret one");
        let b = schedule_with(b"secret two");
        assert_ne!(a.handshake_secret(), b.handshake_secret());
    }

    #[test]
    fn test_traffic_keys_require_stage() {
        let mut ks = KeySchedule::new();
        assert!(matches!(
            ks.handshake_traffic_keys(&[0u8; 32], 32),
            Err(CoreError::InvalidState { .. })
        ));

        let mut ks = schedule_with(&[1u8; 32]);
        assert!(ks.application_traffic_keys(&[0u8; 32], 32).is_err());
        ks.derive_master().unwrap();
        assert!(ks.application_traffic_keys(&[0u8; 32], 32).is_ok());
    }

    #[test]
    fn test_derived_keys_recorded() {
        let mut ks = schedule_with(&[2u8; 32]);
        let keys = ks.handshake_traffic_keys(&sha256(b"t"), 32).unwrap();
        ks.finished_key(Role::Initiator).unwrap();

        assert_eq!(ks.derived_key("handshake_client_key"), Some(&keys.client_key));
        assert!(ks.derived_key("c_finished_key").is_some());
        let labels: Vec<_> = ks.derived_labels().collect();
        assert!(labels.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_finished_roundtrip_and_direction() {
        let mut ks = schedule_with(&[3u8; 32]);
        let hash = sha256(b"transcript");

        let client = ks.compute_finished(Role::Initiator, &hash).unwrap();
        let server = ks.compute_finished(Role::Responder, &hash).unwrap();
        assert_ne!(client, server);

        assert!(ks.verify_finished(Role::Initiator, &hash, &client).is_ok());
        assert!(ks.verify_finished(Role::Responder, &hash, &client).is_err());
        assert!(ks.verify_finished(Role::Initiator, &sha256(b"other"), &client).is_err());
    }

    #[test]
    fn test_debug_hides_material() {
        let ks = schedule_with(&[4u8; 32]);
        let debug = format!("{ks:?}");
        assert!(debug.contains("Handshake"));
        assert!(!debug.contains("0404"));
    }
}
