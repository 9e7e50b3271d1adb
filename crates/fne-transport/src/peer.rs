// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Peer session lifecycle (spec.md §4.4, component C6): the login/auth/
//! config handshake, ping liveness tracking, and the NAK tag taxonomy a
//! peer can be rejected with.
//!
//! ```text
//!            RPTL (login req)
//!   (-) --------------------------> WaitingAuth
//!                                        | RPTK with SHA-256(salt||password)
//!                                        v
//!                                  WaitingConfig
//!                                        | RPTC with JSON config blob
//!                                        v
//!                                    Running <-- PING -- self (every pingTime ms)
//! ```

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Peer session state (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    WaitingLogin,
    WaitingAuth,
    WaitingConfig,
    Running,
    Closing,
}

/// Textual NAK tag a peer is rejected with (spec.md §4.4: "Error taxonomy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakTag {
    RepeaterLogin,
    RepeaterAuth,
    RepeaterConfig,
    RepeaterPing,
    TransferActLog,
    TransferDiagLog,
    Announce,
}

impl NakTag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RepeaterLogin => "TAG_REPEATER_LOGIN",
            Self::RepeaterAuth => "TAG_REPEATER_AUTH",
            Self::RepeaterConfig => "TAG_REPEATER_CONFIG",
            Self::RepeaterPing => "TAG_REPEATER_PING",
            Self::TransferActLog => "TAG_TRANSFER_ACT_LOG",
            Self::TransferDiagLog => "TAG_TRANSFER_DIAG_LOG",
            Self::Announce => "TAG_ANNOUNCE",
        }
    }
}

/// Peer session error: carries the NAK tag the caller should send back,
/// together with whether the peer record must be destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("peer session rejected: {tag:?}")]
pub struct PeerError {
    pub tag: NakTag,
    pub fatal: bool,
}

impl PeerError {
    fn fatal(tag: NakTag) -> Self {
        Self { tag, fatal: true }
    }
}

/// Minimal JSON configuration blob carried by `RPTC` (spec.md §4.4: "must at
/// least carry `software`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub software: String,
    pub raw: String,
}

fn parse_config(body: &[u8]) -> Result<PeerConfig, PeerError> {
    let text = std::str::from_utf8(body).map_err(|_| PeerError::fatal(NakTag::RepeaterConfig))?;
    let value: Value = serde_json::from_str(text).map_err(|_| PeerError::fatal(NakTag::RepeaterConfig))?;
    let software = value
        .get("software")
        .and_then(Value::as_str)
        .ok_or(PeerError::fatal(NakTag::RepeaterConfig))?
        .to_string();
    Ok(PeerConfig {
        software,
        raw: text.to_string(),
    })
}

/// A live peer session: identity, network-facing volatile state, and the
/// FSM driving it from login through to teardown.
#[derive(Debug, Clone)]
pub struct Peer {
    pub peer_id: u32,
    pub state: PeerState,
    pub salt: u32,
    pub last_ping_ms: u64,
    pub ping_count: u32,
    pub last_rtp_sequence: Option<u16>,
    pub next_rtp_sequence: u16,
    pub stream_id: u32,
    pub config: Option<PeerConfig>,
}

impl Peer {
    /// A freshly created peer record, immediately after its first `RPTL`.
    /// `salt` is supplied by the caller (drawn from an RNG) so the login
    /// step stays deterministic in tests (spec.md scenario S1).
    #[must_use]
    pub fn login(peer_id: u32, salt: u32) -> Self {
        Self {
            peer_id,
            state: PeerState::WaitingAuth,
            salt,
            last_ping_ms: 0,
            ping_count: 0,
            last_rtp_sequence: None,
            next_rtp_sequence: 0,
            stream_id: 0,
            config: None,
        }
    }

    /// Process an `RPTK` authentication request.
    ///
    /// # Errors
    /// Returns a fatal [`PeerError`] tagged `TAG_REPEATER_AUTH` if the
    /// digest is the wrong length or does not match `SHA-256(salt ||
    /// password)`.
    pub fn authenticate(&mut self, digest: &[u8], password: &[u8]) -> Result<(), PeerError> {
        if self.state != PeerState::WaitingAuth {
            return Err(PeerError::fatal(NakTag::RepeaterAuth));
        }
        if digest.len() != 32 {
            self.state = PeerState::Closing;
            return Err(PeerError::fatal(NakTag::RepeaterAuth));
        }
        let mut hasher = Sha256::new();
        hasher.update(self.salt.to_be_bytes());
        hasher.update(password);
        let expected = hasher.finalize();

        if expected.as_slice() != digest {
            self.state = PeerState::Closing;
            return Err(PeerError::fatal(NakTag::RepeaterAuth));
        }
        self.state = PeerState::WaitingConfig;
        Ok(())
    }

    /// Process an `RPTC` configuration exchange.
    ///
    /// # Errors
    /// Returns a fatal [`PeerError`] tagged `TAG_REPEATER_CONFIG` if the
    /// body is not valid UTF-8 JSON carrying at least a `software` field.
    pub fn configure(&mut self, body: &[u8]) -> Result<(), PeerError> {
        if self.state != PeerState::WaitingConfig {
            return Err(PeerError::fatal(NakTag::RepeaterConfig));
        }
        let config = match parse_config(body) {
            Ok(config) => config,
            Err(err) => {
                self.state = PeerState::Closing;
                return Err(err);
            }
        };
        self.config = Some(config);
        self.state = PeerState::Running;
        Ok(())
    }

    /// Record a `PING` from the peer, given the current wall-clock in
    /// milliseconds.
    pub fn record_ping(&mut self, now_ms: u64) {
        self.last_ping_ms = now_ms;
        self.ping_count += 1;
    }

    /// Whether this peer has missed too many pings and must be destroyed
    /// (spec.md §4.4: `now - lastPing > pingTime * maxMissedPings`).
    #[must_use]
    pub fn is_ping_expired(&self, now_ms: u64, ping_time_ms: u64, max_missed_pings: u32) -> bool {
        now_ms.saturating_sub(self.last_ping_ms) > ping_time_ms * u64::from(max_missed_pings)
    }

    /// Transition to `Closing` on an explicit `RPT_CLOSING`.
    pub fn close(&mut self) {
        self.state = PeerState::Closing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rptk_digest(salt: u32, password: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt.to_be_bytes());
        hasher.update(password);
        hasher.finalize().to_vec()
    }

    #[test]
    fn s1_login_auth_config_reaches_running() {
        let mut peer = Peer::login(1, 0xDEAD_BEEF);
        assert_eq!(peer.state, PeerState::WaitingAuth);

        let digest = rptk_digest(0xDEAD_BEEF, b"password");
        peer.authenticate(&digest, b"password").unwrap();
        assert_eq!(peer.state, PeerState::WaitingConfig);

        peer.configure(br#"{"software":"test"}"#).unwrap();
        assert_eq!(peer.state, PeerState::Running);
        assert_eq!(peer.config.as_ref().unwrap().software, "test");
    }

    #[test]
    fn s2_wrong_password_destroys_peer() {
        let mut peer = Peer::login(1, 0xDEAD_BEEF);
        let digest = rptk_digest(0xDEAD_BEEF, b"wrong");
        let err = peer.authenticate(&digest, b"password").unwrap_err();
        assert_eq!(err.tag, NakTag::RepeaterAuth);
        assert!(err.fatal);
        assert_eq!(peer.state, PeerState::Closing);
    }

    #[test]
    fn authenticate_rejects_wrong_length_digest() {
        let mut peer = Peer::login(1, 1);
        let err = peer.authenticate(&[0u8; 4], b"password").unwrap_err();
        assert_eq!(err.tag, NakTag::RepeaterAuth);
    }

    #[test]
    fn configure_rejects_malformed_json() {
        let mut peer = Peer::login(1, 1);
        let digest = rptk_digest(1, b"x");
        peer.authenticate(&digest, b"x").unwrap();
        let err = peer.configure(b"not json").unwrap_err();
        assert_eq!(err.tag, NakTag::RepeaterConfig);
        assert_eq!(peer.state, PeerState::Closing);
    }

    #[test]
    fn configure_rejects_missing_software_field() {
        let mut peer = Peer::login(1, 1);
        let digest = rptk_digest(1, b"x");
        peer.authenticate(&digest, b"x").unwrap();
        let err = peer.configure(br#"{"duplex":true}"#).unwrap_err();
        assert_eq!(err.tag, NakTag::RepeaterConfig);
    }

    #[test]
    fn s5_ping_timeout_after_max_missed_pings() {
        let mut peer = Peer::login(1, 1);
        peer.record_ping(0);
        assert!(!peer.is_ping_expired(24_999, 5_000, 5));
        assert!(peer.is_ping_expired(25_001, 5_000, 5));
    }
}
