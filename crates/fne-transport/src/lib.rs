// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RTP-framed UDP transport and authenticated peer session layer (spec.md
//! §4.4, §4.5: components C5/C6).

pub mod envelope;
pub mod frame;
pub mod peer;
pub mod queue;

pub use frame::{FneHeader, NetFunc, NetSubfunc, RtpHeader, RTP_END_OF_CALL_SEQ};
pub use peer::{NakTag, Peer, PeerError, PeerState};
pub use queue::PeerQueue;
