// SPDX-License-Identifier: Apache-2.0 OR MIT

//! P25 call terminator frames (spec.md §4.3): a plain TDU carries nothing
//! beyond its sync/NID preamble, while a TDULC carries one RS(24,12,13)
//! Link Control block (reusing [`super::lc`]) announcing why the call
//! ended.

use crate::codec::reed_solomon::RsError;
use crate::p25::lc::{self, LinkControl};

/// Encode a TDULC's Link Control into its 24-byte on-wire block.
#[must_use]
pub fn encode(lc: &LinkControl) -> [u8; 24] {
    lc::encode(lc)
}

/// Decode a TDULC's 24-byte Link Control block.
///
/// # Errors
/// Propagates [`RsError`] when the block has more errors than RS(24,12,13)
/// can correct.
pub fn decode(block: &[u8; 24]) -> Result<LinkControl, RsError> {
    lc::decode(block)
}
