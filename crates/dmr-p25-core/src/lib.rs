// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bit-level DMR and P25 frame codecs: the error-correction primitives
//! (C1/C2), the DMR frame codec (C3), the P25 frame codec (C4), and the
//! link-layer crypto keystream (C9) that every other component in this
//! workspace is written against.
//!
//! This crate is pure: every codec is a function of `(bytes, config)` with
//! no global state, so it can be exercised the same way from a live FNE
//! server, a patch engine, or a unit test.

pub mod bits;
pub mod bptc;
pub mod codec;
pub mod crypto;
pub mod dmr;
pub mod hamming;
pub mod model;
pub mod p25;
