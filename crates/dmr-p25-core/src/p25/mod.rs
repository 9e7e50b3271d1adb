// SPDX-License-Identifier: Apache-2.0 OR MIT

//! TIA-102 Project 25 frame codec (C4): NID/sync recognition, HDU, LDU1/
//! LDU2 voice frames with interleaved link control and low-speed data,
//! TDU/TDULC terminators, TSBK trunking control, and PDU packet data.

pub mod consts;
pub mod hdu;
pub mod lc;
pub mod ldu;
pub mod nid;
pub mod pdu;
pub mod tdulc;
pub mod tsbk;
