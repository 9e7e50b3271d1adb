// SPDX-License-Identifier: Apache-2.0 OR MIT

//! DMR data header: the BPTC(196,96)-wrapped, CRC-CCITT-16-protected header
//! that precedes a confirmed/unconfirmed/UDT/response/defined data PDU.
//!
//! The header occupies the first 10 bytes of the 12-byte BPTC scratch
//! block; the last 2 bytes carry the masked CRC-CCITT-16.

use crate::bptc;
use crate::codec::crc;
use crate::dmr::consts::{Dpf, DATA_HEADER_CRC_MASK};

const BLOCK_LENGTH_BYTES: usize = 12;
const CRC_HI: usize = 10;
const CRC_LO: usize = 11;

/// Variant-specific fields, keyed by [`Dpf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpfFields {
    Udt {
        sap: u8,
        data_format: u8,
        blocks_to_follow: u8,
        pad_length: u8,
        supplemental: bool,
        protect: bool,
        udt_opcode: u8,
    },
    UnconfirmedData {
        sap: u8,
        pad_length: u8,
        full_message: bool,
        blocks_to_follow: u8,
        fragment_seq: u8,
    },
    ConfirmedData {
        sap: u8,
        pad_length: u8,
        full_message: bool,
        blocks_to_follow: u8,
        synchronize: bool,
        send_seq: u8,
        fragment_seq: u8,
    },
    Response {
        sap: u8,
        blocks_to_follow: u8,
        response_class: u8,
        response_type: u8,
        response_status: u8,
    },
    DefinedShort {
        sap: u8,
        blocks_to_follow: u8,
        full_message: bool,
        synchronize: bool,
        data_format: u8,
        pad_length: u8,
    },
    DefinedRaw {
        sap: u8,
        blocks_to_follow: u8,
        full_message: bool,
        synchronize: bool,
        dst_port: u8,
        src_port: u8,
    },
    Proprietary,
}

/// A fully decoded DMR data header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    pub group: bool,
    pub answer_required: bool,
    pub dpf: Dpf,
    pub dst_id: u32,
    pub src_id: u32,
    pub fields: DpfFields,
}

impl DataHeader {
    /// Blocks-to-follow is absent for proprietary headers, whose body is
    /// opaque to this layer.
    #[must_use]
    pub fn blocks_to_follow(&self) -> Option<u8> {
        match self.fields {
            DpfFields::Udt {
                blocks_to_follow, ..
            }
            | DpfFields::UnconfirmedData {
                blocks_to_follow, ..
            }
            | DpfFields::ConfirmedData {
                blocks_to_follow, ..
            }
            | DpfFields::Response {
                blocks_to_follow, ..
            }
            | DpfFields::DefinedShort {
                blocks_to_follow, ..
            }
            | DpfFields::DefinedRaw {
                blocks_to_follow, ..
            } => Some(blocks_to_follow),
            DpfFields::Proprietary => None,
        }
    }
}

/// `true` if the CRC was verified (or the sender left it zeroed, in which
/// case it is trusted unverified per the network's common behavior).
fn verify_and_unmask(data: &mut [u8; BLOCK_LENGTH_BYTES]) -> bool {
    if data[CRC_HI] == 0x00 && data[CRC_LO] == 0x00 {
        return true;
    }
    data[CRC_HI] ^= DATA_HEADER_CRC_MASK[0];
    data[CRC_LO] ^= DATA_HEADER_CRC_MASK[1];
    let expected = (u16::from(data[CRC_HI]) << 8) | u16::from(data[CRC_LO]);
    let mut check = *data;
    check[CRC_HI] = 0;
    check[CRC_LO] = 0;
    let ok = crc::verify_crc16(&check, expected);
    data[CRC_HI] ^= DATA_HEADER_CRC_MASK[0];
    data[CRC_LO] ^= DATA_HEADER_CRC_MASK[1];
    ok
}

fn apply_crc(data: &mut [u8; BLOCK_LENGTH_BYTES]) {
    data[CRC_HI] = 0;
    data[CRC_LO] = 0;
    let crc_val = crc::crc16_ccitt(data);
    data[CRC_HI] = (crc_val >> 8) as u8;
    data[CRC_LO] = crc_val as u8;
    data[CRC_HI] ^= DATA_HEADER_CRC_MASK[0];
    data[CRC_LO] ^= DATA_HEADER_CRC_MASK[1];
}

/// Decode a 196-bit BPTC block (25 bytes) into a [`DataHeader`].
///
/// Returns `None` if the CRC-CCITT-16 check fails (and the CRC field was
/// not left zeroed by the sender).
#[must_use]
pub fn decode(block: &[u8; 25]) -> Option<DataHeader> {
    let mut data = bptc::decode(block);

    if !verify_and_unmask(&mut data) {
        return None;
    }

    let group = data[0] & 0x80 != 0;
    let answer_required = data[0] & 0x40 != 0;
    let dpf = Dpf::from_wire(data[0]);

    if dpf == Dpf::Proprietary {
        return Some(DataHeader {
            group,
            answer_required,
            dpf,
            dst_id: 0,
            src_id: 0,
            fields: DpfFields::Proprietary,
        });
    }

    let dst_id = (u32::from(data[2]) << 16) | (u32::from(data[3]) << 8) | u32::from(data[4]);
    let src_id = (u32::from(data[5]) << 16) | (u32::from(data[6]) << 8) | u32::from(data[7]);

    let fields = match dpf {
        Dpf::Udt => DpfFields::Udt {
            sap: (data[1] & 0xF0) >> 4,
            data_format: data[1] & 0x0F,
            blocks_to_follow: (data[8] & 0x03) + 1,
            pad_length: (data[8] & 0xF8) >> 3,
            supplemental: data[9] & 0x80 != 0,
            protect: data[9] & 0x40 != 0,
            udt_opcode: data[9] & 0x3F,
        },
        Dpf::UnconfirmedData => DpfFields::UnconfirmedData {
            sap: (data[1] & 0xF0) >> 4,
            pad_length: (data[0] & 0x10) + (data[1] & 0x0F),
            full_message: data[8] & 0x80 != 0,
            blocks_to_follow: data[8] & 0x7F,
            fragment_seq: data[9] & 0x0F,
        },
        Dpf::ConfirmedData => DpfFields::ConfirmedData {
            sap: (data[1] & 0xF0) >> 4,
            pad_length: (data[0] & 0x10) + (data[1] & 0x0F),
            full_message: data[8] & 0x80 != 0,
            blocks_to_follow: data[8] & 0x7F,
            synchronize: data[9] & 0x80 != 0,
            send_seq: (data[9] >> 4) & 0x07,
            fragment_seq: data[9] & 0x0F,
        },
        Dpf::Response => DpfFields::Response {
            sap: (data[1] & 0xF0) >> 4,
            blocks_to_follow: data[8] & 0x7F,
            response_class: (data[9] >> 6) & 0x03,
            response_type: (data[9] >> 3) & 0x07,
            response_status: data[9] & 0x07,
        },
        Dpf::DefinedShort => DpfFields::DefinedShort {
            sap: (data[1] & 0xF0) >> 4,
            blocks_to_follow: (data[0] & 0x30) + (data[1] & 0x0F),
            full_message: data[8] & 0x01 != 0,
            synchronize: data[8] & 0x02 != 0,
            data_format: (data[8] & 0xFC) >> 2,
            pad_length: data[9],
        },
        Dpf::DefinedRaw => DpfFields::DefinedRaw {
            sap: (data[1] & 0xF0) >> 4,
            blocks_to_follow: (data[0] & 0x30) + (data[1] & 0x0F),
            full_message: data[8] & 0x01 != 0,
            synchronize: data[8] & 0x02 != 0,
            dst_port: (data[8] & 0x1C) >> 2,
            src_port: (data[8] & 0xE0) >> 5,
        },
        Dpf::Proprietary | Dpf::Unknown(_) => DpfFields::Proprietary,
    };

    Some(DataHeader {
        group,
        answer_required,
        dpf,
        dst_id,
        src_id,
        fields,
    })
}

/// Encode a [`DataHeader`] back into a 196-bit BPTC block.
#[must_use]
pub fn encode(header: &DataHeader) -> [u8; 25] {
    let mut data = [0u8; BLOCK_LENGTH_BYTES];

    data[0] = header.dpf.to_wire()
        | if header.group { 0x80 } else { 0 }
        | if header.answer_required { 0x40 } else { 0 };

    if header.dpf == Dpf::Proprietary {
        apply_crc(&mut data);
        return bptc::encode(&data);
    }

    data[2] = (header.dst_id >> 16) as u8;
    data[3] = (header.dst_id >> 8) as u8;
    data[4] = header.dst_id as u8;
    data[5] = (header.src_id >> 16) as u8;
    data[6] = (header.src_id >> 8) as u8;
    data[7] = header.src_id as u8;

    let (byte1_extra, byte8, byte9) = match header.fields {
        DpfFields::Udt {
            sap,
            data_format,
            blocks_to_follow,
            pad_length,
            supplemental,
            protect,
            udt_opcode,
        } => (
            (sap << 4) | (data_format & 0x0F),
            (pad_length << 3) | (blocks_to_follow.saturating_sub(1) & 0x03),
            (if supplemental { 0x80 } else { 0 })
                | (if protect { 0x40 } else { 0 })
                | (udt_opcode & 0x3F),
        ),
        DpfFields::UnconfirmedData {
            sap,
            pad_length,
            full_message,
            blocks_to_follow,
            fragment_seq,
        } => (
            (sap << 4) | (pad_length & 0x0F),
            (if full_message { 0x80 } else { 0 }) | (blocks_to_follow & 0x7F),
            fragment_seq & 0x0F,
        ),
        DpfFields::ConfirmedData {
            sap,
            pad_length,
            full_message,
            blocks_to_follow,
            synchronize,
            send_seq,
            fragment_seq,
        } => (
            (sap << 4) | (pad_length & 0x0F),
            (if full_message { 0x80 } else { 0 }) | (blocks_to_follow & 0x7F),
            (if synchronize { 0x80 } else { 0 })
                | ((send_seq & 0x07) << 4)
                | (fragment_seq & 0x0F),
        ),
        DpfFields::Response {
            sap,
            blocks_to_follow,
            response_class,
            response_type,
            response_status,
        } => (
            sap << 4,
            blocks_to_follow & 0x7F,
            ((response_class & 0x03) << 6)
                | ((response_type & 0x07) << 3)
                | (response_status & 0x07),
        ),
        DpfFields::DefinedShort {
            sap,
            blocks_to_follow,
            full_message,
            synchronize,
            data_format,
            pad_length,
        } => (
            (sap << 4) | (blocks_to_follow & 0x0F),
            (if full_message { 0x01 } else { 0 })
                | (if synchronize { 0x02 } else { 0 })
                | ((data_format & 0x3F) << 2),
            pad_length,
        ),
        DpfFields::DefinedRaw {
            sap,
            blocks_to_follow,
            full_message,
            synchronize,
            dst_port,
            src_port,
        } => (
            (sap << 4) | (blocks_to_follow & 0x0F),
            (if full_message { 0x01 } else { 0 })
                | (if synchronize { 0x02 } else { 0 })
                | ((dst_port & 0x07) << 2)
                | ((src_port & 0x07) << 5),
            0,
        ),
        DpfFields::Proprietary => (0, 0, 0),
    };
    data[1] = byte1_extra;
    data[8] = byte8;
    data[9] = byte9;

    apply_crc(&mut data);
    bptc::encode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfirmed_data_header_roundtrips() {
        let header = DataHeader {
            group: true,
            answer_required: false,
            dpf: Dpf::UnconfirmedData,
            dst_id: 0xAABBCC,
            src_id: 0x010203,
            fields: DpfFields::UnconfirmedData {
                sap: 3,
                pad_length: 2,
                full_message: true,
                blocks_to_follow: 5,
                fragment_seq: 1,
            },
        };
        let block = encode(&header);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.dst_id, header.dst_id);
        assert_eq!(decoded.src_id, header.src_id);
        assert_eq!(decoded.dpf, Dpf::UnconfirmedData);
        assert_eq!(decoded.blocks_to_follow(), Some(5));
    }

    #[test]
    fn confirmed_data_header_roundtrips() {
        let header = DataHeader {
            group: false,
            answer_required: true,
            dpf: Dpf::ConfirmedData,
            dst_id: 1,
            src_id: 2,
            fields: DpfFields::ConfirmedData {
                sap: 0,
                pad_length: 0,
                full_message: false,
                blocks_to_follow: 10,
                synchronize: true,
                send_seq: 5,
                fragment_seq: 3,
            },
        };
        let block = encode(&header);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.blocks_to_follow(), Some(10));
        match decoded.fields {
            DpfFields::ConfirmedData {
                synchronize,
                send_seq,
                fragment_seq,
                ..
            } => {
                assert!(synchronize);
                assert_eq!(send_seq, 5);
                assert_eq!(fragment_seq, 3);
            }
            other => panic!("unexpected fields variant: {other:?}"),
        }
    }

    #[test]
    fn udt_header_roundtrips() {
        let header = DataHeader {
            group: true,
            answer_required: false,
            dpf: Dpf::Udt,
            dst_id: 0xFFFFFF,
            src_id: 0x000001,
            fields: DpfFields::Udt {
                sap: 0,
                data_format: 5,
                blocks_to_follow: 2,
                pad_length: 3,
                supplemental: false,
                protect: false,
                udt_opcode: 1,
            },
        };
        let block = encode(&header);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.blocks_to_follow(), Some(2));
    }

    #[test]
    fn proprietary_header_has_no_addresses() {
        let header = DataHeader {
            group: false,
            answer_required: false,
            dpf: Dpf::Proprietary,
            dst_id: 0,
            src_id: 0,
            fields: DpfFields::Proprietary,
        };
        let block = encode(&header);
        let decoded = decode(&block).unwrap();
        assert_eq!(decoded.dpf, Dpf::Proprietary);
        assert_eq!(decoded.blocks_to_follow(), None);
    }

    #[test]
    fn tampered_crc_field_is_rejected() {
        let mut data = [0u8; BLOCK_LENGTH_BYTES];
        data[0] = Dpf::UnconfirmedData.to_wire();
        apply_crc(&mut data);
        data[CRC_LO] ^= 0x01;
        assert!(!verify_and_unmask(&mut data));
    }

    #[test]
    fn zeroed_crc_field_is_trusted() {
        let mut data = [0u8; BLOCK_LENGTH_BYTES];
        data[0] = Dpf::UnconfirmedData.to_wire();
        assert!(verify_and_unmask(&mut data));
    }
}
