// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wire framing (spec.md §4.5, §6): every datagram carries a 12-byte RTP
//! header, a fixed framing header `{function, subfunction, peer-id,
//! stream-id}`, and an optional AES-wrapped preshared-key envelope.
//!
//! The numeric `NET_FUNC_*`/`NET_*_SUBFUNC_*` byte values below are not
//! reproduced from a specific upstream header (none shipped in the
//! retrieved `original_source` extract beyond their symbolic names in
//! `FNENetwork.cpp`); they are assigned here in the same order the
//! reference dispatch `switch` enumerates them, which is sufficient for
//! interoperability between this crate's own encoder and decoder.

/// Sentinel RTP sequence number marking the final packet of a call stream.
pub const RTP_END_OF_CALL_SEQ: u16 = 0xFFFE;

/// 12-byte RTP header (RFC 3550), version 2, no extension/CSRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

const RTP_VERSION: u8 = 2;

impl RtpHeader {
    #[must_use]
    pub fn encode(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0] = RTP_VERSION << 6;
        out[1] = (if self.marker { 0x80 } else { 0 }) | (self.payload_type & 0x7F);
        out[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        out
    }

    /// # Errors
    /// Returns [`FrameError::BadRtpVersion`] if the header's version field
    /// is not RTP version 2.
    pub fn decode(bytes: &[u8; 12]) -> Result<Self, FrameError> {
        let version = bytes[0] >> 6;
        if version != RTP_VERSION {
            return Err(FrameError::BadRtpVersion(version));
        }
        Ok(Self {
            marker: bytes[1] & 0x80 != 0,
            payload_type: bytes[1] & 0x7F,
            sequence: u16::from_be_bytes([bytes[2], bytes[3]]),
            timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ssrc: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// Top-level framing header function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetFunc {
    Protocol,
    Rptl,
    Rptk,
    Rptc,
    RptClosing,
    Ping,
    Pong,
    GrantReq,
    Transfer,
    Announce,
    Master,
    MstClosing,
    Ack,
    Nak,
    Unknown(u8),
}

impl NetFunc {
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Protocol => 0,
            Self::Rptl => 1,
            Self::Rptk => 2,
            Self::Rptc => 3,
            Self::RptClosing => 4,
            Self::Ping => 5,
            Self::Pong => 6,
            Self::GrantReq => 7,
            Self::Transfer => 8,
            Self::Announce => 9,
            Self::Master => 10,
            Self::MstClosing => 11,
            Self::Ack => 12,
            Self::Nak => 13,
            Self::Unknown(v) => v,
        }
    }

    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Protocol,
            1 => Self::Rptl,
            2 => Self::Rptk,
            3 => Self::Rptc,
            4 => Self::RptClosing,
            5 => Self::Ping,
            6 => Self::Pong,
            7 => Self::GrantReq,
            8 => Self::Transfer,
            9 => Self::Announce,
            10 => Self::Master,
            11 => Self::MstClosing,
            12 => Self::Ack,
            13 => Self::Nak,
            other => Self::Unknown(other),
        }
    }
}

/// Subfunction code, interpreted relative to the enclosing [`NetFunc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetSubfunc {
    Nop,
    ProtocolDmr,
    ProtocolP25,
    ProtocolNxdn,
    /// KMM traffic carried over the `PROTOCOL` function (spec.md §4.7):
    /// the patch engine's key-request/delivery exchange with the FNE.
    ProtocolKmm,
    AnncGrpAffil,
    AnncUnitReg,
    AnncUnitDereg,
    AnncAffils,
    TransferActivity,
    TransferDiag,
    Unknown(u8),
}

impl NetSubfunc {
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Nop => 0,
            Self::ProtocolDmr => 1,
            Self::ProtocolP25 => 2,
            Self::ProtocolNxdn => 3,
            Self::ProtocolKmm => 4,
            Self::AnncGrpAffil => 1,
            Self::AnncUnitReg => 2,
            Self::AnncUnitDereg => 3,
            Self::AnncAffils => 4,
            Self::TransferActivity => 1,
            Self::TransferDiag => 2,
            Self::Unknown(v) => v,
        }
    }
}

const FRAME_HEADER_LENGTH_BYTES: usize = 10;

/// Framing header: `function(1) | subfunction(1) | peer-id(4) | stream-id(4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FneHeader {
    pub function: NetFunc,
    pub subfunction: u8,
    pub peer_id: u32,
    pub stream_id: u32,
}

impl FneHeader {
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_HEADER_LENGTH_BYTES] {
        let mut out = [0u8; FRAME_HEADER_LENGTH_BYTES];
        out[0] = self.function.to_wire();
        out[1] = self.subfunction;
        out[2..6].copy_from_slice(&self.peer_id.to_be_bytes());
        out[6..10].copy_from_slice(&self.stream_id.to_be_bytes());
        out
    }

    #[must_use]
    pub fn decode(bytes: &[u8; FRAME_HEADER_LENGTH_BYTES]) -> Self {
        Self {
            function: NetFunc::from_wire(bytes[0]),
            subfunction: bytes[1],
            peer_id: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            stream_id: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        }
    }
}

/// A fully parsed inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub rtp: RtpHeader,
    pub header: FneHeader,
    pub body: Vec<u8>,
}

/// Transport decode failure (spec.md §7 "malformed RTP header, short body").
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("datagram too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("unsupported RTP version {0}")]
    BadRtpVersion(u8),
}

const MIN_DATAGRAM_LEN: usize = 12 + FRAME_HEADER_LENGTH_BYTES;

/// Parse a raw UDP datagram into its RTP header, framing header, and body.
///
/// # Errors
/// Returns [`FrameError::TooShort`] if the datagram is shorter than a bare
/// RTP + framing header, or [`FrameError::BadRtpVersion`] if the RTP
/// version field is not 2.
pub fn parse_datagram(bytes: &[u8]) -> Result<Datagram, FrameError> {
    if bytes.len() < MIN_DATAGRAM_LEN {
        return Err(FrameError::TooShort {
            expected: MIN_DATAGRAM_LEN,
            actual: bytes.len(),
        });
    }
    let mut rtp_bytes = [0u8; 12];
    rtp_bytes.copy_from_slice(&bytes[..12]);
    let rtp = RtpHeader::decode(&rtp_bytes)?;

    let mut header_bytes = [0u8; FRAME_HEADER_LENGTH_BYTES];
    header_bytes.copy_from_slice(&bytes[12..12 + FRAME_HEADER_LENGTH_BYTES]);
    let header = FneHeader::decode(&header_bytes);

    let body = bytes[12 + FRAME_HEADER_LENGTH_BYTES..].to_vec();
    Ok(Datagram { rtp, header, body })
}

/// Serialize an outbound datagram.
#[must_use]
pub fn build_datagram(rtp: &RtpHeader, header: &FneHeader, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + FRAME_HEADER_LENGTH_BYTES + body.len());
    out.extend_from_slice(&rtp.encode());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtp_header_roundtrips() {
        let rtp = RtpHeader {
            marker: true,
            payload_type: 0x62,
            sequence: 42,
            timestamp: 0xDEAD_BEEF,
            ssrc: 0x1234_5678,
        };
        let bytes = rtp.encode();
        assert_eq!(RtpHeader::decode(&bytes).unwrap(), rtp);
    }

    #[test]
    fn rtp_header_rejects_bad_version() {
        let mut bytes = [0u8; 12];
        bytes[0] = 0x01 << 6;
        assert_eq!(
            RtpHeader::decode(&bytes).unwrap_err(),
            FrameError::BadRtpVersion(1)
        );
    }

    #[test]
    fn fne_header_roundtrips() {
        let header = FneHeader {
            function: NetFunc::Rptl,
            subfunction: 0,
            peer_id: 900001,
            stream_id: 0,
        };
        let bytes = header.encode();
        assert_eq!(FneHeader::decode(&bytes), header);
    }

    #[test]
    fn datagram_roundtrips() {
        let rtp = RtpHeader {
            marker: false,
            payload_type: 0,
            sequence: RTP_END_OF_CALL_SEQ,
            timestamp: 0,
            ssrc: 1,
        };
        let header = FneHeader {
            function: NetFunc::Protocol,
            subfunction: NetSubfunc::ProtocolP25.to_wire(),
            peer_id: 900001,
            stream_id: 777,
        };
        let body = vec![1, 2, 3, 4, 5];
        let datagram_bytes = build_datagram(&rtp, &header, &body);
        let parsed = parse_datagram(&datagram_bytes).unwrap();
        assert_eq!(parsed.rtp, rtp);
        assert_eq!(parsed.header, header);
        assert_eq!(parsed.body, body);
    }

    #[test]
    fn short_datagram_is_rejected() {
        assert!(matches!(
            parse_datagram(&[0u8; 4]),
            Err(FrameError::TooShort { .. })
        ));
    }

    #[test]
    fn net_func_roundtrips_known_values() {
        for func in [
            NetFunc::Protocol,
            NetFunc::Rptl,
            NetFunc::Rptk,
            NetFunc::Rptc,
            NetFunc::Ping,
            NetFunc::Pong,
            NetFunc::Transfer,
            NetFunc::Announce,
            NetFunc::Nak,
        ] {
            assert_eq!(NetFunc::from_wire(func.to_wire()), func);
        }
    }
}
