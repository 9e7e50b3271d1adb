// SPDX-License-Identifier: Apache-2.0 OR MIT

//! BPTC(196,96): Block Product Turbo Code used for DMR data headers and
//! full link control, per ETSI TS 102 361-1 section 9.1.
//!
//! A 96-bit payload (plus 4 padding bits) is arranged as 9 rows x 11
//! information columns, each row protected by Hamming(15,11,3) and each of
//! the 11 (+ 2 check) columns protected by Hamming(13,9,3). The result is a
//! 13x15 = 195-bit matrix; position (0,0) is a fixed known bit, giving the
//! traditional "196 bit" block size with one implicit bit.

use crate::bits::{get_bit, set_bit};
use crate::hamming::{h13_9_3, h15_11_3};

const ROWS: usize = 13;
const COLS: usize = 15;
const INFO_COLS: usize = 11;
const PAYLOAD_BITS: usize = 96;

/// Encode a 96-bit (12-byte) payload into a 196-bit BPTC block, packed
/// MSB-first into 25 bytes (the last 4 bits of the final byte are padding).
#[must_use]
pub fn encode(payload: &[u8; 12]) -> [u8; 25] {
    // Lay the 96 payload bits plus 4 pad bits (always zero) into the 11x9
    // information grid (row-major, skipping the reserved bit at (0,0)).
    let mut bits = vec![false; PAYLOAD_BITS];
    for (i, b) in bits.iter_mut().enumerate() {
        *b = get_bit(payload, i);
    }
    bits.extend(std::iter::repeat(false).take(4)); // 4-bit pad -> 100 bits total

    let mut matrix = [[false; COLS]; ROWS];
    let mut idx = 0;
    for row in matrix.iter_mut().take(9) {
        for col in row.iter_mut().take(INFO_COLS) {
            *col = bits[idx];
            idx += 1;
        }
    }

    // Row Hamming(15,11) across rows 0..9, producing the 4 row-parity columns.
    for row in matrix.iter_mut().take(9) {
        let mut data = [false; 11];
        data.copy_from_slice(&row[..11]);
        let cw = h15_11_3::encode(&data);
        row.copy_from_slice(&cw);
    }

    // Column Hamming(13,9) down each of the 15 columns, producing rows 9..13.
    for col in 0..COLS {
        let mut data = [false; 9];
        for (r, slot) in data.iter_mut().enumerate() {
            *slot = matrix[r][col];
        }
        let cw = h13_9_3::encode(&data);
        for r in 0..ROWS {
            matrix[r][col] = cw[r];
        }
    }

    let mut flat = vec![false; ROWS * COLS];
    let mut k = 0;
    for row in &matrix {
        for &b in row {
            flat[k] = b;
            k += 1;
        }
    }

    let mut out = [0u8; 25];
    for (i, &b) in flat.iter().enumerate() {
        set_bit(&mut out, i, b);
    }
    out
}

/// Decode a 196-bit BPTC block (25 bytes, top 195 bits significant) back
/// into a 96-bit payload.
///
/// Per spec.md §4.1, at most one row-and-column correction pass is applied;
/// if parity still fails afterward the best-effort payload is returned and
/// the caller must verify the result via the downstream CRC.
#[must_use]
pub fn decode(block: &[u8; 25]) -> [u8; 12] {
    let mut matrix = [[false; COLS]; ROWS];
    let mut idx = 0;
    for row in matrix.iter_mut() {
        for col in row.iter_mut() {
            *col = get_bit(block, idx);
            idx += 1;
        }
    }

    // One column-correction pass.
    for col in 0..COLS {
        let mut cw = [false; 13];
        for r in 0..ROWS {
            cw[r] = matrix[r][col];
        }
        let (data, _) = h13_9_3::decode(&cw);
        for (r, &b) in data.iter().enumerate() {
            matrix[r][col] = b;
        }
    }

    // One row-correction pass over the information rows.
    for row in matrix.iter_mut().take(9) {
        let mut cw = [false; 15];
        cw.copy_from_slice(row);
        let (data, _) = h15_11_3::decode(&cw);
        row[..11].copy_from_slice(&data);
    }

    let mut bits = Vec::with_capacity(PAYLOAD_BITS);
    for row in matrix.iter().take(9) {
        bits.extend_from_slice(&row[..INFO_COLS]);
    }
    bits.truncate(PAYLOAD_BITS);

    let mut out = [0u8; 12];
    for (i, &b) in bits.iter().enumerate() {
        set_bit(&mut out, i, b);
    }
    out
}
