// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trellis 3/4 rate FEC used by P25 TSBK and PDU blocks.
//!
//! A rate-1/2, constraint-length-4 convolutional code (generator
//! polynomials `0b1101`/`0b1111`, the same pair used by most open
//! half-rate trellis implementations) is punctured down to rate 3/4 by
//! dropping one parity bit in every four, then Viterbi-decoded on the
//! receive side. 12 bytes (96 bits) of payload encode to a 196-bit block
//! (98 dibits), matching the block sizes used elsewhere in this crate.

const CONSTRAINT_LEN: u32 = 4;
const POLY_A: u32 = 0b1101;
const POLY_B: u32 = 0b1111;
const PAYLOAD_BITS: usize = 96;
const FLUSH_BITS: usize = 4; // trailing zero bits to flush the shift register
const ENCODED_BITS: usize = (PAYLOAD_BITS + FLUSH_BITS) * 2; // rate 1/2 before puncture

/// Puncture pattern: keep 3 of every 4 encoded bits (drop the 4th), giving
/// rate 3/4 from the underlying rate-1/2 code.
fn is_punctured(index: usize) -> bool {
    index % 4 == 3
}

fn convolve(bit: u32, state: u32) -> (bool, bool) {
    let reg = (state << 1) | bit;
    let a = (reg & POLY_A).count_ones() % 2 == 1;
    let b = (reg & POLY_B).count_ones() % 2 == 1;
    (a, b)
}

/// Encode a 96-bit (12-byte) payload into a 196-bit Trellis 3/4 block,
/// packed MSB-first into 25 bytes (the top 171 bits are significant: 98
/// rate-1/2 dibits minus punctured bits = 171; remaining bits are zero pad).
#[must_use]
pub fn encode(payload: &[u8; 12]) -> Vec<u8> {
    let mut bits: Vec<u32> = (0..PAYLOAD_BITS)
        .map(|i| u32::from(crate::bits::get_bit(payload, i)))
        .collect();
    bits.extend(std::iter::repeat(0u32).take(FLUSH_BITS));

    let mut state = 0u32;
    let mask = (1 << (CONSTRAINT_LEN - 1)) - 1;
    let mut encoded = Vec::with_capacity(ENCODED_BITS);
    for &bit in &bits {
        let (a, b) = convolve(bit, state);
        encoded.push(a);
        encoded.push(b);
        state = ((state << 1) | bit) & mask;
    }

    let punctured: Vec<bool> = encoded
        .into_iter()
        .enumerate()
        .filter_map(|(i, b)| if is_punctured(i) { None } else { Some(b) })
        .collect();

    crate::bits::pack_bits(&punctured)
}

/// Trellis decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrellisError {
    #[error("trellis block too short")]
    TooShort,
}

/// Decode a punctured Trellis 3/4 block back into the original 96-bit payload
/// via hard-decision Viterbi, treating punctured positions as erasures that
/// never contribute branch-metric cost.
///
/// # Errors
/// Returns [`TrellisError::TooShort`] if fewer bits than the code expects
/// are supplied.
pub fn decode(block: &[u8]) -> Result<[u8; 12], TrellisError> {
    let total_unpunctured = ENCODED_BITS - ENCODED_BITS / 4;
    let bits = crate::bits::unpack_bits(block, total_unpunctured.min(block.len() * 8));
    if bits.len() < total_unpunctured {
        return Err(TrellisError::TooShort);
    }

    // Reinsert erasure placeholders at punctured positions.
    let mut full = Vec::with_capacity(ENCODED_BITS);
    let mut it = bits.iter();
    for i in 0..ENCODED_BITS {
        if is_punctured(i) {
            full.push(None);
        } else {
            full.push(it.next().copied());
        }
    }

    let num_symbols = PAYLOAD_BITS + FLUSH_BITS;
    let num_states = 1usize << (CONSTRAINT_LEN - 1);
    const INF: u32 = u32::MAX / 2;

    let mut path_metric = vec![INF; num_states];
    path_metric[0] = 0;
    let mut backptr: Vec<Vec<(usize, u32)>> = Vec::with_capacity(num_symbols);

    for sym in 0..num_symbols {
        let rcv_a = full[sym * 2];
        let rcv_b = full[sym * 2 + 1];
        let mut next_metric = vec![INF; num_states];
        let mut next_back = vec![(0usize, 0u32); num_states];

        for state in 0..num_states {
            if path_metric[state] >= INF {
                continue;
            }
            for &bit in &[0u32, 1u32] {
                let (a, b) = convolve(bit, state as u32);
                let mut cost = path_metric[state];
                if let Some(r) = rcv_a {
                    if r != a {
                        cost += 1;
                    }
                }
                if let Some(r) = rcv_b {
                    if r != b {
                        cost += 1;
                    }
                }
                let next_state = ((state as u32) << 1 | bit) as usize
                    & (num_states - 1);
                if cost < next_metric[next_state] {
                    next_metric[next_state] = cost;
                    next_back[next_state] = (state, bit);
                }
            }
        }

        path_metric = next_metric;
        backptr.push(next_back);
    }

    // Trace back from the lowest-cost final state (flush bits force state 0).
    let mut best_state = 0usize;
    let mut best_cost = path_metric[0];
    for (s, &m) in path_metric.iter().enumerate() {
        if m < best_cost {
            best_cost = m;
            best_state = s;
        }
    }

    let mut decoded_bits = vec![0u32; num_symbols];
    let mut state = best_state;
    for sym in (0..num_symbols).rev() {
        let (prev_state, bit) = backptr[sym][state];
        decoded_bits[sym] = bit;
        state = prev_state;
    }

    let mut out = [0u8; 12];
    for i in 0..PAYLOAD_BITS {
        crate::bits::set_bit(&mut out, i, decoded_bits[i] == 1);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_zero_payload() {
        let payload = [0u8; 12];
        let encoded = encode(&payload);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn roundtrip_arbitrary_payload() {
        fastrand::seed(7);
        for _ in 0..8 {
            let mut payload = [0u8; 12];
            fastrand::fill(&mut payload);
            let encoded = encode(&payload);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded, payload);
        }
    }

    #[test]
    fn decode_corrects_light_bit_errors() {
        let payload: [u8; 12] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let mut encoded = encode(&payload);
        // Flip a single bit; the Viterbi decoder should still find the
        // maximum-likelihood path back to the original payload.
        encoded[2] ^= 0x10;
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn too_short_block_is_rejected() {
        let err = decode(&[0u8; 2]).unwrap_err();
        assert_eq!(err, TrellisError::TooShort);
    }
}
