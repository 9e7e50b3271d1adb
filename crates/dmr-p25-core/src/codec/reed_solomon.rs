// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generic Reed-Solomon(n,k) codec over GF(2^8), parametrized by codeword
//! length `n` and data length `k`. Shared by DMR's RS(12,9) full link
//! control and P25's RS(24,12,13) voice LC and RS(36,20) HDU.
//!
//! Generator roots are consecutive powers of the field's primitive element
//! starting at `alpha^0`, matching the TIA-102 Annex convention referenced
//! by spec.md.

use super::gf256::{self, mul};

/// A Reed-Solomon(n,k) code instance. `n` is the total codeword length in
/// bytes, `k` the number of data bytes; `n - k` parity bytes are appended.
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    n: usize,
    k: usize,
    generator: Vec<u8>,
}

impl ReedSolomon {
    /// Build a new RS(n,k) instance, precomputing the generator polynomial.
    #[must_use]
    pub fn new(n: usize, k: usize) -> Self {
        assert!(n > k, "RS codeword length must exceed data length");
        let nsym = n - k;
        let mut generator = vec![1u8];
        for i in 0..nsym {
            let root = gf256::pow(2, i as u32);
            let mut next = vec![0u8; generator.len() + 1];
            for (j, &g) in generator.iter().enumerate() {
                next[j] ^= mul(g, root);
                next[j + 1] ^= g;
            }
            generator = next;
        }
        Self { n, k, generator }
    }

    #[must_use]
    pub fn n(&self) -> usize {
        self.n
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Encode `data` (exactly `k` bytes) into a systematic `n`-byte codeword
    /// (data bytes followed by `n-k` parity bytes).
    #[must_use]
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        assert_eq!(data.len(), self.k, "RS encode expects exactly k data bytes");
        let nsym = self.n - self.k;
        let mut remainder = vec![0u8; nsym];

        for &d in data {
            let factor = d ^ remainder[0];
            remainder.rotate_left(1);
            remainder[nsym - 1] = 0;
            if factor != 0 {
                for (i, &g) in self.generator.iter().enumerate().take(nsym) {
                    remainder[i] ^= mul(g, factor);
                }
            }
        }

        let mut out = Vec::with_capacity(self.n);
        out.extend_from_slice(data);
        out.extend_from_slice(&remainder);
        out
    }

    /// Compute syndromes for a received codeword; all-zero means no error.
    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        let nsym = self.n - self.k;
        (0..nsym)
            .map(|i| {
                let root = gf256::pow(2, i as u32);
                let mut acc = 0u8;
                for &byte in received {
                    acc = mul(acc, root) ^ byte;
                }
                acc
            })
            .collect()
    }

    /// Decode a received `n`-byte codeword, correcting up to `(n-k)/2` byte
    /// errors. Returns the corrected `k`-byte data on success.
    ///
    /// # Errors
    /// Returns [`RsError::Uncorrectable`] when the error count exceeds the
    /// code's correction capability, and [`RsError::BadLength`] for a
    /// malformed input.
    pub fn decode(&self, received: &[u8]) -> Result<Vec<u8>, RsError> {
        if received.len() != self.n {
            return Err(RsError::BadLength {
                expected: self.n,
                actual: received.len(),
            });
        }

        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok(received[..self.k].to_vec());
        }

        let nsym = self.n - self.k;
        let sigma = berlekamp_massey(&syndromes, nsym);
        let error_positions = chien_search(&sigma, self.n);

        let max_errors = nsym / 2;
        if error_positions.is_empty() || error_positions.len() > max_errors {
            return Err(RsError::Uncorrectable);
        }

        let magnitudes = forney(&syndromes, &sigma, &error_positions, self.n);

        let mut corrected = received.to_vec();
        for (&pos, &mag) in error_positions.iter().zip(magnitudes.iter()) {
            corrected[pos] ^= mag;
        }

        // Verify the correction actually zeroes the syndromes; if not, the
        // error pattern was beyond this code's guaranteed capability.
        if self.syndromes(&corrected).iter().any(|&s| s != 0) {
            return Err(RsError::Uncorrectable);
        }

        Ok(corrected[..self.k].to_vec())
    }

    /// Check only: `true` if the received codeword has zero syndrome.
    #[must_use]
    pub fn check(&self, received: &[u8]) -> bool {
        received.len() == self.n && self.syndromes(received).iter().all(|&s| s == 0)
    }
}

/// Errors from [`ReedSolomon::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RsError {
    #[error("reed-solomon codeword uncorrectable")]
    Uncorrectable,
    #[error("reed-solomon codeword length mismatch: expected {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

/// Berlekamp-Massey algorithm: derive the error-locator polynomial from syndromes.
fn berlekamp_massey(syndromes: &[u8], nsym: usize) -> Vec<u8> {
    let mut c = vec![1u8];
    let mut b = vec![1u8];
    let mut l = 0usize;
    let mut m = 1usize;
    let mut bb = 1u8;

    for n in 0..nsym {
        let mut delta = syndromes[n];
        for i in 1..=l {
            if i < c.len() {
                delta ^= mul(c[i], syndromes[n - i]);
            }
        }

        if delta == 0 {
            m += 1;
        } else if 2 * l <= n {
            let t = c.clone();
            let coef = gf256::div(delta, bb);
            let mut shifted = vec![0u8; m];
            shifted.extend_from_slice(&b);
            extend_xor(&mut c, &shifted, coef);
            l = n + 1 - l;
            b = t;
            bb = delta;
            m = 1;
        } else {
            let coef = gf256::div(delta, bb);
            let mut shifted = vec![0u8; m];
            shifted.extend_from_slice(&b);
            extend_xor(&mut c, &shifted, coef);
            m += 1;
        }
    }

    c
}

fn extend_xor(c: &mut Vec<u8>, shifted: &[u8], coef: u8) {
    if c.len() < shifted.len() {
        c.resize(shifted.len(), 0);
    }
    for (i, &s) in shifted.iter().enumerate() {
        c[i] ^= mul(s, coef);
    }
}

/// Chien search: evaluate the error locator at every codeword position to
/// find roots, which give the error positions (as indices from the start).
fn chien_search(sigma: &[u8], n: usize) -> Vec<usize> {
    let mut positions = Vec::new();
    for i in 0..n {
        let x_inv = gf256::pow(2, i as u32);
        let mut acc = 0u8;
        for (j, &s) in sigma.iter().enumerate() {
            acc ^= mul(s, gf256::pow(x_inv, j as u32));
        }
        if acc == 0 {
            // Root at alpha^-i corresponds to an error at position n-1-i.
            if let Some(pos) = (n - 1).checked_sub(i) {
                positions.push(pos);
            }
        }
    }
    positions
}

/// Forney's algorithm: compute error magnitudes at the located positions.
fn forney(syndromes: &[u8], sigma: &[u8], positions: &[usize], n: usize) -> Vec<u8> {
    // Error evaluator polynomial: omega(x) = [S(x) * sigma(x)] mod x^(n-k)
    let nsym = syndromes.len();
    let mut omega = vec![0u8; nsym];
    for i in 0..nsym {
        let mut acc = 0u8;
        for j in 0..=i {
            if j < sigma.len() {
                acc ^= mul(sigma[j], syndromes[i - j]);
            }
        }
        omega[i] = acc;
    }

    positions
        .iter()
        .map(|&pos| {
            let x_inv = gf256::pow(2, (n - 1 - pos) as u32);
            let mut omega_val = 0u8;
            for (j, &o) in omega.iter().enumerate() {
                omega_val ^= mul(o, gf256::pow(x_inv, j as u32));
            }
            // sigma'(x) — formal derivative: odd-indexed terms only.
            let mut sigma_deriv = 0u8;
            let mut j = 1;
            while j < sigma.len() {
                sigma_deriv ^= mul(sigma[j], gf256::pow(x_inv, (j - 1) as u32));
                j += 2;
            }
            if sigma_deriv == 0 {
                0
            } else {
                gf256::div(omega_val, sigma_deriv)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rs129_roundtrip_no_error() {
        let rs = ReedSolomon::new(12, 9);
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let encoded = rs.encode(&data);
        assert_eq!(encoded.len(), 12);
        assert!(rs.check(&encoded));
        let decoded = rs.decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rs129_detects_single_byte_corruption() {
        let rs = ReedSolomon::new(12, 9);
        let data = [10u8, 20, 30, 40, 50, 60, 70, 80, 90];
        let mut encoded = rs.encode(&data);
        encoded[3] ^= 0xFF;
        assert!(!rs.check(&encoded));
    }

    #[test]
    fn rs129_corrects_single_byte_error() {
        let rs = ReedSolomon::new(12, 9);
        let data = [10u8, 20, 30, 40, 50, 60, 70, 80, 90];
        let mut encoded = rs.encode(&data);
        encoded[5] ^= 0x42;
        let decoded = rs.decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rs_24_12_corrects_up_to_six_errors() {
        let rs = ReedSolomon::new(24, 12);
        let data: Vec<u8> = (0..12).collect();
        let mut encoded = rs.encode(&data);
        for i in 0..6 {
            encoded[i * 2] ^= 0x55;
        }
        let decoded = rs.decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn rs_36_20_roundtrip() {
        let rs = ReedSolomon::new(36, 20);
        let data: Vec<u8> = (0..20).map(|i| i * 3).collect();
        let encoded = rs.encode(&data);
        let decoded = rs.decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn bad_length_is_rejected() {
        let rs = ReedSolomon::new(12, 9);
        let err = rs.decode(&[0u8; 11]).unwrap_err();
        assert_eq!(
            err,
            RsError::BadLength {
                expected: 12,
                actual: 11
            }
        );
    }
}
