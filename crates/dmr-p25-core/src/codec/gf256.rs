// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GF(2^8) arithmetic over the primitive polynomial `x^8+x^4+x^3+x^2+1`
//! (`0x11D`), shared by every Reed-Solomon variant in this crate (DMR's
//! RS(12,9), P25's RS(24,12,13) and RS(36,20)).

const PRIM_POLY: u16 = 0x11D;

/// log/antilog tables, built once at first use.
pub struct Gf256Tables {
    pub exp: [u8; 512],
    pub log: [u8; 256],
}

impl Gf256Tables {
    fn build() -> Self {
        let mut exp = [0u8; 512];
        let mut log = [0u8; 256];
        let mut x: u16 = 1;
        for i in 0..255usize {
            exp[i] = x as u8;
            log[x as usize] = i as u8;
            x <<= 1;
            if x & 0x100 != 0 {
                x ^= PRIM_POLY;
            }
        }
        for i in 255..512 {
            exp[i] = exp[i - 255];
        }
        Self { exp, log }
    }
}

std::thread_local! {
    static TABLES: Gf256Tables = Gf256Tables::build();
}

/// Multiply two elements of GF(2^8).
#[must_use]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    TABLES.with(|t| {
        let la = t.log[a as usize] as usize;
        let lb = t.log[b as usize] as usize;
        t.exp[la + lb]
    })
}

/// Divide `a` by `b` in GF(2^8). Panics if `b == 0`.
#[must_use]
pub fn div(a: u8, b: u8) -> u8 {
    assert!(b != 0, "division by zero in GF(256)");
    if a == 0 {
        return 0;
    }
    TABLES.with(|t| {
        let la = t.log[a as usize] as usize;
        let lb = t.log[b as usize] as usize;
        t.exp[(la + 255 - lb) % 255 + 255]
    })
}

/// Raise `a` to `power` in GF(2^8).
#[must_use]
pub fn pow(a: u8, power: u32) -> u8 {
    if a == 0 {
        return 0;
    }
    TABLES.with(|t| {
        let la = t.log[a as usize] as u32;
        let e = (la * power) % 255;
        t.exp[e as usize]
    })
}

/// Multiplicative inverse of `a` in GF(2^8). Panics if `a == 0`.
#[must_use]
pub fn inv(a: u8) -> u8 {
    assert!(a != 0, "zero has no inverse in GF(256)");
    TABLES.with(|t| {
        let la = t.log[a as usize] as usize;
        t.exp[255 - la]
    })
}
