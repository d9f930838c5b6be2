//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! Rust native implementation of
//! [AES](https://nvlpubs.nist.gov/nistpubs/FIPS/NIST.FIPS.197-upd1.pdf) having
//! in mind the approach that is done in-circuit; this means that it is not
//! written in the most rust idiomatic way, but simulating the behavior of the
//! gadgets in [`crate::circuit_aes`].

use std::array;

use anyhow::{ensure, Result};

use crate::constants::{AES_POLY, RCON, SBOX, SBOX_AFFINE_CONST};

/// AES state, `s[row][col]`.
pub type State = [[u8; 4]; 4];

/// Column-major load of a block into the state: `s[r][c] = block[r + 4c]`.
pub fn state_from_block(block: &[u8; 16]) -> State {
    array::from_fn(|r| array::from_fn(|c| block[r + 4 * c]))
}

/// Inverse of [`state_from_block`].
pub fn flatten_state(s: State) -> [u8; 16] {
    array::from_fn(|i| s[i % 4][i / 4])
}

/// Splits a flat key into NK big-endian words.
pub fn key_words<const NK: usize>(key: &[u8]) -> Result<[[u8; 4]; NK]> {
    ensure!(
        key.len() == 4 * NK,
        "key length {} does not match NK={} ({} bytes)",
        key.len(),
        NK,
        4 * NK
    );
    Ok(array::from_fn(|i| array::from_fn(|j| key[4 * i + j])))
}

/// encrypts an AES block (16 bytes). NR determines the number of rounds,
/// where AES-128: NR=10, AES-192: NR=12, AES-256: NR=14.
pub fn encrypt_block<const NR: usize>(input: &[u8; 16], w: &[[u8; 4]; 4 * (NR + 1)]) -> [u8; 16]
where
    [(); 4 * (NR + 1)]:,
{
    let mut s = state_from_block(input);

    s = add_round_key(s, &w[0..4]);

    for round in 1..NR {
        s = sub_bytes(s);
        s = shift_rows(s);
        s = mix_columns(s);
        s = add_round_key(s, &w[4 * round..4 * round + 4]);
    }

    s = sub_bytes(s);
    s = shift_rows(s);
    s = add_round_key(s, &w[4 * NR..4 * NR + 4]);

    flatten_state(s)
}

pub fn sub_bytes(s: State) -> State {
    s.map(|row| row.map(|b| SBOX[b as usize]))
}

/// Row r is rotated left by r positions. Pure rewiring, shared with the circuit.
pub fn shift_rows<T: Copy>(s: [[T; 4]; 4]) -> [[T; 4]; 4] {
    array::from_fn(|i| array::from_fn(|j| s[i][(i + j) % 4]))
}

pub fn mix_columns(s: State) -> State {
    let mut r = [[0u8; 4]; 4];
    for c in 0..4 {
        r[0][c] = gf_2_8_mul(0x02, s[0][c]) ^ gf_2_8_mul(0x03, s[1][c]) ^ s[2][c] ^ s[3][c];
        r[1][c] = s[0][c] ^ gf_2_8_mul(0x02, s[1][c]) ^ gf_2_8_mul(0x03, s[2][c]) ^ s[3][c];
        r[2][c] = s[0][c] ^ s[1][c] ^ gf_2_8_mul(0x02, s[2][c]) ^ gf_2_8_mul(0x03, s[3][c]);
        r[3][c] = gf_2_8_mul(0x03, s[0][c]) ^ s[1][c] ^ s[2][c] ^ gf_2_8_mul(0x02, s[3][c]);
    }
    r
}

/// multiplication by x in GF(2^8), section 4.2.1
pub fn xtime(b: u8) -> u8 {
    if b & 0x80 == 0x80 {
        (b << 1) ^ AES_POLY
    } else {
        b << 1
    }
}

/// multiplication in GF(2^8), section 4.2
pub fn gf_2_8_mul(a_raw: u8, b_raw: u8) -> u8 {
    let mut r = 0u8;
    let mut a = a_raw;
    let mut b = b_raw;
    for _ in 0..8 {
        if b & 1 == 1 {
            r ^= a
        }
        a = xtime(a);
        b >>= 1;
    }
    r
}

/// x^254, which is the multiplicative inverse for x != 0 and maps 0 to 0.
/// Same square-and-multiply chain as the circuit:
/// x^2, x^3, x^6, x^7, ..., x^127, x^254.
pub fn gf_2_8_inv(x: u8) -> u8 {
    let mut r = gf_2_8_mul(x, x);
    for _ in 0..6 {
        r = gf_2_8_mul(r, x);
        r = gf_2_8_mul(r, r);
    }
    r
}

/// S-box computed from its definition instead of the table, section 5.1.1.
pub fn sbox_algebraic(x: u8) -> u8 {
    let b = gf_2_8_inv(x);
    b ^ b.rotate_left(1) ^ b.rotate_left(2) ^ b.rotate_left(3) ^ b.rotate_left(4)
        ^ SBOX_AFFINE_CONST
}

fn add_round_key(s: State, key: &[[u8; 4]]) -> State {
    assert_eq!(key.len(), 4); // ensures that key: [[u8;4]; 4]
    array::from_fn(|i| array::from_fn(|j| s[i][j] ^ key[j][i]))
}

pub fn key_expansion<const NK: usize, const NR: usize>(
    key: &[[u8; 4]; NK],
) -> [[u8; 4]; 4 * (NR + 1)]
where
    [(); 4 * (NR + 1)]:,
{
    let mut w = [[0u8; 4]; 4 * (NR + 1)]; // expanded key
    w[..NK].copy_from_slice(key);

    for i in NK..4 * (NR + 1) {
        let mut temp = w[i - 1];
        if i % NK == 0 {
            let rcon: [u8; 4] = [RCON[i / NK], 0, 0, 0];
            temp = xor_words(sub_word(rot_word(temp)), rcon);
        } else if NK > 6 && i % NK == 4 {
            temp = sub_word(temp);
        }
        w[i] = xor_words(w[i - NK], temp);
    }
    w
}

pub fn rot_word<T: Copy>(w: [T; 4]) -> [T; 4] {
    array::from_fn(|i| w[(i + 1) % 4])
}

fn sub_word(w: [u8; 4]) -> [u8; 4] {
    w.map(|b| SBOX[b as usize])
}

fn xor_words(w1: [u8; 4], w2: [u8; 4]) -> [u8; 4] {
    array::from_fn(|i| w1[i] ^ w2[i])
}
