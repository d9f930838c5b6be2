//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! Rust native implementation of [AES-GCM (Galois Counter
//! Mode)](https://nvlpubs.nist.gov/nistpubs/Legacy/SP/nistspecialpublication800-38d.pdf)
//! having in mind the approach that is done in-circuit; this means that it
//! is not written in the most rust idiomatic way, nor memory-efficient, but
//! simulating the behavior of the gadgets in [`crate::circuit_gcm`].

use anyhow::{ensure, Result};

use crate::{
    constants::{BLOCK_LEN, DEFAULT_IV_LEN, GCM_R, TAG_LEN},
    native_aes::{encrypt_block, key_expansion, key_words},
};

/// Section 7.1, Algorithm 4. Returns (ciphertext, tag).
pub fn encrypt<const NK: usize, const NR: usize>(
    key: &[u8],
    iv: &[u8],
    pt: &[u8], // plaintext
    aad: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN])>
where
    [(); 4 * (NR + 1)]:,
{
    let expanded_key = key_expansion::<NK, NR>(&key_words::<NK>(key)?);

    // 1. H = CIPH_K(0^128)
    let h = encrypt_block::<NR>(&[0u8; 16], &expanded_key);

    // 2. J_0
    let j0 = j0(h, iv)?;

    // 3. C = GCTR(inc32(J_0), P)
    let c = gctr::<NR>(&expanded_key, &inc32(j0), pt);

    // 4-6. T = GCTR(J_0, S), S = GHASH(A || 0^v || C || 0^u || [len(A)]_64 || [len(C)]_64)
    let t = tag::<NR>(&expanded_key, h, j0, aad, &c)?;

    Ok((c, t))
}

/// Section 7.2, Algorithm 5. Instead of failing on a wrong tag it returns the
/// plaintext together with the result of the tag comparison.
pub fn decrypt<const NK: usize, const NR: usize>(
    key: &[u8],
    iv: &[u8],
    ct: &[u8], // ciphertext
    aad: &[u8],
    tag_in: &[u8],
) -> Result<(Vec<u8>, bool)>
where
    [(); 4 * (NR + 1)]:,
{
    ensure!(tag_in.len() == TAG_LEN, "tag must be {} bytes", TAG_LEN);
    let expanded_key = key_expansion::<NK, NR>(&key_words::<NK>(key)?);

    let h = encrypt_block::<NR>(&[0u8; 16], &expanded_key);
    let j0 = j0(h, iv)?;
    let p = gctr::<NR>(&expanded_key, &inc32(j0), ct);
    let t = tag::<NR>(&expanded_key, h, j0, aad, ct)?;

    Ok((p, t.as_slice() == tag_in))
}

/// Pre-counter block J_0, step 2 of Algorithm 4.
pub fn j0(h: [u8; 16], iv: &[u8]) -> Result<[u8; 16]> {
    ensure!(!iv.is_empty(), "IV must not be empty");
    if iv.len() == DEFAULT_IV_LEN {
        // J_0 = IV || 0^31 || 1
        let mut out = [0u8; 16];
        out[..12].copy_from_slice(iv);
        out[15] = 0x01;
        Ok(out)
    } else {
        // J_0 = GHASH(IV || 0^(s+64) || [len(IV)]_64)
        let mut input = pad_to_block(iv);
        input.extend_from_slice(&[0u8; 8]);
        input.extend_from_slice(&((iv.len() as u64) * 8).to_be_bytes());
        ghash(h, &input)
    }
}

fn tag<const NR: usize>(
    expanded_key: &[[u8; 4]; 4 * (NR + 1)],
    h: [u8; 16],
    j0: [u8; 16],
    aad: &[u8],
    c: &[u8],
) -> Result<[u8; TAG_LEN]>
where
    [(); 4 * (NR + 1)]:,
{
    let s = ghash(h, &ghash_input(aad, c))?;
    Ok(xor_blocks(s, encrypt_block::<NR>(&j0, expanded_key)))
}

/// A || 0^v || C || 0^u || [len(A)]_64 || [len(C)]_64
pub fn ghash_input(aad: &[u8], c: &[u8]) -> Vec<u8> {
    let a_len: [u8; 8] = ((aad.len() as u64) * 8).to_be_bytes();
    let c_len: [u8; 8] = ((c.len() as u64) * 8).to_be_bytes();
    [pad_to_block(aad), pad_to_block(c), a_len.to_vec(), c_len.to_vec()].concat()
}

fn pad_to_block(x: &[u8]) -> Vec<u8> {
    let mut out = x.to_vec();
    out.resize(x.len().next_multiple_of(BLOCK_LEN), 0);
    out
}

/// GCM-Ctr, Section 6.5, Algorithm 3
pub fn gctr<const NR: usize>(
    key: &[[u8; 4]; 4 * (NR + 1)],
    icb: &[u8; 16],
    x: &[u8],
) -> Vec<u8>
where
    [(); 4 * (NR + 1)]:,
{
    let mut y = Vec::with_capacity(x.len());
    let mut cb_i = *icb;
    for (i, x_i) in x.chunks(BLOCK_LEN).enumerate() {
        if i > 0 {
            cb_i = inc32(cb_i);
        }
        let ciph_cb_i = encrypt_block::<NR>(&cb_i, key);
        // the last chunk might be shorter than 16 bytes, only MSB_len(x_i) of
        // the keystream block is used
        y.extend(std::iter::zip(x_i, ciph_cb_i).map(|(a, b)| a ^ b));
    }
    y
}

/// Section 6.4, Algorithm 2
pub fn ghash(h: [u8; 16], x: &[u8]) -> Result<[u8; 16]> {
    ensure!(
        x.len().is_multiple_of(BLOCK_LEN),
        "GHASH input must be a multiple of 128 bits"
    );

    let mut y = [0u8; 16]; // (128 bits)
    for x_i in x.chunks(BLOCK_LEN) {
        let mut xi = [0u8; 16];
        xi.copy_from_slice(x_i);
        let y_xi = xor_blocks(y, xi);
        y = gf_2_128_mul(y_xi, h);
    }
    Ok(y)
}

pub fn xor_blocks(b1: [u8; 16], b2: [u8; 16]) -> [u8; 16] {
    std::array::from_fn(|i| b1[i] ^ b2[i])
}

/// multiplication of blocks (in GF(2^128)), Algorithm 1, Section 6.3
pub fn gf_2_128_mul(x: [u8; 16], y: [u8; 16]) -> [u8; 16] {
    let mut z = [0u8; 16];
    let mut v = y;
    for i in 0..128 {
        // xi: i-th bit of x
        let byte_index = i / 8;
        let bit_index = 7 - (i % 8);
        let xi = (x[byte_index] >> bit_index) & 1;

        if xi == 1 {
            z = xor_blocks(z, v);
        }
        let lsb = v[15] & 1;
        right_shift_one(&mut v);
        if lsb == 1 {
            v = xor_blocks(v, GCM_R);
        }
    }
    z
}

/// Same product as [`gf_2_128_mul`], as a carry-less multiplication followed
/// by a reduction. In the returned `u128`s bit e is the coefficient of x^e.
pub fn gf_2_128_mul_clmul(x: [u8; 16], y: [u8; 16]) -> [u8; 16] {
    let a = u128::from_be_bytes(x).reverse_bits();
    let b = u128::from_be_bytes(y).reverse_bits();

    let (mut lo, mut hi) = (0u128, 0u128);
    for e in 0..128 {
        if (a >> e) & 1 == 1 {
            lo ^= b << e;
            if e > 0 {
                hi ^= b >> (128 - e);
            }
        }
    }

    // x^128 = x^7 + x^2 + x + 1; the terms pushed past x^127 by the shifts
    // are folded back once more
    let overflow = (hi >> 127) ^ (hi >> 126) ^ (hi >> 121);
    let hi = hi ^ overflow;
    let r = lo ^ hi ^ (hi << 1) ^ (hi << 2) ^ (hi << 7);

    r.reverse_bits().to_be_bytes()
}

pub fn right_shift_one(block: &mut [u8; 16]) {
    let mut carry = 0u8;

    for byte in block.iter_mut() {
        let new_carry = *byte & 1;
        *byte = (*byte >> 1) | (carry << 7);
        carry = new_carry;
    }
}

/// increment the right-most 32 bits of the given block (128 bits). Section 6.2.
pub fn inc32(b: [u8; 16]) -> [u8; 16] {
    let mut r = b;
    // counter = last 32bits
    let counter = u32::from_be_bytes([r[12], r[13], r[14], r[15]]);
    r[12..16].copy_from_slice(&counter.wrapping_add(1).to_be_bytes());
    r
}

#[cfg(test)]
pub(crate) mod tests {
    use aes_gcm::{
        aead::{consts::U8, Aead, KeyInit, Payload},
        aes::{Aes128, Aes256},
        AesGcm, Nonce,
    };
    use rand::Rng;

    use super::*;

    pub(crate) fn from_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    pub(crate) struct GcmVector {
        pub key: &'static str,
        pub iv: &'static str,
        pub pt: &'static str,
        pub aad: &'static str,
        pub ct: &'static str,
        pub tag: &'static str,
    }

    /// Test cases 1, 2, 4, 5 and 16 of the GCM submission (McGrew & Viega),
    /// also used by NIST SP 800-38D validation.
    pub(crate) const NIST_VECTORS_128: [GcmVector; 4] = [
        GcmVector {
            key: "00000000000000000000000000000000",
            iv: "000000000000000000000000",
            pt: "",
            aad: "",
            ct: "",
            tag: "58e2fccefa7e3061367f1d57a4e7455a",
        },
        GcmVector {
            key: "00000000000000000000000000000000",
            iv: "000000000000000000000000",
            pt: "00000000000000000000000000000000",
            aad: "",
            ct: "0388dace60b6a392f328c2b971b2fe78",
            tag: "ab6e47d42cec13bdf53a67b21257bddf",
        },
        GcmVector {
            key: "feffe9928665731c6d6a8f9467308308",
            iv: "cafebabefacedbaddecaf888",
            pt: "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a721c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b39",
            aad: "feedfacedeadbeeffeedfacedeadbeefabaddad2",
            ct: "42831ec2217774244b7221b784d0d49ce3aa212f2c02a4e035c17e2329aca12e21d514b25466931c7d8f6a5aac84aa051ba30b396a0aac973d58e091",
            tag: "5bc94fbc3221a5db94fae95ae7121a47",
        },
        GcmVector {
            key: "feffe9928665731c6d6a8f9467308308",
            iv: "cafebabefacedbad",
            pt: "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a721c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b39",
            aad: "feedfacedeadbeeffeedfacedeadbeefabaddad2",
            ct: "61353b4c2806934a777ff51fa22a4755699b2a714fcdc6f83766e5f97b6c742373806900e49f24b22b097544d4896b424989b5e1ebac0f07c23f4598",
            tag: "3612d2e79e3b0785561be14aaca2fccb",
        },
    ];

    pub(crate) const NIST_VECTOR_256: GcmVector = GcmVector {
        key: "feffe9928665731c6d6a8f9467308308feffe9928665731c6d6a8f9467308308",
        iv: "cafebabefacedbaddecaf888",
        pt: "d9313225f88406e5a55909c5aff5269a86a7a9531534f7da2e4c303d8a318a721c3c0c95956809532fcf0e2449a6b525b16aedf5aa0de657ba637b39",
        aad: "feedfacedeadbeeffeedfacedeadbeefabaddad2",
        ct: "522dc1f099567d07f47f37a32a84427d643a8cdcbfe5c0c97598a2bd2555d1aa8cb08e48590dbb3da7b08b1056828838c5f61e6393ba7a0abcc9f662",
        tag: "76fc6ece0f4e1768cddf8853bb2d551b",
    };

    #[test]
    fn test_aes_gcm_encrypt_nist_vectors() -> Result<()> {
        for v in NIST_VECTORS_128.iter() {
            let (c, tag) =
                encrypt::<4, 10>(&from_hex(v.key), &from_hex(v.iv), &from_hex(v.pt), &from_hex(v.aad))?;
            assert_eq!(c, from_hex(v.ct));
            assert_eq!(tag.to_vec(), from_hex(v.tag));
        }

        let v = NIST_VECTOR_256;
        let (c, tag) =
            encrypt::<8, 14>(&from_hex(v.key), &from_hex(v.iv), &from_hex(v.pt), &from_hex(v.aad))?;
        assert_eq!(c, from_hex(v.ct));
        assert_eq!(tag.to_vec(), from_hex(v.tag));
        Ok(())
    }

    #[test]
    fn test_aes_gcm_decrypt_nist_vectors() -> Result<()> {
        for v in NIST_VECTORS_128.iter() {
            let (p, is_valid) = decrypt::<4, 10>(
                &from_hex(v.key),
                &from_hex(v.iv),
                &from_hex(v.ct),
                &from_hex(v.aad),
                &from_hex(v.tag),
            )?;
            assert!(is_valid);
            assert_eq!(p, from_hex(v.pt));
        }
        Ok(())
    }

    /// test checking against external aes-gcm lib
    #[test]
    fn test_with_external_lib() -> Result<()> {
        let mut rng = rand::thread_rng();
        for pt_len in [0, 1, 15, 16, 17, 42] {
            let key: [u8; 16] = rng.gen();
            let nonce: [u8; 12] = rng.gen();
            let pt: Vec<u8> = (0..pt_len).map(|_| rng.gen()).collect();
            let aad: Vec<u8> = (0..(pt_len % 7) * 3).map(|_| rng.gen()).collect();

            let cipher = AesGcm::<Aes128, aes_gcm::aead::consts::U12>::new(&key.into());
            let payload = Payload {
                msg: &pt,
                aad: &aad,
            };
            let expected = cipher.encrypt(Nonce::from_slice(&nonce), payload).unwrap();

            let (c, t) = encrypt::<4, 10>(&key, &nonce, &pt, &aad)?;
            assert_eq!([c, t.to_vec()].concat(), expected);

            // non-96-bit IV
            let key: [u8; 32] = rng.gen();
            let nonce: [u8; 8] = rng.gen();
            let cipher = AesGcm::<Aes256, U8>::new(&key.into());
            let payload = Payload {
                msg: &pt,
                aad: &aad,
            };
            let expected = cipher.encrypt(Nonce::from_slice(&nonce), payload).unwrap();

            let (c, t) = encrypt::<8, 14>(&key, &nonce, &pt, &aad)?;
            assert_eq!([c, t.to_vec()].concat(), expected);
        }
        Ok(())
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let mut rng = rand::thread_rng();
        for iv_len in [1, 8, 12, 16, 20] {
            let key: [u8; 24] = rng.gen();
            let iv: Vec<u8> = (0..iv_len).map(|_| rng.gen()).collect();
            let pt: Vec<u8> = (0..33).map(|_| rng.gen()).collect();
            let aad: Vec<u8> = (0..5).map(|_| rng.gen()).collect();

            let (c, t) = encrypt::<6, 12>(&key, &iv, &pt, &aad)?;
            let (p, is_valid) = decrypt::<6, 12>(&key, &iv, &c, &aad, &t)?;
            assert!(is_valid);
            assert_eq!(p, pt);
        }
        Ok(())
    }

    /// Flipping any single bit of the ciphertext, the AAD or the tag must make
    /// the tag check fail.
    #[test]
    fn test_tag_sensitivity() -> Result<()> {
        let mut rng = rand::thread_rng();
        let key: [u8; 32] = rng.gen();
        let iv: [u8; 12] = rng.gen();
        let pt: [u8; 32] = rng.gen();
        let aad: [u8; 16] = rng.gen();
        let (c, t) = encrypt::<8, 14>(&key, &iv, &pt, &aad)?;

        for _ in 0..300 {
            let (mut c, mut aad, mut t) = (c.clone(), aad, t);
            let field = rng.gen_range(0..3);
            let target: &mut [u8] = match field {
                0 => c.as_mut_slice(),
                1 => &mut aad[..],
                _ => &mut t[..],
            };
            let bit = rng.gen_range(0..target.len() * 8);
            target[bit / 8] ^= 1 << (bit % 8);

            let (_, is_valid) = decrypt::<8, 14>(&key, &iv, &c, &aad, &t)?;
            assert!(!is_valid, "flip of bit {bit} in field {field} not detected");
        }
        Ok(())
    }

    #[test]
    fn test_rejects_malformed_inputs() {
        assert!(encrypt::<4, 10>(&[0u8; 15], &[0u8; 12], &[], &[]).is_err());
        assert!(encrypt::<4, 10>(&[0u8; 16], &[], &[], &[]).is_err());
        assert!(decrypt::<4, 10>(&[0u8; 16], &[0u8; 12], &[], &[], &[0u8; 12]).is_err());
        assert!(ghash([0u8; 16], &[0u8; 17]).is_err());
    }

    #[test]
    fn test_inc32() {
        let mut block = [0xabu8; 16];
        block[12..].copy_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        let r = inc32(block);
        assert_eq!(r[..12], block[..12]);
        assert_eq!(r[12..], [0, 0, 0, 0]);

        block[12..].copy_from_slice(&[0x00, 0x00, 0x00, 0xff]);
        assert_eq!(inc32(block)[12..], [0x00, 0x00, 0x01, 0x00]);
        block[12..].copy_from_slice(&[0x12, 0xff, 0xff, 0xfe]);
        assert_eq!(inc32(block)[12..], [0x12, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_gf_2_128_mul_vector() {
        // X_1 of test case 2: C_1 * H
        let h: [u8; 16] = from_hex("66e94bd4ef8a2c3b884cfa59ca342b2e").try_into().unwrap();
        let c: [u8; 16] = from_hex("0388dace60b6a392f328c2b971b2fe78").try_into().unwrap();
        let expected: [u8; 16] = from_hex("5e2ec746917062882c85b0685353deb7")
            .try_into()
            .unwrap();
        assert_eq!(gf_2_128_mul(c, h), expected);
        assert_eq!(gf_2_128_mul_clmul(c, h), expected);

        // 1 is 10000000 || 0^120
        let mut one = [0u8; 16];
        one[0] = 0x80;
        assert_eq!(gf_2_128_mul(one, h), h);
        assert_eq!(gf_2_128_mul(h, [0u8; 16]), [0u8; 16]);
    }

    #[test]
    fn test_gf_2_128_mul_variants_agree() {
        let mut rng = rand::thread_rng();
        for _ in 0..10_000 {
            let x: [u8; 16] = rng.gen();
            let y: [u8; 16] = rng.gen();
            assert_eq!(gf_2_128_mul(x, y), gf_2_128_mul_clmul(x, y));
        }
        let ones = [0xffu8; 16];
        assert_eq!(gf_2_128_mul(ones, ones), gf_2_128_mul_clmul(ones, ones));
    }
}
