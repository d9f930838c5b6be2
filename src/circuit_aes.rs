//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! AES block cipher gadgets: SubBytes (lookup or algebraic), ShiftRows,
//! MixColumns, AddRoundKey, KeyExpansion and the full Cipher of FIPS-197.

use std::array;

use anyhow::{ensure, Result};
use plonky2::{
    field::{extension::Extendable, goldilocks_field::GoldilocksField as F, types::Field},
    hash::hash_types::RichField,
    iop::{
        target::{BoolTarget, Target},
        witness::PartialWitness,
    },
    plonk::circuit_builder::CircuitBuilder,
};

use crate::{
    circuit_bytes::{ByteLuts, ByteTarget, CircuitBuilderBytes, PartialWitnessBytes},
    config::{check_key_params, AesGcmContext, SBoxStrategy},
    constants::{AES_POLY, RCON, SBOX_AFFINE_CONST},
    native_aes::{rot_word, shift_rows, State},
    D,
};

/// AES state, `s[row][col]`.
#[derive(Debug, Copy, Clone)]
pub struct StateTarget(pub [[ByteTarget; 4]; 4]);

/// 4 bytes, big-endian; one state column or one key schedule entry.
pub type WordTarget = [ByteTarget; 4];

impl StateTarget {
    /// Column-major load, `s[r][c] = block[r + 4c]`.
    pub fn from_block(block: [ByteTarget; 16]) -> Self {
        Self(array::from_fn(|r| array::from_fn(|c| block[r + 4 * c])))
    }

    pub fn to_block(self) -> [ByteTarget; 16] {
        array::from_fn(|i| self.0[i % 4][i / 4])
    }
}

pub trait CircuitBuilderAESState<F: RichField + Extendable<D>, const D: usize> {
    /// Adds state target.
    fn add_virtual_state(&mut self) -> StateTarget;

    /// Adds NK key words of range checked bytes.
    fn add_virtual_key<const NK: usize>(&mut self) -> [WordTarget; NK];

    /// Cipher() of FIPS-197, section 5.1.
    fn encrypt_block<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        s: StateTarget,
        w: &[WordTarget; 4 * (NR + 1)],
    ) -> StateTarget
    where
        [(); 4 * (NR + 1)]:;

    /// Applies sub_bytes routine to state.
    fn state_sub_bytes(&mut self, ctx: &AesGcmContext, s: StateTarget) -> StateTarget;

    /// SubWord
    fn state_sub_word(&mut self, ctx: &AesGcmContext, word: WordTarget) -> WordTarget;

    /// S-box of a single byte, with the strategy configured in `ctx`.
    fn sub_byte(&mut self, ctx: &AesGcmContext, x: ByteTarget) -> ByteTarget;

    /// S-box as `affine(x^254)` over the bits of `x`.
    fn sub_byte_algebraic(&mut self, x: ByteTarget) -> ByteTarget;

    /// MixColumns
    fn state_mix_columns(&mut self, luts: &ByteLuts, s: StateTarget) -> StateTarget;

    /// AddRoundKey
    fn state_add_round_key(
        &mut self,
        luts: &ByteLuts,
        round_key: &[WordTarget],
        s: StateTarget,
    ) -> StateTarget;

    /// KeyExpansion
    fn key_expansion<const NK: usize, const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        key: &[WordTarget; NK],
    ) -> [WordTarget; 4 * (NR + 1)]
    where
        [(); 4 * (NR + 1)]:;

    /// GF(2^8) multiplication over little-endian bits.
    fn gf_2_8_mul_bits(&mut self, a: [BoolTarget; 8], b: [BoolTarget; 8]) -> [BoolTarget; 8];

    /// x^254 over little-endian bits (inverse, with 0 -> 0).
    fn gf_2_8_inv_bits(&mut self, x: [BoolTarget; 8]) -> [BoolTarget; 8];
}

impl CircuitBuilderAESState<F, D> for CircuitBuilder<F, D> {
    fn add_virtual_state(&mut self) -> StateTarget {
        StateTarget(array::from_fn(|_| self.add_virtual_byte_arr()))
    }

    fn add_virtual_key<const NK: usize>(&mut self) -> [WordTarget; NK] {
        array::from_fn(|_| self.add_virtual_byte_arr())
    }

    fn encrypt_block<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        s: StateTarget,
        w: &[WordTarget; 4 * (NR + 1)], // expanded key
    ) -> StateTarget
    where
        [(); 4 * (NR + 1)]:,
    {
        let luts = &ctx.luts;
        let mut s = self.state_add_round_key(luts, &w[0..4], s);
        (1..NR).for_each(|i| {
            s = self.state_sub_bytes(ctx, s);
            s = StateTarget(shift_rows(s.0));
            s = self.state_mix_columns(luts, s);
            s = self.state_add_round_key(luts, &w[4 * i..4 * (i + 1)], s);
        });
        s = self.state_sub_bytes(ctx, s);
        s = StateTarget(shift_rows(s.0));
        self.state_add_round_key(luts, &w[4 * NR..4 * (NR + 1)], s)
    }

    fn state_sub_bytes(&mut self, ctx: &AesGcmContext, s: StateTarget) -> StateTarget {
        StateTarget(s.0.map(|row| self.state_sub_word(ctx, row)))
    }

    fn state_sub_word(&mut self, ctx: &AesGcmContext, word: WordTarget) -> WordTarget {
        word.map(|b| self.sub_byte(ctx, b))
    }

    fn sub_byte(&mut self, ctx: &AesGcmContext, x: ByteTarget) -> ByteTarget {
        match ctx.config.sbox {
            SBoxStrategy::Lookup => {
                let sbox_lut_idx = ctx.luts.sbox(self);
                self.add_lookup_from_index(x, sbox_lut_idx)
            }
            SBoxStrategy::Algebraic => self.sub_byte_algebraic(x),
        }
    }

    fn sub_byte_algebraic(&mut self, x: ByteTarget) -> ByteTarget {
        let x_bits = self.byte_to_bits(x);
        let b = self.gf_2_8_inv_bits(x_bits);

        // b'_i = b_i ^ b_{i+4} ^ b_{i+5} ^ b_{i+6} ^ b_{i+7} ^ c_i
        let out: [BoolTarget; 8] = array::from_fn(|i| {
            let terms = [0, 4, 5, 6, 7].map(|k| b[(i + k) % 8].target);
            let mut sum = self.add_many(terms);
            if (SBOX_AFFINE_CONST >> i) & 1 == 1 {
                sum = self.add_const(sum, F::ONE);
            }
            self.parity(sum, 3)
        });
        self.from_bits(&out)
    }

    fn state_mix_columns(&mut self, luts: &ByteLuts, s: StateTarget) -> StateTarget {
        // r_i = a_i ^ t ^ xtime(a_i ^ a_{i+1}), with t = a_0 ^ a_1 ^ a_2 ^ a_3
        let out_cols: [WordTarget; 4] = array::from_fn(|c| {
            let a: WordTarget = array::from_fn(|r| s.0[r][c]);
            let a01 = self.xor_bytes(luts, a[0], a[1]);
            let a23 = self.xor_bytes(luts, a[2], a[3]);
            let t = self.xor_bytes(luts, a01, a23);
            array::from_fn(|r| {
                let pair = self.xor_bytes(luts, a[r], a[(r + 1) % 4]);
                let doubled = self.xtime(luts, pair);
                let a_t = self.xor_bytes(luts, a[r], t);
                self.xor_bytes(luts, a_t, doubled)
            })
        });
        StateTarget(array::from_fn(|r| array::from_fn(|c| out_cols[c][r])))
    }

    fn state_add_round_key(
        &mut self,
        luts: &ByteLuts,
        round_key: &[WordTarget],
        s: StateTarget,
    ) -> StateTarget {
        assert_eq!(round_key.len(), 4);
        StateTarget(array::from_fn(|i| {
            array::from_fn(|j| self.xor_bytes(luts, s.0[i][j], round_key[j][i]))
        }))
    }

    fn key_expansion<const NK: usize, const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        key: &[WordTarget; NK],
    ) -> [WordTarget; 4 * (NR + 1)]
    where
        [(); 4 * (NR + 1)]:,
    {
        let rcon: [ByteTarget; 11] = RCON.map(|c| self.constant_byte(c));

        let key_additions = (NK..4 * (NR + 1))
            .scan(key.to_vec(), |st, i| {
                let offset = if i % NK == 0 {
                    let term = self.state_sub_word(ctx, rot_word(st[i - 1]));
                    let head = self.xor_bytes(&ctx.luts, term[0], rcon[i / NK]);
                    [head, term[1], term[2], term[3]]
                } else if (NK > 6) && (i % NK == 4) {
                    self.state_sub_word(ctx, st[i - 1])
                } else {
                    st[i - 1]
                };

                let cur_val: WordTarget =
                    array::from_fn(|j| self.xor_bytes(&ctx.luts, st[i - NK][j], offset[j]));
                st.push(cur_val);
                Some(cur_val)
            })
            .collect::<Vec<_>>();
        array::from_fn(|i| if i < NK { key[i] } else { key_additions[i - NK] })
    }

    fn gf_2_8_mul_bits(&mut self, a: [BoolTarget; 8], b: [BoolTarget; 8]) -> [BoolTarget; 8] {
        // c_m = #{(i, j) : i + j = m, a_i = b_j = 1}, kept as an integer
        let zero = self.zero();
        let c: [Target; 15] = array::from_fn(|m| {
            (0..8)
                .filter(|i| m >= *i && m - i < 8)
                .fold(zero, |acc, i| self.mul_add(a[i].target, b[m - i].target, acc))
        });

        array::from_fn(|k| {
            let sources = (0..15).filter(|m| (reduced_monomial_gf_2_8(*m) >> k) & 1 == 1);
            let max_sum: usize = sources.clone().map(|m| m.min(14 - m) + 1).sum();
            let sum = self.add_many(sources.map(|m| c[m]));
            self.parity(sum, bit_len(max_sum))
        })
    }

    fn gf_2_8_inv_bits(&mut self, x: [BoolTarget; 8]) -> [BoolTarget; 8] {
        // x^2, x^3, x^6, x^7, ..., x^126, x^127, x^254
        let mut r = self.gf_2_8_mul_bits(x, x);
        for _ in 0..6 {
            r = self.gf_2_8_mul_bits(r, x);
            r = self.gf_2_8_mul_bits(r, r);
        }
        r
    }
}

/// x^m mod x^8 + x^4 + x^3 + x + 1, for m < 15.
fn reduced_monomial_gf_2_8(m: usize) -> u8 {
    let mut v: u16 = 1 << m;
    for k in (8..15).rev() {
        if (v >> k) & 1 == 1 {
            v ^= (0x100 | AES_POLY as u16) << (k - 8);
        }
    }
    v as u8
}

/// Number of bits needed to represent `x`.
pub(crate) fn bit_len(x: usize) -> usize {
    (usize::BITS - x.leading_zeros()).max(1) as usize
}

pub trait PartialWitnessAESState {
    fn set_target_state(&mut self, target: StateTarget, value: State) -> Result<()>;

    fn set_key_targets(&mut self, target: &[WordTarget], key: &[u8]) -> Result<()>;
}

impl<F: Field> PartialWitnessAESState for PartialWitness<F> {
    fn set_target_state(&mut self, target: StateTarget, value: State) -> Result<()> {
        std::iter::zip(target.0, value).try_for_each(|(t, v)| self.set_byte_targets(&t, &v))
    }

    fn set_key_targets(&mut self, target: &[WordTarget], key: &[u8]) -> Result<()> {
        ensure!(
            key.len() == 4 * target.len(),
            "key has {} bytes, circuit expects {}",
            key.len(),
            4 * target.len()
        );
        std::iter::zip(target, key.chunks(4)).try_for_each(|(t, v)| self.set_byte_targets(t, v))
    }
}

/// EncryptBlock: one AES encryption of a witness block under a witness key.
#[derive(Debug, Clone)]
pub struct AesBlockTarget<const NK: usize, const NR: usize> {
    pub key: [WordTarget; NK],
    pub input: [ByteTarget; 16],
    pub output: [ByteTarget; 16],
}

impl<const NK: usize, const NR: usize> AesBlockTarget<NK, NR>
where
    [(); 4 * (NR + 1)]:,
{
    pub fn new_virtual(builder: &mut CircuitBuilder<F, D>, ctx: &AesGcmContext) -> Result<Self> {
        check_key_params::<NK, NR>()?;

        let key = builder.add_virtual_key::<NK>();
        let input: [ByteTarget; 16] = builder.add_virtual_byte_arr();

        let w = builder.key_expansion::<NK, NR>(ctx, &key);
        let output = builder
            .encrypt_block::<NR>(ctx, StateTarget::from_block(input), &w)
            .to_block();

        log::debug!(
            "AES block (NK:{}, NR:{}, sbox:{:?}) num_gates: {}",
            NK,
            NR,
            ctx.config.sbox,
            builder.num_gates()
        );
        Ok(Self { key, input, output })
    }

    pub fn register_public_outputs(&self, builder: &mut CircuitBuilder<F, D>) {
        builder.register_public_inputs(&self.output);
    }

    pub fn set_targets(&self, pw: &mut PartialWitness<F>, key: &[u8], input: &[u8]) -> Result<()> {
        pw.set_key_targets(&self.key, key)?;
        pw.set_byte_targets(&self.input, input)
    }
}
