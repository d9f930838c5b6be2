//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! GF(2^128) arithmetic and GHASH (SP 800-38D, sections 6.3 and 6.4).
//!
//! Field elements are carried as 128 boolean wires, [`Gf128Target`], where
//! index `e` holds the coefficient of x^e. With the GCM bit order this is bit
//! `7 - e % 8` of byte `e / 8` of the block.

use std::array;

use plonky2::{
    field::{extension::Extendable, goldilocks_field::GoldilocksField as F},
    hash::hash_types::RichField,
    iop::target::{BoolTarget, Target},
    plonk::circuit_builder::CircuitBuilder,
};

use crate::{
    circuit_aes::bit_len,
    circuit_bytes::{ByteTarget, CircuitBuilderBytes},
    circuit_ctr::BlockTarget,
    config::{AesGcmContext, Gf128Strategy},
    constants::BLOCK_LEN,
    D,
};

pub type Gf128Target = [BoolTarget; 128];

pub trait CircuitBuilderGhash<F: RichField + Extendable<D>, const D: usize> {
    fn block_to_gf128(&mut self, block: &BlockTarget) -> Gf128Target;

    /// Zero pads `bytes` to whole blocks.
    fn bytes_to_gf128_blocks(&mut self, bytes: &[ByteTarget]) -> Vec<Gf128Target>;

    fn gf128_to_block(&mut self, x: &Gf128Target) -> BlockTarget;

    fn constant_gf128(&mut self, block: [u8; 16]) -> Gf128Target;

    fn gf128_add(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target;

    /// x * y with the strategy configured in `ctx`.
    fn gf_2_128_mul(&mut self, ctx: &AesGcmContext, x: &Gf128Target, y: &Gf128Target)
        -> Gf128Target;

    /// Algorithm 1: one conditional xor and one multiplication by x per bit of `x`.
    fn gf_2_128_mul_bit_serial(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target;

    /// Carry-less product accumulated as field integers, reduction folded in,
    /// and a single parity per output coefficient.
    fn gf_2_128_mul_delayed_parity(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target;

    /// GHASH_H(X_1 || ... || X_m); the zero block when `blocks` is empty.
    fn ghash(&mut self, ctx: &AesGcmContext, h: &Gf128Target, blocks: &[Gf128Target])
        -> Gf128Target;
}

impl CircuitBuilderGhash<F, D> for CircuitBuilder<F, D> {
    fn block_to_gf128(&mut self, block: &BlockTarget) -> Gf128Target {
        let bits: Vec<[BoolTarget; 8]> = block.iter().map(|b| self.byte_to_bits(*b)).collect();
        array::from_fn(|e| bits[e / 8][7 - e % 8])
    }

    fn bytes_to_gf128_blocks(&mut self, bytes: &[ByteTarget]) -> Vec<Gf128Target> {
        let zero = self.zero();
        bytes
            .chunks(BLOCK_LEN)
            .map(|chunk| {
                let block: BlockTarget = array::from_fn(|i| chunk.get(i).copied().unwrap_or(zero));
                self.block_to_gf128(&block)
            })
            .collect()
    }

    fn gf128_to_block(&mut self, x: &Gf128Target) -> BlockTarget {
        array::from_fn(|k| {
            let le_bits: [BoolTarget; 8] = array::from_fn(|j| x[8 * k + 7 - j]);
            self.from_bits(&le_bits)
        })
    }

    fn constant_gf128(&mut self, block: [u8; 16]) -> Gf128Target {
        array::from_fn(|e| self.constant_bool((block[e / 8] >> (7 - e % 8)) & 1 == 1))
    }

    fn gf128_add(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target {
        array::from_fn(|e| self.xor_bits(x[e], y[e]))
    }

    fn gf_2_128_mul(
        &mut self,
        ctx: &AesGcmContext,
        x: &Gf128Target,
        y: &Gf128Target,
    ) -> Gf128Target {
        match ctx.config.gf128 {
            Gf128Strategy::BitSerial => self.gf_2_128_mul_bit_serial(x, y),
            Gf128Strategy::DelayedParity => self.gf_2_128_mul_delayed_parity(x, y),
        }
    }

    fn gf_2_128_mul_bit_serial(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target {
        let mut z: Gf128Target = [self._false(); 128];
        let mut v: Gf128Target = *y;
        for i in 0..128 {
            for e in 0..128 {
                let xi_ve = self.and(x[i], v[e]);
                z[e] = self.xor_bits(z[e], xi_ve);
            }
            if i == 127 {
                break;
            }
            // v = v * x: shift every coefficient up by one, x^128 folds into
            // x^7 + x^2 + x + 1
            let carry = v[127];
            let mut shifted: Gf128Target = array::from_fn(|e| if e == 0 { carry } else { v[e - 1] });
            for e in [1, 2, 7] {
                shifted[e] = self.xor_bits(shifted[e], carry);
            }
            v = shifted;
        }
        z
    }

    fn gf_2_128_mul_delayed_parity(&mut self, x: &Gf128Target, y: &Gf128Target) -> Gf128Target {
        // c_k = sum_{i+j=k} x_i * y_j, as an integer below 129
        let zero = self.zero();
        let mut c: Vec<Target> = vec![zero; 255];
        for i in 0..128 {
            for j in 0..128 {
                c[i + j] = self.mul_add(x[i].target, y[j].target, c[i + j]);
            }
        }

        let reduced: Vec<u128> = (0..255).map(reduced_monomial_gf_2_128).collect();
        let bound = max_coefficient_sum(&reduced);
        let n = bit_len(bound);

        array::from_fn(|e| {
            let terms: Vec<Target> = (0..255)
                .filter(|k| (reduced[*k] >> e) & 1 == 1)
                .map(|k| c[k])
                .collect();
            let sum = self.add_many(terms);
            self.parity(sum, n)
        })
    }

    fn ghash(
        &mut self,
        ctx: &AesGcmContext,
        h: &Gf128Target,
        blocks: &[Gf128Target],
    ) -> Gf128Target {
        let Some((first, rest)) = blocks.split_first() else {
            return [self._false(); 128];
        };
        // Y_0 = 0, so Y_1 = X_1 * H
        let mut y = self.gf_2_128_mul(ctx, first, h);
        for x_i in rest {
            let y_xi = self.gf128_add(&y, x_i);
            y = self.gf_2_128_mul(ctx, &y_xi, h);
        }
        y
    }
}

/// x^m mod x^128 + x^7 + x^2 + x + 1, bit e holding the coefficient of x^e.
fn reduced_monomial_gf_2_128(m: usize) -> u128 {
    (0..m).fold(1u128, |r, _| {
        let carry = r >> 127;
        (r << 1) ^ (carry * 0x87)
    })
}

/// Largest value any per-coefficient sum can take: x^k of the carry-less
/// product collects min(k + 1, 255 - k) partial products.
fn max_coefficient_sum(reduced: &[u128]) -> usize {
    (0..128)
        .map(|e| {
            (0..255)
                .filter(|k| (reduced[*k] >> e) & 1 == 1)
                .map(|k| (k + 1).min(255 - k))
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
}
