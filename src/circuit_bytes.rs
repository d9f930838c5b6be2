//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! Byte and bit primitives every other gadget is built from.
//!
//! A [`ByteTarget`] is a plain [`Target`] that is known to hold a value in
//! `0..=255`. The Goldilocks field is much larger than 2^8, so that knowledge
//! has to come from a constraint: every byte wire created here is either range
//! checked, a constant, the output of a byte lookup table or the recomposition
//! of 8 boolean wires. Gadgets only ever combine such wires, which keeps the
//! invariant for the whole circuit.

use std::{array, cell::OnceCell, sync::Arc};

use anyhow::{ensure, Result};
use plonky2::{
    field::{extension::Extendable, goldilocks_field::GoldilocksField as F, types::Field},
    hash::hash_types::RichField,
    gates::lookup_table::LookupTable,
    iop::{
        target::{BoolTarget, Target},
        witness::{PartialWitness, WitnessWrite},
    },
    plonk::circuit_builder::CircuitBuilder,
};

use crate::{constants::SBOX, native_aes, D};

pub type ByteTarget = Target;

/// Lookup tables of one circuit. Each table is registered the first time a
/// gadget asks for it, so a circuit only carries the tables it uses.
///
/// The indices belong to the builder that registered them; in debug builds a
/// lookup through a different builder panics.
#[derive(Debug, Clone, Default)]
pub struct ByteLuts {
    /// `(a << 8) + b -> a ^ b`
    xor: OnceCell<(usize, LookupTable)>,
    /// `b -> xtime(b)`
    xtime: OnceCell<(usize, LookupTable)>,
    /// `b -> SBOX[b]`
    sbox: OnceCell<(usize, LookupTable)>,
}

impl ByteLuts {
    pub fn xor(&self, builder: &mut CircuitBuilder<F, D>) -> usize {
        Self::index(&self.xor, builder, byte_xor_table)
    }

    pub fn xtime(&self, builder: &mut CircuitBuilder<F, D>) -> usize {
        Self::index(&self.xtime, builder, byte_xtime_table)
    }

    pub fn sbox(&self, builder: &mut CircuitBuilder<F, D>) -> usize {
        Self::index(&self.sbox, builder, sbox_table)
    }

    /// Number of tables registered so far.
    pub fn num_registered(&self) -> usize {
        [&self.xor, &self.xtime, &self.sbox]
            .iter()
            .filter(|lut| lut.get().is_some())
            .count()
    }

    fn index(
        lut: &OnceCell<(usize, LookupTable)>,
        builder: &mut CircuitBuilder<F, D>,
        table: fn() -> LookupTable,
    ) -> usize {
        let (index, registered) = lut.get_or_init(|| {
            let index = builder.add_lookup_table_from_pairs(table());
            (index, builder.get_lut(index))
        });
        // the builder keeps the Arc it was given, so pointer equality identifies it
        debug_assert!(
            *index < builder.get_luts_length()
                && Arc::ptr_eq(&builder.get_lut(*index), registered),
            "lookup table {index} was registered in another circuit builder"
        );
        *index
    }
}

pub trait CircuitBuilderBytes<F: RichField + Extendable<D>, const D: usize> {
    /// Adds a witness byte, range checked to 8 bits.
    fn add_virtual_byte_target(&mut self) -> ByteTarget;

    fn add_virtual_byte_arr<const N: usize>(&mut self) -> [ByteTarget; N];

    fn constant_byte(&mut self, value: u8) -> ByteTarget;

    fn constant_bytes<const N: usize>(&mut self, value: [u8; N]) -> [ByteTarget; N];

    /// ToBits: little-endian decomposition of `x` into `n` bits. Unsatisfiable
    /// unless `x < 2^n`, which rules out `x + 2^n` style aliasing.
    ///
    /// Panics if `n >= 64`: such a decomposition would wrap around the field
    /// order.
    fn to_bits(&mut self, x: Target, n: usize) -> Vec<BoolTarget>;

    fn byte_to_bits(&mut self, x: ByteTarget) -> [BoolTarget; 8];

    /// FromBits: `sum bits[i] * 2^i`.
    fn from_bits(&mut self, bits: &[BoolTarget]) -> Target;

    /// XorBits: `a + b - 2ab`.
    fn xor_bits(&mut self, a: BoolTarget, b: BoolTarget) -> BoolTarget;

    /// Lowest bit of `sum`, where `sum` is known to be below `2^n`.
    fn parity(&mut self, sum: Target, n: usize) -> BoolTarget;

    fn xor_bytes(&mut self, luts: &ByteLuts, a: ByteTarget, b: ByteTarget) -> ByteTarget;

    /// Multiplication by x in GF(2^8).
    fn xtime(&mut self, luts: &ByteLuts, a: ByteTarget) -> ByteTarget;

    /// 1 iff both slices hold the same bytes.
    fn bytes_equal(&mut self, a: &[ByteTarget], b: &[ByteTarget]) -> BoolTarget;
}

impl CircuitBuilderBytes<F, D> for CircuitBuilder<F, D> {
    fn add_virtual_byte_target(&mut self) -> ByteTarget {
        let t = self.add_virtual_target();
        self.range_check(t, 8);
        t
    }

    fn add_virtual_byte_arr<const N: usize>(&mut self) -> [ByteTarget; N] {
        array::from_fn(|_| self.add_virtual_byte_target())
    }

    fn constant_byte(&mut self, value: u8) -> ByteTarget {
        self.constant(F::from_canonical_u8(value))
    }

    fn constant_bytes<const N: usize>(&mut self, value: [u8; N]) -> [ByteTarget; N] {
        value.map(|v| self.constant_byte(v))
    }

    fn to_bits(&mut self, x: Target, n: usize) -> Vec<BoolTarget> {
        // a decomposition with 64 bits would wrap around the field order
        assert!(n < 64, "to_bits: {n} bits do not fit below the field order");
        self.split_le(x, n)
    }

    fn byte_to_bits(&mut self, x: ByteTarget) -> [BoolTarget; 8] {
        let bits = self.to_bits(x, 8);
        array::from_fn(|i| bits[i])
    }

    fn from_bits(&mut self, bits: &[BoolTarget]) -> Target {
        let zero = self.zero();
        let two = self.two();
        bits.iter()
            .rev()
            .fold(zero, |acc, b| self.mul_add(two, acc, b.target))
    }

    fn xor_bits(&mut self, a: BoolTarget, b: BoolTarget) -> BoolTarget {
        let sum = self.add(a.target, b.target);
        BoolTarget::new_unsafe(self.arithmetic(-F::TWO, F::ONE, a.target, b.target, sum))
    }

    fn parity(&mut self, sum: Target, n: usize) -> BoolTarget {
        self.to_bits(sum, n)[0]
    }

    fn xor_bytes(&mut self, luts: &ByteLuts, a: ByteTarget, b: ByteTarget) -> ByteTarget {
        let lut_idx = luts.xor(self);
        let lookup_idx = self.mul_const_add(F::from_canonical_u64(1 << 8), a, b);
        self.add_lookup_from_index(lookup_idx, lut_idx)
    }

    fn xtime(&mut self, luts: &ByteLuts, a: ByteTarget) -> ByteTarget {
        let lut_idx = luts.xtime(self);
        self.add_lookup_from_index(a, lut_idx)
    }

    fn bytes_equal(&mut self, a: &[ByteTarget], b: &[ByteTarget]) -> BoolTarget {
        assert_eq!(a.len(), b.len());
        let init = self._true();
        std::iter::zip(a, b).fold(init, |acc, (x, y)| {
            let eq = self.is_equal(*x, *y);
            self.and(acc, eq)
        })
    }
}

pub trait PartialWitnessBytes {
    fn set_byte_target(&mut self, target: ByteTarget, value: u8) -> Result<()>;

    fn set_byte_targets(&mut self, targets: &[ByteTarget], values: &[u8]) -> Result<()>;
}

impl<F: Field> PartialWitnessBytes for PartialWitness<F> {
    fn set_byte_target(&mut self, target: ByteTarget, value: u8) -> Result<()> {
        self.set_target(target, F::from_canonical_u8(value))
    }

    fn set_byte_targets(&mut self, targets: &[ByteTarget], values: &[u8]) -> Result<()> {
        ensure!(
            targets.len() == values.len(),
            "expected {} bytes, got {}",
            targets.len(),
            values.len()
        );
        std::iter::zip(targets, values).try_for_each(|(t, v)| self.set_byte_target(*t, *v))
    }
}

pub fn byte_xor_table() -> LookupTable {
    Arc::new(
        (0..=u8::MAX as u16)
            .flat_map(|x| (0..=u8::MAX as u16).map(move |y| ((x << 8) + y, x ^ y)))
            .collect(),
    )
}

pub fn byte_xtime_table() -> LookupTable {
    Arc::new(
        (0..=u8::MAX)
            .map(|y| (y as u16, native_aes::xtime(y) as u16))
            .collect(),
    )
}

pub fn sbox_table() -> LookupTable {
    Arc::new(
        SBOX.into_iter()
            .enumerate()
            .map(|(i, o)| (i as u16, o as u16))
            .collect(),
    )
}
