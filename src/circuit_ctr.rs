//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! Counter engine (inc32) and the GCTR function of SP 800-38D section 6.5.

use std::array;

use anyhow::Result;
use plonky2::{
    field::{extension::Extendable, goldilocks_field::GoldilocksField as F, types::Field},
    hash::hash_types::RichField,
    iop::{target::BoolTarget, witness::PartialWitness},
    plonk::circuit_builder::CircuitBuilder,
};

use crate::{
    circuit_aes::{CircuitBuilderAESState, PartialWitnessAESState, StateTarget, WordTarget},
    circuit_bytes::{ByteLuts, ByteTarget, CircuitBuilderBytes, PartialWitnessBytes},
    config::{check_key_params, AesGcmContext, CounterStrategy},
    constants::BLOCK_LEN,
    D,
};

/// 16 bytes: a plaintext/ciphertext block, a counter block or a tag.
pub type BlockTarget = [ByteTarget; 16];

pub trait CircuitBuilderCtr<F: RichField + Extendable<D>, const D: usize> {
    /// inc32 with the strategy configured in `ctx`.
    fn inc32(&mut self, ctx: &AesGcmContext, block: BlockTarget) -> BlockTarget;

    /// inc32 as a ripple-carry adder over the 32 counter bits.
    fn inc32_bit_ripple(&mut self, block: BlockTarget) -> BlockTarget;

    /// inc32 as a carry chain over the 4 counter bytes.
    fn inc32_byte_carry(&mut self, block: BlockTarget) -> BlockTarget;

    fn xor_blocks(&mut self, luts: &ByteLuts, a: BlockTarget, b: BlockTarget) -> BlockTarget;

    /// GCTR_K(icb, x). L: size of the input in bytes.
    fn gctr<const NR: usize, const L: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
        icb: BlockTarget,
        x: &[ByteTarget; L],
    ) -> [ByteTarget; L]
    where
        [(); 4 * (NR + 1)]:;
}

impl CircuitBuilderCtr<F, D> for CircuitBuilder<F, D> {
    fn inc32(&mut self, ctx: &AesGcmContext, block: BlockTarget) -> BlockTarget {
        match ctx.config.counter {
            CounterStrategy::BitRipple => self.inc32_bit_ripple(block),
            CounterStrategy::ByteCarry => self.inc32_byte_carry(block),
        }
    }

    fn inc32_bit_ripple(&mut self, block: BlockTarget) -> BlockTarget {
        let mut r = block;

        let mut carry = self._true();
        for byte_index in (12..16).rev() {
            let bits = self.byte_to_bits(block[byte_index]);
            let mut sum = [carry; 8];
            for (bit_index, a) in bits.into_iter().enumerate() {
                sum[bit_index] = self.xor_bits(a, carry);
                carry = self.and(a, carry);
            }
            r[byte_index] = self.from_bits(&sum);
        }
        r
    }

    fn inc32_byte_carry(&mut self, block: BlockTarget) -> BlockTarget {
        let mut r = block;

        let byte_modulus = self.constant(F::from_canonical_u64(1 << 8));
        let mut carry = self.one();
        for byte_index in (12..16).rev() {
            // s <= 256, and s == 256 exactly when the byte wraps
            let s = self.add(block[byte_index], carry);
            let wraps: BoolTarget = self.is_equal(s, byte_modulus);
            r[byte_index] = self.mul_const_add(-F::from_canonical_u64(1 << 8), wraps.target, s);
            carry = wraps.target;
        }
        r
    }

    fn xor_blocks(&mut self, luts: &ByteLuts, a: BlockTarget, b: BlockTarget) -> BlockTarget {
        array::from_fn(|i| self.xor_bytes(luts, a[i], b[i]))
    }

    fn gctr<const NR: usize, const L: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
        icb: BlockTarget,
        x: &[ByteTarget; L],
    ) -> [ByteTarget; L]
    where
        [(); 4 * (NR + 1)]:,
    {
        let mut y: [ByteTarget; L] = *x;
        let mut cb_i = icb;

        for (i, x_i) in x.chunks(BLOCK_LEN).enumerate() {
            if i > 0 {
                cb_i = self.inc32(ctx, cb_i);
            }
            let ciph_cb_i = self
                .encrypt_block::<NR>(ctx, StateTarget::from_block(cb_i), w)
                .to_block();

            // last chunk might be smaller than 16 bytes (L%16 bytes), the
            // unused tail of the keystream block is dropped
            for (j, x_ij) in x_i.iter().enumerate() {
                y[i * BLOCK_LEN + j] = self.xor_bytes(&ctx.luts, *x_ij, ciph_cb_i[j]);
            }
        }
        y
    }
}

/// CtrEncrypt / CtrDecrypt: `output = GCTR_K(icb, input)`. CTR is its own
/// inverse, so the same target decrypts when `input` holds a ciphertext.
#[derive(Debug, Clone)]
pub struct CtrTarget<const NK: usize, const NR: usize, const L: usize> {
    pub key: [WordTarget; NK],
    pub icb: BlockTarget,
    pub input: [ByteTarget; L],
    pub output: [ByteTarget; L],
}

impl<const NK: usize, const NR: usize, const L: usize> CtrTarget<NK, NR, L>
where
    [(); 4 * (NR + 1)]:,
{
    pub fn new_virtual(builder: &mut CircuitBuilder<F, D>, ctx: &AesGcmContext) -> Result<Self> {
        check_key_params::<NK, NR>()?;

        let key = builder.add_virtual_key::<NK>();
        let icb: BlockTarget = builder.add_virtual_byte_arr();
        let input: [ByteTarget; L] = builder.add_virtual_byte_arr();

        let w = builder.key_expansion::<NK, NR>(ctx, &key);
        let output = builder.gctr::<NR, L>(ctx, &w, icb, &input);

        log::debug!(
            "CTR (NK:{}, NR:{}, L:{}, counter:{:?}) num_gates: {}",
            NK,
            NR,
            L,
            ctx.config.counter,
            builder.num_gates()
        );
        Ok(Self {
            key,
            icb,
            input,
            output,
        })
    }

    pub fn register_public_outputs(&self, builder: &mut CircuitBuilder<F, D>) {
        builder.register_public_inputs(&self.output);
    }

    pub fn set_targets(
        &self,
        pw: &mut PartialWitness<F>,
        key: &[u8],
        icb: &[u8],
        input: &[u8],
    ) -> Result<()> {
        pw.set_key_targets(&self.key, key)?;
        pw.set_byte_targets(&self.icb, icb)?;
        pw.set_byte_targets(&self.input, input)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use plonky2::{
        field::{goldilocks_field::GoldilocksField as F, types::PrimeField64},
        iop::witness::PartialWitness,
        plonk::{circuit_builder::CircuitBuilder, circuit_data::CircuitConfig},
    };
    use rand::Rng;

    use super::*;
    use crate::{
        circuit_bytes::tests::{init_logger, C},
        config::GadgetConfig,
        native_aes::{key_expansion, key_words},
        native_gcm::{gctr, inc32},
    };

    /// Both counter encodings run on the same block and are wired together.
    #[test]
    fn test_inc32_strategies() -> Result<()> {
        let config = CircuitConfig::standard_recursion_config();
        let mut builder = CircuitBuilder::<F, D>::new(config);

        let block: BlockTarget = builder.add_virtual_byte_arr();
        let by_bits = builder.inc32_bit_ripple(block);
        let by_bytes = builder.inc32_byte_carry(block);
        std::iter::zip(by_bits, by_bytes).for_each(|(a, b)| builder.connect(a, b));
        builder.register_public_inputs(&by_bytes);

        println!("inc32 bit-ripple + byte-carry num_gates: {}", builder.num_gates());
        let data = builder.build::<C>();

        let mut rng = rand::thread_rng();
        let mut test_blocks: Vec<[u8; 16]> = (0..4).map(|_| rng.gen()).collect();
        for tail in [
            [0xff, 0xff, 0xff, 0xff],
            [0x00, 0x00, 0x00, 0x00],
            [0x00, 0x00, 0x00, 0xff],
            [0x00, 0xff, 0xff, 0xff],
            [0xfe, 0xff, 0xff, 0xff],
            [0x12, 0x34, 0x56, 0x78],
        ] {
            let mut b: [u8; 16] = rng.gen();
            b[12..].copy_from_slice(&tail);
            test_blocks.push(b);
        }

        test_blocks.into_iter().try_for_each(|b| {
            let mut pw = PartialWitness::<F>::new();
            pw.set_byte_targets(&block, &b)?;

            let proof = data.prove(pw)?;
            let out: Vec<u8> = proof
                .public_inputs
                .iter()
                .map(|v| v.to_canonical_u64() as u8)
                .collect();
            assert_eq!(out, inc32(b).to_vec());
            data.verify(proof)
        })
    }

    #[test]
    fn test_inc32_wraparound() -> Result<()> {
        for config in [GadgetConfig::default(), GadgetConfig::baseline()] {
            let circuit_config = CircuitConfig::standard_recursion_config();
            let mut builder = CircuitBuilder::<F, D>::new(circuit_config);
            let ctx = AesGcmContext::new(config);

            let block: BlockTarget = builder.add_virtual_byte_arr();
            let out = builder.inc32(&ctx, block);
            let data = builder.build::<C>();

            let mut b = [0x5au8; 16];
            b[12..].copy_from_slice(&[0xff; 4]);
            let mut expected = b;
            expected[12..].copy_from_slice(&[0x00; 4]);

            let mut pw = PartialWitness::<F>::new();
            pw.set_byte_targets(&block, &b)?;
            pw.set_byte_targets(&out, &expected)?;

            let proof = data.prove(pw)?;
            data.verify(proof)?;
        }
        Ok(())
    }

    #[test]
    fn test_gctr() -> Result<()> {
        // AES-128
        test_gctr_op::<4, 10, 13>(GadgetConfig::default())?;
        test_gctr_op::<4, 10, 17>(GadgetConfig::baseline().with_sbox(Default::default()))?;

        // AES-256
        test_gctr_op::<8, 14, 32>(GadgetConfig::default())?;

        Ok(())
    }

    fn test_gctr_op<const NK: usize, const NR: usize, const L: usize>(
        gadget_config: GadgetConfig,
    ) -> Result<()>
    where
        [(); 4 * (NR + 1)]:,
    {
        init_logger();
        let mut rng = rand::thread_rng();
        let key: Vec<u8> = (0..4 * NK).map(|_| rng.gen()).collect();
        let mut icb: [u8; 16] = rng.gen();
        // force a carry out of the low counter byte on the second block
        icb[15] = 0xff;
        let pt: Vec<u8> = (0..L).map(|_| rng.gen()).collect();

        let expanded_key = key_expansion::<NK, NR>(&key_words::<NK>(&key)?);
        let expected = gctr::<NR>(&expanded_key, &icb, &pt);
        // self-inverse
        assert_eq!(gctr::<NR>(&expanded_key, &icb, &expected), pt);

        // Circuit declaration
        let config = CircuitConfig::standard_recursion_config();
        let mut builder = CircuitBuilder::<F, D>::new(config);
        let ctx = AesGcmContext::new(gadget_config);

        let ctr_target = CtrTarget::<NK, NR, L>::new_virtual(&mut builder, &ctx)?;

        println!(
            "gctr (NK:{}, NR:{}, L:{}) num_gates: {}",
            NK,
            NR,
            L,
            builder.num_gates()
        );
        let data = builder.build::<C>();

        // encrypt
        let mut pw = PartialWitness::<F>::new();
        ctr_target.set_targets(&mut pw, &key, &icb, &pt)?;
        pw.set_byte_targets(&ctr_target.output, &expected)?;
        let proof = data.prove(pw)?;
        data.verify(proof)?;

        // decrypt with the same circuit
        let mut pw = PartialWitness::<F>::new();
        ctr_target.set_targets(&mut pw, &key, &icb, &expected)?;
        pw.set_byte_targets(&ctr_target.output, &pt)?;
        let proof = data.prove(pw)?;
        data.verify(proof)
    }
}
