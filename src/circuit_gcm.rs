//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! AES-GCM authenticated encryption and decryption (SP 800-38D, section 7)
//! composed from the block cipher, counter and GHASH gadgets.

use anyhow::{ensure, Result};
use plonky2::{
    field::{extension::Extendable, goldilocks_field::GoldilocksField as F},
    hash::hash_types::RichField,
    iop::{target::BoolTarget, witness::PartialWitness},
    plonk::circuit_builder::CircuitBuilder,
};

use crate::{
    circuit_aes::{CircuitBuilderAESState, PartialWitnessAESState, StateTarget, WordTarget},
    circuit_bytes::{ByteTarget, CircuitBuilderBytes, PartialWitnessBytes},
    circuit_ctr::{BlockTarget, CircuitBuilderCtr},
    circuit_ghash::{CircuitBuilderGhash, Gf128Target},
    config::{check_key_params, AesGcmContext},
    constants::DEFAULT_IV_LEN,
    D,
};

pub trait CircuitBuilderGcm<F: RichField + Extendable<D>, const D: usize> {
    /// H = CIPH_K(0^128)
    fn gcm_hash_subkey<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
    ) -> Gf128Target
    where
        [(); 4 * (NR + 1)]:;

    /// Pre-counter block J_0. A 96-bit IV is used directly, any other
    /// length goes through GHASH. Fails on an empty IV.
    fn gcm_j0(
        &mut self,
        ctx: &AesGcmContext,
        h: &Gf128Target,
        iv: &[ByteTarget],
    ) -> Result<BlockTarget>;

    /// T = GHASH_H(A || 0^v || C || 0^u || [len(A)]_64 || [len(C)]_64) xor CIPH_K(J_0)
    fn gcm_tag<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
        h: &Gf128Target,
        j0: BlockTarget,
        aad: &[ByteTarget],
        ct: &[ByteTarget],
    ) -> BlockTarget
    where
        [(); 4 * (NR + 1)]:;
}

impl CircuitBuilderGcm<F, D> for CircuitBuilder<F, D> {
    fn gcm_hash_subkey<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
    ) -> Gf128Target
    where
        [(); 4 * (NR + 1)]:,
    {
        let zero_block = self.constant_bytes([0u8; 16]);
        let h = self
            .encrypt_block::<NR>(ctx, StateTarget::from_block(zero_block), w)
            .to_block();
        self.block_to_gf128(&h)
    }

    fn gcm_j0(
        &mut self,
        ctx: &AesGcmContext,
        h: &Gf128Target,
        iv: &[ByteTarget],
    ) -> Result<BlockTarget> {
        ensure!(!iv.is_empty(), "IV must not be empty");

        if iv.len() == DEFAULT_IV_LEN {
            // J_0 = IV || 0^31 || 1
            let tail = self.constant_bytes([0, 0, 0, 1]);
            let mut j0 = [tail[0]; 16];
            j0[..12].copy_from_slice(iv);
            j0[12..].copy_from_slice(&tail);
            return Ok(j0);
        }

        // J_0 = GHASH_H(IV || 0^(s+64) || [len(IV)]_64)
        let mut blocks = self.bytes_to_gf128_blocks(iv);
        let mut len_block = [0u8; 16];
        len_block[8..].copy_from_slice(&((iv.len() as u64) * 8).to_be_bytes());
        blocks.push(self.constant_gf128(len_block));

        let j0 = self.ghash(ctx, h, &blocks);
        Ok(self.gf128_to_block(&j0))
    }

    fn gcm_tag<const NR: usize>(
        &mut self,
        ctx: &AesGcmContext,
        w: &[WordTarget; 4 * (NR + 1)],
        h: &Gf128Target,
        j0: BlockTarget,
        aad: &[ByteTarget],
        ct: &[ByteTarget],
    ) -> BlockTarget
    where
        [(); 4 * (NR + 1)]:,
    {
        let mut len_block = [0u8; 16];
        len_block[..8].copy_from_slice(&((aad.len() as u64) * 8).to_be_bytes());
        len_block[8..].copy_from_slice(&((ct.len() as u64) * 8).to_be_bytes());

        let mut blocks = self.bytes_to_gf128_blocks(aad);
        blocks.extend(self.bytes_to_gf128_blocks(ct));
        blocks.push(self.constant_gf128(len_block));

        let s = self.ghash(ctx, h, &blocks);
        let s = self.gf128_to_block(&s);

        let ciph_j0 = self
            .encrypt_block::<NR>(ctx, StateTarget::from_block(j0), w)
            .to_block();
        self.xor_blocks(&ctx.luts, s, ciph_j0)
    }
}

/// GcmEncrypt over a witness key, IV, plaintext and AAD.
///
/// IV: IV length in bytes, L: plaintext length in bytes, A: AAD length in bytes.
#[derive(Debug, Clone)]
pub struct AesGcmTarget<
    const NK: usize,
    const NR: usize,
    const IV: usize,
    const L: usize,
    const A: usize,
> {
    pub key: [WordTarget; NK],
    pub iv: [ByteTarget; IV],
    pub pt: [ByteTarget; L],
    pub aad: [ByteTarget; A],
    pub ct: [ByteTarget; L],
    pub tag: BlockTarget,
}

impl<const NK: usize, const NR: usize, const IV: usize, const L: usize, const A: usize>
    AesGcmTarget<NK, NR, IV, L, A>
where
    [(); 4 * (NR + 1)]:,
{
    pub fn new_virtual(builder: &mut CircuitBuilder<F, D>, ctx: &AesGcmContext) -> Result<Self> {
        check_key_params::<NK, NR>()?;
        ensure!(IV > 0, "IV must not be empty");

        let key = builder.add_virtual_key::<NK>();
        let iv: [ByteTarget; IV] = builder.add_virtual_byte_arr();
        let pt: [ByteTarget; L] = builder.add_virtual_byte_arr();
        let aad: [ByteTarget; A] = builder.add_virtual_byte_arr();

        let w = builder.key_expansion::<NK, NR>(ctx, &key);
        let h = builder.gcm_hash_subkey::<NR>(ctx, &w);
        let j0 = builder.gcm_j0(ctx, &h, &iv)?;

        let icb = builder.inc32(ctx, j0);
        let ct = builder.gctr::<NR, L>(ctx, &w, icb, &pt);
        let tag = builder.gcm_tag::<NR>(ctx, &w, &h, j0, &aad, &ct);

        log::debug!(
            "AES-GCM encrypt (NK:{}, NR:{}, IV:{}, L:{}, A:{}, {:?}) num_gates: {}",
            NK,
            NR,
            IV,
            L,
            A,
            ctx.config,
            builder.num_gates()
        );
        Ok(Self {
            key,
            iv,
            pt,
            aad,
            ct,
            tag,
        })
    }

    /// Ciphertext followed by the tag.
    pub fn register_public_outputs(&self, builder: &mut CircuitBuilder<F, D>) {
        builder.register_public_inputs(&self.ct);
        builder.register_public_inputs(&self.tag);
    }

    pub fn set_targets(
        &self,
        pw: &mut PartialWitness<F>,
        key: &[u8],
        iv: &[u8],
        pt: &[u8],
        aad: &[u8],
    ) -> Result<()> {
        pw.set_key_targets(&self.key, key)?;
        pw.set_byte_targets(&self.iv, iv)?;
        pw.set_byte_targets(&self.pt, pt)?;
        pw.set_byte_targets(&self.aad, aad)
    }
}

/// GcmDecrypt over a witness key, IV, ciphertext, AAD and tag. The plaintext
/// is always produced; `is_valid` is 1 iff the tag matches, so a wrong tag
/// still yields a satisfiable circuit.
#[derive(Debug, Clone)]
pub struct AesGcmDecryptTarget<
    const NK: usize,
    const NR: usize,
    const IV: usize,
    const L: usize,
    const A: usize,
> {
    pub key: [WordTarget; NK],
    pub iv: [ByteTarget; IV],
    pub ct: [ByteTarget; L],
    pub aad: [ByteTarget; A],
    pub tag: BlockTarget,
    pub pt: [ByteTarget; L],
    pub is_valid: BoolTarget,
}

impl<const NK: usize, const NR: usize, const IV: usize, const L: usize, const A: usize>
    AesGcmDecryptTarget<NK, NR, IV, L, A>
where
    [(); 4 * (NR + 1)]:,
{
    pub fn new_virtual(builder: &mut CircuitBuilder<F, D>, ctx: &AesGcmContext) -> Result<Self> {
        check_key_params::<NK, NR>()?;
        ensure!(IV > 0, "IV must not be empty");

        let key = builder.add_virtual_key::<NK>();
        let iv: [ByteTarget; IV] = builder.add_virtual_byte_arr();
        let ct: [ByteTarget; L] = builder.add_virtual_byte_arr();
        let aad: [ByteTarget; A] = builder.add_virtual_byte_arr();
        let tag: BlockTarget = builder.add_virtual_byte_arr();

        let w = builder.key_expansion::<NK, NR>(ctx, &key);
        let h = builder.gcm_hash_subkey::<NR>(ctx, &w);
        let j0 = builder.gcm_j0(ctx, &h, &iv)?;

        let icb = builder.inc32(ctx, j0);
        let pt = builder.gctr::<NR, L>(ctx, &w, icb, &ct);
        let expected_tag = builder.gcm_tag::<NR>(ctx, &w, &h, j0, &aad, &ct);
        let is_valid = builder.bytes_equal(&expected_tag, &tag);

        log::debug!(
            "AES-GCM decrypt (NK:{}, NR:{}, IV:{}, L:{}, A:{}, {:?}) num_gates: {}",
            NK,
            NR,
            IV,
            L,
            A,
            ctx.config,
            builder.num_gates()
        );
        Ok(Self {
            key,
            iv,
            ct,
            aad,
            tag,
            pt,
            is_valid,
        })
    }

    /// Plaintext followed by the validity bit.
    pub fn register_public_outputs(&self, builder: &mut CircuitBuilder<F, D>) {
        builder.register_public_inputs(&self.pt);
        builder.register_public_input(self.is_valid.target);
    }

    pub fn set_targets(
        &self,
        pw: &mut PartialWitness<F>,
        key: &[u8],
        iv: &[u8],
        ct: &[u8],
        aad: &[u8],
        tag: &[u8],
    ) -> Result<()> {
        pw.set_key_targets(&self.key, key)?;
        pw.set_byte_targets(&self.iv, iv)?;
        pw.set_byte_targets(&self.ct, ct)?;
        pw.set_byte_targets(&self.aad, aad)?;
        pw.set_byte_targets(&self.tag, tag)
    }
}
