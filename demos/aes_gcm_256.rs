//! Run: `RUST_LOG=debug cargo run --release --example aes_gcm_256`
#![allow(incomplete_features)]
#![feature(generic_const_exprs)]

use anyhow::{anyhow, Result};
use plonky2::{
    field::goldilocks_field::GoldilocksField as F,
    iop::witness::PartialWitness,
    plonk::{
        circuit_builder::CircuitBuilder, circuit_data::CircuitConfig,
        config::PoseidonGoldilocksConfig,
    },
};
use plonky2_aes_gcm::{
    circuit_bytes::PartialWitnessBytes, AesGcm256Target, AesGcmContext, GadgetConfig, D,
    KEY_LEN_256,
};

fn main() -> Result<()> {
    env_logger::init();

    const IV: usize = 12; // size (bytes) of the IV
    const L: usize = 42; // size (bytes) of plaintext to encrypt
    const A: usize = 16; // size (bytes) of additional authenticated data

    let key: &[u8; KEY_LEN_256] = &[123; KEY_LEN_256];
    let nonce: &[u8; IV] = &[111; IV];
    let pt: &[u8; L] = &[231u8; L]; // plaintext
    let aad: &[u8; A] = &[7u8; A];

    // use external rust library to compute the ciphertext & tag
    use aes_gcm::{
        aead::{Aead, Payload},
        KeyInit,
    };
    let cipher = aes_gcm::Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| anyhow!("aes-gcm: {e}"))?;
    let encrypt_res = cipher
        .encrypt(aes_gcm::Nonce::from_slice(nonce), Payload { msg: pt, aad })
        .map_err(|e| anyhow!("aes-gcm: {e}"))?;
    let (ct, tag) = encrypt_res.split_at(L);

    // same values from this crate's native implementation
    let (native_ct, native_tag) =
        plonky2_aes_gcm::native_gcm::encrypt::<8, 14>(key, nonce, pt, aad)?;
    assert_eq!(native_ct, ct);
    assert_eq!(native_tag, tag);

    // circuit declaration
    let config = CircuitConfig::standard_recursion_zk_config();
    let mut builder = CircuitBuilder::<F, D>::new(config);
    let ctx = AesGcmContext::new(GadgetConfig::default());
    let aes_targets = AesGcm256Target::<IV, L, A>::new_virtual(&mut builder, &ctx)?;
    aes_targets.register_public_outputs(&mut builder);

    println!(
        "AES-GCM-256 circuit (IV:{}, L:{}, A:{}) num_gates: {}",
        IV,
        L,
        A,
        builder.num_gates()
    );

    let data = builder.build::<PoseidonGoldilocksConfig>();

    // set values to circuit
    let mut pw = PartialWitness::<F>::new();
    aes_targets.set_targets(&mut pw, key, nonce, pt, aad)?;
    pw.set_byte_targets(&aes_targets.ct, ct)?;
    pw.set_byte_targets(&aes_targets.tag, tag)?;

    let proof = data.prove(pw)?;
    data.verify(proof)
}
