//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
#![allow(incomplete_features)]
#![feature(generic_const_exprs)]

pub mod circuit_aes;
pub mod circuit_bytes;
pub mod circuit_ctr;
pub mod circuit_gcm;
pub mod circuit_ghash;
pub mod config;
pub mod constants;
pub mod native_aes;
pub mod native_gcm;

/// D defines the extension degree of the field used in the Plonky2 proofs (quadratic extension).
pub const D: usize = 2;

pub use circuit_aes::AesBlockTarget;
pub use circuit_ctr::CtrTarget;
pub use circuit_gcm::{AesGcmDecryptTarget, AesGcmTarget};
pub use config::{AesGcmContext, GadgetConfig};

// expose pre-defined configurations (AES-128, AES-192, AES-256), generic over
// the IV, plaintext and AAD lengths in bytes:

pub const KEY_LEN_128: usize = 4 * 4;
pub type AesGcm128Target<const IV: usize, const L: usize, const A: usize> =
    AesGcmTarget<4, 10, IV, L, A>;
pub type AesGcm128DecryptTarget<const IV: usize, const L: usize, const A: usize> =
    AesGcmDecryptTarget<4, 10, IV, L, A>;

pub const KEY_LEN_192: usize = 6 * 4;
pub type AesGcm192Target<const IV: usize, const L: usize, const A: usize> =
    AesGcmTarget<6, 12, IV, L, A>;
pub type AesGcm192DecryptTarget<const IV: usize, const L: usize, const A: usize> =
    AesGcmDecryptTarget<6, 12, IV, L, A>;

pub const KEY_LEN_256: usize = 8 * 4;
pub type AesGcm256Target<const IV: usize, const L: usize, const A: usize> =
    AesGcmTarget<8, 14, IV, L, A>;
pub type AesGcm256DecryptTarget<const IV: usize, const L: usize, const A: usize> =
    AesGcmDecryptTarget<8, 14, IV, L, A>;
