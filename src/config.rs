//! For LICENSE check out https://github.com/0xPARC/plonky2-aes/blob/main/LICENSE
//!
//! Gadget strategies and per-circuit context.
//!
//! Every strategy pair computes the same function; they only differ in how many
//! constraints they cost. The defaults are the cheaper variant of each pair.

use anyhow::{bail, Result};

use crate::circuit_bytes::ByteLuts;

/// How SubBytes is expressed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SBoxStrategy {
    /// One lookup into the 256-entry S-box table per byte.
    #[default]
    Lookup,
    /// x^254 over bit wires followed by the affine map; no table needed.
    Algebraic,
}

/// How GF(2^128) products are expressed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Gf128Strategy {
    /// Shift-and-reduce over booleans (SP 800-38D, Algorithm 1).
    BitSerial,
    /// Accumulates the carry-less product as field integers, with the
    /// reduction folded in, and takes a single parity per output bit.
    #[default]
    DelayedParity,
}

/// How inc32 is expressed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CounterStrategy {
    /// 32-bit ripple-carry adder over the bits of the counter.
    BitRipple,
    /// Carry chain over the 4 counter bytes using equality tests.
    #[default]
    ByteCarry,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct GadgetConfig {
    pub sbox: SBoxStrategy,
    pub gf128: Gf128Strategy,
    pub counter: CounterStrategy,
}

impl GadgetConfig {
    /// The reference encodings: algebraic S-box, bit-serial GF(2^128) and ripple counter.
    pub fn baseline() -> Self {
        Self {
            sbox: SBoxStrategy::Algebraic,
            gf128: Gf128Strategy::BitSerial,
            counter: CounterStrategy::BitRipple,
        }
    }

    pub fn with_sbox(mut self, sbox: SBoxStrategy) -> Self {
        self.sbox = sbox;
        self
    }

    pub fn with_gf128(mut self, gf128: Gf128Strategy) -> Self {
        self.gf128 = gf128;
        self
    }

    pub fn with_counter(mut self, counter: CounterStrategy) -> Self {
        self.counter = counter;
        self
    }
}

/// Lookup tables and strategies shared by all the gadgets of one circuit. The
/// table indices belong to the builder they were registered in, so a context
/// must not be reused across builders; debug builds panic on such a lookup.
#[derive(Debug, Clone, Default)]
pub struct AesGcmContext {
    pub luts: ByteLuts,
    pub config: GadgetConfig,
}

impl AesGcmContext {
    pub fn new(config: GadgetConfig) -> Self {
        Self {
            luts: ByteLuts::default(),
            config,
        }
    }
}

/// Accepts the three AES variants: (NK, NR) in {(4, 10), (6, 12), (8, 14)}.
pub fn check_key_params<const NK: usize, const NR: usize>() -> Result<()> {
    match (NK, NR) {
        (4, 10) | (6, 12) | (8, 14) => Ok(()),
        _ => bail!("unsupported AES parameters NK={NK}, NR={NR}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_params() {
        assert!(check_key_params::<4, 10>().is_ok());
        assert!(check_key_params::<6, 12>().is_ok());
        assert!(check_key_params::<8, 14>().is_ok());
        assert!(check_key_params::<4, 14>().is_err());
        assert!(check_key_params::<5, 11>().is_err());
    }

    #[test]
    fn test_config_builders() {
        let config = GadgetConfig::default()
            .with_sbox(SBoxStrategy::Algebraic)
            .with_counter(CounterStrategy::BitRipple);
        assert_eq!(config.sbox, SBoxStrategy::Algebraic);
        assert_eq!(config.gf128, Gf128Strategy::DelayedParity);
        assert_eq!(config.counter, CounterStrategy::BitRipple);
        assert_eq!(
            GadgetConfig::baseline().with_gf128(Gf128Strategy::DelayedParity),
            GadgetConfig {
                sbox: SBoxStrategy::Algebraic,
                gf128: Gf128Strategy::DelayedParity,
                counter: CounterStrategy::BitRipple,
            }
        );
    }

    #[test]
    fn test_new_context_has_no_tables() {
        let ctx = AesGcmContext::new(GadgetConfig::baseline());
        assert_eq!(ctx.luts.num_registered(), 0);
        assert_eq!(ctx.config, GadgetConfig::baseline());
    }
}
