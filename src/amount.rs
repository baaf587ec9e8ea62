//! Amount quantization.
//!
//! Layer-2 transactions carry amounts and fees in a packed floating point form: a base-10
//! exponent and a binary mantissa of limited width. A value the wire format cannot express
//! is rejected by the node, so everything is rounded down to the closest packable value
//! before submission. Rounding is always towards zero; a transfer never sends more than
//! asked for.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use rust_decimal::Decimal;

use crate::errors::{Error, Result};

/// Decimal places of the native asset (wei per ETH = 10^18).
pub const ETH_DECIMALS: u32 = 18;

const EXPONENT_BIT_WIDTH: u32 = 5;
const MAX_EXPONENT: u32 = (1 << EXPONENT_BIT_WIDTH) - 1;
const AMOUNT_MANTISSA_BIT_WIDTH: u32 = 35;
const FEE_MANTISSA_BIT_WIDTH: u32 = 11;

/// A transfer amount in wei that fits the 40-bit packed amount encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackedAmount(U256);

/// A fee in wei that fits the 16-bit packed fee encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PackedFee(U256);

impl PackedAmount {
    /// Round `wei` down to the closest packable amount.
    pub fn closest(wei: U256) -> Result<Self> {
        round_down(wei, AMOUNT_MANTISSA_BIT_WIDTH).map(Self)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl PackedFee {
    /// Round `wei` down to the closest packable fee.
    pub fn closest(wei: U256) -> Result<Self> {
        round_down(wei, FEE_MANTISSA_BIT_WIDTH).map(Self)
    }

    pub fn wei(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for PackedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PackedFee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Quantize a human readable amount and fee, both in ETH (e.g. `"0.01"`).
pub fn quantize(amount: &str, fee: &str) -> Result<(PackedAmount, PackedFee)> {
    let amount = PackedAmount::closest(parse_eth(amount)?)?;
    let fee = PackedFee::closest(parse_eth(fee)?)?;
    Ok((amount, fee))
}

/// Parse a decimal ETH string into wei.
pub fn parse_eth(value: &str) -> Result<U256> {
    let decimal = Decimal::from_str(value.trim())
        .map_err(|e| Error::invalid_amount(value, e.to_string()))?
        .normalize();

    if decimal.is_sign_negative() && !decimal.is_zero() {
        return Err(Error::invalid_amount(value, "amount must not be negative"));
    }
    if decimal.scale() > ETH_DECIMALS {
        return Err(Error::invalid_amount(
            value,
            format!("more than {ETH_DECIMALS} fractional digits"),
        ));
    }

    let mantissa = decimal.mantissa().unsigned_abs();
    let scale = U256::from(10u8).pow(U256::from(ETH_DECIMALS - decimal.scale()));
    Ok(U256::from(mantissa) * scale)
}

/// Whether `wei` is exactly expressible as a packed amount.
pub fn is_packable_amount(wei: U256) -> bool {
    matches!(PackedAmount::closest(wei), Ok(p) if p.wei() == wei)
}

/// Whether `wei` is exactly expressible as a packed fee.
pub fn is_packable_fee(wei: U256) -> bool {
    matches!(PackedFee::closest(wei), Ok(p) if p.wei() == wei)
}

fn round_down(value: U256, mantissa_bits: u32) -> Result<U256> {
    let ten = U256::from(10u8);
    let max_mantissa = (U256::from(1u8) << mantissa_bits) - U256::from(1u8);

    let mut mantissa = value;
    let mut exponent = 0u32;
    while mantissa > max_mantissa {
        if exponent == MAX_EXPONENT {
            return Err(Error::invalid_amount(
                value.to_string(),
                "exceeds the largest packable value",
            ));
        }
        mantissa /= ten;
        exponent += 1;
    }

    Ok(mantissa * ten.pow(U256::from(exponent)))
}
