//! Amount parsing and decimal rescaling.
//!
//! Caller amounts are decimal strings. They are parsed at 18 decimals first
//! and then rescaled to the token's own precision.

use alloy::primitives::utils::parse_units;
use alloy::primitives::U256;

use crate::error::{AgentError, AgentResult};

/// Precision caller amounts are parsed at.
pub const BASE_DECIMALS: u8 = 18;

/// Reject amounts that are not finite, positive decimals.
pub fn validate_amount(amount: &str) -> AgentResult<()> {
    let trimmed = amount.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .parse::<f64>()
            .map(|v| v.is_finite() && v > 0.0)
            .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(AgentError::Validation(format!("Invalid amount: {}", amount)))
    }
}

/// Parse a positive decimal amount at 18 decimals.
pub fn parse_amount(amount: &str) -> AgentResult<U256> {
    validate_amount(amount)?;
    let value = parse_units(amount.trim(), BASE_DECIMALS)
        .map_err(|e| AgentError::Validation(format!("Invalid amount: {} ({})", amount, e)))?
        .get_absolute();
    if value.is_zero() {
        return Err(AgentError::Validation(format!("Invalid amount: {}", amount)));
    }
    Ok(value)
}

/// Move `value` from `from` decimals to `to` decimals, truncating.
///
/// Fails when the scale factor or the scaled value does not fit a `U256`.
pub fn rescale(value: U256, from: u8, to: u8) -> AgentResult<U256> {
    if from == to {
        return Ok(value);
    }
    let overflow = || {
        AgentError::Validation(format!(
            "Amount cannot be expressed with {} decimals: exceeds uint256",
            to
        ))
    };
    let factor = U256::from(10u64)
        .checked_pow(U256::from(from.abs_diff(to)))
        .ok_or_else(overflow)?;
    if to < from {
        Ok(value / factor)
    } else {
        value.checked_mul(factor).ok_or_else(overflow)
    }
}

/// Parse `amount` and express it in units of a token with `decimals`.
pub fn to_token_units(amount: &str, decimals: u8) -> AgentResult<U256> {
    let base = parse_amount(amount)?;
    let scaled = rescale(base, BASE_DECIMALS, decimals)?;
    if scaled.is_zero() {
        return Err(AgentError::Validation(format!(
            "Invalid amount: {} is below the token precision of {} decimals",
            amount, decimals
        )));
    }
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_amounts() {
        for bad in ["-1", "0", "", "abc", "NaN", "inf", "0.0"] {
            let err = validate_amount(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid amount"), "{}", bad);
        }
        assert!(validate_amount("0.5").is_ok());
    }

    #[test]
    fn test_parse_amount_at_base_precision() {
        assert_eq!(
            parse_amount("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert!(parse_amount("1e3").is_err());
    }

    #[test]
    fn test_six_decimal_token() {
        assert_eq!(to_token_units("100", 6).unwrap(), U256::from(100_000_000u64));
    }

    #[test]
    fn test_rescale_up_and_down() {
        assert_eq!(rescale(U256::from(1_000_000u64), 18, 12).unwrap(), U256::from(1u64));
        assert_eq!(rescale(U256::from(1u64), 18, 20).unwrap(), U256::from(100u64));
        assert_eq!(rescale(U256::from(7u64), 8, 8).unwrap(), U256::from(7u64));
    }

    #[test]
    fn test_sub_precision_amount_rejected() {
        assert!(to_token_units("0.0000001", 6).is_err());
    }

    #[test]
    fn test_oversized_decimals_rejected() {
        let err = to_token_units("1", 100).unwrap_err();
        assert!(matches!(err, AgentError::Validation(_)));
        assert!(err.to_string().contains("exceeds uint256"));

        assert!(rescale(U256::from(1u64), 0, 255).is_err());
        assert!(to_token_units("1", 77).is_ok());
    }
}
