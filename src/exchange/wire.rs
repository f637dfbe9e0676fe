//! Numeric wire codec.
//!
//! Amounts are supplied as `f64` and must reach the wire as canonical decimal
//! strings or scaled integers. Every conversion checks that the wire value
//! denotes the same amount the caller asked for; anything else is a
//! [`Error::Precision`], never a silent rounding.

use std::str::FromStr;

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::error::{Error, Result};

/// Scale used for integer USD amounts (micro-dollars).
pub const USD_POWER: i32 = 6;

const WIRE_TOLERANCE: f64 = 1e-12;
const INT_TOLERANCE: f64 = 1e-3;

/// Converts a float into its canonical wire string.
///
/// The value is formatted with 8 fractional digits, checked against the input,
/// then normalized: trailing zeros are stripped, `-0` becomes `0` and the
/// result never uses exponent notation.
///
/// Magnitudes beyond what a [`Decimal`] can hold (about `7.9e28`) are rejected
/// as [`Error::Precision`].
///
/// ```
/// use astersdk::exchange::wire::float_to_wire;
///
/// assert_eq!(float_to_wire(50000.0).unwrap(), "50000");
/// assert_eq!(float_to_wire(0.5).unwrap(), "0.5");
/// assert!(float_to_wire(0.123456789).is_err());
/// ```
pub fn float_to_wire(x: f64) -> Result<String> {
    if !x.is_finite() {
        return Err(Error::precision(x, "not a finite number"));
    }

    let rounded = format!("{x:.8}");
    let parsed = f64::from_str(&rounded).map_err(|_| Error::precision(x, "unparsable"))?;
    if (parsed - x).abs() >= WIRE_TOLERANCE {
        return Err(Error::precision(x, "more than 8 fractional digits"));
    }

    let decimal =
        Decimal::from_str(&rounded).map_err(|_| Error::precision(x, "out of decimal range"))?;
    let normalized = decimal.normalize();
    if normalized.is_zero() {
        return Ok("0".to_owned());
    }

    Ok(normalized.to_string())
}

/// Converts a float into an integer scaled by `10^power`.
///
/// Fails when the scaled value is further than `1e-3` from an integer.
pub fn float_to_int(x: f64, power: i32) -> Result<i64> {
    if !x.is_finite() {
        return Err(Error::precision(x, "not a finite number"));
    }

    let with_decimals = x * 10f64.powi(power);
    let rounded = with_decimals.round();
    if (rounded - with_decimals).abs() >= INT_TOLERANCE {
        return Err(Error::precision(x, "scaled value is not an integer"));
    }

    rounded
        .to_i64()
        .ok_or_else(|| Error::precision(x, "scaled value overflows i64"))
}

/// Converts a USD amount into micro-dollars.
#[inline(always)]
pub fn float_to_usd_int(x: f64) -> Result<i64> {
    float_to_int(x, USD_POWER)
}

/// Computes an aggressive limit price for a market order.
///
/// `px` is moved by `slippage` against the taker, rounded to 5 significant
/// figures and then to `6 - sz_decimals` decimals for perps or
/// `8 - sz_decimals` for spot.
pub fn slippage_price(
    px: f64,
    is_buy: bool,
    slippage: f64,
    sz_decimals: u32,
    is_spot: bool,
) -> Result<f64> {
    if !px.is_finite() || px <= 0.0 {
        return Err(Error::validation("px", format!("{px} is not a positive price")));
    }
    if !(0.0..1.0).contains(&slippage) {
        return Err(Error::validation(
            "slippage",
            format!("{slippage} is outside [0, 1)"),
        ));
    }

    let px = if is_buy {
        px * (1.0 + slippage)
    } else {
        px * (1.0 - slippage)
    };

    let max_decimals: u32 = if is_spot { 8 } else { 6 };
    let decimals = max_decimals.saturating_sub(sz_decimals);

    Decimal::from_f64(px)
        .and_then(|px| px.round_sf(5))
        .map(|px| px.round_dp(decimals))
        .and_then(|px| px.to_f64())
        .ok_or_else(|| Error::validation("px", format!("{px} is out of decimal range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_wire() {
        assert_eq!(float_to_wire(50000.0).unwrap(), "50000");
        assert_eq!(float_to_wire(0.5).unwrap(), "0.5");
        assert_eq!(float_to_wire(1.0).unwrap(), "1");
        assert_eq!(float_to_wire(0.00000001).unwrap(), "0.00000001");
        assert_eq!(float_to_wire(123.456).unwrap(), "123.456");
        assert_eq!(float_to_wire(-2.25).unwrap(), "-2.25");
        assert_eq!(float_to_wire(1e10).unwrap(), "10000000000");
    }

    #[test]
    fn test_float_to_wire_negative_zero() {
        assert_eq!(float_to_wire(-0.0).unwrap(), "0");
        assert_eq!(float_to_wire(0.0).unwrap(), "0");
        // below the tolerance, formats as -0.00000000
        assert_eq!(float_to_wire(-1e-13).unwrap(), "0");
    }

    #[test]
    fn test_float_to_wire_rejects_precision_loss() {
        let err = float_to_wire(0.123456789).unwrap_err();
        assert!(matches!(err, Error::Precision { .. }));

        assert!(float_to_wire(1.000000001).is_err());
        assert!(float_to_wire(f64::NAN).is_err());
        assert!(float_to_wire(f64::INFINITY).is_err());
        assert!(matches!(
            float_to_wire(1e30),
            Err(Error::Precision {
                reason: "out of decimal range",
                ..
            })
        ));
    }

    #[test]
    fn test_float_to_wire_round_trip() {
        // k / 1e8 is the closest f64 to a decimal with at most 8 fractional digits
        for k in (0..2_000_000i64).step_by(997).chain([1, 7, 99_999_999, 12_345_678_901]) {
            let x = k as f64 / 1e8;
            let wire = float_to_wire(x).unwrap();
            assert!(!wire.contains('e'), "{wire}");
            assert!(!wire.starts_with('+'), "{wire}");
            assert!(!wire.contains('.') || !wire.ends_with('0'), "{wire}");
            let parsed: f64 = wire.parse().unwrap();
            assert!((parsed - x).abs() < 1e-12, "{x} -> {wire}");
        }
    }

    #[test]
    fn test_float_to_int() {
        assert_eq!(float_to_int(1.5, 6).unwrap(), 1_500_000);
        assert_eq!(float_to_int(0.000001, 6).unwrap(), 1);
        assert_eq!(float_to_int(-3.0, 2).unwrap(), -300);
        assert_eq!(float_to_usd_int(12.34).unwrap(), 12_340_000);
    }

    #[test]
    fn test_float_to_int_rejects_precision_loss() {
        assert!(float_to_usd_int(0.0000001).is_err());
        assert!(float_to_int(1.25, 1).is_err());
        assert!(float_to_int(1e30, 6).is_err());
        assert!(float_to_int(f64::NAN, 6).is_err());
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_slippage_price() {
        // 100 * 1.05 = 105, already 5 significant figures
        assert_close(slippage_price(100.0, true, 0.05, 2, false).unwrap(), 105.0);
        assert_close(slippage_price(100.0, false, 0.05, 2, false).unwrap(), 95.0);
        // 5 significant figures: 43210.987 -> 43211
        assert_close(slippage_price(43210.987, true, 0.0, 0, false).unwrap(), 43211.0);
        // perps with 5 size decimals keep a single price decimal
        assert_close(slippage_price(1.23456, true, 0.0, 5, false).unwrap(), 1.2);
        // spot allows two more decimals
        assert_close(slippage_price(1.23456, true, 0.0, 5, true).unwrap(), 1.235);
    }

    #[test]
    fn test_slippage_price_rejects_bad_input() {
        assert!(slippage_price(0.0, true, 0.05, 2, false).is_err());
        assert!(slippage_price(10.0, true, 1.5, 2, false).is_err());
        assert!(slippage_price(f64::NAN, true, 0.05, 2, false).is_err());
    }
}
