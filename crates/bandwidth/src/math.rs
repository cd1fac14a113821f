//! Deterministic exponential used by every price curve in this module.

use lino_types::Dec;

use crate::errors::{BandwidthError, Result};

/// Number of squarings; `(1 + x/2^N)^(2^N)` approximates `e^x`.
const SQUARINGS: u32 = 10;

/// `2^SQUARINGS`
const DIVISOR: i64 = 1 << SQUARINGS;

/// Approximate `e^x` as `(1 + |x|/1024)^1024`, inverted for negative `x`.
///
/// Only [`Dec`] multiplication and division are used, so the result is
/// identical on every node. It underestimates the true exponential; the
/// chain's fee history depends on these exact digits.
///
/// Fails with [`BandwidthError::Overflow`] once `|x|` passes roughly 136,
/// where `e^|x|` no longer fits a [`Dec`].
pub fn approx_exp(x: Dec) -> Result<Dec> {
    let overflow = || BandwidthError::Overflow { context: "approx_exp" };
    let mut y = (x.abs() / Dec::from_int(DIVISOR))
        .checked_add(Dec::one())
        .ok_or_else(overflow)?;
    for _ in 0..SQUARINGS {
        y = y.checked_mul(y).ok_or_else(overflow)?;
    }
    if x.is_negative() {
        Ok(Dec::one() / y)
    } else {
        Ok(y)
    }
}
