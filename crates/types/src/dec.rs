//! Deterministic fixed-point decimal with 18 fractional digits.
//!
//! Every price, rate and credit balance in the chain state is a [`Dec`].
//! Values are stored as a sign and a 256-bit magnitude scaled by `10^18`,
//! which leaves room for punishment coefficients far beyond anything an
//! `i128` could hold. Products and quotients are evaluated exactly in 512
//! bits and then rounded back to 18 fractional digits half-to-even, so
//! independent validators always agree on the last digit.

use core::cmp::Ordering;
use core::fmt::{self, Display, Formatter};
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use core::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits carried by [`Dec`].
pub const PRECISION: u32 = 18;

/// Scaling factor: 1 unit = 1e-18.
const SCALE: u128 = 1_000_000_000_000_000_000;

/// Errors produced while parsing a decimal string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecError {
    #[error("empty decimal string")]
    Empty,
    #[error("invalid decimal string: {0}")]
    Invalid(String),
    #[error("too many fractional digits in {0} (max {PRECISION})")]
    TooPrecise(String),
    #[error("decimal out of range: {0}")]
    Overflow(String),
}

/// Signed fixed-point decimal with [`PRECISION`] fractional digits.
///
/// Zero is never negative, so the derived equality and hash agree with
/// numeric equality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec {
    negative: bool,
    magnitude: U256,
}

impl Dec {
    fn signed(negative: bool, magnitude: U256) -> Self {
        Self {
            negative: negative && !magnitude.is_zero(),
            magnitude,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn one() -> Self {
        Self::signed(false, U256::from(SCALE))
    }

    /// Whole-unit constructor.
    pub fn from_int(value: i64) -> Self {
        Self::from_i128(i128::from(value))
    }

    /// Whole-unit constructor for wide integers; every `i128` fits.
    pub fn from_i128(value: i128) -> Self {
        let magnitude = U256::from(value.unsigned_abs()) * U256::from(SCALE);
        Self::signed(value < 0, magnitude)
    }

    /// `numerator / denominator`, rounded like [`Dec::checked_quo`].
    ///
    /// # Panics
    /// Panics if `denominator` is zero.
    pub fn from_ratio(numerator: i64, denominator: i64) -> Self {
        Self::from_int(numerator) / Self::from_int(denominator)
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.magnitude.is_zero()
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        !self.negative && !self.magnitude.is_zero()
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.negative
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::signed(false, self.magnitude)
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        if self.negative == rhs.negative {
            let magnitude = self.magnitude.checked_add(rhs.magnitude)?;
            return Some(Self::signed(self.negative, magnitude));
        }
        Some(match self.magnitude.cmp(&rhs.magnitude) {
            Ordering::Less => Self::signed(rhs.negative, rhs.magnitude - self.magnitude),
            _ => Self::signed(self.negative, self.magnitude - rhs.magnitude),
        })
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.checked_add(-rhs)
    }

    /// Multiply, rounding the exact product half-to-even. `None` on overflow.
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let product = self.magnitude.full_mul(rhs.magnitude);
        let magnitude = U256::try_from(chop_precision_and_round(product)).ok()?;
        Some(Self::signed(self.negative != rhs.negative, magnitude))
    }

    /// Divide, rounding half-to-even. The quotient is first taken with 36
    /// fractional digits (truncated) and then rounded to 18.
    /// `None` when `rhs` is zero or the result overflows.
    pub fn checked_quo(self, rhs: Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        let scale = U512::from(SCALE);
        let numerator = U512::from(self.magnitude) * scale * scale;
        let quotient = numerator / U512::from(rhs.magnitude);
        let magnitude = U256::try_from(chop_precision_and_round(quotient)).ok()?;
        Some(Self::signed(self.negative != rhs.negative, magnitude))
    }

    /// Round to the nearest integer, ties to even. `None` beyond `i128`.
    pub fn round_to_int(self) -> Option<i128> {
        let rounded = chop_precision_and_round(U512::from(self.magnitude));
        if rounded.bits() > 127 {
            return None;
        }
        let abs = rounded.low_u128() as i128;
        Some(if self.negative { -abs } else { abs })
    }
}

/// Drop 18 fractional digits from a magnitude, rounding half-to-even.
///
/// Rounding the magnitude keeps the result symmetric around zero.
fn chop_precision_and_round(value: U512) -> U512 {
    let scale = U512::from(SCALE);
    let (quo, rem) = value.div_mod(scale);
    match (rem + rem).cmp(&scale) {
        Ordering::Less => quo,
        Ordering::Greater => quo + U512::one(),
        Ordering::Equal if quo.bit(0) => quo + U512::one(),
        Ordering::Equal => quo,
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
        }
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Dec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (whole, frac) = self.magnitude.div_mod(U256::from(SCALE));
        let sign = if self.negative { "-" } else { "" };
        write!(f, "{sign}{whole}.{:018}", frac.low_u64())
    }
}

impl FromStr for Dec {
    type Err = DecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DecError::Empty);
        }
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(DecError::Invalid(s.to_string()));
        }
        if frac.len() > PRECISION as usize {
            return Err(DecError::TooPrecise(s.to_string()));
        }

        let overflow = || DecError::Overflow(s.to_string());
        let whole = U256::from_dec_str(whole).map_err(|_| overflow())?;
        let frac_raw: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<18}");
            padded.parse().map_err(|_| DecError::Invalid(s.to_string()))?
        };
        let magnitude = whole
            .checked_mul(U256::from(SCALE))
            .and_then(|w| w.checked_add(U256::from(frac_raw)))
            .ok_or_else(overflow)?;
        Ok(Self::signed(negative, magnitude))
    }
}

impl TryFrom<String> for Dec {
    type Error = DecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dec> for String {
    fn from(value: Dec) -> Self {
        value.to_string()
    }
}

impl From<i64> for Dec {
    #[inline]
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl Neg for Dec {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self::Output {
        Self::signed(!self.negative, self.magnitude)
    }
}

impl Add for Dec {
    type Output = Self;

    /// # Panics
    /// Panics if the sum does not fit the decimal range.
    fn add(self, rhs: Self) -> Self::Output {
        match self.checked_add(rhs) {
            Some(sum) => sum,
            None => panic!("decimal overflow in {self} + {rhs}"),
        }
    }
}

impl AddAssign for Dec {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Dec {
    type Output = Self;

    /// # Panics
    /// Panics if the difference does not fit the decimal range.
    fn sub(self, rhs: Self) -> Self::Output {
        match self.checked_sub(rhs) {
            Some(difference) => difference,
            None => panic!("decimal overflow in {self} - {rhs}"),
        }
    }
}

impl SubAssign for Dec {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul for Dec {
    type Output = Self;

    /// # Panics
    /// Panics if the product does not fit the decimal range.
    fn mul(self, rhs: Self) -> Self::Output {
        match self.checked_mul(rhs) {
            Some(product) => product,
            None => panic!("decimal overflow in {self} * {rhs}"),
        }
    }
}

impl Div for Dec {
    type Output = Self;

    /// # Panics
    /// Panics on division by zero or overflow.
    fn div(self, rhs: Self) -> Self::Output {
        assert!(!rhs.is_zero(), "division by zero in Dec");
        match self.checked_quo(rhs) {
            Some(quotient) => quotient,
            None => panic!("decimal overflow in {self} / {rhs}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    /// Value already scaled by `10^18`.
    fn raw(value: i128) -> Dec {
        Dec::signed(value < 0, U256::from(value.unsigned_abs()))
    }

    #[test]
    fn parse_and_display_are_canonical() {
        assert_eq!(dec("1").to_string(), "1.000000000000000000");
        assert_eq!(dec("0.0252").to_string(), "0.025200000000000000");
        assert_eq!(dec("-12.5").to_string(), "-12.500000000000000000");
        assert_eq!(
            dec("910.849417274954801802"),
            raw(910_849_417_274_954_801_802)
        );
        assert_eq!(dec("-0"), Dec::zero());
        assert!(!dec("-0.0").is_negative());
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!("".parse::<Dec>(), Err(DecError::Empty));
        assert!(matches!("1.2.3".parse::<Dec>(), Err(DecError::Invalid(_))));
        assert!(matches!("abc".parse::<Dec>(), Err(DecError::Invalid(_))));
        assert!(matches!(".5".parse::<Dec>(), Err(DecError::Invalid(_))));
        assert!(matches!(
            "0.0000000000000000001".parse::<Dec>(),
            Err(DecError::TooPrecise(_))
        ));
        let too_wide = format!("1{}", "0".repeat(60));
        assert!(matches!(too_wide.parse::<Dec>(), Err(DecError::Overflow(_))));
    }

    #[test]
    fn basic_arithmetic() {
        let a = dec("1.5");
        let b = dec("2.25");
        assert_eq!(a + b, dec("3.75"));
        assert_eq!(a - b, dec("-0.75"));
        assert_eq!(b - a, dec("0.75"));
        assert_eq!(a * b, dec("3.375"));
        assert_eq!(b / a, dec("1.5"));
        assert_eq!(-a, dec("-1.5"));
        assert_eq!(-a * -b, dec("3.375"));
        assert_eq!(-a + a, Dec::zero());
    }

    #[test]
    fn ordering_follows_sign_and_magnitude() {
        let mut values = vec![dec("2"), dec("-3"), Dec::zero(), dec("-0.5"), dec("0.5")];
        values.sort();
        assert_eq!(
            values,
            vec![dec("-3"), dec("-0.5"), Dec::zero(), dec("0.5"), dec("2")]
        );
        assert_eq!(dec("-1").max(Dec::zero()), Dec::zero());
    }

    #[test]
    fn division_rounds_half_to_even() {
        assert_eq!(Dec::from_ratio(1, 3), dec("0.333333333333333333"));
        assert_eq!(Dec::from_ratio(2, 3), dec("0.666666666666666667"));
        assert_eq!(Dec::from_ratio(-2, 3), dec("-0.666666666666666667"));
        assert_eq!(Dec::from_ratio(1000, 3), dec("333.333333333333333333"));
    }

    #[test]
    fn multiplication_ties_go_to_even() {
        let half = dec("0.5");
        assert_eq!(raw(1) * half, Dec::zero());
        assert_eq!(raw(3) * half, raw(2));
        assert_eq!(raw(-3) * half, raw(-2));
    }

    #[test]
    fn round_to_int_uses_bankers_rounding() {
        assert_eq!(dec("2.5").round_to_int(), Some(2));
        assert_eq!(dec("3.5").round_to_int(), Some(4));
        assert_eq!(dec("2522.536744331140").round_to_int(), Some(2523));
        assert_eq!(dec("-2.5").round_to_int(), Some(-2));
        assert_eq!(dec("-2.6").round_to_int(), Some(-3));
        assert_eq!(Dec::from_int(10).round_to_int(), Some(10));
        let beyond_i128 = Dec::from_i128(i128::MAX) * Dec::from_int(4);
        assert_eq!(beyond_i128.round_to_int(), None);
    }

    #[test]
    fn values_beyond_i128_are_exact() {
        // squaring step of exp(53): well past what an i128 could store
        let y = dec("167345904689.977341382923031542");
        let squared = y * y;
        assert!(squared > Dec::from_i128(i128::MAX / 1_000_000_000_000_000_000));
        assert_eq!(squared / y, y);
        assert_eq!(squared.to_string().parse::<Dec>().unwrap(), squared);
    }

    #[test]
    fn checked_ops_report_failures() {
        assert_eq!(Dec::one().checked_quo(Dec::zero()), None);
        let huge = dec(&format!("1{}", "0".repeat(58)));
        assert_eq!(huge.checked_mul(dec("12")), None);
        let half_range = dec(&format!("6{}", "0".repeat(58)));
        assert_eq!(half_range.checked_add(half_range), None);
        assert_eq!((-half_range).checked_sub(half_range), None);
        assert_eq!(huge.checked_sub(huge), Some(Dec::zero()));
        assert_eq!(huge.checked_mul(dec("0.001")), Some(dec(&format!("1{}", "0".repeat(55)))));
    }

    #[test]
    #[should_panic(expected = "decimal overflow")]
    fn operator_overflow_panics() {
        let huge = dec(&format!("1{}", "0".repeat(58)));
        let _ = huge * huge;
    }

    #[test]
    fn serializes_as_decimal_string() {
        let value = dec("0.025225367443311400");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"0.025225367443311400\"");
        let back: Dec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert!(serde_json::from_str::<Dec>("\"nope\"").is_err());
    }
}
