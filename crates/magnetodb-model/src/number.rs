//! Arbitrary-precision decimal numbers for `N` attribute values.
//!
//! A [`Decimal`] is stored in canonical form: the significant digits without
//! leading or trailing zeros, a sign, and a power-of-ten exponent. Two values
//! are equal exactly when they are numerically equal, so `"1.0"`, `"01"` and
//! `"1"` collapse to one set member and one map key.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Maximum number of significant digits.
pub const MAX_PRECISION: usize = 38;

/// Largest allowed adjusted exponent (exponent of the leading digit).
pub const MAX_ADJUSTED_EXPONENT: i64 = 126;

/// Smallest allowed adjusted exponent.
pub const MIN_ADJUSTED_EXPONENT: i64 = -128;

// Plain (non-scientific) notation is used while the adjusted exponent stays
// within this window.
const PLAIN_MIN_ADJUSTED: i64 = -7;
const PLAIN_MAX_ADJUSTED: i64 = 38;

/// Errors produced while parsing or computing numbers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    /// Empty numeric literal.
    #[error("The parameter cannot be converted to a numeric value")]
    Empty,
    /// Malformed numeric literal.
    #[error("The parameter cannot be converted to a numeric value: '{0}'")]
    Invalid(String),
    /// More significant digits than supported.
    #[error("Attempting to store more than {MAX_PRECISION} significant digits in a Number")]
    Precision,
    /// Magnitude too large.
    #[error("Number overflow. Attempting to store a number with magnitude larger than supported range")]
    Overflow,
    /// Magnitude too small.
    #[error("Number underflow. Attempting to store a number with magnitude smaller than supported range")]
    Underflow,
}

/// Canonical arbitrary-precision decimal.
///
/// The value is `(-1)^negative * digits * 10^exponent`. Zero has no digits,
/// a positive sign and a zero exponent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Decimal {
    negative: bool,
    /// ASCII digits, no leading or trailing `'0'`.
    digits: String,
    exponent: i64,
}

impl Decimal {
    /// The number zero.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Parse a numeric literal such as `"-12.50"` or `"1.5e10"`.
    ///
    /// # Errors
    /// Returns a [`NumberError`] for empty or malformed input, more than 38
    /// significant digits, or a magnitude outside the supported range.
    pub fn parse(s: &str) -> Result<Self, NumberError> {
        if s.is_empty() {
            return Err(NumberError::Empty);
        }
        let invalid = || NumberError::Invalid(s.to_owned());
        if s.trim() != s {
            return Err(invalid());
        }

        let (negative, rest) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (mantissa, explicit_exp) = match rest.find(['e', 'E']) {
            Some(pos) => {
                let exp: i64 = rest[pos + 1..].parse().map_err(|_| invalid())?;
                (&rest[..pos], exp)
            }
            None => (rest, 0),
        };

        let (int_part, frac_part) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f),
            None => (mantissa, ""),
        };
        let all_digits = int_part.bytes().chain(frac_part.bytes());
        if int_part.len() + frac_part.len() == 0 || !all_digits.clone().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let digits: Vec<u8> = all_digits.map(|b| b - b'0').collect();
        let frac_len = i64::try_from(frac_part.len()).map_err(|_| invalid())?;
        // Saturation keeps absurd exponents out of range instead of wrapping.
        let exponent = explicit_exp.saturating_sub(frac_len);

        let (digits, exponent) = strip_zeros(digits, exponent);
        if digits.len() > MAX_PRECISION {
            return Err(NumberError::Precision);
        }
        Self::from_parts(negative, &digits, exponent)
    }

    /// Build a canonical value from already stripped digits, checking range.
    fn from_parts(negative: bool, digits: &[u8], exponent: i64) -> Result<Self, NumberError> {
        if digits.is_empty() {
            return Ok(Self::zero());
        }
        let adjusted = exponent.saturating_add(len_i64(digits) - 1);
        if adjusted > MAX_ADJUSTED_EXPONENT {
            return Err(NumberError::Overflow);
        }
        if adjusted < MIN_ADJUSTED_EXPONENT {
            return Err(NumberError::Underflow);
        }
        Ok(Self {
            negative,
            digits: digits.iter().map(|d| char::from(b'0' + d)).collect(),
            exponent,
        })
    }

    /// Whether this value is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// Whether this value is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Number of significant digits (zero has none).
    #[must_use]
    pub fn precision(&self) -> usize {
        self.digits.len()
    }

    /// Exponent of the leading significant digit.
    #[must_use]
    pub fn adjusted_exponent(&self) -> i64 {
        self.exponent
            .saturating_add(len_i64(self.digits.as_bytes()) - 1)
    }

    fn digit_values(&self) -> Vec<u8> {
        self.digits.bytes().map(|b| b - b'0').collect()
    }

    /// Exact sum, rounded half-even to 38 significant digits.
    ///
    /// # Errors
    /// Returns [`NumberError::Overflow`] or [`NumberError::Underflow`] when the
    /// result leaves the supported range.
    pub fn checked_add(&self, other: &Self) -> Result<Self, NumberError> {
        if self.is_zero() {
            return Ok(other.clone());
        }
        if other.is_zero() {
            return Ok(self.clone());
        }

        let exponent = self.exponent.min(other.exponent);
        let a = shifted(&self.digit_values(), self.exponent - exponent);
        let b = shifted(&other.digit_values(), other.exponent - exponent);

        let (negative, magnitude) = if self.negative == other.negative {
            (self.negative, add_magnitudes(&a, &b))
        } else {
            match cmp_magnitudes(&a, &b) {
                Ordering::Equal => return Ok(Self::zero()),
                Ordering::Greater => (self.negative, sub_magnitudes(&a, &b)),
                Ordering::Less => (other.negative, sub_magnitudes(&b, &a)),
            }
        };

        let (digits, exponent) = strip_zeros(magnitude, exponent);
        let (digits, exponent) = round_half_even(digits, exponent);
        Self::from_parts(negative, &digits, exponent)
    }

    /// The value with its sign flipped.
    #[must_use]
    pub fn negated(&self) -> Self {
        let mut out = self.clone();
        if !out.is_zero() {
            out.negative = !out.negative;
        }
        out
    }
}

fn len_i64(digits: &[u8]) -> i64 {
    // Digit strings are bounded by the exponent range, far below i64::MAX.
    i64::try_from(digits.len()).unwrap_or(i64::MAX)
}

/// Drop leading zeros and fold trailing zeros into the exponent.
fn strip_zeros(digits: Vec<u8>, exponent: i64) -> (Vec<u8>, i64) {
    let start = digits.iter().position(|d| *d != 0).unwrap_or(digits.len());
    let end = digits.iter().rposition(|d| *d != 0).map_or(start, |p| p + 1);
    if start >= end {
        return (Vec::new(), 0);
    }
    let trailing = len_i64(&digits[end..]);
    (digits[start..end].to_vec(), exponent.saturating_add(trailing))
}

fn shifted(digits: &[u8], zeros: i64) -> Vec<u8> {
    let mut out = digits.to_vec();
    out.extend(std::iter::repeat_n(0u8, usize::try_from(zeros).unwrap_or(0)));
    out
}

fn cmp_magnitudes(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn add_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u8;
    let mut ia = a.iter().rev();
    let mut ib = b.iter().rev();
    loop {
        let (da, db) = (ia.next(), ib.next());
        if da.is_none() && db.is_none() {
            break;
        }
        let sum = da.copied().unwrap_or(0) + db.copied().unwrap_or(0) + carry;
        out.push(sum % 10);
        carry = sum / 10;
    }
    if carry > 0 {
        out.push(carry);
    }
    out.reverse();
    out
}

/// `a - b` where `a >= b` in magnitude.
fn sub_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0i8;
    let mut ib = b.iter().rev();
    for da in a.iter().rev() {
        let db = ib.next().copied().unwrap_or(0);
        let mut diff = i8::try_from(*da).unwrap_or(0) - i8::try_from(db).unwrap_or(0) - borrow;
        if diff < 0 {
            diff += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(u8::try_from(diff).unwrap_or(0));
    }
    out.reverse();
    out
}

fn round_half_even(digits: Vec<u8>, exponent: i64) -> (Vec<u8>, i64) {
    if digits.len() <= MAX_PRECISION {
        return (digits, exponent);
    }
    let dropped = len_i64(&digits[MAX_PRECISION..]);
    let mut kept = digits[..MAX_PRECISION].to_vec();
    let first_dropped = digits[MAX_PRECISION];
    let rest_nonzero = digits[MAX_PRECISION + 1..].iter().any(|d| *d != 0);
    let last_kept_odd = kept.last().is_some_and(|d| d % 2 == 1);

    let round_up = first_dropped > 5 || (first_dropped == 5 && (rest_nonzero || last_kept_odd));
    if round_up {
        kept = add_magnitudes(&kept, &[1]);
    }
    strip_zeros(kept, exponent + dropped)
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let sign = |d: &Self| -> i8 {
            if d.is_zero() {
                0
            } else if d.negative {
                -1
            } else {
                1
            }
        };
        let (sa, sb) = (sign(self), sign(other));
        if sa != sb || sa == 0 {
            return sa.cmp(&sb);
        }
        let magnitude = self
            .adjusted_exponent()
            .cmp(&other.adjusted_exponent())
            .then_with(|| self.digits.as_bytes().cmp(other.digits.as_bytes()));
        if self.negative {
            magnitude.reverse()
        } else {
            magnitude
        }
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        if self.negative {
            f.write_str("-")?;
        }

        let adjusted = self.adjusted_exponent();
        let digits = self.digits.as_str();
        if !(PLAIN_MIN_ADJUSTED..=PLAIN_MAX_ADJUSTED).contains(&adjusted) {
            let (head, tail) = digits.split_at(1);
            f.write_str(head)?;
            if !tail.is_empty() {
                write!(f, ".{tail}")?;
            }
            return write!(f, "E{}{adjusted}", if adjusted >= 0 { "+" } else { "" });
        }

        if self.exponent >= 0 {
            f.write_str(digits)?;
            for _ in 0..self.exponent {
                f.write_str("0")?;
            }
            Ok(())
        } else if adjusted >= 0 {
            let split = usize::try_from(adjusted + 1).unwrap_or(0);
            let (int_part, frac_part) = digits.split_at(split);
            write!(f, "{int_part}.{frac_part}")
        } else {
            f.write_str("0.")?;
            for _ in 0..(-adjusted - 1) {
                f.write_str("0")?;
            }
            f.write_str(digits)
        }
    }
}

impl FromStr for Decimal {
    type Err = NumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for Decimal {
    fn from(v: i64) -> Self {
        // An i64 has at most 19 digits, always within range.
        Self::parse(&v.to_string()).unwrap_or_default()
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a numeric string or a JSON number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Decimal::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Decimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Decimal::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() {
            return Err(E::custom(NumberError::Invalid(v.to_string())));
        }
        Decimal::parse(&v.to_string()).map_err(E::custom)
    }
}
