//! The number sublanguage: integers in several bases, ratios, floats and
//! arbitrary-precision decimals, validated against anchored patterns.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::ast::ValueKind;
use crate::error::EdnError;

// The trailing `0[0-9]+` alternative captures nothing, so literals like
// 089 match the pattern and still fail as invalid numbers.
static INT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([-+]?)(?:(0)|([1-9][0-9]*)|0[xX]([0-9A-Fa-f]+)|0([0-7]+)|([1-9][0-9]?)[rR]([0-9A-Za-z]+)|0[0-9]+)(N)?$",
    )
    .unwrap()
});

static FLOAT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([-+]?[0-9]+(\.[0-9]*)?([eE][-+]?[0-9]+)?)(M)?$").unwrap());

static RATIO_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([-+]?[0-9]+)/([0-9]+)$").unwrap());

/// Matches a complete accumulated literal against the numeric grammar.
pub(crate) fn match_number(literal: &str) -> Result<ValueKind, EdnError> {
    if literal.contains('/') {
        return match_ratio(literal);
    }
    if let Some(caps) = INT_PATTERN.captures(literal) {
        return match_int(literal, &caps);
    }
    if let Some(caps) = FLOAT_PATTERN.captures(literal) {
        return Ok(match_float(&caps));
    }
    Err(invalid(literal))
}

fn invalid(literal: &str) -> EdnError {
    EdnError::lexical(format!("Invalid number format {literal}."))
}

fn match_int(literal: &str, caps: &Captures<'_>) -> Result<ValueKind, EdnError> {
    let negate = caps.get(1).is_some_and(|m| m.as_str() == "-");
    let force_big = caps.get(8).is_some();
    if caps.get(2).is_some() {
        return Ok(if force_big {
            ValueKind::BigInt(BigInt::from(0))
        } else {
            ValueKind::Int(0)
        });
    }
    let (digits, radix) = if let Some(m) = caps.get(3) {
        (m.as_str(), 10)
    } else if let Some(m) = caps.get(4) {
        (m.as_str(), 16)
    } else if let Some(m) = caps.get(5) {
        (m.as_str(), 8)
    } else if let Some(m) = caps.get(7) {
        let radix: u32 = caps[6].parse().map_err(|_| invalid(literal))?;
        if !(2..=36).contains(&radix) {
            return Err(invalid(literal));
        }
        (m.as_str(), radix)
    } else {
        return Err(invalid(literal));
    };
    let mut value = BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(|| invalid(literal))?;
    if negate {
        value = -value;
    }
    if force_big {
        return Ok(ValueKind::BigInt(value));
    }
    // Fixnum range stays i64; anything wider promotes.
    Ok(match value.to_i64() {
        Some(small) => ValueKind::Int(small),
        None => ValueKind::BigInt(value),
    })
}

fn match_ratio(literal: &str) -> Result<ValueKind, EdnError> {
    let caps = RATIO_PATTERN.captures(literal).ok_or_else(|| invalid(literal))?;
    let numerator_text = caps[1].trim_start_matches('+').to_string();
    let numerator =
        BigInt::parse_bytes(numerator_text.as_bytes(), 10).ok_or_else(|| invalid(literal))?;
    let denominator =
        BigInt::parse_bytes(caps[2].as_bytes(), 10).ok_or_else(|| invalid(literal))?;
    if denominator.is_zero() {
        return Err(EdnError::lexical("Divide by zero"));
    }
    let divisor = gcd(numerator.abs(), denominator.clone());
    let numerator = numerator / &divisor;
    let denominator = denominator / &divisor;
    if denominator == BigInt::from(1) {
        return Ok(match numerator.to_i64() {
            Some(small) => ValueKind::Int(small),
            None => ValueKind::BigInt(numerator),
        });
    }
    Ok(ValueKind::Ratio {
        numerator,
        denominator,
    })
}

fn match_float(caps: &Captures<'_>) -> ValueKind {
    let body = &caps[1];
    if caps.get(4).is_some() {
        return ValueKind::Decimal(body.to_string());
    }
    ValueKind::Float(body.parse().unwrap_or(f64::NAN))
}

fn gcd(mut a: BigInt, mut b: BigInt) -> BigInt {
    while !b.is_zero() {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}
