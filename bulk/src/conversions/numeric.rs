use bigdecimal::{BigDecimal, ParseBigDecimalError, num_bigint::Sign};
use std::{fmt::Display, str::FromStr};
use tokio_postgres::types::{IsNull, ToSql, Type};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Decimal digits packed in one base-10000 digit of the wire format.
const DEC_DIGITS: usize = 4;

/// A rust variant of the Postgres Numeric type. The full spectrum of Postgres'
/// Numeric value range is supported.
#[derive(Debug, Ord, PartialOrd, Eq, PartialEq, Clone)]
pub enum PgNumeric {
    NaN,
    PositiveInf,
    NegativeInf,
    Value(BigDecimal),
}

impl FromStr for PgNumeric {
    type Err = ParseBigDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match BigDecimal::from_str(s) {
            Ok(n) => Ok(PgNumeric::Value(n)),
            Err(e) => match s.to_lowercase().as_str() {
                "infinity" | "inf" => Ok(PgNumeric::PositiveInf),
                "-infinity" | "-inf" => Ok(PgNumeric::NegativeInf),
                "nan" => Ok(PgNumeric::NaN),
                _ => Err(e),
            },
        }
    }
}

impl From<BigDecimal> for PgNumeric {
    fn from(value: BigDecimal) -> Self {
        PgNumeric::Value(value)
    }
}

impl From<i64> for PgNumeric {
    fn from(value: i64) -> Self {
        PgNumeric::Value(BigDecimal::from(value))
    }
}

impl PgNumeric {
    /// Converts a float into a numeric using its shortest round-trip representation.
    pub fn from_f64(value: f64) -> PgNumeric {
        if value.is_nan() {
            PgNumeric::NaN
        } else if value == f64::INFINITY {
            PgNumeric::PositiveInf
        } else if value == f64::NEG_INFINITY {
            PgNumeric::NegativeInf
        } else {
            // A finite float always renders as a valid decimal literal.
            BigDecimal::from_str(&value.to_string())
                .map(PgNumeric::Value)
                .unwrap_or(PgNumeric::NaN)
        }
    }
}

/// Writes the numeric header of the binary representation.
fn write_header(out: &mut bytes::BytesMut, n_digits: u16, weight: i16, sign: u16, scale: u16) {
    out.extend_from_slice(&n_digits.to_be_bytes());
    out.extend_from_slice(&weight.to_be_bytes());
    out.extend_from_slice(&sign.to_be_bytes());
    out.extend_from_slice(&scale.to_be_bytes());
}

/// Splits a decimal into base-10000 digits aligned on the decimal point.
///
/// Returns the digits without leading or trailing zero groups, the weight of the first digit
/// and the display scale.
fn to_base_10000(decimal: &BigDecimal) -> (Vec<u16>, i16, u16) {
    let (bigint, exponent) = decimal.as_bigint_and_exponent();
    let mut digits = bigint.magnitude().to_string();

    // A negative exponent means trailing zeros in front of the decimal point.
    let scale = if exponent < 0 {
        digits.push_str(&"0".repeat(exponent.unsigned_abs() as usize));
        0
    } else {
        exponent as usize
    };

    let (integer_part, fraction_part) = if digits.len() > scale {
        let (integer_part, fraction_part) = digits.split_at(digits.len() - scale);
        (integer_part.to_string(), fraction_part.to_string())
    } else {
        (
            String::new(),
            format!("{}{digits}", "0".repeat(scale - digits.len())),
        )
    };

    let integer_padding = (DEC_DIGITS - integer_part.len() % DEC_DIGITS) % DEC_DIGITS;
    let integer_part = format!("{}{integer_part}", "0".repeat(integer_padding));
    let fraction_padding = (DEC_DIGITS - fraction_part.len() % DEC_DIGITS) % DEC_DIGITS;
    let fraction_part = format!("{fraction_part}{}", "0".repeat(fraction_padding));

    let mut weight = (integer_part.len() / DEC_DIGITS) as i16 - 1;
    let mut groups = integer_part
        .as_bytes()
        .chunks(DEC_DIGITS)
        .chain(fraction_part.as_bytes().chunks(DEC_DIGITS))
        .map(|chunk| {
            chunk
                .iter()
                .fold(0u16, |acc, digit| acc * 10 + u16::from(digit - b'0'))
        })
        .collect::<Vec<_>>();

    let leading_zeros = groups.iter().take_while(|group| **group == 0).count();
    groups.drain(..leading_zeros);
    weight -= leading_zeros as i16;

    while groups.last() == Some(&0) {
        groups.pop();
    }

    if groups.is_empty() {
        weight = 0;
    }

    (groups, weight, scale as u16)
}

impl ToSql for PgNumeric {
    fn to_sql(
        &self,
        _: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgNumeric::NaN => write_header(out, 0, 0, NUMERIC_NAN, 0),
            PgNumeric::PositiveInf => write_header(out, 0, 0, NUMERIC_PINF, 0),
            PgNumeric::NegativeInf => write_header(out, 0, 0, NUMERIC_NINF, 0),
            PgNumeric::Value(decimal) => {
                let sign = match decimal.sign() {
                    Sign::Minus => NUMERIC_NEG,
                    Sign::NoSign | Sign::Plus => NUMERIC_POS,
                };
                let (digits, weight, scale) = to_base_10000(decimal);

                write_header(out, digits.len() as u16, weight, sign, scale);
                for digit in digits {
                    out.extend_from_slice(&digit.to_be_bytes());
                }
            }
        }

        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::NUMERIC)
    }

    tokio_postgres::types::to_sql_checked!();
}

impl Display for PgNumeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PgNumeric::NaN => write!(f, "NaN"),
            PgNumeric::PositiveInf => write!(f, "Infinity"),
            PgNumeric::NegativeInf => write!(f, "-Infinity"),
            PgNumeric::Value(n) => write!(f, "{n}"),
        }
    }
}

impl Default for PgNumeric {
    fn default() -> Self {
        PgNumeric::Value(BigDecimal::default())
    }
}
