//! Query parameters
//!
//! Parameters are typed literals bound to a query's placeholders. They are
//! written as text (on the command line, in config files) and parsed by
//! these rules:
//!
//! - VARCHAR values are quoted with `'` or `"`; `\` escapes `\\ \" \' \n \r \t`
//! - no other type may be quoted
//! - integers default to BIGINT; `_i8`, `_i16`, `_i32` and `_i64` pick a width
//! - `t`, `f`, `true`, `false` (any case) are booleans
//! - plain numbers with a `.` are decimals; precision and scale come from the digits
//! - `0x`-prefixed values are VARBINARY
//! - anything else must be an RFC 3339 timestamp with at most millisecond precision
//!
//! # Example
//!
//! ```rust
//! use posql_client::adapter::QueryParam;
//!
//! assert_eq!("'ETH'".parse::<QueryParam>().unwrap(), QueryParam::VarChar("ETH".into()));
//! assert_eq!("7_i16".parse::<QueryParam>().unwrap(), QueryParam::SmallInt(7));
//! assert_eq!("42".parse::<QueryParam>().unwrap(), QueryParam::BigInt(42));
//! assert!("ETH".parse::<QueryParam>().is_err());
//! ```

use crate::types::hex_bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Largest decimal precision the prover accepts
pub const MAX_DECIMAL_PRECISION: u8 = 75;

/// A typed query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum QueryParam {
    /// Text
    VarChar(String),
    /// Boolean
    Boolean(bool),
    /// 8-bit integer
    TinyInt(i8),
    /// 16-bit integer
    SmallInt(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    BigInt(i64),
    /// Fixed-point decimal: `unscaled * 10^-scale`
    Decimal {
        /// Number of significant digits
        precision: u8,
        /// Digits after the decimal point
        scale: i8,
        /// Unscaled integer value, in decimal
        unscaled: String,
    },
    /// Bytes
    VarBinary(#[serde(with = "hex_bytes")] Vec<u8>),
    /// UTC timestamp in milliseconds since the epoch
    Timestamp(i64),
}

/// Why a parameter could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// Text that is not a literal of any other type
    #[error("VARCHAR must be quoted with single or double quotes: {0}")]
    UnquotedVarchar(String),

    /// Integer out of range or malformed
    #[error("invalid integer value: {0}")]
    InvalidInteger(String),

    /// Malformed decimal
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),

    /// Decimal with more digits than the prover accepts
    #[error("decimal precision {0} exceeds {MAX_DECIMAL_PRECISION}")]
    InvalidPrecision(usize),

    /// Malformed hex
    #[error("invalid hexadecimal value: {0}")]
    InvalidHex(String),

    /// Malformed timestamp
    #[error("invalid timestamp value: {0}")]
    InvalidTimestamp(String),

    /// Timestamp with sub-millisecond digits
    #[error("timestamp precision finer than milliseconds is not supported: {0}")]
    TimestampTooPrecise(String),

    /// Backslash followed by an unsupported character
    #[error("invalid escape sequence in string")]
    InvalidEscapeSequence,

    /// Bare quote character inside a quoted string
    #[error("unescaped quote character in string")]
    UnescapedQuote,
}

impl QueryParam {
    /// Parse one parameter
    ///
    /// # Arguments
    /// * `input` - Literal text; surrounding whitespace is ignored
    pub fn parse(input: &str) -> Result<Self, ParamError> {
        let trimmed = input.trim();

        if let Some(quote) = trimmed.chars().next().filter(|c| *c == '"' || *c == '\'') {
            if trimmed.len() >= 2 && trimmed.ends_with(quote) {
                return parse_varchar(&trimmed[1..trimmed.len() - 1], quote);
            }
        }

        if let Some(digits) = trimmed.strip_suffix("_i8") {
            return parse_integer(digits).map(QueryParam::TinyInt);
        }
        if let Some(digits) = trimmed.strip_suffix("_i16") {
            return parse_integer(digits).map(QueryParam::SmallInt);
        }
        if let Some(digits) = trimmed.strip_suffix("_i32") {
            return parse_integer(digits).map(QueryParam::Int);
        }
        if let Some(digits) = trimmed.strip_suffix("_i64") {
            return parse_integer(digits).map(QueryParam::BigInt);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "t" | "true" => return Ok(QueryParam::Boolean(true)),
            "f" | "false" => return Ok(QueryParam::Boolean(false)),
            _ => {}
        }

        let numeric = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));
        if numeric && trimmed.contains('.') {
            return parse_decimal(trimmed);
        }
        if let Some(hex) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            return hex::decode(hex)
                .map(QueryParam::VarBinary)
                .map_err(|_| ParamError::InvalidHex(trimmed.to_string()));
        }
        if numeric {
            return parse_integer(trimmed).map(QueryParam::BigInt);
        }

        parse_timestamp(trimmed)
    }
}

impl FromStr for QueryParam {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryParam::parse(s)
    }
}

fn parse_varchar(content: &str, quote: char) -> Result<QueryParam, ParamError> {
    let mut value = String::with_capacity(content.len());
    let mut chars = content.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => value.push(match chars.next() {
                Some('\\') => '\\',
                Some('"') => '"',
                Some('\'') => '\'',
                Some('n') => '\n',
                Some('r') => '\r',
                Some('t') => '\t',
                _ => return Err(ParamError::InvalidEscapeSequence),
            }),
            c if c == quote => return Err(ParamError::UnescapedQuote),
            c => value.push(c),
        }
    }
    Ok(QueryParam::VarChar(value))
}

fn parse_integer<T: FromStr>(digits: &str) -> Result<T, ParamError> {
    digits
        .trim()
        .parse()
        .map_err(|_| ParamError::InvalidInteger(digits.to_string()))
}

fn parse_decimal(input: &str) -> Result<QueryParam, ParamError> {
    let invalid = || ParamError::InvalidDecimal(input.to_string());

    let (negative, unsigned) = match input.as_bytes().first() {
        Some(b'-') => (true, &input[1..]),
        Some(b'+') => (false, &input[1..]),
        _ => (false, input),
    };
    let (whole, fraction) = unsigned.split_once('.').ok_or_else(invalid)?;
    let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) || whole.len() + fraction.len() == 0 {
        return Err(invalid());
    }

    let scale = i8::try_from(fraction.len()).map_err(|_| invalid())?;
    let significant = format!("{whole}{fraction}");
    let significant = significant.trim_start_matches('0');
    let significant = if significant.is_empty() { "0" } else { significant };
    if significant.len() > usize::from(MAX_DECIMAL_PRECISION) {
        return Err(ParamError::InvalidPrecision(significant.len()));
    }

    let unscaled = if negative && significant != "0" {
        format!("-{significant}")
    } else {
        significant.to_string()
    };
    Ok(QueryParam::Decimal {
        precision: significant.len() as u8,
        scale,
        unscaled,
    })
}

fn parse_timestamp(input: &str) -> Result<QueryParam, ParamError> {
    let parsed = DateTime::parse_from_rfc3339(input).map_err(|_| {
        if input.chars().any(|c| c.is_ascii_digit()) {
            ParamError::InvalidTimestamp(input.to_string())
        } else {
            ParamError::UnquotedVarchar(input.to_string())
        }
    })?;
    if parsed.timestamp_subsec_nanos() % 1_000_000 != 0 {
        return Err(ParamError::TimestampTooPrecise(input.to_string()));
    }
    Ok(QueryParam::Timestamp(
        parsed.with_timezone(&Utc).timestamp_millis(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(input: &str) -> QueryParam {
        QueryParam::parse(input).unwrap()
    }

    #[test]
    fn test_varchar_quotes_and_escapes() {
        assert_eq!(parse("'hello world'"), QueryParam::VarChar("hello world".into()));
        assert_eq!(parse(r#""hello world""#), QueryParam::VarChar("hello world".into()));
        assert_eq!(parse(r#""a\nb""#), QueryParam::VarChar("a\nb".into()));
        assert_eq!(parse(r#""say \"hi\"""#), QueryParam::VarChar("say \"hi\"".into()));
        assert_eq!(parse(r#""""#), QueryParam::VarChar(String::new()));
        // the other quote character needs no escape
        assert_eq!(parse(r#"'it"s'"#), QueryParam::VarChar("it\"s".into()));
    }

    #[test]
    fn test_varchar_errors() {
        assert_eq!(
            QueryParam::parse(r#""bad\q""#),
            Err(ParamError::InvalidEscapeSequence)
        );
        assert_eq!(
            QueryParam::parse(r#""a"b""#),
            Err(ParamError::UnescapedQuote)
        );
        assert!(matches!(
            QueryParam::parse("hello"),
            Err(ParamError::UnquotedVarchar(_))
        ));
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(parse("42"), QueryParam::BigInt(42));
        assert_eq!(parse("-42_i64"), QueryParam::BigInt(-42));
        assert_eq!(parse("-5_i8"), QueryParam::TinyInt(-5));
        assert_eq!(parse("300_i16"), QueryParam::SmallInt(300));
        assert_eq!(parse("70000_i32"), QueryParam::Int(70000));
        assert!(matches!(
            QueryParam::parse("300_i8"),
            Err(ParamError::InvalidInteger(_))
        ));
        assert!(matches!(
            QueryParam::parse("1-2"),
            Err(ParamError::InvalidInteger(_))
        ));
    }

    #[test]
    fn test_booleans() {
        for input in ["t", "TRUE", "True"] {
            assert_eq!(parse(input), QueryParam::Boolean(true));
        }
        for input in ["f", "false", "FALSE"] {
            assert_eq!(parse(input), QueryParam::Boolean(false));
        }
    }

    #[test]
    fn test_decimals() {
        assert_eq!(
            parse("123.45"),
            QueryParam::Decimal {
                precision: 5,
                scale: 2,
                unscaled: "12345".into()
            }
        );
        assert_eq!(
            parse("-0.050"),
            QueryParam::Decimal {
                precision: 2,
                scale: 3,
                unscaled: "-50".into()
            }
        );
        assert!(matches!(
            QueryParam::parse("1.2.3"),
            Err(ParamError::InvalidDecimal(_))
        ));
        let wide = format!("1.{}", "0".repeat(75));
        assert_eq!(
            QueryParam::parse(&wide),
            Err(ParamError::InvalidPrecision(76))
        );
    }

    #[test]
    fn test_varbinary() {
        assert_eq!(parse("0xDEad"), QueryParam::VarBinary(vec![0xde, 0xad]));
        assert!(matches!(
            QueryParam::parse("0xabc"),
            Err(ParamError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(
            parse("2024-01-02T03:04:05.678Z"),
            QueryParam::Timestamp(1_704_164_645_678)
        );
        assert_eq!(
            parse("1970-01-01T01:00:00+01:00"),
            QueryParam::Timestamp(0)
        );
        assert!(matches!(
            QueryParam::parse("2024-01-02T03:04:05.678901Z"),
            Err(ParamError::TimestampTooPrecise(_))
        ));
        assert!(matches!(
            QueryParam::parse("2024-13-45T00:00:00Z"),
            Err(ParamError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_quoted_numbers_stay_text() {
        assert_eq!(parse("'42'"), QueryParam::VarChar("42".into()));
    }

    #[test]
    fn test_wire_form() {
        assert_eq!(
            serde_json::to_value(parse("0xff")).unwrap(),
            json!({"type": "varBinary", "value": "0xff"})
        );
        assert_eq!(
            serde_json::to_value(parse("1.5")).unwrap(),
            json!({"type": "decimal", "value": {"precision": 2, "scale": 1, "unscaled": "15"}})
        );
    }
}
