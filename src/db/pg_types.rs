//! PostgreSQL wire types that sqlx has no built-in mapping for.
//!
//! `PgDecimal` carries NUMERIC values as decimal text in both directions,
//! `UntypedNull` binds a NULL whose type the server infers, and the
//! `format_*` helpers render INTERVAL and array values the way `psql` does.

use super::types::is_decimal_text;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{
    PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueFormat, PgValueRef, Postgres,
};
use sqlx::{Decode, Encode, Type};

const NUMERIC_OID: u32 = 1700;
const NUMERIC_ARRAY_OID: u32 = 1231;
const UNKNOWN_OID: u32 = 705;

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Base-10000 digits per NUMERIC group.
const DEC_DIGITS: usize = 4;

/// A NUMERIC value as exact decimal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgDecimal(pub String);

impl Type<Postgres> for PgDecimal {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(NUMERIC_OID))
    }
}

impl PgHasArrayType for PgDecimal {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(NUMERIC_ARRAY_OID))
    }
}

impl<'r> Decode<'r, Postgres> for PgDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Binary => decode_numeric(value.as_bytes()?).map(PgDecimal),
            PgValueFormat::Text => Ok(PgDecimal(value.as_str()?.to_owned())),
        }
    }
}

impl Encode<'_, Postgres> for PgDecimal {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(&encode_numeric(&self.0)?);
        Ok(IsNull::No)
    }
}

/// A NULL parameter sent with the `unknown` type, so the server gives it
/// the type its context expects.
#[derive(Debug, Clone, Copy)]
pub struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(UNKNOWN_OID))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, BoxDynError> {
    bytes
        .get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| BoxDynError::from("numeric value is truncated"))
}

/// Renders the binary NUMERIC format as decimal text.
///
/// Layout: ndigits, weight, sign, dscale (16 bits each), then `ndigits`
/// base-10000 digits. Digit `i` is worth `10000^(weight - i)`.
pub fn decode_numeric(bytes: &[u8]) -> Result<String, BoxDynError> {
    let ndigits = usize::from(read_u16(bytes, 0)?);
    let weight = i32::from(read_u16(bytes, 2)? as i16);
    let sign = read_u16(bytes, 4)?;
    let dscale = usize::from(read_u16(bytes, 6)?);

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign {other:#06x}").into()),
    }

    let digits = (0..ndigits)
        .map(|i| read_u16(bytes, 8 + 2 * i))
        .collect::<Result<Vec<_>, _>>()?;
    let digit_at = |exponent: i32| -> u16 {
        usize::try_from(weight - exponent)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit_at(weight).to_string());
        for exponent in (0..weight).rev() {
            text.push_str(&format!("{:04}", digit_at(exponent)));
        }
    }

    if dscale > 0 {
        let groups = dscale.div_ceil(DEC_DIGITS);
        let mut fraction: String = (1..=groups as i32)
            .map(|j| format!("{:04}", digit_at(-j)))
            .collect();
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }
    Ok(text)
}

/// Builds the binary NUMERIC format from decimal text.
pub fn encode_numeric(text: &str) -> Result<Vec<u8>, BoxDynError> {
    match text {
        "NaN" => return Ok(numeric_bytes(&[], 0, NUMERIC_NAN, 0)),
        "Infinity" => return Ok(numeric_bytes(&[], 0, NUMERIC_PINF, 0)),
        "-Infinity" => return Ok(numeric_bytes(&[], 0, NUMERIC_NINF, 0)),
        _ => {}
    }
    if !is_decimal_text(text) {
        return Err(format!("invalid numeric value '{text}'").into());
    }

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (NUMERIC_NEG, rest),
        None => (NUMERIC_POS, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int_part = int_part.trim_start_matches('0');

    // Align both halves on group boundaries around the decimal point.
    let int_pad = (DEC_DIGITS - int_part.len() % DEC_DIGITS) % DEC_DIGITS;
    let frac_pad = (DEC_DIGITS - frac_part.len() % DEC_DIGITS) % DEC_DIGITS;
    let padded = format!(
        "{}{int_part}{frac_part}{}",
        "0".repeat(int_pad),
        "0".repeat(frac_pad)
    );

    let mut digits: Vec<u16> = padded
        .as_bytes()
        .chunks(DEC_DIGITS)
        .map(|group| group.iter().fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0')))
        .collect();
    let mut weight = ((int_pad + int_part.len()) / DEC_DIGITS) as i32 - 1;

    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    weight -= leading as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }

    let (weight, sign) = if digits.is_empty() {
        (0, NUMERIC_POS)
    } else {
        (weight, sign)
    };
    let weight = i16::try_from(weight).map_err(|_| format!("numeric value '{text}' is out of range"))?;
    let dscale =
        u16::try_from(frac_part.len()).map_err(|_| format!("numeric value '{text}' is out of range"))?;
    Ok(numeric_bytes(&digits, weight, sign, dscale))
}

fn numeric_bytes(digits: &[u16], weight: i16, sign: u16, dscale: u16) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + 2 * digits.len());
    bytes.extend_from_slice(&(digits.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&weight.to_be_bytes());
    bytes.extend_from_slice(&sign.to_be_bytes());
    bytes.extend_from_slice(&dscale.to_be_bytes());
    for digit in digits {
        bytes.extend_from_slice(&digit.to_be_bytes());
    }
    bytes
}

/// Renders an INTERVAL as `1 year 2 mons 3 days 04:05:06.5`.
pub fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, name: &str) -> String {
        let plural = if n.abs() == 1 { "" } else { "s" };
        format!("{n} {name}{plural}")
    }

    let mut parts = Vec::new();
    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        parts.push(unit(years.into(), "year"));
    }
    if months != 0 {
        parts.push(unit(months.into(), "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days.into(), "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let secs = total / 1_000_000;
        let micros = total % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if micros != 0 {
            time.push_str(format!(".{micros:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

/// Renders array elements as a `{a,b,NULL}` literal.
pub fn format_array<T>(items: Vec<Option<T>>, render: impl Fn(T) -> String) -> String {
    let items: Vec<String> = items
        .into_iter()
        .map(|item| item.map_or_else(|| "NULL".to_string(), &render))
        .collect();
    format!("{{{}}}", items.join(","))
}

/// Quotes a text array element when the literal syntax requires it.
pub fn array_text_element(s: String) -> String {
    let needs_quotes = s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '{' | '}' | ',' | '"' | '\\'));
    if !needs_quotes {
        return s;
    }
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bytes(words: &[u16]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn test_encode_numeric_groups() {
        // 12.50: digits [12, 5000], weight 0, dscale 2
        assert_eq!(
            encode_numeric("12.50").unwrap(),
            bytes(&[2, 0, NUMERIC_POS, 2, 12, 5000])
        );
        // 100000000: trailing zero groups are dropped, weight stays 2
        assert_eq!(
            encode_numeric("100000000").unwrap(),
            bytes(&[1, 2, NUMERIC_POS, 0, 1])
        );
        assert_eq!(
            encode_numeric("-0.0001").unwrap(),
            bytes(&[1, (-1i16) as u16, NUMERIC_NEG, 4, 1])
        );
        assert_eq!(encode_numeric("-0.00").unwrap(), bytes(&[0, 0, NUMERIC_POS, 2]));
        assert_eq!(encode_numeric("NaN").unwrap(), bytes(&[0, 0, NUMERIC_NAN, 0]));
        assert!(encode_numeric("1e5").is_err());
    }

    #[test]
    fn test_decode_numeric_text() {
        assert_eq!(
            decode_numeric(&bytes(&[3, 1, NUMERIC_NEG, 5, 12, 3456, 7890])).unwrap(),
            "-123456.78900"
        );
        assert_eq!(
            decode_numeric(&bytes(&[1, 2, NUMERIC_POS, 0, 1])).unwrap(),
            "100000000"
        );
        assert_eq!(
            decode_numeric(&bytes(&[1, (-2i16) as u16, NUMERIC_POS, 6, 1200])).unwrap(),
            "0.000012"
        );
        assert_eq!(decode_numeric(&bytes(&[0, 0, NUMERIC_POS, 0])).unwrap(), "0");
        assert_eq!(
            decode_numeric(&bytes(&[0, 0, NUMERIC_PINF, 0])).unwrap(),
            "Infinity"
        );
        assert!(decode_numeric(&[0, 1]).is_err());
        assert!(decode_numeric(&bytes(&[0, 0, 0x1234, 0])).is_err());
    }

    #[test]
    fn test_format_interval() {
        let interval = PgInterval {
            months: 14,
            days: 3,
            microseconds: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_500_000,
        };
        assert_eq!(format_interval(&interval), "1 year 2 mons 3 days 04:05:06.5");

        let zero = PgInterval {
            months: 0,
            days: 0,
            microseconds: 0,
        };
        assert_eq!(format_interval(&zero), "00:00:00");

        let negative = PgInterval {
            months: 0,
            days: 1,
            microseconds: -90_000_000,
        };
        assert_eq!(format_interval(&negative), "1 day -00:01:30");
    }

    #[test]
    fn test_format_array() {
        assert_eq!(
            format_array(vec![Some(1), None, Some(3)], |v: i32| v.to_string()),
            "{1,NULL,3}"
        );
        assert_eq!(
            format_array(
                vec![Some("a".to_string()), Some("b c".to_string()), Some("NULL".to_string())],
                array_text_element
            ),
            "{a,\"b c\",\"NULL\"}"
        );
        assert_eq!(format_array(Vec::<Option<i64>>::new(), |v| v.to_string()), "{}");
    }
}
