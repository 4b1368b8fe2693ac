//! # Predicate Literal Parsing
//!
//! This module parses the textual constant forms of the predicate language
//! into typed values. The query compiler calls these once it knows the type
//! hint for a constant; the parsers themselves are hint-free.
//!
//! ## Supported Literal Forms
//!
//! | Form | Format | Example |
//! |------|--------|---------|
//! | Integer | decimal, `0x` hex, `0` octal | `42`, `0x2a`, `052` |
//! | Decimal | digits with fraction/exponent | `1.25`, `3e-4`, `-inf` |
//! | UUID | hyphenated, 36 chars | `550e8400-e29b-41d4-a716-446655440000` |
//! | ObjectId | 24 hex chars | `5f4e2ab51c3a5a8c2f1e0b97` |
//! | Base64 | standard alphabet, `=` padding | `aGVsbG8=` |
//! | Timestamp | `T<sec>:<nanos>` | `T1641027600:500000000` |
//! | Timestamp | civil date/time | `2022-01-01@09:00:00:123` |
//!
//! ## Timestamp Sign Discipline
//!
//! Civil timestamps convert through a UTC day count. Dates before 1900 are
//! rejected outright (platform timegm implementations return -1 for them,
//! which is also a valid instant, so there is no safe way to pass them
//! through). A parsed nanosecond field is never negative; when the seconds
//! are negative the nanoseconds take the same sign so both components agree.
//!
//! ## Error Handling
//!
//! All functions return `eyre::Result` with the offending text in the
//! message.

use eyre::{bail, ensure, Result, WrapErr};

use crate::types::{Decimal, ObjectId, Timestamp, Uuid};

/// Parses an integer with automatic base detection: `0x`/`0X` selects
/// hexadecimal, a leading `0` selects octal, anything else is decimal.
pub fn parse_int_auto(s: &str) -> Result<i64> {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let magnitude: i64 = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).wrap_err_with(|| format!("invalid hex integer: '{}'", s))?
    } else if digits.len() > 1 && digits.starts_with('0') {
        i64::from_str_radix(&digits[1..], 8)
            .wrap_err_with(|| format!("invalid octal integer: '{}'", s))?
    } else {
        digits
            .parse()
            .wrap_err_with(|| format!("invalid integer: '{}'", s))?
    };

    Ok(if negative { -magnitude } else { magnitude })
}

/// Parses the 36-character hyphenated UUID payload.
pub fn parse_uuid(s: &str) -> Result<Uuid> {
    let hex_only: String = s.chars().filter(|c| *c != '-').collect();

    ensure!(
        s.len() == 36 && hex_only.len() == 32,
        "invalid UUID format '{}': expected 8-4-4-4-12 hex groups",
        s
    );

    let mut bytes = [0u8; 16];
    for (i, chunk) in hex_only.as_bytes().chunks(2).enumerate() {
        let hex_pair = std::str::from_utf8(chunk)
            .wrap_err_with(|| format!("invalid UTF-8 in UUID hex: {:?}", chunk))?;
        bytes[i] = u8::from_str_radix(hex_pair, 16)
            .wrap_err_with(|| format!("invalid hex in UUID: '{}'", hex_pair))?;
    }

    Ok(Uuid::from_bytes(bytes))
}

/// Parses the 24-hex-character ObjectId payload.
pub fn parse_object_id(s: &str) -> Result<ObjectId> {
    ensure!(
        s.len() == 24,
        "invalid ObjectId '{}': expected 24 hex chars, got {}",
        s,
        s.len()
    );

    let mut bytes = [0u8; 12];
    for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
        let hex_pair = std::str::from_utf8(chunk)
            .wrap_err_with(|| format!("invalid UTF-8 in ObjectId hex: {:?}", chunk))?;
        bytes[i] = u8::from_str_radix(hex_pair, 16)
            .wrap_err_with(|| format!("invalid hex in ObjectId: '{}'", hex_pair))?;
    }

    Ok(ObjectId::from_bytes(bytes))
}

/// Parses a decimal constant: finite scaled integer, signed infinity, or NaN.
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let s = s.trim();
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    if body.eq_ignore_ascii_case("inf") || body.eq_ignore_ascii_case("infinity") {
        return Ok(Decimal::infinity(negative));
    }
    if body.eq_ignore_ascii_case("nan") {
        return Ok(Decimal::nan());
    }

    let (mantissa_str, exponent) = match body.find(['e', 'E']) {
        Some(idx) => {
            let exp: i32 = body[idx + 1..]
                .parse()
                .wrap_err_with(|| format!("invalid decimal exponent in '{}'", s))?;
            (&body[..idx], exp)
        }
        None => (body, 0),
    };

    let (int_part, frac_part) = match mantissa_str.find('.') {
        Some(idx) => (&mantissa_str[..idx], &mantissa_str[idx + 1..]),
        None => (mantissa_str, ""),
    };

    ensure!(
        !(int_part.is_empty() && frac_part.is_empty()),
        "invalid decimal: '{}'",
        s
    );
    ensure!(
        int_part.bytes().all(|b| b.is_ascii_digit()) && frac_part.bytes().all(|b| b.is_ascii_digit()),
        "invalid decimal: '{}'",
        s
    );

    let mut digits: i128 = 0;
    for b in int_part.bytes().chain(frac_part.bytes()) {
        digits = digits
            .checked_mul(10)
            .and_then(|d| d.checked_add((b - b'0') as i128))
            .ok_or_else(|| eyre::eyre!("decimal '{}' exceeds 128-bit precision", s))?;
    }
    if negative {
        digits = -digits;
    }

    let scale = frac_part.len() as i32 - exponent;
    ensure!(
        i16::try_from(scale).is_ok(),
        "decimal exponent out of range in '{}'",
        s
    );

    Ok(Decimal::finite(digits, scale as i16))
}

const BASE64_PAD: u8 = b'=';

fn base64_digit(b: u8) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b - b'A'),
        b'a'..=b'z' => Some(b - b'a' + 26),
        b'0'..=b'9' => Some(b - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes a standard-alphabet base64 payload to its exact byte length.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    let input = s.as_bytes();
    ensure!(input.len() % 4 == 0, "Invalid base64 value");

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    for (i, quad) in input.chunks(4).enumerate() {
        let is_last = (i + 1) * 4 == input.len();
        let pad = quad.iter().filter(|&&b| b == BASE64_PAD).count();
        ensure!(pad <= 2, "Invalid base64 value");
        ensure!(pad == 0 || is_last, "Invalid base64 value");
        // Padding may only occupy the trailing positions of the last quad.
        ensure!(
            quad.iter()
                .rev()
                .take(pad)
                .all(|&b| b == BASE64_PAD),
            "Invalid base64 value"
        );

        let mut acc: u32 = 0;
        for &b in &quad[..4 - pad] {
            let digit = base64_digit(b).ok_or_else(|| eyre::eyre!("Invalid base64 value"))?;
            acc = (acc << 6) | digit as u32;
        }
        acc <<= 6 * pad as u32;

        out.push((acc >> 16) as u8);
        if pad < 2 {
            out.push((acc >> 8) as u8);
        }
        if pad < 1 {
            out.push(acc as u8);
        }
    }

    Ok(out)
}

/// Parses either timestamp form: `T<sec>:<nanos>` or
/// `YYYY-MM-DD<sep>HH:MM:SS[:NANOS]` with `@` or `T` as separator.
pub fn parse_timestamp(s: &str) -> Result<Timestamp> {
    if let Some(rest) = s.strip_prefix('T') {
        let colon = rest
            .find(':')
            .ok_or_else(|| eyre::eyre!("invalid timestamp '{}': missing ':'", s))?;
        let seconds = parse_int_auto(&rest[..colon])?;
        let nanoseconds = parse_int_auto(&rest[colon + 1..])? as i32;
        return Timestamp::new(seconds, nanoseconds);
    }
    parse_civil_timestamp(s)
}

fn parse_civil_timestamp(s: &str) -> Result<Timestamp> {
    let sep = if s.contains('@') { '@' } else { 'T' };
    let (date_str, time_str) = s
        .split_once(sep)
        .ok_or_else(|| eyre::eyre!("invalid timestamp '{}': missing date/time separator", s))?;

    let date_parts: Vec<&str> = date_str.split('-').collect();
    ensure!(
        date_parts.len() == 3,
        "invalid timestamp '{}': expected YYYY-MM-DD date",
        s
    );
    let year: i32 = date_parts[0]
        .parse()
        .wrap_err_with(|| format!("invalid year in timestamp: '{}'", date_parts[0]))?;
    let month: u32 = date_parts[1]
        .parse()
        .wrap_err_with(|| format!("invalid month in timestamp: '{}'", date_parts[1]))?;
    let day: u32 = date_parts[2]
        .parse()
        .wrap_err_with(|| format!("invalid day in timestamp: '{}'", date_parts[2]))?;

    if year < 1900 {
        bail!("Conversion of dates before 1900 is not supported.");
    }
    ensure!(
        (1..=12).contains(&month),
        "invalid month {} in timestamp '{}'",
        month,
        s
    );
    ensure!(
        day >= 1 && day <= days_in_month(year, month),
        "invalid day {} in timestamp '{}'",
        day,
        s
    );

    let time_parts: Vec<&str> = time_str.split(':').collect();
    ensure!(
        time_parts.len() == 3 || time_parts.len() == 4,
        "invalid timestamp '{}': expected HH:MM:SS[:NANOS] time",
        s
    );
    let hour: i64 = time_parts[0]
        .parse()
        .wrap_err_with(|| format!("invalid hour in timestamp: '{}'", time_parts[0]))?;
    let minute: i64 = time_parts[1]
        .parse()
        .wrap_err_with(|| format!("invalid minute in timestamp: '{}'", time_parts[1]))?;
    let second: i64 = time_parts[2]
        .parse()
        .wrap_err_with(|| format!("invalid second in timestamp: '{}'", time_parts[2]))?;
    ensure!(
        (0..24).contains(&hour) && (0..60).contains(&minute) && (0..60).contains(&second),
        "invalid time in timestamp '{}'",
        s
    );

    let mut nanoseconds: i32 = if time_parts.len() == 4 {
        time_parts[3]
            .parse()
            .wrap_err_with(|| format!("invalid nanoseconds in timestamp: '{}'", time_parts[3]))?
    } else {
        0
    };
    if nanoseconds < 0 {
        bail!("The nanoseconds of a Timestamp cannot be negative.");
    }

    let days = date_to_days_since_epoch(year, month, day);
    let seconds = days as i64 * 86_400 + hour * 3_600 + minute * 60 + second;
    if seconds < 0 {
        // The seconds determine the sign of the nanoseconds part.
        nanoseconds = -nanoseconds;
    }

    Timestamp::new(seconds, nanoseconds)
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

fn date_to_days_since_epoch(year: i32, month: u32, day: u32) -> i32 {
    let mut days: i32 = 0;

    if year >= 1970 {
        for y in 1970..year {
            days += if is_leap_year(y) { 366 } else { 365 };
        }
    } else {
        for y in year..1970 {
            days -= if is_leap_year(y) { 366 } else { 365 };
        }
    }

    for m in 1..month {
        days += days_in_month(year, m) as i32;
    }

    days += day as i32 - 1;

    days
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_auto_detects_base() {
        assert_eq!(parse_int_auto("42").unwrap(), 42);
        assert_eq!(parse_int_auto("-17").unwrap(), -17);
        assert_eq!(parse_int_auto("0x2a").unwrap(), 42);
        assert_eq!(parse_int_auto("052").unwrap(), 42);
        assert_eq!(parse_int_auto("0").unwrap(), 0);
    }

    #[test]
    fn int_auto_rejects_garbage() {
        assert!(parse_int_auto("fourty-two").is_err());
        assert!(parse_int_auto("0xZZ").is_err());
    }

    #[test]
    fn uuid_round_trips_hyphenated_form() {
        let u = parse_uuid("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(u.as_bytes()[0], 0x55);
        assert_eq!(u.as_bytes()[15], 0x00);
    }

    #[test]
    fn uuid_rejects_wrong_length() {
        assert!(parse_uuid("550e8400").is_err());
        assert!(parse_uuid("550e8400-e29b-41d4-a716-44665544000000").is_err());
    }

    #[test]
    fn object_id_parses_24_hex_chars() {
        let oid = parse_object_id("5f4e2ab51c3a5a8c2f1e0b97").unwrap();
        assert_eq!(oid.as_bytes()[0], 0x5f);
        assert_eq!(oid.as_bytes()[11], 0x97);
    }

    #[test]
    fn object_id_rejects_bad_input() {
        assert!(parse_object_id("5f4e2ab5").is_err());
        assert!(parse_object_id("zz4e2ab51c3a5a8c2f1e0b97").is_err());
    }

    #[test]
    fn decimal_parses_finite_forms() {
        assert_eq!(parse_decimal("1.25").unwrap().to_parts(), Some((125, 2)));
        assert_eq!(parse_decimal("-3").unwrap().to_parts(), Some((-3, 0)));
        assert_eq!(parse_decimal("2e3").unwrap().to_parts(), Some((2, -3)));
        assert_eq!(parse_decimal("1.5e-2").unwrap().to_parts(), Some((15, 3)));
    }

    #[test]
    fn decimal_parses_special_forms() {
        assert!(parse_decimal("inf").unwrap().is_infinite());
        assert!(parse_decimal("-inf").unwrap().is_infinite());
        assert!(parse_decimal("NaN").unwrap().is_nan());
    }

    #[test]
    fn decimal_rejects_garbage() {
        assert!(parse_decimal("").is_err());
        assert!(parse_decimal("1.2.3").is_err());
        assert!(parse_decimal("abc").is_err());
    }

    #[test]
    fn base64_decodes_with_and_without_padding() {
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64("aGVsbG8h").unwrap(), b"hello!");
        assert_eq!(decode_base64("aA==").unwrap(), b"h");
        assert_eq!(decode_base64("").unwrap(), b"");
    }

    #[test]
    fn base64_rejects_invalid_input() {
        assert!(decode_base64("a").is_err());
        assert!(decode_base64("a=b=").is_err());
        assert!(decode_base64("§§§§").is_err());
    }

    #[test]
    fn explicit_timestamp_form_parses() {
        let ts = parse_timestamp("T100:500").unwrap();
        assert_eq!(ts.seconds(), 100);
        assert_eq!(ts.nanoseconds(), 500);

        let ts = parse_timestamp("T-100:-500").unwrap();
        assert_eq!(ts.seconds(), -100);
        assert_eq!(ts.nanoseconds(), -500);
    }

    #[test]
    fn civil_timestamp_converts_to_utc_seconds() {
        // 1970-01-02 00:00:00 UTC is exactly one day after the epoch.
        let ts = parse_timestamp("1970-01-02@00:00:00").unwrap();
        assert_eq!(ts.seconds(), 86_400);
        assert_eq!(ts.nanoseconds(), 0);

        let ts = parse_timestamp("2022-01-01T09:00:00:123").unwrap();
        assert_eq!(ts.seconds(), 1_641_027_600);
        assert_eq!(ts.nanoseconds(), 123);
    }

    #[test]
    fn civil_timestamp_before_1970_is_negative() {
        let ts = parse_timestamp("1969-12-31@00:00:00").unwrap();
        assert_eq!(ts.seconds(), -86_400);
    }

    #[test]
    fn pre_1900_dates_are_rejected() {
        let err = parse_timestamp("1899-12-31@00:00:00").unwrap_err();
        assert!(err.to_string().contains("before 1900"));
    }

    #[test]
    fn negative_nanoseconds_field_is_rejected() {
        let err = parse_timestamp("2022-01-01@00:00:00:-5").unwrap_err();
        assert!(err.to_string().contains("cannot be negative"));
    }

    #[test]
    fn nanoseconds_inherit_sign_of_negative_seconds() {
        let ts = parse_timestamp("1969-12-31@00:00:00:250").unwrap();
        assert_eq!(ts.seconds(), -86_400);
        assert_eq!(ts.nanoseconds(), -250);
    }
}
