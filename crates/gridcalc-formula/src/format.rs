//! Default (en-US) display formatter
//!
//! Format strings are a letter optionally followed by a digit count:
//!
//! | Format | Meaning                           | Example (`1234.5`)  |
//! |--------|-----------------------------------|---------------------|
//! | `nX`   | number, thousands separators      | `n2` → `1,234.50`   |
//! | `fX`   | fixed point, no separators        | `f1` → `1234.5`     |
//! | `cX`   | currency                          | `c1` → `$1,234.5`   |
//! | `pX`   | percent                           | `p0` → `123450%`    |
//! | `d`    | short date                        | `m/d/yyyy`          |
//! | `t`    | short time                        | `h:mm AM`           |
//! | `g`    | short date and time               |                     |
//!
//! The digit count defaults to 2. Anything else formats as plain text.

use crate::value::FormulaValue;

const DEFAULT_DIGITS: usize = 2;

/// Render a value with a display format
pub fn format_value(value: &FormulaValue, format: &str) -> String {
    let value = value.raw();
    let mut chars = format.chars();
    let Some(kind) = chars.next() else {
        return value.as_string();
    };
    let digits = chars.as_str();

    match kind.to_ascii_lowercase() {
        'd' | 't' | 'g' if digits.is_empty() => format_date(value, kind.to_ascii_lowercase()),
        'n' | 'f' | 'c' | 'p' if value.is_number() => {
            let Some(digits) = parse_digits(digits) else {
                return value.as_string();
            };
            let n = value.to_number();
            match kind.to_ascii_lowercase() {
                'n' => fixed(n, digits, true),
                'f' => fixed(n, digits, false),
                'c' => {
                    let body = fixed(n.abs(), digits, true);
                    if is_negative(n, digits) {
                        format!("-${}", body)
                    } else {
                        format!("${}", body)
                    }
                }
                _ => format!("{}%", fixed(n * 100.0, digits, true)),
            }
        }
        _ => value.as_string(),
    }
}

fn parse_digits(text: &str) -> Option<usize> {
    if text.is_empty() {
        Some(DEFAULT_DIGITS)
    } else {
        text.parse().ok()
    }
}

/// Whether `n` still shows as negative once rounded to `digits`
fn is_negative(n: f64, digits: usize) -> bool {
    n < 0.0 && format!("{:.*}", digits, n.abs()).chars().any(|c| matches!(c, '1'..='9'))
}

fn fixed(n: f64, digits: usize, grouping: bool) -> String {
    let text = format!("{:.*}", digits, n.abs());
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };

    let mut result = String::with_capacity(text.len() + text.len() / 3 + 1);
    if is_negative(n, digits) {
        result.push('-');
    }
    if grouping {
        result.push_str(&group_thousands(int_part));
    } else {
        result.push_str(int_part);
    }
    if let Some(frac) = frac_part {
        result.push('.');
        result.push_str(frac);
    }
    result
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_date(value: &FormulaValue, kind: char) -> String {
    if !value.is_number() {
        return value.as_string();
    }
    let Ok(date) = value.to_date() else {
        return value.as_string();
    };
    match kind {
        'd' => date.format("%-m/%-d/%Y").to_string(),
        't' => date.format("%-I:%M %p").to_string(),
        _ => date.format("%-m/%-d/%Y %-I:%M %p").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    #[test]
    fn test_numbers() {
        assert_eq!(format_value(&num(1234.567), "n2"), "1,234.57");
        assert_eq!(format_value(&num(1234.5), "n"), "1,234.50");
        assert_eq!(format_value(&num(-1234567.0), "n0"), "-1,234,567");
        assert_eq!(format_value(&num(-0.001), "n2"), "0.00");
        assert_eq!(format_value(&num(1234.5), "f1"), "1234.5");
        assert_eq!(format_value(&num(999.0), "n0"), "999");
    }

    #[test]
    fn test_currency_and_percent() {
        assert_eq!(format_value(&num(1234.5), "c2"), "$1,234.50");
        assert_eq!(format_value(&num(-5.0), "c0"), "-$5");
        assert_eq!(format_value(&num(0.256), "p1"), "25.6%");
        assert_eq!(format_value(&num(0.5), "p0"), "50%");
    }

    #[test]
    fn test_dates() {
        let date = NaiveDate::from_ymd_opt(2020, 3, 1)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        let value = FormulaValue::Date(date);
        assert_eq!(format_value(&value, "d"), "3/1/2020");
        assert_eq!(format_value(&value, "t"), "2:05 PM");
        assert_eq!(format_value(&value, "g"), "3/1/2020 2:05 PM");
        assert_eq!(format_value(&num(43831.0), "d"), "1/1/2020");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(format_value(&FormulaValue::from("abc"), "n2"), "abc");
        assert_eq!(format_value(&num(1.5), "zz"), "1.5");
        assert_eq!(format_value(&num(1.5), ""), "1.5");
        assert_eq!(format_value(&FormulaValue::Boolean(true), "d"), "TRUE");
        assert_eq!(
            format_value(&FormulaValue::formatted(num(2.0), "n0"), "n1"),
            "2.0"
        );
    }
}
