//! Values flowing through the engine and the coercions between them

use crate::error::{FormulaError, FormulaResult};
use crate::expr::CellRangeReference;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use gridcalc_core::CellValue;
use std::fmt;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Largest serial day number accepted when converting back to a date (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Empty,
    Number(f64),
    String(String),
    Boolean(bool),
    Date(NaiveDateTime),
    /// A result that also dictates its display format (e.g. `ROUND`, `NOW`)
    Formatted {
        value: Box<FormulaValue>,
        format: String,
    },
    /// A (possibly narrowed) range reference returned by `INDEX`
    Reference(CellRangeReference),
}

impl FormulaValue {
    /// Wrap a value together with a display format
    pub fn formatted<S: Into<String>>(value: FormulaValue, format: S) -> Self {
        FormulaValue::Formatted {
            value: Box::new(value),
            format: format.into(),
        }
    }

    /// The value with any `Formatted` wrapper removed
    pub fn raw(&self) -> &FormulaValue {
        match self {
            FormulaValue::Formatted { value, .. } => value.raw(),
            v => v,
        }
    }

    /// Owned version of [`raw`](Self::raw)
    pub fn into_raw(self) -> FormulaValue {
        match self {
            FormulaValue::Formatted { value, .. } => value.into_raw(),
            v => v,
        }
    }

    /// The display format attached to this value, if any
    pub fn format(&self) -> Option<&str> {
        match self {
            FormulaValue::Formatted { format, .. } => Some(format),
            _ => None,
        }
    }

    /// Whether this is a plain number/string/boolean/date/empty
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            FormulaValue::Formatted { .. } | FormulaValue::Reference(_)
        )
    }

    /// Whether the raw value is a date
    pub fn is_date(&self) -> bool {
        matches!(self.raw(), FormulaValue::Date(_))
    }

    /// Whether the raw value is numeric (numbers and dates)
    pub fn is_number(&self) -> bool {
        matches!(self.raw(), FormulaValue::Number(n) if !n.is_nan())
            || self.is_date()
    }

    /// Blank in the sense of `COUNTBLANK`: empty, empty string, or NaN
    pub fn is_blank(&self) -> bool {
        match self.raw() {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            FormulaValue::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Coerce to a number
    ///
    /// Booleans become 0/1, dates their serial day number, empty values and
    /// empty strings 0. Text that does not parse yields NaN.
    pub fn to_number(&self) -> f64 {
        match self.raw() {
            FormulaValue::Empty => 0.0,
            FormulaValue::Number(n) => *n,
            FormulaValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            FormulaValue::Date(d) => date_to_serial(d),
            FormulaValue::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    0.0
                } else {
                    parse_number(s).unwrap_or(f64::NAN)
                }
            }
            FormulaValue::Formatted { .. } | FormulaValue::Reference(_) => f64::NAN,
        }
    }

    /// Coerce to a number, rejecting values that do not convert
    pub fn expect_number(&self) -> FormulaResult<f64> {
        let n = self.to_number();
        if n.is_nan() {
            Err(FormulaError::argument(format!(
                "cannot convert '{}' to a number",
                self.as_string()
            )))
        } else {
            Ok(n)
        }
    }

    /// Coerce to a boolean
    pub fn to_boolean(&self) -> FormulaResult<bool> {
        match self.raw() {
            FormulaValue::Boolean(b) => Ok(*b),
            FormulaValue::String(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("false") || s.is_empty() {
                    Ok(false)
                } else {
                    parse_number(s).map(|n| n != 0.0).ok_or_else(|| {
                        FormulaError::argument(format!("cannot convert '{}' to a boolean", s))
                    })
                }
            }
            v => Ok(v.to_number() != 0.0),
        }
    }

    /// Coerce to a date; numbers are read as serial day numbers
    pub fn to_date(&self) -> FormulaResult<NaiveDateTime> {
        match self.raw() {
            FormulaValue::Date(d) => Ok(*d),
            FormulaValue::String(s) => parse_date_text(s)
                .or_else(|| parse_number(s.trim()).and_then(serial_to_date))
                .ok_or_else(|| FormulaError::argument(format!("cannot convert '{}' to a date", s))),
            v => serial_to_date(v.to_number()).ok_or_else(|| {
                FormulaError::argument(format!("cannot convert '{}' to a date", v.as_string()))
            }),
        }
    }

    /// Coerce to text
    pub fn as_string(&self) -> String {
        match self.raw() {
            FormulaValue::Empty => String::new(),
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Date(d) => format_date(d),
            FormulaValue::Reference(r) => r.to_string(),
            FormulaValue::Formatted { value, .. } => value.as_string(),
        }
    }
}

impl fmt::Display for FormulaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::String(s) => FormulaValue::String(s),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Date(d) => FormulaValue::Date(d),
            // Formula cells are resolved by the engine before conversion
            CellValue::Formula(text) => FormulaValue::String(text),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::String(s)
    }
}

impl From<NaiveDateTime> for FormulaValue {
    fn from(d: NaiveDateTime) -> Self {
        FormulaValue::Date(d)
    }
}

/// Day zero of the serial date system (1899-12-30)
pub fn serial_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

/// Convert a date to its serial day number (days since 1899-12-30, with a time fraction)
pub fn date_to_serial(date: &NaiveDateTime) -> f64 {
    (*date - serial_epoch()).num_milliseconds() as f64 / MS_PER_DAY
}

/// Convert a serial day number back to a date
pub fn serial_to_date(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL {
        return None;
    }
    let ms = (serial * MS_PER_DAY).round() as i64;
    serial_epoch().checked_add_signed(Duration::milliseconds(ms))
}

/// Parse calendar text such as `2020-01-31` or `1/31/2020 13:45`
pub fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Parse numeric text, accepting a trailing percent sign
pub fn parse_number(text: &str) -> Option<f64> {
    if let Some(pct) = text.strip_suffix('%') {
        return parse_number(pct.trim()).map(|n| n / 100.0);
    }
    // f64::from_str also accepts "inf" and "NaN", which are not numbers here
    let digits = text.trim_start_matches(['+', '-']);
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse::<f64>().ok()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn format_date(d: &NaiveDateTime) -> String {
    if d.time() == NaiveTime::MIN {
        d.format("%-m/%-d/%Y").to_string()
    } else if d.second() == 0 {
        d.format("%-m/%-d/%Y %-I:%M %p").to_string()
    } else {
        d.format("%-m/%-d/%Y %-I:%M:%S %p").to_string()
    }
}
