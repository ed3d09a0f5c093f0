//! Date and time functions
//!
//! Dates are serial day numbers counted from 1899-12-30; the time of day is
//! the fractional part.

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::{serial_epoch, FormulaValue};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const SECONDS_PER_DAY: i64 = 86_400;

fn date_arg(expr: &Expr, ctx: &EvaluationContext) -> FormulaResult<NaiveDateTime> {
    ctx.value(expr)?.to_date()
}

fn integer_arg(expr: &Expr, ctx: &EvaluationContext) -> FormulaResult<i64> {
    Ok(ctx.number(expr)?.trunc() as i64)
}

/// A calendar date, with the day clamped to the length of the month
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (28..=day.max(28))
        .rev()
        .map(|d| d.min(day))
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

pub fn fn_now(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::formatted(
        FormulaValue::Date(Local::now().naive_local()),
        "g",
    ))
}

pub fn fn_today(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::formatted(
        FormulaValue::Date(Local::now().date_naive().and_time(NaiveTime::MIN)),
        "d",
    ))
}

pub fn fn_year(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.year() as f64))
}

pub fn fn_month(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.month() as f64))
}

pub fn fn_day(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.day() as f64))
}

pub fn fn_hour(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.hour() as f64))
}

pub fn fn_minute(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.minute() as f64))
}

pub fn fn_second(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(date_arg(&args[0], ctx)?.second() as f64))
}

/// WEEKDAY(date, [return_type])
///
/// - 1: Sunday = 1 through Saturday = 7 (default)
/// - 2: Monday = 1 through Sunday = 7
/// - 3: Monday = 0 through Sunday = 6
pub fn fn_weekday(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let date = date_arg(&args[0], ctx)?;
    let return_type = match args.get(1) {
        Some(arg) => integer_arg(arg, ctx)?,
        None => 1,
    };

    let weekday = date.weekday();
    let n = match return_type {
        1 => weekday.num_days_from_sunday() + 1,
        2 => weekday.number_from_monday(),
        3 => weekday.num_days_from_monday(),
        other => {
            return Err(FormulaError::argument(format!(
                "WEEKDAY return type {} is not supported",
                other
            )))
        }
    };
    Ok(FormulaValue::Number(n as f64))
}

/// TIME(hour, minute, second) - wraps around at 24 hours
pub fn fn_time(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let hour = integer_arg(&args[0], ctx)?;
    let minute = integer_arg(&args[1], ctx)?;
    let second = integer_arg(&args[2], ctx)?;

    let seconds = hour
        .checked_mul(3600)
        .and_then(|h| minute.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(second))
        .ok_or_else(|| {
            FormulaError::argument(format!("invalid time {}:{}:{}", hour, minute, second))
        })?
        .rem_euclid(SECONDS_PER_DAY);
    Ok(FormulaValue::formatted(
        FormulaValue::Date(serial_epoch() + Duration::seconds(seconds)),
        "t",
    ))
}

/// DATE(year, month, day)
///
/// Months outside 1..=12 roll into neighbouring years and days beyond the
/// month roll forward. Years below 1900 are offset from 1900.
pub fn fn_date(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut year = integer_arg(&args[0], ctx)?;
    let month = integer_arg(&args[1], ctx)?;
    let day = integer_arg(&args[2], ctx)?;

    if (0..1900).contains(&year) {
        year += 1900;
    }

    let invalid = || FormulaError::argument(format!("invalid date {}-{}-{}", year, month, day));
    let months = year
        .checked_mul(12)
        .and_then(|m| m.checked_add(month))
        .and_then(|m| m.checked_sub(1))
        .ok_or_else(invalid)?;

    let first = i32::try_from(months.div_euclid(12))
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, months.rem_euclid(12) as u32 + 1, 1))
        .ok_or_else(invalid)?;
    let date = day
        .checked_sub(1)
        .and_then(Duration::try_days)
        .and_then(|offset| first.checked_add_signed(offset))
        .ok_or_else(invalid)?;

    Ok(FormulaValue::Date(date.and_time(NaiveTime::MIN)))
}

/// Whole months between two dates, counting a month only once its day is reached
fn whole_months(start: NaiveDate, end: NaiveDate) -> i64 {
    let mut months = (end.year() - start.year()) as i64 * 12 + end.month() as i64
        - start.month() as i64;
    if end.day() < start.day() {
        months -= 1;
    }
    months
}

/// DATEDIF(start_date, end_date, unit)
///
/// Units: `Y` whole years, `M` whole months, `D` days, `YM` months ignoring
/// years, `YD` days ignoring years, `MD` days ignoring months and years.
pub fn fn_datedif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let start = date_arg(&args[0], ctx)?.date();
    let end = date_arg(&args[1], ctx)?.date();
    let unit = ctx.string(&args[2])?.trim().to_uppercase();

    if start > end {
        return Err(FormulaError::argument(
            "DATEDIF start date is after the end date",
        ));
    }

    let result = match unit.as_str() {
        "Y" => whole_months(start, end) / 12,
        "M" => whole_months(start, end),
        "D" => (end - start).num_days(),
        "YM" => whole_months(start, end) % 12,
        "YD" => {
            let shifted = clamped_date(end.year(), start.month(), start.day())
                .filter(|d| *d <= end)
                .or_else(|| clamped_date(end.year() - 1, start.month(), start.day()))
                .unwrap_or(start);
            (end - shifted).num_days()
        }
        "MD" => {
            if end.day() >= start.day() {
                (end.day() - start.day()) as i64
            } else {
                let (year, month) = if end.month() == 1 {
                    (end.year() - 1, 12)
                } else {
                    (end.year(), end.month() - 1)
                };
                let anchor = clamped_date(year, month, start.day()).unwrap_or(start);
                (end - anchor).num_days()
            }
        }
        other => {
            return Err(FormulaError::argument(format!(
                "DATEDIF unit '{}' is not supported",
                other
            )))
        }
    };
    Ok(FormulaValue::Number(result as f64))
}
