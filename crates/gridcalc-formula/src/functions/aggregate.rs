//! Aggregate and statistical functions

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::{parse_number, serial_to_date, FormulaValue};

/// Reductions shared by the named functions and `SUBTOTAL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Average,
    Count,
    CountA,
    Max,
    Min,
    Product,
    Stdev,
    StdevP,
    Sum,
    Var,
    VarP,
}

impl Aggregate {
    /// Map a `SUBTOTAL` function code (1-11, or 101-111 to skip hidden cells)
    pub fn from_subtotal_code(code: i64) -> Option<(Self, bool)> {
        let include_hidden = code < 100;
        let kind = match code % 100 {
            1 => Aggregate::Average,
            2 => Aggregate::Count,
            3 => Aggregate::CountA,
            4 => Aggregate::Max,
            5 => Aggregate::Min,
            6 => Aggregate::Product,
            7 => Aggregate::Stdev,
            8 => Aggregate::StdevP,
            9 => Aggregate::Sum,
            10 => Aggregate::Var,
            11 => Aggregate::VarP,
            _ => return None,
        };
        if (1..=11).contains(&code) || (101..=111).contains(&code) {
            Some((kind, include_hidden))
        } else {
            None
        }
    }

    /// Apply the reduction to a flattened list of values
    pub fn apply(self, values: &[FormulaValue]) -> FormulaResult<FormulaValue> {
        let (nums, all_dates) = numbers(values);
        let as_date = |n: f64| {
            if all_dates {
                serial_to_date(n)
                    .map(FormulaValue::Date)
                    .unwrap_or(FormulaValue::Number(n))
            } else {
                FormulaValue::Number(n)
            }
        };

        Ok(match self {
            Aggregate::Sum => as_date(nums.iter().sum()),
            Aggregate::Average => {
                if nums.is_empty() {
                    return Err(FormulaError::DivideByZero);
                }
                as_date(mean(&nums))
            }
            Aggregate::Max => as_date(nums.iter().copied().reduce(f64::max).unwrap_or(0.0)),
            Aggregate::Min => as_date(nums.iter().copied().reduce(f64::min).unwrap_or(0.0)),
            Aggregate::Count => FormulaValue::Number(nums.len() as f64),
            Aggregate::CountA => FormulaValue::Number(
                values
                    .iter()
                    .filter(|v| !matches!(v.raw(), FormulaValue::Empty))
                    .count() as f64,
            ),
            Aggregate::Product => {
                if nums.is_empty() {
                    FormulaValue::Number(0.0)
                } else {
                    FormulaValue::Number(nums.iter().product())
                }
            }
            Aggregate::Var => FormulaValue::Number(variance(&nums, true)?),
            Aggregate::VarP => FormulaValue::Number(variance(&nums, false)?),
            Aggregate::Stdev => FormulaValue::Number(variance(&nums, true)?.sqrt()),
            Aggregate::StdevP => FormulaValue::Number(variance(&nums, false)?.sqrt()),
        })
    }
}

/// Numeric entries of a value list, and whether every one of them was a date
///
/// Numeric text is parsed; booleans, blanks and other text are dropped.
pub fn numbers(values: &[FormulaValue]) -> (Vec<f64>, bool) {
    let mut nums = Vec::with_capacity(values.len());
    let mut dates = 0;

    for v in values {
        match v.raw() {
            FormulaValue::Number(n) if !n.is_nan() => nums.push(*n),
            FormulaValue::Date(_) => {
                nums.push(v.to_number());
                dates += 1;
            }
            FormulaValue::String(s) => {
                if let Some(n) = parse_number(s.trim()) {
                    nums.push(n);
                }
            }
            _ => {}
        }
    }

    let all_dates = !nums.is_empty() && dates == nums.len();
    (nums, all_dates)
}

fn mean(nums: &[f64]) -> f64 {
    nums.iter().sum::<f64>() / nums.len() as f64
}

fn variance(nums: &[f64], sample: bool) -> FormulaResult<f64> {
    let n = nums.len();
    if n == 0 || (sample && n < 2) {
        return Err(FormulaError::DivideByZero);
    }
    let m = mean(nums);
    let ss: f64 = nums.iter().map(|x| (x - m).powi(2)).sum();
    Ok(ss / if sample { (n - 1) as f64 } else { n as f64 })
}

/// Flatten every argument into one value list
pub(crate) fn collect(
    args: &[Expr],
    ctx: &EvaluationContext,
    include_hidden: bool,
) -> FormulaResult<Vec<FormulaValue>> {
    let mut values = Vec::new();
    for arg in args {
        values.extend(ctx.values(arg, include_hidden)?);
    }
    Ok(values)
}

fn reduce(kind: Aggregate, args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    kind.apply(&collect(args, ctx, true)?)
}

/// SUM(value1, ...)
pub fn fn_sum(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Sum, args, ctx)
}

/// AVERAGE(value1, ...)
pub fn fn_average(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Average, args, ctx)
}

/// MAX(value1, ...)
pub fn fn_max(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Max, args, ctx)
}

/// MIN(value1, ...)
pub fn fn_min(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Min, args, ctx)
}

pub fn fn_var(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Var, args, ctx)
}

pub fn fn_varp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::VarP, args, ctx)
}

pub fn fn_stdev(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Stdev, args, ctx)
}

pub fn fn_stdevp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::StdevP, args, ctx)
}

/// COUNT(value1, ...) - numeric entries only
pub fn fn_count(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Count, args, ctx)
}

/// COUNTA(value1, ...) - non-empty entries
pub fn fn_counta(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::CountA, args, ctx)
}

/// COUNTBLANK(range, ...) - empty cells, empty strings and NaN
pub fn fn_countblank(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let values = collect(args, ctx, true)?;
    Ok(FormulaValue::Number(
        values.iter().filter(|v| v.is_blank()).count() as f64,
    ))
}

pub fn fn_product(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    reduce(Aggregate::Product, args, ctx)
}

/// SUMPRODUCT(array1, [array2], ...)
pub fn fn_sumproduct(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut arrays = Vec::with_capacity(args.len());
    for arg in args {
        arrays.push(ctx.values(arg, true)?);
    }

    let len = arrays[0].len();
    if arrays.iter().any(|a| a.len() != len) {
        return Err(FormulaError::argument(
            "SUMPRODUCT arrays must have the same size",
        ));
    }

    let entry = |v: &FormulaValue| match v.raw() {
        FormulaValue::Number(n) if !n.is_nan() => *n,
        FormulaValue::Date(_) => v.to_number(),
        _ => 0.0,
    };

    let sum = (0..len)
        .map(|i| arrays.iter().map(|a| entry(&a[i])).product::<f64>())
        .sum();
    Ok(FormulaValue::Number(sum))
}

/// RANK(number, ref, [order])
///
/// `order` 0 (the default) ranks the largest value first.
pub fn fn_rank(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = ctx.number(&args[0])?;
    let (mut nums, _) = numbers(&ctx.values(&args[1], true)?);
    let order = super::optional(args, 2, 0.0, ctx, |e, ctx| ctx.number(e))?;

    if order == 0.0 {
        nums.sort_by(|a, b| b.total_cmp(a));
    } else {
        nums.sort_by(|a, b| a.total_cmp(b));
    }

    nums.iter()
        .position(|&n| n == number)
        .map(|i| FormulaValue::Number((i + 1) as f64))
        .ok_or_else(|| FormulaError::NotFound(FormulaValue::Number(number).as_string()))
}

/// SUBTOTAL(function_num, ref1, ...)
pub fn fn_subtotal(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let code = ctx.number(&args[0])?.trunc() as i64;
    let (kind, include_hidden) = Aggregate::from_subtotal_code(code).ok_or_else(|| {
        FormulaError::argument(format!("invalid SUBTOTAL function number {}", code))
    })?;
    kind.apply(&collect(&args[1..], ctx, include_hidden)?)
}
