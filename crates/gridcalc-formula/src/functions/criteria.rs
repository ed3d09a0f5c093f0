//! Criteria matching for COUNTIF, COUNTIFS, SUMIF and SUMIFS
//!
//! A criterion is text (or a value turned into text) of one of these shapes:
//! - A wildcard pattern: `?` matches one character, `*` any run of characters
//! - A comparison: `">5"`, `"<>apple"`
//! - A bare value: an implicit `=` comparison
//! - `"="` matches blank cells, `"<>"` matches non-blank cells
//!
//! Comparisons are evaluated through the expression evaluator, so they
//! follow the same rules as the comparison operators: `">5"` never matches
//! text, while `"apple"` and `"<>apple"` compare text case-insensitively.

use super::{has_wildcards, wildcard_regex};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::expr::{BinaryOperator, CellRangeReference, Expr};
use crate::value::FormulaValue;
use regex::Regex;

/// A parsed criterion
#[derive(Debug)]
pub enum Criterion {
    Pattern { regex: Regex, negate: bool },
    Compare { op: BinaryOperator, operand: String },
    Blank,
    NonBlank,
}

impl Criterion {
    pub fn parse(criteria: &FormulaValue) -> FormulaResult<Self> {
        let text = criteria.as_string();
        let (op, operand) = split_operator(&text);

        if operand.is_empty() {
            return match op {
                BinaryOperator::Equal => Ok(Criterion::Blank),
                BinaryOperator::NotEqual => Ok(Criterion::NonBlank),
                _ => Err(FormulaError::InvalidCriteria(text)),
            };
        }

        if has_wildcards(operand) {
            let negate = match op {
                BinaryOperator::Equal => false,
                BinaryOperator::NotEqual => true,
                _ => return Err(FormulaError::InvalidCriteria(text)),
            };
            return Ok(Criterion::Pattern {
                regex: wildcard_regex(operand)?,
                negate,
            });
        }

        Ok(Criterion::Compare {
            op,
            operand: operand.to_string(),
        })
    }

    /// Test one candidate cell value
    pub fn matches(&self, value: &FormulaValue, ctx: &EvaluationContext) -> FormulaResult<bool> {
        match self {
            Criterion::Blank => Ok(value.is_blank()),
            Criterion::NonBlank => Ok(!value.is_blank()),
            Criterion::Pattern { regex, negate } => {
                Ok(regex.is_match(&value.as_string()) != *negate)
            }
            Criterion::Compare { op, operand } => {
                let test = Expr::binary(
                    *op,
                    Expr::Literal(value.clone()),
                    Expr::Literal(FormulaValue::String(operand.clone())),
                );
                evaluate(&test, ctx)?.to_boolean()
            }
        }
    }
}

/// Split a leading comparison operator off criteria text; bare text means `=`
fn split_operator(text: &str) -> (BinaryOperator, &str) {
    const OPERATORS: [(&str, BinaryOperator); 6] = [
        (">=", BinaryOperator::GreaterEqual),
        ("<=", BinaryOperator::LessEqual),
        ("<>", BinaryOperator::NotEqual),
        (">", BinaryOperator::GreaterThan),
        ("<", BinaryOperator::LessThan),
        ("=", BinaryOperator::Equal),
    ];

    for (prefix, op) in OPERATORS {
        if let Some(rest) = text.strip_prefix(prefix) {
            return (op, rest.trim());
        }
    }
    (BinaryOperator::Equal, text.trim())
}

/// Ranges paired with criteria must all have the same shape
fn check_spans(function: &str, ranges: &[&CellRangeReference]) -> FormulaResult<()> {
    let first = ranges[0].range;
    for r in &ranges[1..] {
        if r.range.row_span() != first.row_span() || r.range.column_span() != first.column_span() {
            return Err(FormulaError::argument(format!(
                "{} ranges must have the same size ({} vs {})",
                function, ranges[0], r
            )));
        }
    }
    Ok(())
}

/// Per-cell match flags for a list of (range, criteria) pairs, all ANDed
fn match_mask(
    function: &str,
    pairs: &[Expr],
    sum_range: Option<&CellRangeReference>,
    ctx: &EvaluationContext,
) -> FormulaResult<Vec<bool>> {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(FormulaError::argument(format!(
            "{} expects range/criteria pairs",
            function
        )));
    }

    let mut ranges = Vec::with_capacity(pairs.len() / 2);
    let mut criteria = Vec::with_capacity(pairs.len() / 2);
    for pair in pairs.chunks(2) {
        ranges.push(ctx.reference(&pair[0], function)?);
        criteria.push(Criterion::parse(&ctx.value(&pair[1])?)?);
    }

    let mut all: Vec<&CellRangeReference> = ranges.iter().collect();
    all.extend(sum_range);
    check_spans(function, &all)?;

    let mut mask: Option<Vec<bool>> = None;
    for (range, criterion) in ranges.iter().zip(&criteria) {
        let values = ctx.range_values(range, true, None)?;
        let flags = mask.get_or_insert_with(|| vec![true; values.len()]);
        for (flag, value) in flags.iter_mut().zip(&values) {
            if *flag {
                *flag = criterion.matches(value, ctx)?;
            }
        }
    }
    Ok(mask.unwrap_or_default())
}

fn sum_matching(
    sum_range: &CellRangeReference,
    mask: &[bool],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let values = ctx.range_values(sum_range, true, None)?;
    let sum = values
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m)
        .map(|(v, _)| v.to_number())
        .filter(|n| !n.is_nan())
        .sum();
    Ok(FormulaValue::Number(sum))
}

fn count(mask: &[bool]) -> FormulaValue {
    FormulaValue::Number(mask.iter().filter(|&&m| m).count() as f64)
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(count(&match_mask("COUNTIF", args, None, ctx)?))
}

/// COUNTIFS(range1, criteria1, [range2, criteria2], ...)
pub fn fn_countifs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(count(&match_mask("COUNTIFS", args, None, ctx)?))
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let sum_range = match args.get(2) {
        Some(arg) => ctx.reference(arg, "SUMIF")?,
        None => ctx.reference(&args[0], "SUMIF")?,
    };
    let mask = match_mask("SUMIF", &args[..2], Some(&sum_range), ctx)?;
    sum_matching(&sum_range, &mask, ctx)
}

/// SUMIFS(sum_range, range1, criteria1, [range2, criteria2], ...)
pub fn fn_sumifs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let sum_range = ctx.reference(&args[0], "SUMIFS")?;
    let mask = match_mask("SUMIFS", &args[1..], Some(&sum_range), ctx)?;
    sum_matching(&sum_range, &mask, ctx)
}
