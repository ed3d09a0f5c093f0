//! Lookup and reference functions

use super::{has_wildcards, optional, wildcard_regex};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{compare_values, EvaluationContext, Operand};
use crate::expr::{CellRangeReference, Expr};
use crate::value::FormulaValue;
use gridcalc_core::CellRange;
use std::cmp::Ordering;

/// ROW([reference])
pub fn fn_row(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let row = match args.first() {
        Some(arg) => ctx.reference(arg, "ROW")?.range.top_row,
        None => ctx
            .row
            .ok_or_else(|| FormulaError::argument("ROW needs a reference outside of a cell"))?,
    };
    Ok(FormulaValue::Number((row + 1) as f64))
}

/// COLUMN([reference])
pub fn fn_column(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let col = match args.first() {
        Some(arg) => ctx.reference(arg, "COLUMN")?.range.left_col,
        None => ctx
            .col
            .ok_or_else(|| FormulaError::argument("COLUMN needs a reference outside of a cell"))?,
    };
    Ok(FormulaValue::Number((col + 1) as f64))
}

pub fn fn_rows(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let r = ctx.reference(&args[0], "ROWS")?;
    Ok(FormulaValue::Number(r.range.row_span() as f64))
}

pub fn fn_columns(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let r = ctx.reference(&args[0], "COLUMNS")?;
    Ok(FormulaValue::Number(r.range.column_span() as f64))
}

/// CHOOSE(index, value1, ...) - only the chosen value is evaluated
pub fn fn_choose(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let index = ctx.number(&args[0])?.trunc();
    if index < 1.0 || index as usize >= args.len() {
        return Err(FormulaError::IndexOutOfRange(format!(
            "CHOOSE index {} with {} choices",
            index,
            args.len() - 1
        )));
    }
    // Ranges stay references so CHOOSE can feed SUM and friends
    Ok(match ctx.operand(&args[index as usize])? {
        Operand::Range(r) => FormulaValue::Reference(r),
        Operand::Value(v) => v,
    })
}

/// A 1-based position argument where 0 means "the whole axis"
fn axis_index(name: &str, n: f64, span: usize) -> FormulaResult<Option<usize>> {
    let n = n.trunc();
    if n < 0.0 || n as usize > span {
        return Err(FormulaError::IndexOutOfRange(format!(
            "{} index {} outside 1..={}",
            name, n, span
        )));
    }
    Ok(if n == 0.0 { None } else { Some(n as usize - 1) })
}

/// INDEX(reference, row, [column])
///
/// Returns a reference narrowed to one cell, or to a whole row or column when
/// the other index is 0.
pub fn fn_index(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let r = ctx.reference(&args[0], "INDEX")?;
    let range = r.range;
    let row = axis_index("INDEX row", ctx.number(&args[1])?, range.row_span())?;
    let col = axis_index(
        "INDEX column",
        optional(args, 2, 0.0, ctx, |e, ctx| ctx.number(e))?,
        range.column_span(),
    )?;

    let (top, bottom) = match row {
        Some(i) => (range.top_row + i, range.top_row + i),
        None => (range.top_row, range.bottom_row),
    };
    let (left, right) = match col {
        Some(i) => (range.left_col + i, range.left_col + i),
        None => (range.left_col, range.right_col),
    };

    Ok(FormulaValue::Reference(
        r.with_range(CellRange::new(top, left, bottom, right)),
    ))
}

/// Direction a table is searched in
#[derive(Debug, Clone, Copy, PartialEq)]
enum Axis {
    /// Keys in the first row, results further down (HLOOKUP)
    Horizontal,
    /// Keys in the first column, results further right (VLOOKUP)
    Vertical,
}

impl Axis {
    /// The row or column at `offset` along the lookup direction
    fn line(self, range: &CellRange, offset: usize) -> CellRange {
        match self {
            Axis::Horizontal => CellRange::new(
                range.top_row + offset,
                range.left_col,
                range.top_row + offset,
                range.right_col,
            ),
            Axis::Vertical => CellRange::new(
                range.top_row,
                range.left_col + offset,
                range.bottom_row,
                range.left_col + offset,
            ),
        }
    }

    fn depth(self, range: &CellRange) -> usize {
        match self {
            Axis::Horizontal => range.row_span(),
            Axis::Vertical => range.column_span(),
        }
    }
}

/// Position of an exact match; text with wildcards is matched as a pattern
fn exact_position(lookup: &FormulaValue, keys: &[FormulaValue]) -> FormulaResult<Option<usize>> {
    if let FormulaValue::String(text) = lookup.raw() {
        if has_wildcards(text) {
            let re = wildcard_regex(text)?;
            return Ok(keys.iter().position(|k| re.is_match(&k.as_string())));
        }
    }
    Ok(keys
        .iter()
        .position(|k| k.is_blank() == lookup.is_blank() && compare_values(k, lookup) == Ordering::Equal))
}

/// Last position before the keys pass `lookup` in the direction `past`
///
/// Keys are assumed sorted: ascending when `past` is `Greater`, descending
/// when it is `Less`.
fn sorted_position(lookup: &FormulaValue, keys: &[FormulaValue], past: Ordering) -> Option<usize> {
    keys.iter()
        .take_while(|k| compare_values(k, lookup) != past)
        .enumerate()
        .filter(|(_, k)| !k.is_blank())
        .map(|(i, _)| i)
        .last()
}

fn table_lookup(
    name: &str,
    axis: Axis,
    args: &[Expr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let lookup = ctx.value(&args[0])?.into_raw();
    let table = ctx.reference(&args[1], name)?;
    let index = ctx.number(&args[2])?.trunc();
    let approximate = optional(args, 3, true, ctx, |e, ctx| ctx.boolean(e))?;

    let depth = axis.depth(&table.range);
    if index < 1.0 || index as usize > depth {
        return Err(FormulaError::IndexOutOfRange(format!(
            "{} index {} outside 1..={}",
            name, index, depth
        )));
    }

    let keys = ctx.range_values(&table.with_range(axis.line(&table.range, 0)), true, None)?;
    let position = match exact_position(&lookup, &keys)? {
        Some(p) => Some(p),
        None if approximate => sorted_position(&lookup, &keys, Ordering::Greater),
        None => None,
    }
    .ok_or_else(|| FormulaError::NotFound(lookup.as_string()))?;

    let results = ctx.range_values(
        &table.with_range(axis.line(&table.range, index as usize - 1)),
        true,
        None,
    )?;
    results
        .into_iter()
        .nth(position)
        .ok_or_else(|| FormulaError::NotFound(lookup.as_string()))
}

/// HLOOKUP(lookup_value, table, row_index, [approximate])
pub fn fn_hlookup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    table_lookup("HLOOKUP", Axis::Horizontal, args, ctx)
}

/// VLOOKUP(lookup_value, table, column_index, [approximate])
pub fn fn_vlookup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    table_lookup("VLOOKUP", Axis::Vertical, args, ctx)
}

/// MATCH(lookup_value, range, [match_type])
///
/// - 1: largest value not above the lookup value, range ascending (default)
/// - 0: first exact match, wildcards allowed
/// - -1: smallest value not below the lookup value, range descending
pub fn fn_match(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let lookup = ctx.value(&args[0])?.into_raw();
    let range: CellRangeReference = ctx.reference(&args[1], "MATCH")?;
    let match_type = optional(args, 2, 1.0, ctx, |e, ctx| ctx.number(e))?.trunc() as i64;

    let values = ctx.range_values(&range, true, None)?;
    let position = match match_type {
        0 => exact_position(&lookup, &values)?,
        1 => sorted_position(&lookup, &values, Ordering::Greater),
        -1 => sorted_position(&lookup, &values, Ordering::Less),
        other => {
            return Err(FormulaError::argument(format!(
                "MATCH type {} is not supported",
                other
            )))
        }
    };

    position
        .map(|p| FormulaValue::Number((p + 1) as f64))
        .ok_or_else(|| FormulaError::NotFound(lookup.as_string()))
}
