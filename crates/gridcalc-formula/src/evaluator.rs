//! Formula evaluator
//!
//! Evaluates expression trees to produce values. Cell references are resolved
//! through the [`GridHost`]; formula cells are re-entered through the engine,
//! guarded against circular references.

use crate::engine::FormulaEngine;
use crate::error::{FormulaError, FormulaResult};
use crate::expr::{BinaryOperator, CellRangeReference, Expr, UnaryOperator};
use crate::functions::{CustomArgument, FunctionImpl};
use crate::host::GridHost;
use crate::value::FormulaValue;
use std::cmp::Ordering;

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    pub engine: &'a FormulaEngine,
    pub host: &'a dyn GridHost,
    /// Sheet that unqualified references resolve against
    pub sheet: usize,
    /// Row of the cell containing the formula, if known
    pub row: Option<usize>,
    /// Column of the cell containing the formula, if known
    pub col: Option<usize>,
}

/// An argument evaluated just far enough to tell ranges from values
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Range(CellRangeReference),
    Value(FormulaValue),
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        engine: &'a FormulaEngine,
        host: &'a dyn GridHost,
        sheet: usize,
        row: Option<usize>,
        col: Option<usize>,
    ) -> Self {
        Self {
            engine,
            host,
            sheet,
            row,
            col,
        }
    }

    /// Evaluate an argument, keeping references unresolved
    pub fn operand(&self, expr: &Expr) -> FormulaResult<Operand> {
        match expr {
            Expr::Reference(r) => Ok(Operand::Range(r.clone())),
            _ => Ok(match evaluate(expr, self)? {
                FormulaValue::Reference(r) => Operand::Range(r),
                v => Operand::Value(v),
            }),
        }
    }

    /// Evaluate an argument to a single value; ranges yield their top-left cell
    pub fn value(&self, expr: &Expr) -> FormulaResult<FormulaValue> {
        match self.operand(expr)? {
            Operand::Range(r) => self.reference_value(&r),
            Operand::Value(v) => Ok(v),
        }
    }

    /// Evaluate an argument to a number
    pub fn number(&self, expr: &Expr) -> FormulaResult<f64> {
        self.value(expr)?.expect_number()
    }

    /// Evaluate an argument to text
    pub fn string(&self, expr: &Expr) -> FormulaResult<String> {
        Ok(self.value(expr)?.as_string())
    }

    /// Evaluate an argument to a boolean
    pub fn boolean(&self, expr: &Expr) -> FormulaResult<bool> {
        self.value(expr)?.to_boolean()
    }

    /// Evaluate an argument that must be a range
    pub fn reference(&self, expr: &Expr, function: &str) -> FormulaResult<CellRangeReference> {
        match self.operand(expr)? {
            Operand::Range(r) => Ok(r),
            Operand::Value(v) => Err(FormulaError::argument(format!(
                "{} expects a range, got '{}'",
                function,
                v.as_string()
            ))),
        }
    }

    /// Flatten an argument into values; scalars become a one-element list
    pub fn values(&self, expr: &Expr, include_hidden: bool) -> FormulaResult<Vec<FormulaValue>> {
        match self.operand(expr)? {
            Operand::Range(r) => self.range_values(&r, include_hidden, None),
            Operand::Value(v) => Ok(vec![v.into_raw()]),
        }
    }

    /// Resolve an optional sheet name to a sheet index
    pub fn resolve_sheet(&self, name: Option<&str>) -> FormulaResult<usize> {
        match name {
            Some(name) => self
                .host
                .sheet_index(name)
                .ok_or_else(|| FormulaError::InvalidSheetReference(name.to_string())),
            None => Ok(self.sheet),
        }
    }

    /// Value of the top-left cell of a reference
    pub fn reference_value(&self, reference: &CellRangeReference) -> FormulaResult<FormulaValue> {
        let sheet = self.resolve_sheet(reference.sheet.as_deref())?;
        let _guard = self.engine.begin_resolve(self.host, sheet, &reference.range)?;
        Ok(self.engine.get_cell_value(
            self.host,
            sheet,
            reference.range.top_row,
            reference.range.left_col,
            false,
        ))
    }

    /// Every cell value of a reference, row by row
    ///
    /// `column` restricts the result to one column, as an offset from the left
    /// edge of the range. Hidden rows and columns are skipped unless
    /// `include_hidden` is set. Display formats are stripped.
    pub fn range_values(
        &self,
        reference: &CellRangeReference,
        include_hidden: bool,
        column: Option<usize>,
    ) -> FormulaResult<Vec<FormulaValue>> {
        let sheet = self.resolve_sheet(reference.sheet.as_deref())?;
        let range = reference.range;

        if range.bottom_row >= self.host.row_count(sheet)
            || range.right_col >= self.host.column_count(sheet)
        {
            return Err(FormulaError::IndexOutOfRange(format!(
                "{} is outside the sheet",
                reference
            )));
        }

        let _guard = self.engine.begin_resolve(self.host, sheet, &range)?;

        let mut values = Vec::with_capacity(range.row_span() * range.column_span());
        for row in range.top_row..=range.bottom_row {
            if !include_hidden && self.host.is_row_hidden(sheet, row) {
                continue;
            }
            for col in range.left_col..=range.right_col {
                if column.is_some_and(|c| range.left_col + c != col) {
                    continue;
                }
                if !include_hidden && self.host.is_column_hidden(sheet, col) {
                    continue;
                }
                values.push(
                    self.engine
                        .get_cell_value(self.host, sheet, row, col, false)
                        .into_raw(),
                );
            }
        }
        Ok(values)
    }
}

/// Evaluate an expression
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Unary { op, operand } => evaluate_unary_op(*op, operand, ctx),
        Expr::Binary { op, left, right } => evaluate_binary_op(*op, left, right, ctx),
        Expr::Reference(r) => ctx.reference_value(r),
        Expr::FunctionCall { def, args } => match &def.implementation {
            FunctionImpl::Builtin(f) => f(args, ctx),
            FunctionImpl::Custom(f) => {
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(match ctx.operand(arg)? {
                        Operand::Range(r) => CustomArgument::Range(r.range),
                        Operand::Value(v) => CustomArgument::Value(v),
                    });
                }
                f(&evaluated)
            }
        },
    }
}

fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &Expr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let n = ctx.value(operand)?.to_number();
    if n.is_nan() {
        return Err(FormulaError::BadExpression);
    }

    Ok(FormulaValue::Number(match op {
        UnaryOperator::Plus => n,
        UnaryOperator::Negate => -n,
    }))
}

fn evaluate_binary_op(
    op: BinaryOperator,
    left: &Expr,
    right: &Expr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let left_val = ctx.value(left)?;
    let right_val = ctx.value(right)?;

    if op == BinaryOperator::Concat {
        return Ok(FormulaValue::String(
            left_val.as_string() + &right_val.as_string(),
        ));
    }

    if op.is_comparison() {
        return Ok(FormulaValue::Boolean(compare_op(op, &left_val, &right_val)));
    }

    let l = left_val.to_number();
    let r = right_val.to_number();
    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => l / r,
        BinaryOperator::IntDivide => (l / r).floor(),
        BinaryOperator::Modulo => (l % r).floor(),
        _ => l.powf(r),
    };

    if result.is_nan() {
        return Err(FormulaError::BadExpression);
    }
    Ok(FormulaValue::Number(result))
}

/// Apply a comparison operator
///
/// Operands compare through their numeric difference. When that difference
/// is NaN, `=` and `<>` fall back to case-insensitive text equality and the
/// ordering operators are false.
pub fn compare_op(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> bool {
    let diff = left.to_number() - right.to_number();
    if diff.is_nan() {
        let equal = left.as_string().to_lowercase() == right.as_string().to_lowercase();
        return match op {
            BinaryOperator::Equal => equal,
            BinaryOperator::NotEqual => !equal,
            _ => false,
        };
    }
    match op {
        BinaryOperator::Equal => diff == 0.0,
        BinaryOperator::NotEqual => diff != 0.0,
        BinaryOperator::LessThan => diff < 0.0,
        BinaryOperator::LessEqual => diff <= 0.0,
        BinaryOperator::GreaterThan => diff > 0.0,
        _ => diff >= 0.0,
    }
}

/// Total ordering of two values for lookups and sorting
///
/// Values that both coerce to numbers compare numerically; anything else
/// compares as case-insensitive text.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    let diff = left.to_number() - right.to_number();
    if diff.is_nan() {
        left.as_string()
            .to_lowercase()
            .cmp(&right.as_string().to_lowercase())
    } else {
        diff.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
    }
}
