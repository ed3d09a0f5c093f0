//! Logical functions

use crate::error::FormulaResult;
use crate::evaluator::{evaluate, EvaluationContext, Operand};
use crate::expr::Expr;
use crate::value::FormulaValue;

/// Truth values of one argument; a range contributes every non-empty cell
fn truths(arg: &Expr, ctx: &EvaluationContext) -> FormulaResult<Vec<bool>> {
    match ctx.operand(arg)? {
        Operand::Range(r) => ctx
            .range_values(&r, true, None)?
            .iter()
            .filter(|v| !v.is_blank())
            .map(FormulaValue::to_boolean)
            .collect(),
        Operand::Value(v) => Ok(vec![v.to_boolean()?]),
    }
}

/// AND(logical1, ...) - stops at the first false argument
pub fn fn_and(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for arg in args {
        if truths(arg, ctx)?.contains(&false) {
            return Ok(FormulaValue::Boolean(false));
        }
    }
    Ok(FormulaValue::Boolean(true))
}

/// OR(logical1, ...) - stops at the first true argument
pub fn fn_or(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    for arg in args {
        if truths(arg, ctx)?.contains(&true) {
            return Ok(FormulaValue::Boolean(true));
        }
    }
    Ok(FormulaValue::Boolean(false))
}

/// IF(condition, [value_if_true], [value_if_false])
///
/// Only the selected branch is evaluated. A missing branch yields the
/// condition's boolean.
pub fn fn_if(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let condition = ctx.boolean(&args[0])?;
    let branch = if condition { args.get(1) } else { args.get(2) };
    match branch {
        Some(expr) => evaluate(expr, ctx),
        None => Ok(FormulaValue::Boolean(condition)),
    }
}

pub fn fn_not(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(!ctx.boolean(&args[0])?))
}

pub fn fn_true(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

pub fn fn_false(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}

#[cfg(test)]
mod tests {
    use crate::engine::{EvalOptions, FormulaEngine};
    use crate::error::FormulaResult;
    use crate::value::FormulaValue;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let wb = Workbook::new();
        FormulaEngine::new().try_evaluate(&wb, formula, &EvalOptions::default())
    }

    #[test]
    fn test_and_or_not() {
        assert_eq!(eval("=AND(TRUE, 1, \"true\")").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE, FALSE)").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE, 0, 2)").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=NOT(1=1)").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=TRUE").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=FALSE()").unwrap(), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_short_circuit() {
        // The second argument would fail if evaluated
        assert_eq!(eval("=AND(FALSE, 0/0)").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(TRUE, 0/0)").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=IF(1>0, \"yes\", 0/0)").unwrap(), FormulaValue::from("yes"));
        assert_eq!(eval("=IF(0, 0/0, \"no\")").unwrap(), FormulaValue::from("no"));
        assert!(eval("=AND(TRUE, 0/0)").is_err());
    }

    #[test]
    fn test_if_without_branches() {
        assert_eq!(eval("=IF(2>1)").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=IF(2<1, 5)").unwrap(), FormulaValue::Boolean(false));
    }
}
