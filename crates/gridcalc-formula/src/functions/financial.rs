//! Financial functions

use super::optional;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::FormulaValue;

const MAX_ITERATIONS: usize = 20;
const EPSILON: f64 = 1e-7;
/// Largest residual, relative to the cash flows, accepted at convergence
const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Future value balance of an annuity at rate `r`; zero at the solution
fn annuity_balance(r: f64, nper: f64, pmt: f64, pv: f64, fv: f64, due: f64) -> f64 {
    if r == 0.0 {
        return pv + pmt * nper + fv;
    }
    let growth = (1.0 + r).powf(nper);
    pv * growth + pmt * (1.0 + r * due) * (growth - 1.0) / r + fv
}

/// Future value of one unit paid every period at rate `r`
fn annuity_factor(r: f64, nper: f64, due: f64) -> f64 {
    if r == 0.0 {
        return nper;
    }
    (1.0 + r * due) * ((1.0 + r).powf(nper) - 1.0) / r
}

/// RATE(nper, pmt, pv, [fv], [type], [guess])
///
/// Solved with the secant method starting from `guess` and `guess * 1.1`.
/// The balance is divided by the annuity factor so the solver works in
/// payment units, which keeps long terms from blowing up the search.
/// Stops once successive estimates are within `EPSILON`.
pub fn fn_rate(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let nper = ctx.number(&args[0])?;
    let pmt = ctx.number(&args[1])?;
    let pv = ctx.number(&args[2])?;
    let fv = optional(args, 3, 0.0, ctx, |e, ctx| ctx.number(e))?;
    let due = optional(args, 4, 0.0, ctx, |e, ctx| ctx.number(e))?;
    let guess = optional(args, 5, 0.1, ctx, |e, ctx| ctx.number(e))?;

    let due = if due != 0.0 { 1.0 } else { 0.0 };
    let f = |r: f64| annuity_balance(r, nper, pmt, pv, fv, due) / annuity_factor(r, nper, due);
    let tolerance = RESIDUAL_TOLERANCE * (1.0 + pmt.abs() + pv.abs() + fv.abs());

    let mut r0 = guess;
    let mut r1 = guess * 1.1;
    let mut f0 = f(r0);

    for _ in 0..MAX_ITERATIONS {
        let f1 = f(r1);
        if f1 == 0.0 {
            return Ok(FormulaValue::Number(r1));
        }
        if f1 == f0 || !f1.is_finite() {
            break;
        }

        let next = r1 - f1 * (r1 - r0) / (f1 - f0);
        if (next - r1).abs() < EPSILON {
            if f1.abs() <= tolerance {
                return Ok(FormulaValue::Number(next));
            }
            break;
        }
        r0 = r1;
        f0 = f1;
        r1 = next;
    }

    Err(FormulaError::NoConvergence("RATE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EvalOptions, FormulaEngine};
    use gridcalc_core::Workbook;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let wb = Workbook::new();
        FormulaEngine::new().try_evaluate(&wb, formula, &EvalOptions::default())
    }

    #[test]
    fn test_balance_at_zero_rate() {
        assert_eq!(annuity_balance(0.0, 10.0, -100.0, 1000.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_rate() {
        let rate = eval("=RATE(12, -100, 1000)").unwrap().to_number();
        assert!((rate - 0.029229).abs() < 1e-4, "{}", rate);

        // Monthly rate of a 4 year loan of 8000 paid 200 per month
        let rate = eval("=RATE(48, -200, 8000)").unwrap().to_number();
        assert!((rate - 0.007701).abs() < 1e-4, "{}", rate);
    }

    #[test]
    fn test_rate_long_loans() {
        // 30 year mortgage at 0.5% per month
        let rate = eval("=RATE(360, -599.55, 100000)").unwrap().to_number();
        assert!((rate - 0.005).abs() < 1e-5, "{}", rate);

        let rate = eval("=RATE(360, -6000, 1000000)").unwrap().to_number();
        assert!((rate - 0.005).abs() < 1e-4, "{}", rate);

        // Payments at the start of each period
        let rate = eval("=RATE(360, -596.57, 100000, 0, 1)").unwrap().to_number();
        assert!((rate - 0.005).abs() < 1e-5, "{}", rate);
    }

    #[test]
    fn test_annuity_factor() {
        assert_eq!(annuity_factor(0.0, 12.0, 0.0), 12.0);
        let r = 0.01;
        let balance = annuity_balance(r, 12.0, -1.0, 0.0, 0.0, 0.0);
        assert!((balance + annuity_factor(r, 12.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn test_rate_no_convergence() {
        // Payments can never repay the loan
        assert_eq!(
            eval("=RATE(12, 100, 1000)"),
            Err(FormulaError::NoConvergence("RATE"))
        );
    }
}
