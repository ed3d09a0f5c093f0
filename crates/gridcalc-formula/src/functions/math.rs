//! Math functions

use super::optional;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::FormulaValue;
use rand::Rng;

/// Reject NaN and infinite results
fn finite(name: &str, n: f64) -> FormulaResult<FormulaValue> {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Err(FormulaError::argument(format!(
            "{} is undefined for the given arguments",
            name
        )))
    }
}

fn unary(
    name: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
    f: impl FnOnce(f64) -> f64,
) -> FormulaResult<FormulaValue> {
    finite(name, f(ctx.number(&args[0])?))
}

pub fn fn_abs(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("ABS", args, ctx, f64::abs)
}

pub fn fn_acos(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("ACOS", args, ctx, f64::acos)
}

pub fn fn_asin(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("ASIN", args, ctx, f64::asin)
}

pub fn fn_atan(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("ATAN", args, ctx, f64::atan)
}

/// ATAN2(x, y) - angle of the point (x, y), argument order as in spreadsheets
pub fn fn_atan2(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let x = ctx.number(&args[0])?;
    let y = ctx.number(&args[1])?;
    if x == 0.0 && y == 0.0 {
        return Err(FormulaError::DivideByZero);
    }
    finite("ATAN2", y.atan2(x))
}

pub fn fn_cos(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("COS", args, ctx, f64::cos)
}

pub fn fn_sin(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("SIN", args, ctx, f64::sin)
}

pub fn fn_tan(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("TAN", args, ctx, f64::tan)
}

pub fn fn_exp(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("EXP", args, ctx, f64::exp)
}

pub fn fn_ln(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("LN", args, ctx, f64::ln)
}

/// LOG(number, [base]) - base defaults to 10
pub fn fn_log(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = ctx.number(&args[0])?;
    let base = optional(args, 1, 10.0, ctx, |e, ctx| ctx.number(e))?;
    let result = if base == 10.0 {
        n.log10()
    } else if base == 2.0 {
        n.log2()
    } else {
        n.log(base)
    };
    finite("LOG", result)
}

pub fn fn_log10(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("LOG10", args, ctx, f64::log10)
}

pub fn fn_sqrt(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("SQRT", args, ctx, f64::sqrt)
}

/// FLOOR(number, [significance]) - round down to a multiple of significance
pub fn fn_floor(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = ctx.number(&args[0])?;
    let sig = optional(args, 1, 1.0, ctx, |e, ctx| ctx.number(e))?;
    if sig == 0.0 {
        return Ok(FormulaValue::Number(0.0));
    }
    finite("FLOOR", (n / sig).floor() * sig)
}

/// CEILING(number, [significance]) - round up to a multiple of significance
pub fn fn_ceiling(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = ctx.number(&args[0])?;
    let sig = optional(args, 1, 1.0, ctx, |e, ctx| ctx.number(e))?;
    if sig == 0.0 {
        return Ok(FormulaValue::Number(0.0));
    }
    finite("CEILING", (n / sig).ceil() * sig)
}

pub fn fn_int(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    unary("INT", args, ctx, f64::floor)
}

/// MOD(number, divisor) - the result has the sign of the divisor
pub fn fn_mod(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = ctx.number(&args[0])?;
    let d = ctx.number(&args[1])?;
    if d == 0.0 {
        return Err(FormulaError::DivideByZero);
    }
    finite("MOD", n - d * (n / d).floor())
}

pub fn fn_pi(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

pub fn fn_power(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let base = ctx.number(&args[0])?;
    let exp = ctx.number(&args[1])?;
    finite("POWER", base.powf(exp))
}

pub fn fn_sign(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let n = ctx.number(&args[0])?;
    Ok(FormulaValue::Number(if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    }))
}

/// RAND() - a random number in [0, 1)
pub fn fn_rand(_args: &[Expr], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen::<f64>()))
}

/// RANDBETWEEN(bottom, top) - a random integer between bottom and top (inclusive)
pub fn fn_randbetween(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let bottom = ctx.number(&args[0])?.ceil() as i64;
    let top = ctx.number(&args[1])?.floor() as i64;
    if bottom > top {
        return Err(FormulaError::argument(format!(
            "RANDBETWEEN bottom {} is greater than top {}",
            bottom, top
        )));
    }

    let mut rng = rand::thread_rng();
    Ok(FormulaValue::Number(rng.gen_range(bottom..=top) as f64))
}

/// Optional digit count, limited to the range an `f64` can shift through
fn digits_arg(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<i32> {
    let digits = optional(args, 1, 0.0, ctx, |e, ctx| ctx.number(e))?.trunc();
    Ok(digits.clamp(-MAX_SHIFT, MAX_SHIFT) as i32)
}

const MAX_SHIFT: f64 = 308.0;

/// Move the decimal point `digits` places to the right
fn shift(n: f64, digits: i32) -> f64 {
    if digits >= 0 {
        n * 10_f64.powi(digits)
    } else {
        n / 10_f64.powi(-digits)
    }
}

#[derive(Clone, Copy)]
enum Rounding {
    Nearest,
    Up,
    Down,
}

/// Shared body of ROUND, ROUNDUP and ROUNDDOWN
///
/// The result carries a `n{digits}` display format.
fn round_with(
    name: &str,
    args: &[Expr],
    ctx: &EvaluationContext,
    mode: Rounding,
) -> FormulaResult<FormulaValue> {
    let number = ctx.number(&args[0])?;
    let digits = digits_arg(args, ctx)?;
    let scaled = shift(number, digits);
    if !scaled.is_finite() {
        // Too many digits to change anything
        return Ok(FormulaValue::formatted(finite(name, number)?, format!("n{}", digits.max(0))));
    }

    // Up rounds away from zero, down toward zero, nearest rounds half away from zero
    let rounded = match mode {
        Rounding::Nearest => scaled.round(),
        Rounding::Up => {
            if scaled >= 0.0 {
                scaled.ceil()
            } else {
                scaled.floor()
            }
        }
        Rounding::Down => scaled.trunc(),
    };

    let value = finite(name, shift(rounded, -digits))?;
    let format = if digits > 0 {
        format!("n{}", digits)
    } else {
        "n0".to_string()
    };
    Ok(FormulaValue::formatted(value, format))
}

/// ROUND(number, [num_digits])
pub fn fn_round(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with("ROUND", args, ctx, Rounding::Nearest)
}

/// ROUNDUP(number, [num_digits])
pub fn fn_roundup(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with("ROUNDUP", args, ctx, Rounding::Up)
}

/// ROUNDDOWN(number, [num_digits])
pub fn fn_rounddown(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    round_with("ROUNDDOWN", args, ctx, Rounding::Down)
}

/// TRUNC(number, [num_digits]) - truncate toward zero
pub fn fn_trunc(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let number = ctx.number(&args[0])?;
    let digits = digits_arg(args, ctx)?;
    let scaled = shift(number, digits);
    if !scaled.is_finite() {
        return finite("TRUNC", number);
    }
    finite("TRUNC", shift(scaled.trunc(), -digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EvalOptions, FormulaEngine};
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let wb = Workbook::new();
        FormulaEngine::new().try_evaluate(&wb, formula, &EvalOptions::default())
    }

    fn number(formula: &str) -> f64 {
        eval(formula).unwrap().to_number()
    }

    #[test]
    fn test_basic_math() {
        assert_eq!(number("=ABS(-3)"), 3.0);
        assert_eq!(number("=INT(-2.5)"), -3.0);
        assert_eq!(number("=SIGN(-0.1)"), -1.0);
        assert_eq!(number("=POWER(2, 8)"), 256.0);
        assert_eq!(number("=SQRT(16)"), 4.0);
        assert_eq!(number("=LOG(1000)"), 3.0);
        assert_eq!(number("=LOG(8, 2)"), 3.0);
        assert!((number("=PI()") - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn test_mod_sign_follows_divisor() {
        assert_eq!(number("=MOD(5, 3)"), 2.0);
        assert_eq!(number("=MOD(-5, 3)"), 1.0);
        assert_eq!(number("=MOD(5, -3)"), -1.0);
        assert_eq!(eval("=MOD(5, 0)"), Err(FormulaError::DivideByZero));
    }

    #[test]
    fn test_floor_ceiling() {
        assert_eq!(number("=FLOOR(7.9)"), 7.0);
        assert_eq!(number("=FLOOR(23, 5)"), 20.0);
        assert_eq!(number("=CEILING(21, 5)"), 25.0);
    }

    #[test]
    fn test_rounding_attaches_format() {
        assert_eq!(
            eval("=ROUND(3.14159, 2)").unwrap(),
            FormulaValue::formatted(FormulaValue::Number(3.14), "n2")
        );
        assert_eq!(
            eval("=ROUND(2.5)").unwrap(),
            FormulaValue::formatted(FormulaValue::Number(3.0), "n0")
        );
        assert_eq!(number("=ROUNDUP(-2.1)"), -3.0);
        assert_eq!(number("=ROUNDDOWN(2.99, 1)"), 2.9);
        assert_eq!(number("=ROUND(1234, -2)"), 1200.0);
        assert_eq!(number("=TRUNC(-8.97, 1)"), -8.9);
        assert_eq!(number("=ROUND(2.5, 1E30)"), 2.5);
        assert_eq!(number("=ROUND(2.5, -1E30)"), 0.0);
        assert_eq!(number("=TRUNC(1E300, 100)"), 1e300);
    }

    #[test]
    fn test_domain_errors() {
        assert!(eval("=SQRT(-1)").is_err());
        assert!(eval("=LN(0)").is_err());
        assert!(eval("=ACOS(2)").is_err());
    }

    #[test]
    fn test_random() {
        for _ in 0..20 {
            let r = number("=RAND()");
            assert!((0.0..1.0).contains(&r));
            let r = number("=RANDBETWEEN(1, 3)");
            assert!([1.0, 2.0, 3.0].contains(&r));
        }
        assert!(eval("=RANDBETWEEN(5, 1)").is_err());
    }
}
