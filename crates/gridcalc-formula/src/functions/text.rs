//! Text functions
//!
//! Positions and lengths count characters, not bytes, and are 1-based.

use super::{optional, wildcard_regex};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::{date_to_serial, parse_date_text, parse_number, FormulaValue};

/// Longest text REPT will build
const MAX_TEXT_LEN: usize = 32_767;

/// A non-negative count argument
fn count_arg(name: &str, n: f64) -> FormulaResult<usize> {
    if n < 0.0 {
        return Err(FormulaError::argument(format!(
            "{} count must not be negative",
            name
        )));
    }
    Ok(n.trunc() as usize)
}

/// A 1-based position argument, returned 0-based
fn position_arg(name: &str, n: f64) -> FormulaResult<usize> {
    if n < 1.0 {
        return Err(FormulaError::argument(format!(
            "{} position must be at least 1",
            name
        )));
    }
    Ok(n.trunc() as usize - 1)
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of the `n`th character, or the end of the string
fn byte_offset(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let n = count_arg("LEFT", optional(args, 1, 1.0, ctx, |e, ctx| ctx.number(e))?)?;
    Ok(FormulaValue::String(text.chars().take(n).collect()))
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let n = count_arg("RIGHT", optional(args, 1, 1.0, ctx, |e, ctx| ctx.number(e))?)?;
    let skip = char_count(&text).saturating_sub(n);
    Ok(FormulaValue::String(text.chars().skip(skip).collect()))
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let start = position_arg("MID", ctx.number(&args[1])?)?;
    let n = count_arg("MID", ctx.number(&args[2])?)?;
    Ok(FormulaValue::String(text.chars().skip(start).take(n).collect()))
}

pub fn fn_len(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(char_count(&ctx.string(&args[0])?) as f64))
}

/// FIND(find_text, within_text, [start_num]) - case-sensitive
pub fn fn_find(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let needle = ctx.string(&args[0])?;
    let haystack = ctx.string(&args[1])?;
    let start = position_arg("FIND", optional(args, 2, 1.0, ctx, |e, ctx| ctx.number(e))?)?;

    let from = byte_offset(&haystack, start);
    haystack[from..]
        .find(&needle)
        .map(|i| FormulaValue::Number((char_count(&haystack[..from + i]) + 1) as f64))
        .ok_or(FormulaError::NotFound(needle))
}

/// SEARCH(find_text, within_text, [start_num]) - case-insensitive, `?`/`*` wildcards
pub fn fn_search(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let needle = ctx.string(&args[0])?;
    let haystack = ctx.string(&args[1])?;
    let start = position_arg("SEARCH", optional(args, 2, 1.0, ctx, |e, ctx| ctx.number(e))?)?;

    // Unanchored version of the wildcard pattern
    let anchored = wildcard_regex(&needle)?;
    let pattern = anchored.as_str().trim_start_matches('^').trim_end_matches('$');
    let re = regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| FormulaError::argument(e.to_string()))?;

    let from = byte_offset(&haystack, start);
    re.find(&haystack[from..])
        .map(|m| FormulaValue::Number((char_count(&haystack[..from + m.start()]) + 1) as f64))
        .ok_or(FormulaError::NotFound(needle))
}

/// REPLACE(old_text, start_num, num_chars, new_text)
pub fn fn_replace(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let start = position_arg("REPLACE", ctx.number(&args[1])?)?;
    let n = count_arg("REPLACE", ctx.number(&args[2])?)?;
    let new_text = ctx.string(&args[3])?;

    let mut result: String = text.chars().take(start).collect();
    result.push_str(&new_text);
    result.extend(text.chars().skip(start.saturating_add(n)));
    Ok(FormulaValue::String(result))
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
pub fn fn_substitute(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let old = ctx.string(&args[1])?;
    let new = ctx.string(&args[2])?;

    if old.is_empty() {
        return Ok(FormulaValue::String(text));
    }

    match args.get(3) {
        None => Ok(FormulaValue::String(text.replace(&old, &new))),
        Some(arg) => {
            let instance = position_arg("SUBSTITUTE", ctx.number(arg)?)?;
            let result = match text.match_indices(&old).nth(instance) {
                Some((i, _)) => format!("{}{}{}", &text[..i], new, &text[i + old.len()..]),
                None => text,
            };
            Ok(FormulaValue::String(result))
        }
    }
}

/// REPT(text, number_times)
pub fn fn_rept(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let n = count_arg("REPT", ctx.number(&args[1])?)?;
    match text.len().checked_mul(n) {
        Some(len) if len <= MAX_TEXT_LEN => Ok(FormulaValue::String(text.repeat(n))),
        _ => Err(FormulaError::argument(format!(
            "REPT result longer than {} characters",
            MAX_TEXT_LEN
        ))),
    }
}

pub fn fn_upper(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(ctx.string(&args[0])?.to_uppercase()))
}

pub fn fn_lower(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::String(ctx.string(&args[0])?.to_lowercase()))
}

/// PROPER(text) - capitalize the first letter of every word
pub fn fn_proper(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    let mut result = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            result.push(c);
            word_start = true;
        }
    }
    Ok(FormulaValue::String(result))
}

/// TRIM(text) - strip both ends and collapse inner runs of spaces
pub fn fn_trim(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let text = ctx.string(&args[0])?;
    Ok(FormulaValue::String(
        lazy_regex::regex!(r" {2,}").replace_all(text.trim(), " ").into_owned(),
    ))
}

pub fn fn_concatenate(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut result = String::new();
    for arg in args {
        result.push_str(&ctx.string(arg)?);
    }
    Ok(FormulaValue::String(result))
}

/// CHAR(number) - character for a code point
pub fn fn_char(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let code = ctx.number(&args[0])?.trunc();
    if code < 1.0 {
        return Err(FormulaError::argument("CHAR code must be at least 1"));
    }
    char::from_u32(code as u32)
        .map(|c| FormulaValue::String(c.to_string()))
        .ok_or_else(|| FormulaError::argument(format!("invalid character code {}", code)))
}

/// CODE(text) - code point of the first character
pub fn fn_code(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ctx.string(&args[0])?
        .chars()
        .next()
        .map(|c| FormulaValue::Number(c as u32 as f64))
        .ok_or_else(|| FormulaError::argument("CODE needs a non-empty text"))
}

/// TEXT(value, format) - format through the host formatter
pub fn fn_text(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = ctx.value(&args[0])?.into_raw();
    let format = ctx.string(&args[1])?;
    Ok(FormulaValue::String(ctx.host.format_value(&value, &format)))
}

/// VALUE(text) - numeric or date text to a number
pub fn fn_value(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let value = ctx.value(&args[0])?;
    if let FormulaValue::String(s) = value.raw() {
        let s = s.trim();
        return parse_number(s)
            .or_else(|| parse_date_text(s).map(|d| date_to_serial(&d)))
            .map(FormulaValue::Number)
            .ok_or_else(|| FormulaError::argument(format!("'{}' is not a number", s)));
    }
    Ok(FormulaValue::Number(value.expect_number()?))
}

/// T(value) - the value if it is text, otherwise ""
pub fn fn_t(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match ctx.value(&args[0])?.into_raw() {
        FormulaValue::String(s) => FormulaValue::String(s),
        _ => FormulaValue::String(String::new()),
    })
}

/// EXACT(text1, text2) - case-sensitive comparison
pub fn fn_exact(args: &[Expr], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(
        ctx.string(&args[0])? == ctx.string(&args[1])?,
    ))
}

#[cfg(test)]
mod tests {
    use crate::engine::{EvalOptions, FormulaEngine};
    use crate::error::{FormulaError, FormulaResult};
    use crate::value::FormulaValue;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let wb = Workbook::new();
        FormulaEngine::new().try_evaluate(&wb, formula, &EvalOptions::default())
    }

    fn text(formula: &str) -> String {
        eval(formula).unwrap().as_string()
    }

    #[test]
    fn test_slicing() {
        assert_eq!(text("=LEFT(\"spreadsheet\", 6)"), "spread");
        assert_eq!(text("=LEFT(\"abc\")"), "a");
        assert_eq!(text("=RIGHT(\"spreadsheet\", 5)"), "sheet");
        assert_eq!(text("=RIGHT(\"ab\", 5)"), "ab");
        assert_eq!(text("=MID(\"spreadsheet\", 3, 4)"), "read");
        assert_eq!(text("=LEN(\"héllo\")"), "5");
        assert!(eval("=MID(\"abc\", 0, 1)").is_err());
    }

    #[test]
    fn test_find_and_search() {
        assert_eq!(text("=FIND(\"s\", \"Mississippi\")"), "3");
        assert_eq!(text("=FIND(\"s\", \"Mississippi\", 5)"), "6");
        assert!(matches!(
            eval("=FIND(\"S\", \"Mississippi\")"),
            Err(FormulaError::NotFound(_))
        ));
        assert_eq!(text("=SEARCH(\"S\", \"Mississippi\")"), "3");
        assert_eq!(text("=SEARCH(\"p?i\", \"Mississippi\")"), "9");
        assert_eq!(text("=SEARCH(\"s*p\", \"Mississippi\")"), "3");
    }

    #[test]
    fn test_replace_substitute() {
        assert_eq!(text("=REPLACE(\"abcdef\", 3, 2, \"XY\")"), "abXYef");
        assert_eq!(text("=SUBSTITUTE(\"a-b-c\", \"-\", \"+\")"), "a+b+c");
        assert_eq!(text("=SUBSTITUTE(\"a-b-c\", \"-\", \"+\", 2)"), "a-b+c");
        assert_eq!(text("=REPT(\"ab\", 3)"), "ababab");
    }

    #[test]
    fn test_huge_counts() {
        assert_eq!(text("=REPLACE(\"abc\", 1E30, 1E30, \"x\")"), "abcx");
        assert_eq!(text("=REPLACE(\"abc\", 2, 1E30, \"x\")"), "ax");
        assert_eq!(text("=MID(\"abc\", 2, 1E30)"), "bc");
        assert_eq!(text("=REPT(\"\", 1E15)"), "");
        assert!(matches!(eval("=REPT(\"ab\", 1E15)"), Err(FormulaError::Argument(_))));
        assert!(matches!(eval("=REPT(\"ab\", 1E30)"), Err(FormulaError::Argument(_))));
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(text("=UPPER(\"abc\")"), "ABC");
        assert_eq!(text("=LOWER(\"ABC\")"), "abc");
        assert_eq!(text("=PROPER(\"hello wORLD-wide\")"), "Hello World-Wide");
        assert_eq!(text("=TRIM(\"  a   b  \")"), "a b");
        assert_eq!(text("=CONCATENATE(\"a\", 1, TRUE)"), "a1TRUE");
    }

    #[test]
    fn test_codes_and_conversions() {
        assert_eq!(text("=CHAR(65)"), "A");
        assert_eq!(text("=CODE(\"a\")"), "97");
        assert_eq!(eval("=VALUE(\"12.5\")").unwrap(), FormulaValue::Number(12.5));
        assert_eq!(eval("=VALUE(\"2020-01-01\")").unwrap(), FormulaValue::Number(43831.0));
        assert_eq!(text("=T(12)"), "");
        assert_eq!(text("=T(\"x\")"), "x");
        assert_eq!(eval("=EXACT(\"a\", \"A\")").unwrap(), FormulaValue::Boolean(false));
    }

    #[test]
    fn test_text_uses_formatter() {
        assert_eq!(text("=TEXT(1234.5, \"n2\")"), "1,234.50");
        assert_eq!(text("=TEXT(DATE(2020, 3, 1), \"d\")"), "3/1/2020");
    }
}
