//! Formula parser
//!
//! A recursive descent parser over the [`Tokenizer`], holding one token of
//! lookahead. Precedence, loosest first:
//!
//! 1. comparison and `&`
//! 2. `+` `-`
//! 3. `*` `/` `\` `%`
//! 4. `^` (left-associative)
//! 5. leading `+` `-`
//! 6. literals, identifiers, parenthesized groups

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::EvaluationContext;
use crate::expr::{BinaryOperator, CellRangeReference, Expr, UnaryOperator};
use crate::functions::FunctionRegistry;
use crate::token::{SymbolTable, Token, TokenId, TokenType, TokenValue};
use crate::tokenizer::Tokenizer;
use crate::value::FormulaValue;
use gridcalc_core::{CellAddress, CellRange};

/// Parse formula text (without the leading `=`) into an expression tree
///
/// Identifiers that are neither functions nor cell references are offered to
/// the host's unknown-function hook when a context is given; without one
/// they are an error.
///
/// # Example
/// ```rust
/// use gridcalc_formula::functions::FunctionRegistry;
/// use gridcalc_formula::parser::parse_formula;
/// use gridcalc_formula::token::SymbolTable;
///
/// let symbols = SymbolTable::new();
/// let registry = FunctionRegistry::new();
/// let expr = parse_formula("SUM(A1:A10) * 2", &symbols, &registry, None).unwrap();
/// ```
pub fn parse_formula(
    text: &str,
    symbols: &SymbolTable,
    registry: &FunctionRegistry,
    ctx: Option<&EvaluationContext>,
) -> FormulaResult<Expr> {
    let mut parser = FormulaParser::new(text, symbols, registry, ctx)?;
    let expr = parser.parse_compare_or_concat()?;

    if !parser.current.is(TokenId::End) {
        return Err(FormulaError::parse(format!(
            "syntax error near '{}'",
            parser.describe_current()
        )));
    }
    Ok(expr)
}

struct FormulaParser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
    registry: &'a FunctionRegistry,
    ctx: Option<&'a EvaluationContext<'a>>,
}

impl<'a> FormulaParser<'a> {
    fn new(
        text: &str,
        symbols: &'a SymbolTable,
        registry: &'a FunctionRegistry,
        ctx: Option<&'a EvaluationContext<'a>>,
    ) -> FormulaResult<Self> {
        let mut tokenizer = Tokenizer::new(text, symbols);
        let current = tokenizer.next_token()?;
        Ok(Self {
            tokenizer,
            current,
            registry,
            ctx,
        })
    }

    /// Move to the next token, returning the one just consumed
    fn advance(&mut self) -> FormulaResult<Token> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn expect(&mut self, id: TokenId, message: &str) -> FormulaResult<()> {
        if !self.current.is(id) {
            return Err(FormulaError::parse(message));
        }
        self.advance()?;
        Ok(())
    }

    fn describe_current(&self) -> String {
        match &self.current.value {
            TokenValue::Literal(v) => v.as_string(),
            TokenValue::Text(s) if s.is_empty() => self.current.id.symbol().to_string(),
            TokenValue::Text(s) => s.clone(),
        }
    }

    // === Expression parsing with precedence ===

    /// Parse one ladder level: operands from `next`, joined by operators of `kinds`
    fn parse_level(
        &mut self,
        kinds: &[TokenType],
        next: fn(&mut Self) -> FormulaResult<Expr>,
    ) -> FormulaResult<Expr> {
        let mut left = next(self)?;

        while kinds.contains(&self.current.kind) {
            let Some(op) = BinaryOperator::from_token(self.current.id) else {
                break;
            };
            self.advance()?;
            let right = next(self)?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_compare_or_concat(&mut self) -> FormulaResult<Expr> {
        self.parse_level(&[TokenType::Compare, TokenType::Concat], Self::parse_add_sub)
    }

    fn parse_add_sub(&mut self) -> FormulaResult<Expr> {
        self.parse_level(&[TokenType::AddSub], Self::parse_mul_div)
    }

    fn parse_mul_div(&mut self) -> FormulaResult<Expr> {
        self.parse_level(&[TokenType::MulDiv], Self::parse_power)
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        self.parse_level(&[TokenType::Power], Self::parse_unary)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current.id {
            TokenId::Add => UnaryOperator::Plus,
            TokenId::Sub => UnaryOperator::Negate,
            _ => return self.parse_atom(),
        };
        self.advance()?;
        Ok(Expr::unary(op, self.parse_unary()?))
    }

    fn parse_atom(&mut self) -> FormulaResult<Expr> {
        match self.current.kind {
            TokenType::Literal => match self.advance()?.value {
                TokenValue::Literal(v) => Ok(Expr::Literal(v)),
                TokenValue::Text(s) => Ok(Expr::Literal(FormulaValue::String(s))),
            },
            TokenType::Identifier => {
                let name = self.advance()?.text().to_string();
                self.parse_identifier(name)
            }
            _ => match self.current.id {
                TokenId::Open => {
                    self.advance()?;
                    let expr = self.parse_compare_or_concat()?;
                    self.expect(TokenId::Close, "unbalanced parenthesis")?;
                    Ok(expr)
                }
                TokenId::End => Err(FormulaError::parse("unexpected end of formula")),
                _ => Err(FormulaError::parse(format!(
                    "syntax error near '{}'",
                    self.describe_current()
                ))),
            },
        }
    }

    // === Identifiers ===

    /// A function call, a cell reference, or a value from the unknown-function hook
    fn parse_identifier(&mut self, name: String) -> FormulaResult<Expr> {
        if let Some(def) = self.registry.get(&name) {
            let args = self.parse_arguments()?.unwrap_or_default();
            if args.len() < def.min_args {
                return Err(FormulaError::TooFewParameters(def.name.clone()));
            }
            if def.max_args.is_some_and(|max| args.len() > max) {
                return Err(FormulaError::TooManyParameters(def.name.clone()));
            }
            return Ok(Expr::FunctionCall { def, args });
        }

        let args = self.parse_arguments()?;
        if args.is_none() {
            if let Some(reference) = parse_range_reference(&name)? {
                return Ok(Expr::Reference(reference));
            }
        }

        let Some(ctx) = self.ctx else {
            return Err(FormulaError::UnknownFunction(name));
        };

        let values = args
            .unwrap_or_default()
            .iter()
            .map(|arg| ctx.value(arg).map(FormulaValue::into_raw))
            .collect::<FormulaResult<Vec<_>>>()?;
        match ctx.host.unknown_function(&name, &values) {
            Some(value) => {
                log::debug!("unknown function {} supplied by host", name);
                Ok(Expr::Literal(value))
            }
            None => Err(FormulaError::UnknownFunction(name)),
        }
    }

    /// A parenthesized argument list; `None` when no `(` follows
    fn parse_arguments(&mut self) -> FormulaResult<Option<Vec<Expr>>> {
        if !self.current.is(TokenId::Open) {
            return Ok(None);
        }
        self.advance()?;

        let mut args = Vec::new();
        if self.current.is(TokenId::Close) {
            self.advance()?;
            return Ok(Some(args));
        }

        loop {
            args.push(self.parse_compare_or_concat()?);
            match self.current.id {
                TokenId::Comma => {
                    self.advance()?;
                }
                TokenId::Close => {
                    self.advance()?;
                    return Ok(Some(args));
                }
                TokenId::End => return Err(FormulaError::parse("unbalanced parenthesis")),
                _ => {
                    return Err(FormulaError::parse(format!(
                        "syntax error near '{}'",
                        self.describe_current()
                    )))
                }
            }
        }
    }
}

// === Cell references ===

/// Split on `sep` outside of single-quoted sheet names
fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Split `Sheet!A1` into its sheet name and address
fn split_sheet(text: &str) -> FormulaResult<(Option<String>, &str)> {
    let parts = split_unquoted(text, '!');
    let (address, sheet_parts) = match parts.split_last() {
        Some((address, rest)) if !rest.is_empty() => (*address, rest),
        _ => return Ok((None, text)),
    };

    let sheet = text[..text.len() - address.len() - 1].to_string();
    if sheet_parts.len() > 1 || sheet.is_empty() {
        return Err(FormulaError::InvalidReference(text.to_string()));
    }

    let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => sheet,
    };
    Ok((Some(sheet), address))
}

/// Parse `A1`, `$A$1:B2` or `'Sheet 1'!A1:B2`
///
/// Returns `None` when the text is not shaped like a reference at all, and an
/// error when it is but the two sides name different sheets.
fn parse_range_reference(text: &str) -> FormulaResult<Option<CellRangeReference>> {
    let parts = split_unquoted(text, ':');
    if parts.len() > 2 {
        return Ok(None);
    }

    let mut corners = Vec::with_capacity(2);
    for part in &parts {
        let (sheet, address) = split_sheet(part)?;
        match CellAddress::parse(address) {
            Ok(addr) => corners.push((sheet, addr)),
            Err(_) => return Ok(None),
        }
    }

    let (first_sheet, start) = corners.swap_remove(0);
    let (sheet, end) = match corners.pop() {
        None => (first_sheet, start),
        Some((second_sheet, end)) => {
            let sheet = match (first_sheet, second_sheet) {
                (Some(a), Some(b)) if a != b => {
                    return Err(FormulaError::InvalidReference(text.to_string()))
                }
                (Some(a), _) => Some(a),
                (None, b) => b,
            };
            (sheet, end)
        }
    };

    Ok(Some(CellRangeReference::new(
        CellRange::from_addresses(start, end),
        sheet,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::engine::FormulaEngine;
    use gridcalc_core::Workbook;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> FormulaResult<Expr> {
        parse_formula(text, &SymbolTable::new(), &FunctionRegistry::new(), None)
    }

    fn eval(text: &str) -> FormulaValue {
        let wb = Workbook::new();
        let engine = FormulaEngine::new();
        let ctx = EvaluationContext::new(&engine, &wb, 0, None, None);
        evaluate(&parse(text).unwrap(), &ctx).unwrap()
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2+3*4"), FormulaValue::Number(14.0));
        assert_eq!(eval("(2+3)*4"), FormulaValue::Number(20.0));
        assert_eq!(eval("2^3^2"), FormulaValue::Number(64.0));
        assert_eq!(eval("-2^2"), FormulaValue::Number(4.0));
        assert_eq!(eval("1+2&\"x\""), FormulaValue::from("3x"));
        assert_eq!(eval("1+1=2"), FormulaValue::Boolean(true));
        assert_eq!(eval("--3"), FormulaValue::Number(3.0));
    }

    #[test]
    fn test_binary_structure() {
        let expr = parse("1-2-3").unwrap();
        let Expr::Binary { op, left, .. } = expr else {
            panic!("expected binary expression");
        };
        assert_eq!(op, BinaryOperator::Subtract);
        assert!(matches!(*left, Expr::Binary { op: BinaryOperator::Subtract, .. }));
    }

    #[test]
    fn test_function_calls() {
        let Expr::FunctionCall { def, args } = parse("sum(1, 2, A1:B2)").unwrap() else {
            panic!("expected function call");
        };
        assert_eq!(def.name, "SUM");
        assert_eq!(args.len(), 3);

        let Expr::FunctionCall { args, .. } = parse("PI()").unwrap() else {
            panic!("expected function call");
        };
        assert!(args.is_empty());
        assert!(matches!(parse("TRUE").unwrap(), Expr::FunctionCall { .. }));
    }

    #[test]
    fn test_arity() {
        assert_eq!(parse("ABS()").unwrap_err(), FormulaError::TooFewParameters("ABS".into()));
        assert_eq!(
            parse("ABS(1, 2)").unwrap_err(),
            FormulaError::TooManyParameters("ABS".into())
        );
    }

    #[test]
    fn test_references() {
        let Expr::Reference(r) = parse("$B$2:A1").unwrap() else {
            panic!("expected reference");
        };
        assert_eq!(r.range, CellRange::new(0, 0, 1, 1));
        assert_eq!(r.sheet, None);

        let Expr::Reference(r) = parse("'Bob''s Sheet'!C3").unwrap() else {
            panic!("expected reference");
        };
        assert_eq!(r.sheet.as_deref(), Some("Bob's Sheet"));
        assert_eq!(r.range, CellRange::single(2, 2));

        let Expr::Reference(r) = parse("A1:Sheet2!B2").unwrap() else {
            panic!("expected reference");
        };
        assert_eq!(r.sheet.as_deref(), Some("Sheet2"));

        assert!(matches!(
            parse("Sheet1!A1:Sheet2!B2"),
            Err(FormulaError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_unknown_identifiers() {
        assert_eq!(
            parse("FOO(1)").unwrap_err(),
            FormulaError::UnknownFunction("FOO".into())
        );
        assert_eq!(
            parse("A1:B2:C3").unwrap_err(),
            FormulaError::UnknownFunction("A1:B2:C3".into())
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("(1+2").unwrap_err(), FormulaError::parse("unbalanced parenthesis"));
        assert_eq!(parse("SUM(1, 2").unwrap_err(), FormulaError::parse("unbalanced parenthesis"));
        assert_eq!(parse("1+").unwrap_err(), FormulaError::parse("unexpected end of formula"));
        assert_eq!(parse("1 2").unwrap_err(), FormulaError::parse("syntax error near '2'"));
        assert_eq!(parse("1+)").unwrap_err(), FormulaError::parse("syntax error near ')'"));
    }

    #[test]
    fn test_split_sheet() {
        assert_eq!(split_sheet("A1").unwrap(), (None, "A1"));
        assert_eq!(split_sheet("Data!A1").unwrap(), (Some("Data".into()), "A1"));
        assert_eq!(split_sheet("'x!y'!A1").unwrap(), (Some("x!y".into()), "A1"));
    }
}
