//! Formula expression tree

use crate::functions::FunctionDef;
use crate::token::TokenId;
use crate::value::FormulaValue;
use gridcalc_core::CellRange;
use std::fmt;
use std::rc::Rc;

/// Parsed formula expression
///
/// Trees hold no evaluation state and can be shared between evaluations
/// through the formula cache.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Number, string, date, or a value supplied by the host for an unknown function
    Literal(FormulaValue),

    /// Leading `+` or `-`
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },

    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Cell or range reference, optionally sheet-qualified
    Reference(CellRangeReference),

    /// Call to a registered function; arguments are passed unevaluated
    FunctionCall {
        def: Rc<FunctionDef>,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellRangeReference {
    pub range: CellRange,
    /// Sheet name; `None` means the sheet the formula is evaluated on
    pub sheet: Option<String>,
}

impl CellRangeReference {
    pub fn new(range: CellRange, sheet: Option<String>) -> Self {
        Self { range, sheet }
    }

    /// Same sheet, different range
    pub fn with_range(&self, range: CellRange) -> Self {
        Self {
            range,
            sheet: self.sheet.clone(),
        }
    }
}

impl fmt::Display for CellRangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sheet {
            Some(sheet) if sheet.chars().all(|c| c.is_alphanumeric() || c == '_') => {
                write!(f, "{}!{}", sheet, self.range)
            }
            Some(sheet) => write!(f, "'{}'!{}", sheet.replace('\'', "''"), self.range),
            None => write!(f, "{}", self.range),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    /// `\`
    IntDivide,
    /// `%` between two operands
    Modulo,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    pub fn from_token(id: TokenId) -> Option<Self> {
        Some(match id {
            TokenId::Add => BinaryOperator::Add,
            TokenId::Sub => BinaryOperator::Subtract,
            TokenId::Mul => BinaryOperator::Multiply,
            TokenId::Div => BinaryOperator::Divide,
            TokenId::DivInt => BinaryOperator::IntDivide,
            TokenId::Mod => BinaryOperator::Modulo,
            TokenId::Power => BinaryOperator::Power,
            TokenId::Eq => BinaryOperator::Equal,
            TokenId::Ne => BinaryOperator::NotEqual,
            TokenId::Lt => BinaryOperator::LessThan,
            TokenId::Le => BinaryOperator::LessEqual,
            TokenId::Gt => BinaryOperator::GreaterThan,
            TokenId::Ge => BinaryOperator::GreaterEqual,
            TokenId::Concat => BinaryOperator::Concat,
            _ => return None,
        })
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqual
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Plus,
    Negate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_display() {
        let range = CellRange::parse("A1:B2").unwrap();
        assert_eq!(CellRangeReference::new(range, None).to_string(), "A1:B2");
        assert_eq!(
            CellRangeReference::new(range, Some("Data".into())).to_string(),
            "Data!A1:B2"
        );
        assert_eq!(
            CellRangeReference::new(range, Some("Bob's data".into())).to_string(),
            "'Bob''s data'!A1:B2"
        );
    }

    #[test]
    fn test_operator_from_token() {
        assert_eq!(
            BinaryOperator::from_token(TokenId::DivInt),
            Some(BinaryOperator::IntDivide)
        );
        assert!(BinaryOperator::from_token(TokenId::Le).unwrap().is_comparison());
        assert_eq!(BinaryOperator::from_token(TokenId::Open), None);
    }
}
