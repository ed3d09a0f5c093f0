//! Token types and the operator symbol table

use crate::value::FormulaValue;
use ahash::AHashMap;

/// Token type; decides which level of the precedence ladder binds the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Compare,
    AddSub,
    MulDiv,
    Power,
    Concat,
    Group,
    Literal,
    Identifier,
}

/// Token identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenId {
    // Comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    // Text
    Concat,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    /// `\` - floored division
    DivInt,
    /// `%` between operands - floored remainder
    Mod,
    Power,
    // Grouping
    Open,
    Close,
    Comma,
    End,
    /// Literal or identifier
    Atom,
}

impl TokenId {
    /// Operator text for diagnostics
    pub fn symbol(&self) -> &'static str {
        match self {
            TokenId::Eq => "=",
            TokenId::Ne => "<>",
            TokenId::Gt => ">",
            TokenId::Ge => ">=",
            TokenId::Lt => "<",
            TokenId::Le => "<=",
            TokenId::Concat => "&",
            TokenId::Add => "+",
            TokenId::Sub => "-",
            TokenId::Mul => "*",
            TokenId::Div => "/",
            TokenId::DivInt => "\\",
            TokenId::Mod => "%",
            TokenId::Power => "^",
            TokenId::Open => "(",
            TokenId::Close => ")",
            TokenId::Comma => ",",
            TokenId::End => "end of formula",
            TokenId::Atom => "atom",
        }
    }
}

/// Payload carried by a token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    /// Number, string or date literal
    Literal(FormulaValue),
    /// Operator symbol or identifier text
    Text(String),
}

/// A lexical token; immutable once created
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: TokenValue,
    pub id: TokenId,
    pub kind: TokenType,
}

impl Token {
    pub fn literal(value: FormulaValue) -> Self {
        Self {
            value: TokenValue::Literal(value),
            id: TokenId::Atom,
            kind: TokenType::Literal,
        }
    }

    pub fn identifier(text: String) -> Self {
        Self {
            value: TokenValue::Text(text),
            id: TokenId::Atom,
            kind: TokenType::Identifier,
        }
    }

    pub fn end() -> Self {
        Self {
            value: TokenValue::Text(String::new()),
            id: TokenId::End,
            kind: TokenType::Group,
        }
    }

    pub fn is(&self, id: TokenId) -> bool {
        self.id == id
    }

    /// Identifier or operator text; empty for literals
    pub fn text(&self) -> &str {
        match &self.value {
            TokenValue::Text(s) => s,
            TokenValue::Literal(_) => "",
        }
    }
}

/// Operator and punctuation lookup, built once per engine
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: AHashMap<&'static str, (TokenId, TokenType)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let entries = [
            ("&", TokenId::Concat, TokenType::Concat),
            ("=", TokenId::Eq, TokenType::Compare),
            ("<>", TokenId::Ne, TokenType::Compare),
            (">", TokenId::Gt, TokenType::Compare),
            (">=", TokenId::Ge, TokenType::Compare),
            ("<", TokenId::Lt, TokenType::Compare),
            ("<=", TokenId::Le, TokenType::Compare),
            ("+", TokenId::Add, TokenType::AddSub),
            ("-", TokenId::Sub, TokenType::AddSub),
            ("*", TokenId::Mul, TokenType::MulDiv),
            ("/", TokenId::Div, TokenType::MulDiv),
            ("\\", TokenId::DivInt, TokenType::MulDiv),
            ("%", TokenId::Mod, TokenType::MulDiv),
            ("^", TokenId::Power, TokenType::Power),
            ("(", TokenId::Open, TokenType::Group),
            (")", TokenId::Close, TokenType::Group),
            (",", TokenId::Comma, TokenType::Group),
        ];

        Self {
            symbols: entries
                .into_iter()
                .map(|(symbol, id, kind)| (symbol, (id, kind)))
                .collect(),
        }
    }

    /// Look up an operator token by its text
    pub fn get(&self, symbol: &str) -> Option<Token> {
        self.symbols.get(symbol).map(|&(id, kind)| Token {
            value: TokenValue::Text(symbol.to_string()),
            id,
            kind,
        })
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        let table = SymbolTable::new();
        let tk = table.get("<>").unwrap();
        assert_eq!(tk.id, TokenId::Ne);
        assert_eq!(tk.kind, TokenType::Compare);
        assert_eq!(table.get("\\").unwrap().kind, TokenType::MulDiv);
        assert!(table.get("!").is_none());
    }
}
