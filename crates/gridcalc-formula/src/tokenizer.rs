//! Formula tokenizer
//!
//! Turns formula text (without the leading `=`) into a stream of [`Token`]s.
//! The only state between calls is the cursor.

use crate::error::{FormulaError, FormulaResult};
use crate::token::{SymbolTable, Token};
use crate::value::{parse_date_text, FormulaValue};

/// Characters that may appear anywhere in an identifier besides letters, digits and `_`
const ID_CHARS: [char; 3] = ['$', ':', '!'];

pub struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    symbols: &'a SymbolTable,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &str, symbols: &'a SymbolTable) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            symbols,
        }
    }

    /// Produce the next token and advance the cursor
    pub fn next_token(&mut self) -> FormulaResult<Token> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }

        let Some(c) = self.peek() else {
            return Ok(Token::end());
        };

        // Operators and punctuation; two-character operators merge with the next char
        let mut buf = [0u8; 4];
        if let Some(token) = self.symbols.get(c.encode_utf8(&mut buf)) {
            if let Some(next) = self.peek_at(1) {
                let pair: String = [c, next].iter().collect();
                if let Some(token) = self.symbols.get(&pair) {
                    self.pos += 2;
                    return Ok(token);
                }
            }
            self.pos += 1;
            return Ok(token);
        }

        if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()))
        {
            return Ok(self.scan_number());
        }

        match c {
            '"' => self.scan_string(),
            '#' => self.scan_date(),
            '\'' => {
                let prefix = self.scan_sheet_prefix()?;
                self.scan_identifier(prefix)
            }
            c if is_identifier_start(c) => self.scan_identifier(String::new()),
            _ => Err(FormulaError::parse("identifier expected")),
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        let mut mantissa = 0.0_f64;
        let mut frac_digits = 0_i32;
        let mut seen_dot = false;
        let mut scientific = false;

        while let Some(c) = self.peek() {
            if let Some(d) = c.to_digit(10) {
                mantissa = mantissa * 10.0 + d as f64;
                if seen_dot {
                    frac_digits += 1;
                }
            } else if c == '.' && !seen_dot {
                seen_dot = true;
            } else if (c == 'e' || c == 'E') && self.exponent_follows() {
                scientific = true;
                self.pos += 1;
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.pos += 1;
                }
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                break;
            } else {
                break;
            }
            self.pos += 1;
        }

        let mut value = if scientific {
            let text: String = self.chars[start..self.pos].iter().collect();
            text.parse::<f64>().unwrap_or(f64::NAN)
        } else {
            mantissa / 10_f64.powi(frac_digits)
        };

        if self.peek() == Some('%') {
            self.pos += 1;
            value /= 100.0;
        }

        Token::literal(FormulaValue::Number(value))
    }

    fn exponent_follows(&self) -> bool {
        match self.peek_at(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('+') | Some('-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        }
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        self.pos += 1;
        let mut s = String::new();

        loop {
            match self.peek() {
                None => return Err(FormulaError::parse("unterminated string")),
                Some('"') if self.peek_at(1) == Some('"') => {
                    s.push('"');
                    self.pos += 2;
                }
                Some('"') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }

        if self.peek() == Some('!') {
            return Err(FormulaError::parse("illegal cross sheet reference"));
        }

        Ok(Token::literal(FormulaValue::String(s)))
    }

    fn scan_date(&mut self) -> FormulaResult<Token> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '#') {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(FormulaError::parse("unterminated date"));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;

        parse_date_text(&text)
            .map(|d| Token::literal(FormulaValue::Date(d)))
            .ok_or_else(|| FormulaError::parse(format!("invalid date literal #{}#", text)))
    }

    /// Scan `'Sheet Name'!` and return it in canonical quoted form, `!` included
    fn scan_sheet_prefix(&mut self) -> FormulaResult<String> {
        self.pos += 1;
        let mut name = String::new();

        loop {
            match self.peek() {
                None => return Err(FormulaError::parse("unterminated sheet name")),
                Some('\'') if self.peek_at(1) == Some('\'') => {
                    name.push('\'');
                    self.pos += 2;
                }
                Some('\'') => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.pos += 1;
                }
            }
        }

        if self.peek() != Some('!') {
            return Err(FormulaError::parse(format!(
                "invalid sheet reference '{}'",
                name
            )));
        }
        self.pos += 1;

        Ok(format!("'{}'!", name.replace('\'', "''")))
    }

    fn scan_identifier(&mut self, mut ident: String) -> FormulaResult<Token> {
        while let Some(c) = self.peek() {
            if is_identifier_char(c) {
                ident.push(c);
                self.pos += 1;
            } else if c == '\'' {
                // e.g. A1:'Sheet 2'!B2
                let prefix = self.scan_sheet_prefix()?;
                ident.push_str(&prefix);
            } else {
                break;
            }
        }

        if ident.is_empty() {
            return Err(FormulaError::parse("identifier expected"));
        }
        Ok(Token::identifier(ident))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || ID_CHARS.contains(&c) || is_cjk(c)
}

fn is_identifier_char(c: char) -> bool {
    is_identifier_start(c) || c.is_alphanumeric()
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{30ff}'   // kana
        | '\u{3400}'..='\u{4dbf}' // CJK extension A
        | '\u{4e00}'..='\u{9fff}' // CJK unified ideographs
        | '\u{ac00}'..='\u{d7af}' // hangul
        | '\u{f900}'..='\u{faff}')
}
