//! # gridcalc-formula
//!
//! Spreadsheet formula engine for gridcalc.
//!
//! This crate provides:
//! - Tokenizing and parsing formula text into expression trees
//! - Evaluating trees against a host grid ([`GridHost`])
//! - Built-in functions (aggregate, math, logical, text, date, lookup, financial)
//! - A parsed-formula cache and circular reference detection
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::Workbook;
//! use gridcalc_formula::{EvalOptions, FormulaEngine, FormulaValue};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_cell_value("A1", 10.0).unwrap();
//! sheet.set_cell_value("A2", 32.0).unwrap();
//!
//! let engine = FormulaEngine::new();
//! let opts = EvalOptions::default();
//! assert_eq!(engine.evaluate(&workbook, "=SUM(A1:A2)", &opts), FormulaValue::Number(42.0));
//! assert_eq!(engine.evaluate(&workbook, "hello", &opts), FormulaValue::from("hello"));
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod format;
pub mod functions;
pub mod host;
pub mod parser;
pub mod settings;
pub mod token;
pub mod tokenizer;
pub mod value;

pub use engine::{EvalOptions, FormulaEngine, ResolveGuard};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext};
pub use expr::{BinaryOperator, CellRangeReference, Expr, UnaryOperator};
pub use functions::{CustomArgument, FunctionDef, FunctionRegistry};
pub use host::GridHost;
pub use parser::parse_formula;
pub use settings::EngineSettings;
pub use value::FormulaValue;
