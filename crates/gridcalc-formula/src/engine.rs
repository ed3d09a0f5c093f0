//! Formula engine facade
//!
//! [`FormulaEngine`] ties the pieces together: it owns the function registry,
//! the symbol table, the parsed-formula cache and the set of cells currently
//! being resolved. One engine serves one host grid and is meant to be used
//! from a single thread.

use crate::cache::FormulaCache;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext};
use crate::functions::{CustomArgument, FunctionDef, FunctionImpl, FunctionRegistry};
use crate::host::GridHost;
use crate::parser::parse_formula;
use crate::settings::EngineSettings;
use crate::token::SymbolTable;
use crate::value::FormulaValue;
use ahash::AHashSet;
use gridcalc_core::{CellRange, CellValue};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Where and how to evaluate a formula
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions<'a> {
    /// Display format applied to primitive results
    pub format: Option<&'a str>,
    /// Sheet for unqualified references; the host's selected sheet if `None`
    pub sheet: Option<usize>,
    /// Row of the calling cell
    pub row: Option<usize>,
    /// Column of the calling cell
    pub col: Option<usize>,
}

impl<'a> EvalOptions<'a> {
    pub fn with_format(mut self, format: &'a str) -> Self {
        self.format = Some(format);
        self
    }

    pub fn on_sheet(mut self, sheet: usize) -> Self {
        self.sheet = Some(sheet);
        self
    }

    /// Evaluate as if the formula lived in this cell
    pub fn at(mut self, row: usize, col: usize) -> Self {
        self.row = Some(row);
        self.col = Some(col);
        self
    }
}

/// Marks a range as being resolved until dropped
pub struct ResolveGuard<'a> {
    in_progress: &'a RefCell<AHashSet<String>>,
    key: String,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.in_progress.borrow_mut().remove(&self.key);
    }
}

/// Spreadsheet formula engine
///
/// # Example
/// ```rust
/// use gridcalc_core::Workbook;
/// use gridcalc_formula::{EvalOptions, FormulaEngine, FormulaValue};
///
/// let mut workbook = Workbook::new();
/// let sheet = workbook.worksheet_mut(0).unwrap();
/// sheet.set_cell_value("A1", 2.0).unwrap();
/// sheet.set_cell_formula("A2", "=A1*21").unwrap();
///
/// let engine = FormulaEngine::new();
/// let value = engine.evaluate(&workbook, "=A2", &EvalOptions::default());
/// assert_eq!(value, FormulaValue::Number(42.0));
/// ```
pub struct FormulaEngine {
    registry: FunctionRegistry,
    symbols: SymbolTable,
    cache: RefCell<FormulaCache>,
    in_progress: RefCell<AHashSet<String>>,
    parse_count: Cell<usize>,
    settings: EngineSettings,
}

impl FormulaEngine {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            registry: FunctionRegistry::new(),
            symbols: SymbolTable::new(),
            cache: RefCell::new(FormulaCache::new(settings.cache_capacity)),
            in_progress: RefCell::new(AHashSet::new()),
            parse_count: Cell::new(0),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    // === Evaluation ===

    /// Evaluate formula text
    ///
    /// Text that does not start with `=` is returned unchanged as a string.
    /// Errors are returned as `"Error: <message>"` strings.
    pub fn evaluate(&self, host: &dyn GridHost, text: &str, opts: &EvalOptions) -> FormulaValue {
        match self.try_evaluate(host, text, opts) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("evaluation of {:?} failed: {}", text, e);
                FormulaValue::String(format!("Error: {}", e))
            }
        }
    }

    /// Evaluate formula text, keeping errors typed
    pub fn try_evaluate(
        &self,
        host: &dyn GridHost,
        text: &str,
        opts: &EvalOptions,
    ) -> FormulaResult<FormulaValue> {
        let Some(body) = text.trim().strip_prefix('=') else {
            return Ok(FormulaValue::String(text.to_string()));
        };

        let sheet = opts.sheet.unwrap_or_else(|| host.selected_sheet());
        let ctx = EvaluationContext::new(self, host, sheet, opts.row, opts.col);

        // The cache borrow must end before parsing or evaluating: both can
        // re-enter the engine through formula cells.
        let cached = if self.settings.cache_enabled {
            self.cache.borrow().get(text)
        } else {
            None
        };
        let expr = match cached {
            Some(expr) => expr,
            None => {
                log::trace!("parsing {:?}", text);
                self.parse_count.set(self.parse_count.get() + 1);
                let expr = Rc::new(parse_formula(
                    body,
                    &self.symbols,
                    &self.registry,
                    Some(&ctx),
                )?);
                if self.settings.cache_enabled {
                    self.cache
                        .borrow_mut()
                        .insert(text.to_string(), Rc::clone(&expr));
                }
                expr
            }
        };

        let value = match evaluate(&expr, &ctx)? {
            FormulaValue::Reference(r) => ctx.reference_value(&r)?,
            value => value,
        };

        match opts.format {
            Some(format) if value.is_primitive() => {
                Ok(FormulaValue::String(host.format_value(&value, format)))
            }
            _ => Ok(value),
        }
    }

    /// Value of one cell; formula cells are evaluated with the cell as caller
    ///
    /// With `formatted` set the result is the display string, using the
    /// cell's format when it has one.
    pub fn get_cell_value(
        &self,
        host: &dyn GridHost,
        sheet: usize,
        row: usize,
        col: usize,
        formatted: bool,
    ) -> FormulaValue {
        let value = match host.cell_content(sheet, row, col) {
            CellValue::Formula(text) => {
                let opts = EvalOptions::default().on_sheet(sheet).at(row, col);
                self.evaluate(host, &text, &opts)
            }
            content => FormulaValue::from(content),
        };

        if !formatted {
            return value;
        }
        match host.cell_format(sheet, row, col) {
            Some(format) => FormulaValue::String(host.format_value(&value, format)),
            None => FormulaValue::String(value.as_string()),
        }
    }

    /// Mark a range as being resolved
    ///
    /// Fails with [`FormulaError::CircularReference`] if the same range on the
    /// same sheet is already being resolved further up the call chain.
    pub fn begin_resolve(
        &self,
        host: &dyn GridHost,
        sheet: usize,
        range: &CellRange,
    ) -> FormulaResult<ResolveGuard<'_>> {
        let key = format!(
            "{}:{},{}-{},{}",
            host.sheet_name(sheet).unwrap_or_default(),
            range.top_row,
            range.left_col,
            range.bottom_row,
            range.right_col
        );

        if !self.in_progress.borrow_mut().insert(key.clone()) {
            return Err(FormulaError::CircularReference);
        }
        Ok(ResolveGuard {
            in_progress: &self.in_progress,
            key,
        })
    }

    // === Extensibility ===

    /// Register a host function, replacing any function with the same name
    ///
    /// Range arguments reach the function as [`CustomArgument::Range`];
    /// everything else is evaluated first.
    pub fn add_custom_function<F>(
        &mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
        f: F,
    ) where
        F: Fn(&[CustomArgument]) -> FormulaResult<FormulaValue> + 'static,
    {
        log::debug!("registering custom function {}", name);
        self.registry.register(FunctionDef {
            name: name.to_string(),
            min_args,
            max_args,
            implementation: FunctionImpl::Custom(Rc::new(f)),
        });
        // Cached trees may hold the previous definition
        self.clear_cache();
    }

    // === Cache ===

    /// Drop every parsed formula, e.g. after rows or columns were inserted
    pub fn clear_cache(&self) {
        log::debug!("clearing formula cache");
        self.cache.borrow_mut().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Number of formulas parsed so far
    pub fn parse_count(&self) -> usize {
        self.parse_count.get()
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new()
    }
}
