//! Built-in spreadsheet functions
//!
//! Every built-in receives its argument expressions unevaluated and decides
//! what to evaluate, which is how `IF`, `AND`, `OR` and `CHOOSE` avoid
//! evaluating branches they do not need.

pub mod aggregate;
pub mod criteria;
pub mod date;
pub mod financial;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod text;

use crate::error::FormulaResult;
use crate::evaluator::EvaluationContext;
use crate::expr::Expr;
use crate::value::FormulaValue;
use ahash::AHashMap;
use gridcalc_core::CellRange;
use std::fmt;
use std::rc::Rc;

/// Built-in function signature
pub type BuiltinFn = fn(&[Expr], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// Host-supplied function; receives evaluated arguments
pub type CustomFn = Rc<dyn Fn(&[CustomArgument]) -> FormulaResult<FormulaValue>>;

/// Argument handed to a custom function
#[derive(Debug, Clone, PartialEq)]
pub enum CustomArgument {
    Value(FormulaValue),
    /// Range arguments are passed as the range itself, not its values
    Range(CellRange),
}

/// Function implementation
#[derive(Clone)]
pub enum FunctionImpl {
    Builtin(BuiltinFn),
    Custom(CustomFn),
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: String,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

/// Function registry, keyed by uppercase name
pub struct FunctionRegistry {
    functions: AHashMap<String, Rc<FunctionDef>>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_aggregate_functions();
        registry.register_criteria_functions();
        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_date_functions();
        registry.register_lookup_functions();
        registry.register_financial_functions();

        registry
    }

    /// Look up a function by name, ignoring case
    pub fn get(&self, name: &str) -> Option<Rc<FunctionDef>> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    /// Register a function, replacing any existing one with the same name
    pub fn register(&mut self, mut def: FunctionDef) {
        def.name = def.name.to_uppercase();
        self.functions.insert(def.name.clone(), Rc::new(def));
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn builtin(&mut self, name: &str, min_args: usize, max_args: Option<usize>, f: BuiltinFn) {
        self.register(FunctionDef {
            name: name.to_string(),
            min_args,
            max_args,
            implementation: FunctionImpl::Builtin(f),
        });
    }

    fn register_aggregate_functions(&mut self) {
        self.builtin("SUM", 1, None, aggregate::fn_sum);
        self.builtin("AVERAGE", 1, None, aggregate::fn_average);
        self.builtin("MAX", 1, None, aggregate::fn_max);
        self.builtin("MIN", 1, None, aggregate::fn_min);
        self.builtin("VAR", 1, None, aggregate::fn_var);
        self.builtin("VARP", 1, None, aggregate::fn_varp);
        self.builtin("STDEV", 1, None, aggregate::fn_stdev);
        self.builtin("STDEVP", 1, None, aggregate::fn_stdevp);
        self.builtin("COUNT", 1, None, aggregate::fn_count);
        self.builtin("COUNTA", 1, None, aggregate::fn_counta);
        self.builtin("COUNTBLANK", 1, None, aggregate::fn_countblank);
        self.builtin("PRODUCT", 1, None, aggregate::fn_product);
        self.builtin("SUMPRODUCT", 1, None, aggregate::fn_sumproduct);
        self.builtin("RANK", 2, Some(3), aggregate::fn_rank);
        self.builtin("SUBTOTAL", 2, None, aggregate::fn_subtotal);
    }

    fn register_criteria_functions(&mut self) {
        self.builtin("COUNTIF", 2, Some(2), criteria::fn_countif);
        self.builtin("COUNTIFS", 2, None, criteria::fn_countifs);
        self.builtin("SUMIF", 2, Some(3), criteria::fn_sumif);
        self.builtin("SUMIFS", 3, None, criteria::fn_sumifs);
    }

    fn register_math_functions(&mut self) {
        self.builtin("ABS", 1, Some(1), math::fn_abs);
        self.builtin("ACOS", 1, Some(1), math::fn_acos);
        self.builtin("ASIN", 1, Some(1), math::fn_asin);
        self.builtin("ATAN", 1, Some(1), math::fn_atan);
        self.builtin("ATAN2", 2, Some(2), math::fn_atan2);
        self.builtin("COS", 1, Some(1), math::fn_cos);
        self.builtin("SIN", 1, Some(1), math::fn_sin);
        self.builtin("TAN", 1, Some(1), math::fn_tan);
        self.builtin("EXP", 1, Some(1), math::fn_exp);
        self.builtin("LN", 1, Some(1), math::fn_ln);
        self.builtin("LOG", 1, Some(2), math::fn_log);
        self.builtin("LOG10", 1, Some(1), math::fn_log10);
        self.builtin("SQRT", 1, Some(1), math::fn_sqrt);
        self.builtin("FLOOR", 1, Some(2), math::fn_floor);
        self.builtin("CEILING", 1, Some(2), math::fn_ceiling);
        self.builtin("INT", 1, Some(1), math::fn_int);
        self.builtin("MOD", 2, Some(2), math::fn_mod);
        self.builtin("PI", 0, Some(0), math::fn_pi);
        self.builtin("POWER", 2, Some(2), math::fn_power);
        self.builtin("SIGN", 1, Some(1), math::fn_sign);
        self.builtin("RAND", 0, Some(0), math::fn_rand);
        self.builtin("RANDBETWEEN", 2, Some(2), math::fn_randbetween);
        self.builtin("ROUND", 1, Some(2), math::fn_round);
        self.builtin("ROUNDDOWN", 1, Some(2), math::fn_rounddown);
        self.builtin("ROUNDUP", 1, Some(2), math::fn_roundup);
        self.builtin("TRUNC", 1, Some(2), math::fn_trunc);
    }

    fn register_logical_functions(&mut self) {
        self.builtin("AND", 1, None, logical::fn_and);
        self.builtin("OR", 1, None, logical::fn_or);
        self.builtin("IF", 1, Some(3), logical::fn_if);
        self.builtin("NOT", 1, Some(1), logical::fn_not);
        self.builtin("TRUE", 0, Some(0), logical::fn_true);
        self.builtin("FALSE", 0, Some(0), logical::fn_false);
    }

    fn register_text_functions(&mut self) {
        self.builtin("LEFT", 1, Some(2), text::fn_left);
        self.builtin("RIGHT", 1, Some(2), text::fn_right);
        self.builtin("MID", 3, Some(3), text::fn_mid);
        self.builtin("LEN", 1, Some(1), text::fn_len);
        self.builtin("FIND", 2, Some(3), text::fn_find);
        self.builtin("SEARCH", 2, Some(3), text::fn_search);
        self.builtin("REPLACE", 4, Some(4), text::fn_replace);
        self.builtin("SUBSTITUTE", 3, Some(4), text::fn_substitute);
        self.builtin("REPT", 2, Some(2), text::fn_rept);
        self.builtin("UPPER", 1, Some(1), text::fn_upper);
        self.builtin("LOWER", 1, Some(1), text::fn_lower);
        self.builtin("PROPER", 1, Some(1), text::fn_proper);
        self.builtin("TRIM", 1, Some(1), text::fn_trim);
        self.builtin("CONCATENATE", 1, None, text::fn_concatenate);
        self.builtin("CHAR", 1, Some(1), text::fn_char);
        self.builtin("CODE", 1, Some(1), text::fn_code);
        self.builtin("TEXT", 2, Some(2), text::fn_text);
        self.builtin("VALUE", 1, Some(1), text::fn_value);
        self.builtin("T", 1, Some(1), text::fn_t);
        self.builtin("EXACT", 2, Some(2), text::fn_exact);
    }

    fn register_date_functions(&mut self) {
        self.builtin("NOW", 0, Some(0), date::fn_now);
        self.builtin("TODAY", 0, Some(0), date::fn_today);
        self.builtin("YEAR", 1, Some(1), date::fn_year);
        self.builtin("MONTH", 1, Some(1), date::fn_month);
        self.builtin("DAY", 1, Some(1), date::fn_day);
        self.builtin("HOUR", 1, Some(1), date::fn_hour);
        self.builtin("MINUTE", 1, Some(1), date::fn_minute);
        self.builtin("SECOND", 1, Some(1), date::fn_second);
        self.builtin("WEEKDAY", 1, Some(2), date::fn_weekday);
        self.builtin("TIME", 3, Some(3), date::fn_time);
        self.builtin("DATE", 3, Some(3), date::fn_date);
        self.builtin("DATEDIF", 3, Some(3), date::fn_datedif);
    }

    fn register_lookup_functions(&mut self) {
        self.builtin("ROW", 0, Some(1), lookup::fn_row);
        self.builtin("COLUMN", 0, Some(1), lookup::fn_column);
        self.builtin("ROWS", 1, Some(1), lookup::fn_rows);
        self.builtin("COLUMNS", 1, Some(1), lookup::fn_columns);
        self.builtin("CHOOSE", 2, None, lookup::fn_choose);
        self.builtin("INDEX", 2, Some(3), lookup::fn_index);
        self.builtin("HLOOKUP", 3, Some(4), lookup::fn_hlookup);
        self.builtin("VLOOKUP", 3, Some(4), lookup::fn_vlookup);
        self.builtin("MATCH", 2, Some(3), lookup::fn_match);
    }

    fn register_financial_functions(&mut self) {
        self.builtin("RATE", 3, Some(6), financial::fn_rate);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluate an optional trailing argument
pub(crate) fn optional<T>(
    args: &[Expr],
    index: usize,
    default: T,
    ctx: &EvaluationContext,
    f: impl FnOnce(&Expr, &EvaluationContext) -> FormulaResult<T>,
) -> FormulaResult<T> {
    match args.get(index) {
        Some(arg) => f(arg, ctx),
        None => Ok(default),
    }
}

/// Compile a `?`/`*` wildcard pattern into an anchored, case-insensitive regex
pub(crate) fn wildcard_regex(pattern: &str) -> FormulaResult<regex::Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '?' => re.push('.'),
            '*' => re.push_str(".*"),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    re.push('$');

    regex::RegexBuilder::new(&re)
        .case_insensitive(true)
        .build()
        .map_err(|e| crate::error::FormulaError::argument(e.to_string()))
}

/// Whether text contains wildcard characters
pub(crate) fn has_wildcards(text: &str) -> bool {
    text.contains(['?', '*'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_ignores_case() {
        let registry = FunctionRegistry::new();
        let def = registry.get("sum").unwrap();
        assert_eq!(def.name, "SUM");
        assert_eq!(def.min_args, 1);
        assert_eq!(def.max_args, None);
        assert!(registry.get("NOSUCH").is_none());
        assert!(registry.len() >= 80);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = FunctionRegistry::new();
        registry.register(FunctionDef {
            name: "pi".into(),
            min_args: 0,
            max_args: Some(0),
            implementation: FunctionImpl::Custom(Rc::new(|_| Ok(FormulaValue::Number(3.0)))),
        });
        let def = registry.get("PI").unwrap();
        assert!(matches!(def.implementation, FunctionImpl::Custom(_)));
    }

    #[test]
    fn test_wildcard_regex() {
        let re = wildcard_regex("a*").unwrap();
        assert!(re.is_match("Apple"));
        assert!(!re.is_match("banana"));

        let re = wildcard_regex("b?t.").unwrap();
        assert!(re.is_match("bat."));
        assert!(!re.is_match("bat!"));
        assert!(has_wildcards("a?"));
        assert!(!has_wildcards("abc"));
    }
}
