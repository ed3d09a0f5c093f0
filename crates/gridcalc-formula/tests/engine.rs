//! End-to-end evaluation through the engine facade

use gridcalc_core::{CellRange, CellValue, Workbook};
use gridcalc_formula::{
    CustomArgument, EngineSettings, EvalOptions, FormulaEngine, FormulaError, FormulaValue,
    GridHost,
};
use pretty_assertions::assert_eq;

fn eval(wb: &Workbook, formula: &str) -> FormulaValue {
    FormulaEngine::new().evaluate(wb, formula, &EvalOptions::default())
}

fn number(wb: &Workbook, formula: &str) -> f64 {
    match eval(wb, formula) {
        FormulaValue::String(s) => panic!("{} evaluated to {:?}", formula, s),
        v => v.to_number(),
    }
}

fn fruit_workbook() -> Workbook {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.fill_range(
        &CellRange::parse("A1:A3").unwrap(),
        ["apple", "banana", "avocado"],
    );
    sheet.fill_range(&CellRange::parse("B1:B3").unwrap(), [3.0, 5.0, 7.0]);
    wb
}

#[test]
fn test_precedence() {
    let wb = Workbook::new();
    assert_eq!(number(&wb, "=2+3*4"), 14.0);
    assert_eq!(number(&wb, "=(2+3)*4"), 20.0);
    assert_eq!(number(&wb, "=2^3^2"), 64.0);
    assert_eq!(number(&wb, "=7\\2 + 7 % 4"), 6.0);
    assert_eq!(number(&wb, "=50%*10"), 5.0);
}

#[test]
fn test_string_number_comparison() {
    let wb = Workbook::new();
    assert_eq!(eval(&wb, "=\"10\"=10"), FormulaValue::Boolean(true));
    assert_eq!(eval(&wb, "=\"B\"=\"b\""), FormulaValue::Boolean(true));
    assert_eq!(eval(&wb, "=\"apple\"<>5"), FormulaValue::Boolean(true));
    // Ordering only applies to values that coerce to numbers
    assert_eq!(eval(&wb, "=\"apple\">5"), FormulaValue::Boolean(false));
    assert_eq!(eval(&wb, "=\"b\">\"A\""), FormulaValue::Boolean(false));
    assert_eq!(eval(&wb, "=\"12\">5"), FormulaValue::Boolean(true));
    assert_eq!(eval(&wb, "=\"abc\"&1+1"), FormulaValue::from("abc2"));
}

#[test]
fn test_cache_round_trip() {
    let wb = fruit_workbook();
    let engine = FormulaEngine::new();
    let opts = EvalOptions::default();

    let first = engine.evaluate(&wb, "=SUM(B1:B3)*2", &opts);
    let second = engine.evaluate(&wb, "=SUM(B1:B3)*2", &opts);
    assert_eq!(first, FormulaValue::Number(30.0));
    assert_eq!(first, second);
    assert_eq!(engine.parse_count(), 1);
}

#[test]
fn test_cache_wiped_when_full() {
    let wb = Workbook::new();
    let engine = FormulaEngine::with_settings(EngineSettings {
        cache_capacity: 2,
        ..Default::default()
    });
    let opts = EvalOptions::default();

    engine.evaluate(&wb, "=1+1", &opts);
    engine.evaluate(&wb, "=2+2", &opts);
    assert_eq!(engine.cache_len(), 2);

    engine.evaluate(&wb, "=3+3", &opts);
    assert_eq!(engine.cache_len(), 1);
    assert_eq!(engine.parse_count(), 3);

    // The earlier entries are gone and parse again
    assert_eq!(engine.evaluate(&wb, "=1+1", &opts), FormulaValue::Number(2.0));
    assert_eq!(engine.parse_count(), 4);
    assert_eq!(engine.evaluate(&wb, "=3+3", &opts), FormulaValue::Number(6.0));
    assert_eq!(engine.parse_count(), 4);
}

#[test]
fn test_wildcard_criteria() {
    let wb = fruit_workbook();
    assert_eq!(number(&wb, "=COUNTIF(A1:A3, \"a*\")"), 2.0);
    assert_eq!(number(&wb, "=SUMIF(A1:A3, \"a*\", B1:B3)"), 10.0);
    assert_eq!(number(&wb, "=COUNTIFS(A1:A3, \"a*\", B1:B3, \">5\")"), 1.0);
    assert_eq!(number(&wb, "=SUMIFS(B1:B3, A1:A3, \"<>banana\", B1:B3, \"<7\")"), 3.0);
}

#[test]
fn test_comparison_criteria_skip_text() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.fill_range(&CellRange::parse("A1:A3").unwrap(), ["apple", "pear", "kiwi"]);
    sheet.fill_range(&CellRange::parse("B1:B4").unwrap(), [4.0, 6.0, 8.0, 1.0]);

    assert_eq!(number(&wb, "=COUNTIF(A1:A3, \">5\")"), 0.0);
    assert_eq!(number(&wb, "=COUNTIF(A1:A3, \"<5\")"), 0.0);
    assert_eq!(number(&wb, "=COUNTIF(A1:A3, \"<>5\")"), 3.0);
    assert_eq!(number(&wb, "=COUNTIF(B1:B4, \">5\")"), 2.0);
}

#[test]
fn test_criteria_ranges_must_match() {
    let wb = fruit_workbook();
    let engine = FormulaEngine::new();
    let opts = EvalOptions::default();
    for formula in [
        "=SUMIF(A1:A3, \"a*\", B1:B2)",
        "=COUNTIFS(A1:A3, \"a*\", B1:B2, \">1\")",
        "=SUMIFS(B1:B3, A1:A2, \"a*\")",
    ] {
        assert!(
            matches!(
                engine.try_evaluate(&wb, formula, &opts),
                Err(FormulaError::Argument(_))
            ),
            "{}",
            formula
        );
    }
}

#[test]
fn test_circular_reference() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_formula("A1", "=B1").unwrap();
    sheet.set_cell_formula("B1", "=A1").unwrap();
    sheet.set_cell_formula("C1", "=D1").unwrap();
    sheet.set_cell_formula("D1", "=E1").unwrap();
    sheet.set_cell_formula("E1", "=C1").unwrap();

    for formula in ["=A1", "=B1", "=D1"] {
        let value = eval(&wb, formula);
        assert!(
            value.as_string().contains("circular reference"),
            "{} gave {:?}",
            formula,
            value
        );
    }
}

#[test]
fn test_datedif() {
    let wb = Workbook::new();
    assert_eq!(number(&wb, "=DATEDIF(#2020-01-31#, #2020-03-01#, \"M\")"), 1.0);
    assert_eq!(number(&wb, "=DATEDIF(#2020-01-31#, #2020-03-01#, \"D\")"), 30.0);
    assert_eq!(
        number(&wb, "=DATEDIF(#2019-05-17#, #2021-02-03#, \"D\")"),
        number(&wb, "=#2021-02-03# - #2019-05-17#")
    );
    assert!(eval(&wb, "=DATEDIF(#2020-01-31#, #2020-03-01#, \"Q\")")
        .as_string()
        .starts_with("Error: "));
}

#[test]
fn test_arity() {
    let wb = Workbook::new();
    assert_eq!(eval(&wb, "=MID(\"abc\", 1)"), FormulaValue::from("Error: too few parameters for MID"));
    assert_eq!(eval(&wb, "=NOT(1, 2)"), FormulaValue::from("Error: too many parameters for NOT"));
    assert_eq!(eval(&wb, "=PI(1)"), FormulaValue::from("Error: too many parameters for PI"));
}

#[test]
fn test_blanks_in_aggregates() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 4.0).unwrap();
    sheet.set_cell_value("A2", "").unwrap();
    sheet.set_cell_value("A4", 6.0).unwrap();
    sheet.set_cell_value("A5", f64::NAN).unwrap();

    assert_eq!(number(&wb, "=SUM(A1:A5)"), 10.0);
    assert_eq!(number(&wb, "=COUNTBLANK(A1:A5)"), 3.0);
    assert_eq!(number(&wb, "=COUNT(A1:A5)"), 2.0);
    assert_eq!(number(&wb, "=AVERAGE(A1:A5)"), 5.0);
}

#[test]
fn test_passthrough() {
    let wb = Workbook::new();
    assert_eq!(eval(&wb, "plain text"), FormulaValue::from("plain text"));
    assert_eq!(eval(&wb, ""), FormulaValue::from(""));
    assert_eq!(eval(&wb, " =1+1"), FormulaValue::Number(2.0));
}

#[test]
fn test_sheet_qualified_references() {
    let mut wb = Workbook::new();
    let index = wb.add_worksheet_with_name("Q1 Sales").unwrap();
    let sheet = wb.worksheet_mut(index).unwrap();
    sheet.fill_range(&CellRange::parse("A1:A3").unwrap(), [100.0, 200.0, 300.0]);
    wb.worksheet_mut(0)
        .unwrap()
        .set_cell_formula("B1", "=SUM('Q1 Sales'!A1:A3)")
        .unwrap();

    assert_eq!(number(&wb, "='Q1 Sales'!A2"), 200.0);
    assert_eq!(number(&wb, "=B1"), 600.0);
    assert_eq!(number(&wb, "=SUM('Q1 Sales'!A1:A3)"), 600.0);
    assert_eq!(
        eval(&wb, "=Missing!A1"),
        FormulaValue::from("Error: invalid sheet reference: Missing")
    );

    // Unqualified references follow the sheet being evaluated
    let engine = FormulaEngine::new();
    let opts = EvalOptions::default().on_sheet(index);
    assert_eq!(engine.evaluate(&wb, "=A3", &opts), FormulaValue::Number(300.0));
}

#[test]
fn test_hidden_rows_and_subtotal() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();
    sheet.fill_range(&CellRange::parse("A1:A4").unwrap(), [1.0, 2.0, 3.0, 4.0]);
    sheet.set_row_hidden(2, true);

    assert_eq!(number(&wb, "=SUBTOTAL(9, A1:A4)"), 10.0);
    assert_eq!(number(&wb, "=SUBTOTAL(109, A1:A4)"), 7.0);
    assert_eq!(number(&wb, "=SUBTOTAL(102, A1:A4)"), 3.0);
}

#[test]
fn test_index_and_lookup() {
    let wb = fruit_workbook();
    assert_eq!(eval(&wb, "=INDEX(A1:B3, 2, 1)"), FormulaValue::from("banana"));
    assert_eq!(number(&wb, "=SUM(INDEX(A1:B3, 0, 2))"), 15.0);
    assert_eq!(number(&wb, "=VLOOKUP(\"avocado\", A1:B3, 2, FALSE)"), 7.0);
    assert_eq!(number(&wb, "=MATCH(\"ban*\", A1:A3, 0)"), 2.0);
}

#[test]
fn test_rate() {
    let wb = Workbook::new();
    let rate = number(&wb, "=RATE(12, -100, 1000)");
    assert!((rate - 0.029229).abs() < 1e-4, "{}", rate);

    let rate = number(&wb, "=RATE(360, -599.55, 100000)");
    assert!((rate - 0.005).abs() < 1e-5, "{}", rate);
}

#[test]
fn test_division_follows_float_arithmetic() {
    let wb = Workbook::new();
    assert_eq!(eval(&wb, "=1/0"), FormulaValue::Number(f64::INFINITY));
    assert!(eval(&wb, "=0/0").as_string().starts_with("Error: "));
}

#[test]
fn test_display_format() {
    let wb = Workbook::new();
    let engine = FormulaEngine::new();
    let opts = EvalOptions::default().with_format("c2");
    assert_eq!(engine.evaluate(&wb, "=1234.5*2", &opts), FormulaValue::from("$2,469.00"));
    assert_eq!(
        engine.evaluate(&wb, "=TEXT(0.125, \"p1\")", &EvalOptions::default()),
        FormulaValue::from("12.5%")
    );
}

#[test]
fn test_custom_function_receives_ranges() {
    let mut wb = Workbook::new();
    wb.worksheet_mut(0)
        .unwrap()
        .fill_range(&CellRange::parse("A1:B2").unwrap(), [1.0, 2.0, 3.0, 4.0]);

    let mut engine = FormulaEngine::new();
    engine.add_custom_function("CELLS", 1, None, |args| {
        let mut total = 0.0;
        for arg in args {
            total += match arg {
                CustomArgument::Range(range) => (range.row_span() * range.column_span()) as f64,
                CustomArgument::Value(v) => v.expect_number()?,
            };
        }
        Ok(FormulaValue::Number(total))
    });

    let opts = EvalOptions::default();
    assert_eq!(engine.evaluate(&wb, "=CELLS(A1:B2, 10)", &opts), FormulaValue::Number(14.0));
    assert_eq!(engine.evaluate(&wb, "=cells(A1)", &opts), FormulaValue::Number(1.0));
    assert_eq!(
        engine.evaluate(&wb, "=CELLS()", &opts),
        FormulaValue::from("Error: too few parameters for CELLS")
    );
    assert_eq!(
        engine.try_evaluate(&wb, "=CELLS(\"x\")", &opts),
        Err(FormulaError::argument("cannot convert 'x' to a number"))
    );
}

/// A workbook that answers one extra function name itself
struct HookHost {
    workbook: Workbook,
}

impl GridHost for HookHost {
    fn sheet_count(&self) -> usize {
        self.workbook.sheet_count()
    }

    fn sheet_name(&self, sheet: usize) -> Option<&str> {
        GridHost::sheet_name(&self.workbook, sheet)
    }

    fn selected_sheet(&self) -> usize {
        self.workbook.selected_sheet()
    }

    fn row_count(&self, sheet: usize) -> usize {
        GridHost::row_count(&self.workbook, sheet)
    }

    fn column_count(&self, sheet: usize) -> usize {
        GridHost::column_count(&self.workbook, sheet)
    }

    fn cell_content(&self, sheet: usize, row: usize, col: usize) -> CellValue {
        self.workbook.cell_content(sheet, row, col)
    }

    fn unknown_function(&self, name: &str, args: &[FormulaValue]) -> Option<FormulaValue> {
        match name.to_uppercase().as_str() {
            "TAXRATE" => Some(FormulaValue::Number(0.2)),
            "TWICE" => args.first().map(|v| FormulaValue::Number(v.to_number() * 2.0)),
            _ => None,
        }
    }
}

#[test]
fn test_unknown_function_hook() {
    let mut workbook = Workbook::new();
    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_cell_value("A1", 50.0)
        .unwrap();
    let host = HookHost { workbook };
    let engine = FormulaEngine::new();
    let opts = EvalOptions::default();

    assert_eq!(engine.evaluate(&host, "=A1*TAXRATE", &opts), FormulaValue::Number(10.0));
    assert_eq!(engine.evaluate(&host, "=TWICE(A1)+1", &opts), FormulaValue::Number(101.0));
    assert_eq!(
        engine.evaluate(&host, "=NOPE(1)", &opts),
        FormulaValue::from("Error: the function \"NOPE\" is not supported")
    );
}

#[test]
fn test_errors_never_escape() {
    let wb = Workbook::new();
    for formula in [
        "=0/0",
        "=(1",
        "=\"abc",
        "=SUM(A1:A999)",
        "=ABS(\"x\")",
        "=#nope#",
        "=DATE(2020, 1, 1E15)",
        "=TIME(1E18, 0, 0)",
        "=REPT(\"ab\", 1E15)",
    ] {
        assert!(
            eval(&wb, formula).as_string().starts_with("Error: "),
            "{}",
            formula
        );
    }
}
