use rusml::ast::expression::Literal;
use rusml::ast::statement::Statement;
use rusml::fmt::surface;
use rusml::parser;

/// Unparsing a parsed statement reproduces the input, modulo
/// whitespace.
fn assert_parse_same(input: &str) {
    let normalized = input.split_whitespace().collect::<Vec<_>>().join(" ");
    assert_parse(input, &normalized);
}

fn assert_parse(input: &str, expected: &str) {
    let stmt = parser::statement_eof(input).unwrap_or_else(|e| panic!("{input}: {e}"));
    assert_eq!(surface::statement_to_string(&stmt), expected, "for {input}");
}

#[test]
fn parse_literals() {
    let literal = parser::literal_eof("1").unwrap();
    assert_eq!(literal.value, Literal::Int(1));

    let literal = parser::literal_eof("~3.5").unwrap();
    assert_eq!(literal.value, Literal::Real(-3.5));

    let literal = parser::literal_eof("\"a string\"").unwrap();
    assert_eq!(literal.value, Literal::String("a string".to_string()));

    let literal = parser::literal_eof("#\"a\"").unwrap();
    assert_eq!(literal.value, Literal::Char('a'));

    let literal = parser::literal_eof("()").unwrap();
    assert_eq!(literal.value, Literal::Unit);
}

#[test]
fn true_and_false_are_literals_in_expressions() {
    assert_parse_same("true");
    assert_parse_same("false");
}

#[test]
fn parse_decl_forms() {
    let decl = parser::decl_eof("val x = 5").unwrap();
    assert_eq!(surface::decl_to_string(&decl), "val x = 5");

    let decl = parser::decl_eof("val x : int = 5").unwrap();
    assert_eq!(surface::decl_to_string(&decl), "val x : int = 5");
}

#[test]
fn left_associative_parens_are_redundant() {
    assert_parse("((1 + 2) + 3) + 4", "1 + 2 + 3 + 4");
}

#[test]
fn right_associative_parens_survive() {
    assert_parse("1 + (2 + (3 + (4)))", "1 + (2 + (3 + 4))");
}

#[test]
fn let_round_trips() {
    assert_parse_same("let val x = 2 in x + (3 + x) + x end");
    assert_parse_same("let val x = 2 and y = 3 in x + y end");
    // a let is atomic: it can sit inside an operand
    assert_parse_same("let val x = 1 in let val x = 2 in x * 3 end + x end");
}

#[test]
fn operator_precedence_shapes() {
    assert_parse("1 + 2 * 3", "1 + 2 * 3");
    assert_parse("(1 + 2) * 3", "(1 + 2) * 3");
    assert_parse("1 :: 2 :: [3]", "1 :: 2 :: [3]");
    assert_parse("1 < 2 andalso 3 < 4", "1 < 2 andalso 3 < 4");
    assert_parse("a orelse b andalso c", "a orelse b andalso c");
}

#[test]
fn application_binds_tighter_than_operators() {
    assert_parse_same("f x + g y");
    assert_parse_same("f (x + g) y");
}

#[test]
fn fn_case_raise_round_trip() {
    assert_parse_same("fn x => x + 1");
    assert_parse_same("fn 0 => 1 | n => n");
    assert_parse_same("case x of 0 => \"zero\" | _ => \"more\"");
    assert_parse_same("raise e");
    assert_parse_same("f x handle E => 0");
}

#[test]
fn pattern_forms_round_trip() {
    assert_parse_same("val (x, y) = p");
    assert_parse_same("val {a, b = (x, y)} = r");
    assert_parse_same("val {a, ...} = r");
    assert_parse_same("val x :: rest = xs");
    assert_parse_same("case xs of [] => 0 | x :: _ => x");
    assert_parse_same("case p of whole as (x, y) => whole");
}

#[test]
fn datatype_and_exception_round_trip() {
    assert_parse_same("datatype color = Red | Green | Blue");
    assert_parse_same("datatype 'a tree = Leaf | Node of 'a tree * 'a * 'a tree");
    assert_parse_same("exception Failure of string");
    assert_parse_same("type point = {x: int, y: int}");
}

#[test]
fn fun_declarations_round_trip() {
    assert_parse_same("fun add x y = x + y");
    assert_parse_same("fun fact 0 = 1 | fact n = n * fact (n - 1)");
}

#[test]
fn from_round_trips() {
    assert_parse_same("from x in xs where x > 1 yield x + 1");
    assert_parse_same("from x in xs, y in ys where x < y");
    assert_parse_same("from e in emps group #deptno e compute count of e");
}

#[test]
fn record_and_selector_round_trip() {
    assert_parse_same("{a = 1, b = \"two\"}");
    assert_parse_same("#name e");
}

#[test]
fn parse_errors_carry_positions() {
    let err = parser::statement_eof("val = 5").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("parse error"), "{message}");

    assert!(parser::statement_eof("1 +").is_err());
    assert!(parser::statement_eof("let val x = 1 in x").is_err());
}

#[test]
fn program_splits_on_semicolons() {
    let statements = parser::program("val x = 5;\nx;\nit + 1;\n").unwrap();
    assert_eq!(statements.len(), 3);
    assert!(matches!(statements[0], Statement::Decl(_)));
    assert!(matches!(statements[1], Statement::Expression(_)));

    let statements = parser::program("").unwrap();
    assert!(statements.is_empty());
}
