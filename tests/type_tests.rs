use std::collections::HashSet;

use rusml::env::Environment;
use rusml::parser;
use rusml::session::Session;
use rusml::shell;
use rusml::types::error::TypeError;
use rusml::types::infer::{deduce_type, TypeResolver};
use rusml::types::TypeSystem;

/// Infer the type of an expression statement and return its
/// generalised moniker.
fn type_of(input: &str) -> Result<String, TypeError> {
    let mut ts = TypeSystem::new();
    let env = Environment::empty();
    let stmt = parser::statement_eof(input).expect("input parses");
    let mut resolver = TypeResolver::new(&mut ts, &env);
    let node = resolver.infer_statement(stmt)?;
    resolver.solve_constraints()?;
    match node {
        rusml::ast::statement::Statement::Expression(e) => {
            let ty = ts.resolve(e.info());
            let free = HashSet::new();
            Ok(ts.generalize(&free, &ty).ty.moniker())
        }
        rusml::ast::statement::Statement::Decl(_) => panic!("expected an expression"),
    }
}

fn assert_type(input: &str, expected: &str) {
    assert_eq!(type_of(input).expect(input), expected, "for {input}");
}

#[test]
fn primitive_types() {
    assert_type("1", "int");
    assert_type("1.5", "real");
    assert_type("\"x\"", "string");
    assert_type("#\"x\"", "char");
    assert_type("true", "bool");
    assert_type("()", "unit");
}

#[test]
fn compound_types() {
    assert_type("(1, \"a\")", "int * string");
    assert_type("[(1, 2)]", "(int * int) list");
    assert_type("{a = 1, b = true}", "{a:int, b:bool}");
    assert_type("fn x => x", "'a -> 'a");
    assert_type("fn x => fn y => x", "'a -> 'b -> 'a");
}

#[test]
fn operator_overloading_resolves_by_unification() {
    assert_type("2 + 3", "int");
    assert_type("2.0 + 3.0", "real");
    assert_type("fn x => x + x", "int -> int"); // numeric default
    assert_type("fn (x, y) => x < y", "int * int -> bool");
}

#[test]
fn equality_schemes_take_equality_types() {
    assert_type("[1] = [1, 2]", "bool");
    assert_type("(1, \"a\") = (1, \"b\")", "bool");
    let err = type_of("(fn x => x) = (fn x => x)").unwrap_err();
    assert!(matches!(err, TypeError::EqualityRequired { .. }));
}

#[test]
fn principal_types_admit_instances() {
    // The inferred type is 'a -> 'a; an instance annotation still
    // checks.
    assert_type("(fn x => x) : int -> int", "int -> int");
    assert_type("(fn x => x) : 'b -> 'b", "'a -> 'a");
}

#[test]
fn generalisation_skips_expansive_bindings() {
    let mut session = Session::new();
    let result = shell::run(
        &mut session,
        "let val f = (fn x => x) (fn y => y) in (f 1, f \"a\") end;\n",
    );
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("type error"), "{}", result.output);
}

#[test]
fn let_polymorphism_allows_both_uses() {
    let mut session = Session::new();
    let result = shell::run(
        &mut session,
        "let val id = fn x => x in (id 1, id \"a\") end;\n",
    );
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.contains("val it = (1,\"a\") : int * string"),
        "{}",
        result.output
    );
}

#[test]
fn unbound_identifiers_are_reported_with_position() {
    let err = type_of("undefined").unwrap_err();
    match err {
        TypeError::UnboundIdentifier { name, .. } => assert_eq!(name, "undefined"),
        other => panic!("expected an unbound identifier error, got {other}"),
    }
    let message = type_of("undefined").unwrap_err().to_string();
    assert!(message.contains("at stdIn:"), "{message}");
}

#[test]
fn occurs_check_reports_infinite_types() {
    let err = type_of("fn x => x x").unwrap_err();
    assert!(matches!(err, TypeError::OccursCheck { .. }));
}

#[test]
fn arity_mismatch_on_type_constructors() {
    let mut ts = TypeSystem::new();
    let env = Environment::empty();
    let stmt = parser::statement_eof("(1 : (int, int) list)").expect("parses");
    let result = deduce_type(&env, stmt, &mut ts);
    assert!(matches!(result, Err(TypeError::ArityMismatch { .. })));
}

#[test]
fn annotations_constrain_inference() {
    assert_type("fn x => (x : int)", "int -> int");
    assert_type("fn (x : string) => x", "string -> string");
    let err = type_of("(1 : string)").unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }));
}

#[test]
fn selector_types_follow_the_record() {
    assert_type("#a {a = 1, b = \"x\"}", "int");
    assert_type("#b {a = 1, b = \"x\"}", "string");
    assert_type(
        "fn r => #name (r : {name: string, age: int})",
        "{age:int, name:string} -> string",
    );
}

#[test]
fn datatype_declarations_type_their_constructors() {
    let mut session = Session::new();
    let program = "datatype 'a tree = Leaf | Node of 'a tree * 'a * 'a tree;\n\
                   Node (Leaf, 5, Leaf);\n";
    let result = shell::run(&mut session, program);
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.contains(": int tree"),
        "{}",
        result.output
    );
}

#[test]
fn exceptions_have_type_exn() {
    let mut session = Session::new();
    let result = shell::run(&mut session, "exception E of int;\nE;\nE 5;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains(": int -> exn"), "{}", result.output);
    assert!(result.output.contains(": exn"), "{}", result.output);
}

#[test]
fn from_has_list_type() {
    assert_type("from x in [1] yield {v = x}", "{v:int} list");
}
