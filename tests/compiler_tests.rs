use rusml::compile::{prepare_statement, CompiledStatement};
use rusml::env::Environment;
use rusml::parser;
use rusml::session::Session;
use rusml::shell;
use rusml::types::TypeSystem;

fn prepare(input: &str, hybrid: bool) -> CompiledStatement {
    let mut ts = TypeSystem::new();
    let env = Environment::empty();
    let stmt = parser::statement_eof(input).expect("input parses");
    let mut warnings = Vec::new();
    prepare_statement(&mut ts, &env, stmt, hybrid, &mut warnings)
        .unwrap_or_else(|e| panic!("{input}: {e}"))
}

fn plan(input: &str) -> String {
    prepare(input, false).plan()
}

#[test]
fn constants_compile_to_constant_codes() {
    assert!(plan("1;").contains("constant(1)"));
    assert!(plan("\"a\";").contains("constant(\"a\")"));
}

#[test]
fn operator_application_plans_show_the_builtin() {
    let plan = plan("2 + 3;");
    assert!(plan.contains("fnValue +"), "{plan}");
    assert!(plan.contains("tuple(constant(2), constant(3))"), "{plan}");
}

#[test]
fn inlining_removes_single_use_lets() {
    // let val x = 1 in x + 2 end inlines to 1 + 2.
    let plan = plan("let val x = 1 in x + 2 end;");
    assert!(
        plan.contains("tuple(constant(1), constant(2))"),
        "{plan}"
    );
    assert!(!plan.contains("get(name x)"), "{plan}");
}

#[test]
fn dead_bindings_disappear() {
    let plan = plan("let val unused = 1 in 2 end;");
    assert!(!plan.contains("unused"), "{plan}");
}

#[test]
fn variables_compile_to_slots() {
    let plan = plan("fn x => fn y => x;");
    assert!(plan.contains("closure"), "{plan}");
}

#[test]
fn match_compiles_to_a_switch_plan() {
    let plan = plan("case 1 of 0 => \"a\" | _ => \"b\";");
    assert!(plan.contains("match("), "{plan}");
}

#[test]
fn self_tail_calls_compile_to_a_loop() {
    let compiled = prepare(
        "let val rec go = fn n => if n = 0 then 0 else go (n - 1) in go 3 end;",
        false,
    );
    let plan = compiled.plan();
    assert!(plan.contains("selfCall"), "{plan}");
}

#[test]
fn non_tail_recursion_stays_an_apply() {
    let compiled = prepare(
        "let val rec fact = fn n => if n = 0 then 1 else n * fact (n - 1) in fact 3 end;",
        false,
    );
    let plan = compiled.plan();
    assert!(!plan.contains("selfCall"), "{plan}");
    assert!(plan.contains("letRec(fact"), "{plan}");
}

#[test]
fn optimizer_is_idempotent_after_convergence() {
    // Preparing the same statement twice yields the same core shape.
    let a = prepare("let val x = 1 val y = x in y + y end;", false)
        .core_string()
        .expect("a value statement");
    let b = prepare("let val x = 1 val y = x in y + y end;", false)
        .core_string()
        .expect("a value statement");
    assert_eq!(a, b);
}

#[test]
fn unused_binding_warning_is_emitted() {
    let mut ts = TypeSystem::new();
    let env = Environment::empty();
    let stmt = parser::statement_eof("let val unused = 1 in 2 end;").expect("parses");
    let mut warnings = Vec::new();
    prepare_statement(&mut ts, &env, stmt, false, &mut warnings).expect("compiles");
    assert!(warnings
        .iter()
        .any(|w| w.to_string().contains("unused binding unused")));
}

#[test]
fn illegal_recursion_is_rejected() {
    let mut session = Session::new();
    let result = shell::run(&mut session, "val rec x = 5;\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("illegal recursion"), "{}", result.output);

    let mut session = Session::new();
    let result = shell::run(&mut session, "val rec (a, b) = (fn x => x, fn y => y);\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("illegal recursion"), "{}", result.output);
}

#[test]
fn evaluation_reuses_session_bindings_by_name() {
    let mut session = Session::new();
    let result = shell::run(&mut session, "val x = 40;\nval y = x + 2;\ny;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains("val it = 42 : int"), "{}", result.output);
}

#[test]
fn failed_statement_preserves_earlier_bindings() {
    let mut session = Session::new();
    let result = shell::run(
        &mut session,
        "val x = 1;\nval y = hd [];\nx;\n",
    );
    assert_eq!(result.exit_code, 1, "{}", result.output);
    assert!(result.output.contains("uncaught exception Empty"));
    assert!(result.output.contains("val it = 1 : int"), "{}", result.output);
}
