use std::rc::Rc;

use rusml::catalog::{DataSet, MapCatalog, RelBuilder};
use rusml::eval::code::{Raised, RelCode};
use rusml::eval::value::Value;
use rusml::eval::EvalContext;
use rusml::session::Session;
use rusml::shell;
use rusml::types::TypeSystem;

fn emp(deptno: i64, name: &str, salary: f64) -> Value {
    Value::record(vec![
        ("deptno".to_string(), Value::Int(deptno)),
        ("name".to_string(), Value::String(name.to_string())),
        ("salary".to_string(), Value::Real(salary)),
    ])
}

fn dept(deptno: i64, dname: &str) -> Value {
    Value::record(vec![
        ("deptno".to_string(), Value::Int(deptno)),
        ("dname".to_string(), Value::String(dname.to_string())),
    ])
}

fn catalog() -> MapCatalog {
    let mut ts = TypeSystem::new();
    let int = ts.int();
    let string = ts.string();
    let real = ts.real();
    let emp_schema = ts.record_type(vec![
        ("deptno".to_string(), int.clone()),
        ("name".to_string(), string.clone()),
        ("salary".to_string(), real),
    ]);
    let dept_schema = ts.record_type(vec![
        ("deptno".to_string(), int),
        ("dname".to_string(), string),
    ]);
    MapCatalog::new()
        .with_dataset(
            "emps",
            DataSet::new(
                emp_schema,
                vec![
                    emp(10, "jones", 800.0),
                    emp(20, "blake", 950.0),
                    emp(10, "clark", 1100.0),
                    emp(20, "smith", 700.0),
                ],
            ),
        )
        .with_dataset(
            "depts",
            DataSet::new(dept_schema, vec![dept(10, "sales"), dept(20, "marketing")]),
        )
}

fn session(hybrid: bool) -> Session {
    let mut session = Session::new().with_catalog(&catalog());
    session.set_prop("hybrid", hybrid).expect("known property");
    session
}

fn run(hybrid: bool, input: &str) -> shell::ShellRun {
    let mut session = session(hybrid);
    shell::run(&mut session, input)
}

/// Hybrid and tree-walk evaluation agree on the same query.
fn assert_eval_same(input: &str) {
    let plain = run(false, input);
    let hybrid = run(true, input);
    assert_eq!(plain.exit_code, 0, "{}", plain.output);
    assert_eq!(plain.output, hybrid.output, "for {input}");
}

#[test]
fn filter_and_project_over_a_dataset() {
    let result = run(false, "from e in emps where #deptno e = 10 yield #name e;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.contains("val it = [\"jones\",\"clark\"] : string list"),
        "{}",
        result.output
    );
    assert_eval_same("from e in emps where #deptno e = 10 yield #name e;\n");
}

#[test]
fn cross_and_conditional_joins() {
    assert_eval_same(
        "from e in emps, d in depts where #deptno e = #deptno d \
         yield {name = #name e, dname = #dname d};\n",
    );
}

#[test]
fn group_by_with_aggregates() {
    assert_eval_same(
        "from e in emps group #deptno e compute count of e;\n",
    );
    assert_eval_same(
        "from e in emps group #deptno e compute sum of #salary e, max of #salary e;\n",
    );
}

#[test]
fn union_of_two_pipelines() {
    assert_eval_same(
        "(from e in emps where #deptno e = 10 yield #name e) \
         @ (from e in emps where #deptno e = 20 yield #name e);\n",
    );
}

#[test]
fn hybrid_plans_are_relational() {
    let mut s = session(true);
    let stmt = rusml::parser::statement_eof(
        "from e in emps where #deptno e = 10 yield #name e;",
    )
    .expect("parses");
    let mut warnings = Vec::new();
    let hybrid = s.hybrid();
    let compiled = rusml::compile::prepare_statement(
        &mut s.type_system,
        &s.env,
        stmt,
        hybrid,
        &mut warnings,
    )
    .expect("compiles");
    let plan = compiled.plan();
    assert!(plan.contains("scan("), "{plan}");
    assert!(plan.contains("filter("), "{plan}");
    assert!(plan.contains("project("), "{plan}");
}

#[test]
fn non_hybrid_plans_stay_tree_walking() {
    let mut s = session(false);
    let stmt = rusml::parser::statement_eof(
        "from e in emps where #deptno e = 10 yield #name e;",
    )
    .expect("parses");
    let mut warnings = Vec::new();
    let hybrid = s.hybrid();
    let compiled = rusml::compile::prepare_statement(
        &mut s.type_system,
        &s.env,
        stmt,
        hybrid,
        &mut warnings,
    )
    .expect("compiles");
    let plan = compiled.plan();
    assert!(plan.contains("from("), "{plan}");
    assert!(!plan.contains("project("), "{plan}");
}

#[test]
fn impure_predicates_are_not_relationalized() {
    // The predicate can raise, so the pipeline must stay a
    // comprehension even in hybrid mode.
    let mut s = session(true);
    let stmt = rusml::parser::statement_eof(
        "from e in emps where hd [true] yield #name e;",
    )
    .expect("parses");
    let mut warnings = Vec::new();
    let hybrid = s.hybrid();
    let compiled = rusml::compile::prepare_statement(
        &mut s.type_system,
        &s.env,
        stmt,
        hybrid,
        &mut warnings,
    )
    .expect("compiles");
    let plan = compiled.plan();
    assert!(plan.contains("from("), "{plan}");
}

#[test]
fn non_record_rows_are_not_relationalized() {
    let result = run(true, "from x in [1, 2, 3] where x > 1;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains("val it = [2,3] : int list"), "{}", result.output);
}

/// A backend that claims every subtree and returns no rows.
struct EmptyBuilder;

impl RelBuilder for EmptyBuilder {
    fn materialize(
        &self,
        _rel: &RelCode,
        _ctx: &EvalContext,
        _frame: &mut Vec<Value>,
    ) -> Option<Result<Vec<Value>, Raised>> {
        Some(Ok(Vec::new()))
    }
}

#[test]
fn an_external_rel_builder_takes_over() {
    let mut session = session(true).with_rel_builder(Rc::new(EmptyBuilder));
    let result = shell::run(
        &mut session,
        "from e in emps where #deptno e = 10 yield #name e;\n",
    );
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.contains("val it = [] : string list"),
        "{}",
        result.output
    );
}
