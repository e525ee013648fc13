use rusml::session::Session;
use rusml::shell;

fn run(input: &str) -> shell::ShellRun {
    let mut session = Session::new();
    shell::run(&mut session, input)
}

#[test]
fn exhaustive_match_is_silent() {
    let result = run("case 1 of 0 => \"z\" | _ => \"n\";\n");
    assert_eq!(result.exit_code, 0);
    assert!(!result.output.contains("warning"), "{}", result.output);
}

#[test]
fn redundant_match_is_rejected() {
    let result = run("case 1 of _ => \"a\" | 0 => \"b\";\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("match redundant"), "{}", result.output);
}

#[test]
fn duplicate_arm_is_redundant() {
    let result = run("case 1 of 0 => \"a\" | 0 => \"b\" | _ => \"c\";\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("match redundant"), "{}", result.output);
}

#[test]
fn nonexhaustive_match_warns_but_compiles() {
    let result = run("case 1 of 0 => \"zero\";\n");
    assert_eq!(result.exit_code, 1, "{}", result.output);
    assert!(
        result.output.contains("match nonexhaustive"),
        "{}",
        result.output
    );
    // 1 is uncovered, so evaluation raises Match.
    assert!(
        result.output.contains("uncaught exception Match"),
        "{}",
        result.output
    );
}

#[test]
fn nonexhaustive_match_succeeds_on_covered_input() {
    let result = run("case 0 of 0 => \"zero\";\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains("match nonexhaustive"), "{}", result.output);
    assert!(
        result.output.contains("val it = \"zero\" : string"),
        "{}",
        result.output
    );
}

#[test]
fn nonexhaustive_and_redundant_is_an_error() {
    let result = run("case 1 of 0 => \"a\" | 0 => \"b\";\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(
        result.output.contains("match nonexhaustive and redundant"),
        "{}",
        result.output
    );
}

#[test]
fn datatype_coverage_counts_constructors() {
    let covered = run("datatype abc = A | B | C;\n\
                       case A of A => 1 | B => 2 | C => 3;\n");
    assert_eq!(covered.exit_code, 0, "{}", covered.output);
    assert!(!covered.output.contains("warning"), "{}", covered.output);

    let partial = run("datatype abc = A | B | C;\ncase A of A => 1 | B => 2;\n");
    assert_eq!(partial.exit_code, 0, "{}", partial.output);
    assert!(
        partial.output.contains("match nonexhaustive"),
        "{}",
        partial.output
    );
}

#[test]
fn list_patterns_cover_with_nil_and_cons() {
    let result = run("case [1] of [] => 0 | x :: _ => x;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(!result.output.contains("warning"), "{}", result.output);
}

#[test]
fn refutable_val_pattern_raises_bind() {
    let result = run("val 1 = 2;\n");
    assert_eq!(result.exit_code, 1, "{}", result.output);
    assert!(
        result.output.contains("uncaught exception Bind"),
        "{}",
        result.output
    );
}

#[test]
fn fn_with_refutable_arms_behaves_like_case() {
    let result = run("val f = fn 0 => \"z\" | _ => \"n\";\nf 0;\nf 9;\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains("val it = \"z\" : string"));
    assert!(result.output.contains("val it = \"n\" : string"));
}

#[test]
fn nested_patterns_are_compiled_positionally() {
    let program = "case (1, (true, \"x\")) of \
                   (0, _) => \"a\" \
                   | (_, (true, s)) => s \
                   | (_, (false, _)) => \"b\";\n";
    let result = run(program);
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.contains("val it = \"x\" : string"), "{}", result.output);
}

#[test]
fn layered_patterns_bind_both_names() {
    let result = run("case (1, 2) of whole as (x, _) => (whole, x);\n");
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.contains("val it = ((1,2),1) : (int * int) * int"),
        "{}",
        result.output
    );
}
