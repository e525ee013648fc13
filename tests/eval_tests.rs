use rusml::session::Session;
use rusml::shell;

fn eval_line(input: &str) -> String {
    let mut session = Session::new();
    let result = shell::run(&mut session, input);
    assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);
    result
        .output
        .lines()
        .last()
        .unwrap_or_default()
        .to_string()
}

fn assert_eval(input: &str, expected: &str) {
    assert_eq!(eval_line(input), format!("val it = {expected}"), "for {input}");
}

#[test]
fn literals() {
    assert_eval("1;", "1 : int");
    assert_eval("~2;", "~2 : int");
    assert_eval("~10.25;", "~10.25 : real");
    assert_eval("\"a string\";", "\"a string\" : string");
    assert_eval("true;", "true : bool");
    assert_eval("#\"a\";", "#\"a\" : char");
    assert_eval("();", "() : unit");
}

#[test]
fn arithmetic() {
    assert_eval("2 + 3;", "5 : int");
    assert_eval("2 + 3 * 4;", "14 : int");
    assert_eval("7 div 2;", "3 : int");
    assert_eval("7 mod 2;", "1 : int");
    assert_eval("1.5 + 2.25;", "3.75 : real");
    assert_eval("1.0 / 4.0;", "0.25 : real");
    assert_eval("\"foo\" ^ \"bar\";", "\"foobar\" : string");
    assert_eval("~(1 + 2);", "~3 : int");
}

#[test]
fn comparisons_and_logic() {
    assert_eval("2 < 3;", "true : bool");
    assert_eval("\"a\" < \"b\";", "true : bool");
    assert_eval("2 = 2;", "true : bool");
    assert_eval("2 <> 3;", "true : bool");
    assert_eval("true andalso false;", "false : bool");
    assert_eval("true orelse false;", "true : bool");
    assert_eval("not true;", "false : bool");
}

#[test]
fn let_bindings() {
    assert_eval("let val x = 1 in x + 2 end;", "3 : int");
    assert_eval(
        "let val x = 1 in let val x = 2 in x * 3 end + x end;",
        "7 : int",
    );
    assert_eval("let val (x, y) = (1, 2) in x + y end;", "3 : int");
}

#[test]
fn functions_and_closures() {
    assert_eval("(fn x => x + 1) 41;", "42 : int");
    assert_eval(
        "let val add = fn x => fn y => x + y in add 2 3 end;",
        "5 : int",
    );
    // captured environment survives the defining scope
    assert_eval(
        "let val mk = fn x => fn () => x val f = mk 7 in f () end;",
        "7 : int",
    );
    let mut session = Session::new();
    let result = shell::run(&mut session, "val f = fn x => x;\n");
    assert_eq!(result.output, "val f = fn : 'a -> 'a\n");
}

#[test]
fn higher_order_builtins() {
    assert_eval("map (fn x => x * 2) [1, 2, 3];", "[2,4,6] : int list");
    assert_eval("filter (fn x => x > 1) [0, 1, 2, 3];", "[2,3] : int list");
    assert_eval("length [1, 2, 3];", "3 : int");
    assert_eval("rev [1, 2, 3];", "[3,2,1] : int list");
    assert_eval("hd [5, 6];", "5 : int");
    assert_eval("tl [5, 6];", "[6] : int list");
    assert_eval("((fn x => x + 1) o (fn x => x * 2)) 5;", "11 : int");
}

#[test]
fn lists_and_tuples() {
    assert_eval("1 :: [2, 3];", "[1,2,3] : int list");
    assert_eval("[1] @ [2, 3];", "[1,2,3] : int list");
    assert_eval("(1, \"two\", true);", "(1,\"two\",true) : int * string * bool");
    assert_eval("{b = 2, a = 1};", "{a=1,b=2} : {a:int, b:int}");
    assert_eval("#a {a = 5, b = 6};", "5 : int");
}

#[test]
fn recursion() {
    assert_eval(
        "let val rec fact = fn n => if n = 0 then 1 else n * fact (n - 1) in fact 5 end;",
        "120 : int",
    );
    let mut session = Session::new();
    let result = shell::run(
        &mut session,
        "fun fib n = if n < 2 then n else fib (n - 1) + fib (n - 2);\nfib 10;\n",
    );
    assert!(result.output.ends_with("val it = 55 : int\n"), "{}", result.output);
}

#[test]
fn mutual_recursion() {
    assert_eval(
        "let val rec even = fn n => if n = 0 then true else odd (n - 1) \
         and odd = fn n => if n = 0 then false else even (n - 1) \
         in even 10 end;",
        "true : bool",
    );
}

#[test]
fn tail_recursion_runs_in_constant_stack() {
    assert_eval(
        "let val rec go = fn n => if n = 0 then 0 else go (n - 1) in go 500000 end;",
        "0 : int",
    );
}

#[test]
fn datatypes_and_case() {
    let mut session = Session::new();
    let program = "datatype shape = Circle of int | Square of int;\n\
                   case Circle 3 of Circle r => r * r | Square s => s;\n";
    let result = shell::run(&mut session, program);
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(result.output.ends_with("val it = 9 : int\n"), "{}", result.output);
}

#[test]
fn option_builtins() {
    assert_eval("SOME 5;", "SOME 5 : int option");
    assert_eval("NONE;", "NONE : 'a option");
    assert_eval(
        "case SOME 5 of SOME x => x | NONE => 0;",
        "5 : int",
    );
    assert_eval("map SOME [1, 2];", "[SOME 1,SOME 2] : int option list");
}

#[test]
fn exceptions_raise_and_handle() {
    let mut session = Session::new();
    let program = "exception Failure of string;\n\
                   (raise Failure \"nope\") handle Failure s => s;\n";
    let result = shell::run(&mut session, program);
    assert_eq!(result.exit_code, 0, "{}", result.output);
    assert!(
        result.output.ends_with("val it = \"nope\" : string\n"),
        "{}",
        result.output
    );
}

#[test]
fn unmatched_handler_rethrows() {
    let mut session = Session::new();
    let program = "exception A;\nexception B;\n(raise A) handle B => 0;\n";
    let result = shell::run(&mut session, program);
    assert_eq!(result.exit_code, 1, "{}", result.output);
    assert!(result.output.contains("uncaught exception A"), "{}", result.output);
}

#[test]
fn builtin_exceptions() {
    let mut session = Session::new();
    let result = shell::run(&mut session, "1 div 0;\n");
    assert_eq!(result.exit_code, 1);
    assert!(result.output.contains("uncaught exception Div"));

    let mut session = Session::new();
    let result = shell::run(&mut session, "hd [];\n");
    assert_eq!(result.exit_code, 1);
    assert!(result.output.contains("uncaught exception Empty"));

    let mut session = Session::new();
    let result = shell::run(&mut session, "(1 div 0) handle Div => 99;\n");
    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("val it = 99 : int"));
}

#[test]
fn rebinding_exceptions_changes_identity() {
    // The old handler no longer matches a freshly declared E.
    let mut session = Session::new();
    let program = "exception E;\n\
                   val f = fn () => raise E;\n\
                   exception E;\n\
                   (f ()) handle E => 1;\n";
    let result = shell::run(&mut session, program);
    assert_eq!(result.exit_code, 1, "{}", result.output);
}

#[test]
fn evaluation_is_deterministic() {
    let program = "let val xs = [3, 1, 2] in map (fn x => x * x) (rev xs) end;";
    assert_eq!(eval_line(program), eval_line(program));
}

#[test]
fn from_comprehensions() {
    assert_eval("from x in [1, 2, 3] where x > 1;", "[2,3] : int list");
    assert_eval(
        "from x in [1, 2, 3] yield x * 10;",
        "[10,20,30] : int list",
    );
    assert_eval(
        "from x in [1, 2], y in [10, 20] yield x + y;",
        "[11,21,12,22] : int list",
    );
    assert_eval(
        "from x in [1, 2], y in [10, 20];",
        "[{x=1,y=10},{x=1,y=20},{x=2,y=10},{x=2,y=20}] : {x:int, y:int} list",
    );
}

#[test]
fn from_group_computes_aggregates() {
    assert_eval(
        "from x in [1, 1, 2, 2, 2] group x compute count of x;",
        "[{count=2,x=1},{count=3,x=2}] : {count:int, x:int} list",
    );
    assert_eval(
        "from x in [1, 2, 3, 4] group {parity = x mod 2} compute sum of x;",
        "[{parity=1,sum=4},{parity=0,sum=6}] : {parity:int, sum:int} list",
    );
}

#[test]
fn group_keys_need_derivable_labels() {
    let mut session = Session::new();
    let result = shell::run(&mut session, "from x in [1, 2] group x mod 2;\n");
    assert_eq!(result.exit_code, 2, "{}", result.output);
    assert!(result.output.contains("label"), "{}", result.output);
}
