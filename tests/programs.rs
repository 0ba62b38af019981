//! Whole programs run through the public `Interpreter` API.

use pretty_assertions::assert_eq;
use toil::{EnvError, EvalError, Interpreter, Output, ParseError, ToilError, Value};

// Runs `source` in a fresh interpreter, returning the result and printed output
fn run(source: &str) -> (Result<Value, ToilError>, String) {
    let output = Output::buffer();
    let interpreter = Interpreter::with_output(output.clone());
    let result = interpreter.run(source);
    (result, output.contents())
}

fn run_display(source: &str) -> String {
    match run(source).0 {
        Ok(value) => value.to_string(),
        Err(e) => panic!("program failed: {}\n{}", e, source),
    }
}

fn run_error(source: &str) -> ToilError {
    match run(source).0 {
        Ok(value) => panic!("expected an error, got {}\n{}", value, source),
        Err(e) => e,
    }
}

#[test]
fn sieve_of_eratosthenes() {
    let source = "
        sieve := arr(False, False) + arr(True) * 98;
        i := 2; while i * i < 100 do
            if sieve[i] then
                j := i * i; while j < 100 do
                    sieve[j] = False;
                    j = j + i
                end
            end;
            i = i + 1
        end;

        primes := arr();
        i := 0; while i < 100 do
            if sieve[i] then
                push(primes, i)
            end;
            i = i + 1
        end;

        primes
    ";
    assert_eq!(
        run_display(source),
        "[2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97]"
    );
}

#[test]
fn array_library() {
    let interpreter = Interpreter::with_output(Output::buffer());
    let go = |source: &str| match interpreter.run(source) {
        Ok(value) => value.to_string(),
        Err(e) => panic!("{}: {}", source, e),
    };

    assert_eq!(go("arr()"), "[]");
    assert_eq!(go("arr(2)[0]"), "2");
    go("a := arr(2, 3, arr(4, 5))");
    assert_eq!(go("a[2][0]"), "4");
    assert_eq!(go("a[2][-1]"), "5");

    go("d := arr(2, 3, 4)");
    assert_eq!(go("len(d)"), "3");
    assert_eq!(go("slice(d, 1, None)"), "[3, 4]");
    assert_eq!(go("slice(d, 1, 2)"), "[3]");
    assert_eq!(go("slice(d, None, 2)"), "[2, 3]");
    assert_eq!(go("slice(d, None, None)"), "[2, 3, 4]");
    assert_eq!(go("push(d, 5)"), "None");
    assert_eq!(go("d"), "[2, 3, 4, 5]");
    assert_eq!(go("pop(d)"), "5");
    assert_eq!(go("d"), "[2, 3, 4]");

    assert_eq!(go("arr(2, 3) + arr(4, 5)"), "[2, 3, 4, 5]");
    assert_eq!(go("arr(2, 3) * 3"), "[2, 3, 2, 3, 2, 3]");
}

#[test]
fn print_writes_lines_in_order() {
    let (result, output) = run("
        deffunc show params x do print(x, x * 2) end;
        show(1); show(2); print(); print(arr(1, None), True)
    ");
    assert_eq!(result, Ok(Value::Null));
    assert_eq!(output, "1 2\n2 4\n\n[1, None] True\n");
}

#[test]
fn arguments_are_evaluated_left_to_right() {
    let (result, output) = run("
        deffunc noisy params x do print(x); x end;
        noisy(1) - noisy(2) * noisy(3)
    ");
    assert_eq!(result, Ok(Value::Integer(-5)));
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn output_before_an_error_is_kept() {
    let (result, output) = run("print(1); missing; print(2)");
    assert!(matches!(
        result,
        Err(ToilError::Eval(EvalError::EnvError(EnvError::UndefinedVariable(ref name, _)))) if name == "missing"
    ));
    assert_eq!(output, "1\n");
}

#[test]
fn short_circuit_skips_the_right_side() {
    let (result, output) = run("0 and print(1)");
    assert_eq!(result, Ok(Value::Integer(0)));
    assert_eq!(output, "");

    let (result, output) = run("1 or print(1)");
    assert_eq!(result, Ok(Value::Integer(1)));
    assert_eq!(output, "");
}

#[test]
fn arrays_can_contain_themselves() {
    let (result, output) = run("a := arr(1); push(a, a); print(a); print(a[1][1][0]); a == a");
    assert_eq!(result, Ok(Value::Boolean(true)));
    assert_eq!(output, "[1, [...]]\n1\n");
    assert!(matches!(
        run_error("a := arr(1); push(a, a); b := arr(1); push(b, b); a < b"),
        ToilError::Eval(EvalError::InvalidArguments(..))
    ));
}

#[test]
fn long_and_or_chains() {
    let source = vec!["1"; 80].join(" and ") + " or print(0)";
    let (result, output) = run(&source);
    assert_eq!(result, Ok(Value::Integer(1)));
    assert_eq!(output, "");
}

#[test]
fn closures_capture_frames_by_reference() {
    assert_eq!(
        run_display("x := 2; f := func do x end; scope x := 3; f() end"),
        "2"
    );
    assert_eq!(run_display("x := 2; f := func do x end; x = 3; f()"), "3");
}

#[test]
fn closures_keep_private_state() {
    let source = "
        deffunc make_account params balance do
            deposit := func amount do balance = balance + amount end;
            withdraw := func amount do balance = balance - amount end;
            arr(deposit, withdraw)
        end;
        first := make_account(100);
        second := make_account(5);
        first[0](50); first[1](30); second[0](1);
        arr(first[0](0), second[1](0))
    ";
    assert_eq!(run_display(source), "[120, 6]");
}

#[test]
fn higher_order_functions() {
    let source = "
        deffunc map params f, items do
            out := arr();
            i := 0; while i < len(items) do
                push(out, f(items[i]));
                i = i + 1
            end;
            out
        end;
        deffunc compose params f, g do func x do f(g(x)) end end;
        map(compose(func x do x * x end, func x do x + 1 end), arr(1, 2, 3))
    ";
    assert_eq!(run_display(source), "[4, 9, 16]");
}

#[test]
fn recursion() {
    assert_eq!(
        run_display("deffunc fac params n do if n == 0 then 1 else n * fac(n - 1) end end; fac(5)"),
        "120"
    );
    assert_eq!(
        run_display(
            "deffunc is_even params n do if n == 0 then True else is_odd(n - 1) end end;
             deffunc is_odd params n do if n == 0 then False else is_even(n - 1) end end;
             is_even(10)"
        ),
        "True"
    );
}

#[test]
fn chained_assignment() {
    let interpreter = Interpreter::with_output(Output::buffer());
    interpreter.run("a := b := 2").unwrap();
    assert_eq!(interpreter.run("a"), Ok(Value::Integer(2)));
    assert_eq!(interpreter.run("b"), Ok(Value::Integer(2)));
}

#[test]
fn scope_isolation() {
    assert!(matches!(
        run_error("scope y := 1 end; y"),
        ToilError::Eval(EvalError::EnvError(EnvError::UndefinedVariable(..)))
    ));
    assert_eq!(run_display("x := 1; scope x = 5 end; x"), "5");
}

#[test]
fn parse_errors() {
    assert!(matches!(
        run_error("2 3"),
        ToilError::Parse(ParseError::ExtraToken(_))
    ));
    assert!(matches!(
        run_error(""),
        ToilError::Parse(ParseError::UnexpectedEof(_))
    ));
    assert!(matches!(
        run_error("if true then 1"),
        ToilError::Parse(ParseError::UnexpectedEof(_))
    ));
    assert!(matches!(
        run_error("x := 1 $ 2"),
        ToilError::Parse(ParseError::LexerError(_))
    ));
}

#[test]
fn evaluation_errors() {
    assert!(matches!(
        run_error("y = 1"),
        ToilError::Eval(EvalError::EnvError(_))
    ));
    assert!(matches!(
        run_error("2 = 3"),
        ToilError::Eval(EvalError::IllegalAssignTarget(..))
    ));
    assert!(matches!(
        run_error("2[3]"),
        ToilError::Eval(EvalError::IndexTypeError(..))
    ));
    assert!(matches!(
        run_error("d := arr(1); d[None] = 2"),
        ToilError::Eval(EvalError::IndexTypeError(..))
    ));
    assert!(matches!(
        run_error("None[2] = 3"),
        ToilError::Eval(EvalError::IndexTypeError(..))
    ));
    assert!(matches!(
        run_error("arr(1, 2)[2]"),
        ToilError::Eval(EvalError::IndexOutOfRange { index: 2, len: 2, .. })
    ));
    assert!(matches!(
        run_error("5(1)"),
        ToilError::Eval(EvalError::IllegalOperator(..))
    ));
    assert!(matches!(
        run_error("1 + arr()"),
        ToilError::Eval(EvalError::TypeMismatch { .. })
    ));
    assert!(matches!(
        run_error("10 % 0"),
        ToilError::Eval(EvalError::DivisionByZero(_))
    ));
    assert!(matches!(
        run_error("len(1, 2)"),
        ToilError::Eval(EvalError::InvalidArguments(..))
    ));
}

#[test]
fn error_messages_render() {
    assert_eq!(
        run_error("missing + 1").to_string(),
        "Undefined variable: 'missing'"
    );
    assert_eq!(
        run_error("1 / 0").to_string(),
        "Evaluation Error: Division by zero"
    );
}
