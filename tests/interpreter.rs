use pretty_assertions::assert_eq;
use toyscheme::{Evaluator, SchemeError, Value};

fn ev(evaluator: &mut Evaluator, source: &str) -> Value {
    evaluator.eval(source).unwrap()
}

fn err(evaluator: &mut Evaluator, source: &str) -> String {
    evaluator.eval(source).unwrap_err().to_string()
}

#[test]
fn lambda_application() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "((lambda (a b) b a) 33 44)"), ev(&mut e, "33"));
    // procedure applied as operator
    assert_eq!(ev(&mut e, "(((lambda (x) x) +) 1)"), ev(&mut e, "1"));
    assert_eq!(ev(&mut e, "((lambda () 7))"), ev(&mut e, "7"));
}

#[test]
fn define_and_set() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define aa 1)");
    assert_eq!(ev(&mut e, "aa"), ev(&mut e, "1"));
    ev(&mut e, "(define (func a) (- a 2))");
    assert_eq!(ev(&mut e, "(func 909)"), ev(&mut e, "907"));
    ev(&mut e, "(set! aa 2)");
    assert_eq!(ev(&mut e, "aa"), ev(&mut e, "2"));
}

#[test]
fn define_names_its_procedure() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define (fib n) n)");
    assert_eq!(
        ev(&mut e, "fib").to_string(),
        "<compound-procedure fib (param: n)>"
    );
    ev(&mut e, "(define thunk (lambda () 1))");
    assert_eq!(
        ev(&mut e, "thunk").to_string(),
        "<compound-procedure thunk (no-param)>"
    );
}

#[test]
fn if_branches() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(if true -2 3)"), ev(&mut e, "-2"));
    assert_eq!(ev(&mut e, "(if #f 1 2)"), ev(&mut e, "2"));
    // missing alternative defaults to false
    assert_eq!(ev(&mut e, "(if #f 1)"), Value::Bool(false));
}

#[test]
fn cond_clauses() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define aa 3)");
    assert_eq!(
        ev(&mut e, "(cond ((= aa 0) 1) ((= aa 1) 2) (else 3))"),
        ev(&mut e, "3")
    );
    // without else clause
    assert_eq!(ev(&mut e, "(cond (#t 1))"), ev(&mut e, "1"));
    // empty cond and empty clause body
    assert_eq!(ev(&mut e, "(cond)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(cond ((= 1 1)))"), Value::Bool(true));
}

#[test]
fn cond_matches_expanded_if_chain() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define aa 1)");
    assert_eq!(
        ev(&mut e, "(cond ((= aa 0) 1) ((= aa 1) 2) (else 3))"),
        ev(&mut e, "(if (= aa 0) 1 (if (= aa 1) 2 3))")
    );
}

#[test]
fn begin_returns_last() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(begin 1 2 3)"), ev(&mut e, "3"));
}

#[test]
fn recursion() {
    let mut e = Evaluator::new();
    ev(&mut e,
       "(define (func n)\
          (if (< n 5)\
              (func (+ n 1))\
              n))");
    assert_eq!(ev(&mut e, "(func 0)"), ev(&mut e, "5"));

    ev(&mut e,
       "(define (fib n)\
          (cond ((= n 0) 0)\
                ((= n 1) 1)\
                (else (+ (fib (- n 1))\
                         (fib (- n 2))))))");
    assert_eq!(ev(&mut e, "(fib 5)"), ev(&mut e, "5"));
    assert_eq!(ev(&mut e, "(fib 8)"), ev(&mut e, "21"));
}

#[test]
fn pairs() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(car (cdr (cons 3 (cons 1 2))))"), ev(&mut e, "1"));
    assert_eq!(ev(&mut e, "(cons 1 (cons 2 3))").to_string(), "(1 2 . 3)");
    assert_eq!(ev(&mut e, "(list 1 2 3)").to_string(), "(1 2 3)");
}

#[test]
fn pair_mutation() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define p (cons 1 2))");
    ev(&mut e, "(set-car! p 9)");
    assert_eq!(ev(&mut e, "(car p)"), ev(&mut e, "9"));
    assert_eq!(ev(&mut e, "(cdr p)"), ev(&mut e, "2"));
    ev(&mut e, "(set-cdr! p (list 5))");
    assert_eq!(ev(&mut e, "p").to_string(), "(9 5)");
}

#[test]
fn quote() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(quote ())"), ev(&mut e, "nil"));
    assert_eq!(ev(&mut e, "'sym"), Value::symbol("sym"));
    assert_eq!(ev(&mut e, "'(1 2 (3))").to_string(), "(1 2 (3))");
    // quoted structure survives analysis and evaluation untouched
    assert_eq!(ev(&mut e, "(car '(a b))"), Value::symbol("a"));
}

#[test]
fn and_or_short_circuit() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define modified 0)");
    ev(&mut e, "(define (aa) (set! modified 1))");
    ev(&mut e, "(or 1 (aa))");
    assert_eq!(ev(&mut e, "modified"), ev(&mut e, "0"));
    ev(&mut e, "(and 1 (aa) 2)");
    assert_eq!(ev(&mut e, "modified"), ev(&mut e, "1"));
}

#[test]
fn and_or_values() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(and)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(or)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(and 1 2 3)"), ev(&mut e, "3"));
    assert_eq!(ev(&mut e, "(or #f 2 3)"), ev(&mut e, "2"));
    assert_eq!(ev(&mut e, "(and 1 #f 3)"), Value::Bool(false));
}

#[test]
fn let_bindings() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(let ((x 10) (xx 73)) (+ x xx))"), ev(&mut e, "83"));
    // let is the same application of a lambda written by hand
    assert_eq!(
        ev(&mut e, "(let ((x 5)) (* x x))"),
        ev(&mut e, "((lambda (x) (* x x)) 5)")
    );
}

#[test]
fn lexical_scope() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "((lambda (x) ((lambda (x) x) 2)) 1)"), ev(&mut e, "2"));
    assert_eq!(ev(&mut e, "(((lambda (x) (lambda (y) x)) 1) 2)"), ev(&mut e, "1"));
}

#[test]
fn prim_apply() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(apply + (list 1 2))"), ev(&mut e, "3"));
    assert_eq!(
        ev(&mut e, "(apply (lambda (a b) (* a b)) '(6 7))"),
        ev(&mut e, "42")
    );
    assert_eq!(err(&mut e, "(apply + 1)"), "Arguments should be a list -- apply");
}

#[test]
fn continuations() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(call/cc (lambda (cont) (cont 1)))"), ev(&mut e, "1"));
    // continuation escapes the surrounding computation
    assert_eq!(
        ev(&mut e, "(+ 1 (call/cc (lambda (k) (+ 100 (k 10)))))"),
        ev(&mut e, "11")
    );
    // value of the body when the continuation is never invoked
    assert_eq!(ev(&mut e, "(call/cc (lambda (k) 42))"), ev(&mut e, "42"));
    // left identity over different value kinds
    assert_eq!(
        ev(&mut e, "(call/cc (lambda (k) (k \"s\")))"),
        Value::string("s")
    );
    assert_eq!(
        ev(&mut e, "(call/cc (lambda (k) (k '(1 2))))").to_string(),
        "(1 2)"
    );

    ev(&mut e, "(define (a) (call/cc (lambda (c) (c 1))))");
    assert_eq!(ev(&mut e, "(a)"), ev(&mut e, "1"));

    assert_eq!(
        err(&mut e, "(call/cc 1)"),
        "call/cc should take a procedure"
    );
    assert_eq!(
        err(&mut e, "(call/cc (lambda (k) (k 1 2)))"),
        "Too many argument for continuation"
    );
}

#[test]
fn alias_call_with_current_continuation() {
    let mut e = Evaluator::new();
    assert_eq!(
        ev(&mut e, "(call-with-current-continuation (lambda (k) (k 5)))"),
        ev(&mut e, "5")
    );
}

#[test]
fn arithmetic() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(+)"), ev(&mut e, "0"));
    assert_eq!(ev(&mut e, "(+ 1 2 3)"), ev(&mut e, "6"));
    assert_eq!(ev(&mut e, "(- 3)"), ev(&mut e, "-3"));
    assert_eq!(ev(&mut e, "(- 10 1 2)"), ev(&mut e, "7"));
    assert_eq!(ev(&mut e, "(* 2 3 4)"), ev(&mut e, "24"));
    assert_eq!(ev(&mut e, "(/ 1 2)"), Value::Real(0.5));
    assert_eq!(ev(&mut e, "(/ 4 2)").to_string(), "2.0");
    // reducing over a single operand returns it unchanged
    assert_eq!(ev(&mut e, "(/ 2)"), ev(&mut e, "2"));
    assert_eq!(ev(&mut e, "(min 3 1 2)"), ev(&mut e, "1"));
    assert_eq!(ev(&mut e, "(max 1 2.5 2)"), Value::Real(2.5));
    assert_eq!(ev(&mut e, "(modulo 7 3)"), ev(&mut e, "1"));
    assert_eq!(ev(&mut e, "(modulo -7 3)"), ev(&mut e, "2"));
    assert_eq!(ev(&mut e, "(modulo 7 -3)"), ev(&mut e, "-2"));
    assert_eq!(err(&mut e, "(/ 1 0)"), "division by zero -- /");
    assert_eq!(err(&mut e, "(-)"), "Too few arguments -- -");
}

#[test]
fn mixed_numeric_tower() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(+ 1 1.5)"), Value::Real(2.5));
    assert_eq!(ev(&mut e, "(= 1 1.0)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(< 1 2 3)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(< 1 3 2)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(<= 1 1 2)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(>= 3 3 1)"), Value::Bool(true));
}

#[test]
fn big_integers_stay_exact() {
    let mut e = Evaluator::new();
    ev(&mut e,
       "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
    assert_eq!(
        ev(&mut e, "(fact 30)"),
        ev(&mut e, "265252859812191058636308480000000")
    );
}

#[test]
fn equality_and_predicates() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(eq? '(1 2) '(1 2))"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(eq? \"ab\" \"ab\")"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(eq? 'a 'b)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(not #f)"), Value::Bool(true));
    // everything except #f is truthy
    assert_eq!(ev(&mut e, "(not 0)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(not nil)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(null? nil)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(pair? (cons 1 2))"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(symbol? 'a)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(string? \"a\")"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(number? 1.5)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(integer? 1)"), Value::Bool(true));
    assert_eq!(ev(&mut e, "(real? 1)"), Value::Bool(false));
    assert_eq!(ev(&mut e, "(boolean? #t)"), Value::Bool(true));
}

#[test]
fn error_messages() {
    let mut e = Evaluator::new();
    assert_eq!(err(&mut e, "missing"), "Unbound variable (missing)");
    assert_eq!(err(&mut e, "(set! nope 1)"), "Setting unbound variable (nope)");
    assert_eq!(err(&mut e, "(car 1)"), "Not a pair -- car");
    assert_eq!(err(&mut e, "(1 2)"), "Unknown procedure type -- APPLY (1)");
    assert_eq!(
        err(&mut e, "((lambda (x) x))"),
        "Wrong number of args -- APPLY (<compound-procedure (param: x)>)"
    );
    assert_eq!(err(&mut e, "(car)"), "take exactly 1 argument -- car");
    // error speaks verbatim, without a primitive-name suffix
    assert_eq!(err(&mut e, "(error \"boom\" 42)"), "boom 42");
    assert!(matches!(
        e.eval("(if 1)").unwrap_err(),
        SchemeError::Malformed("if")
    ));
}

#[test]
fn stdlib_procedures() {
    let mut e = Evaluator::new();
    assert_eq!(ev(&mut e, "(length '(a b c))"), ev(&mut e, "3"));
    assert_eq!(ev(&mut e, "(map (lambda (x) (* x x)) '(1 2 3))").to_string(), "(1 4 9)");
    assert_eq!(ev(&mut e, "(append '(1 2) '(3))").to_string(), "(1 2 3)");
    assert_eq!(
        ev(&mut e, "(filter (lambda (x) (< x 3)) '(1 5 2 7))").to_string(),
        "(1 2)"
    );
    assert_eq!(ev(&mut e, "(reverse '(1 2 3))").to_string(), "(3 2 1)");
    assert_eq!(ev(&mut e, "(cadr '(1 2 3))"), ev(&mut e, "2"));
    assert_eq!(ev(&mut e, "(caddr '(1 2 3))"), ev(&mut e, "3"));
    assert_eq!(ev(&mut e, "(abs -4)"), ev(&mut e, "4"));
}

#[test]
fn eval_agrees_with_eval_of_parsed_datum() {
    let mut e = Evaluator::new();
    let datum = toyscheme::parser::parse("(let ((x 2)) (* x 21))").unwrap();
    assert_eq!(e.eval_datum(&datum).unwrap(), ev(&mut e, "(let ((x 2)) (* x 21))"));
}

#[test]
fn reset_rebuilds_the_global_environment() {
    let mut e = Evaluator::new();
    ev(&mut e, "(define zz 1)");
    e.reset();
    assert!(e.eval("zz").is_err());
    // primitives and stdlib survive the rebuild
    assert_eq!(ev(&mut e, "(length '(1 2))"), ev(&mut e, "2"));
}
