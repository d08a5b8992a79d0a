use crate::env::Environment;
use crate::error::{Result, SchemeError};
use crate::eval::{apply_procedure, Continuation, EvalRequest, Evaluator, Outcome, Unwind};
use crate::parser::Datum;
use crate::value::{CompoundProc, Value};
use lazy_static::lazy_static;
use num_bigint::BigInt;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

lazy_static! {
    static ref SPECIAL_FORMS: HashSet<&'static str> = [
        "if",
        "define",
        "set!",
        "begin",
        "cond",
        "let",
        "lambda",
        "quote",
        "and",
        "or",
        "call/cc",
        "call-with-current-continuation",
    ]
    .into_iter()
    .collect();
}

// An analyzed expression. All syntax checking happens while these are built;
// stepping them can only fail on runtime conditions (unbound names, bad
// applications and so on).
pub enum Form {
    SelfEval(Value),
    Variable(String),
    Quote(Value),
    If {
        predicate: Rc<Form>,
        consequent: Rc<Form>,
        alternative: Rc<Form>,
    },
    Lambda {
        parameters: Rc<Vec<String>>,
        body: Rc<Vec<Rc<Form>>>,
    },
    Begin {
        body: Vec<Rc<Form>>,
    },
    Assignment {
        name: String,
        value: Rc<Form>,
    },
    Definition {
        name: String,
        value: Rc<Form>,
    },
    And {
        seq: Vec<Rc<Form>>,
    },
    Or {
        seq: Vec<Rc<Form>>,
    },
    // cond and let are derived forms; they carry their lowered equivalent
    Cond {
        body: Rc<Form>,
    },
    Let {
        app: Rc<Form>,
    },
    CallCc {
        arg: Rc<Form>,
    },
    Application {
        operator: Rc<Form>,
        operands: Vec<Rc<Form>>,
    },
}

// Classifies an atom that stands for itself: integer, real or string.
// Symbols are left to the caller, which either makes a variable reference or
// a symbol value depending on context.
fn self_eval_atom(token: &str) -> Option<Value> {
    if let Ok(n) = token.parse::<BigInt>() {
        return Some(Value::Integer(n));
    }
    if let Ok(x) = token.parse::<f64>() {
        return Some(Value::Real(x));
    }
    if token.len() >= 2 && token.starts_with('"') && token.ends_with('"') {
        return Some(Value::string(&token[1..token.len() - 1]));
    }
    None
}

// Turns a quoted datum into the value it denotes: lists become pair chains,
// atoms become numbers, strings or symbols.
pub fn quote_datum(datum: &Datum) -> Value {
    match datum {
        Datum::Atom(s) => self_eval_atom(s).unwrap_or_else(|| Value::symbol(s)),
        Datum::List(items) => Value::list(items.iter().map(quote_datum).collect::<Vec<_>>()),
    }
}

pub fn analyze(datum: &Datum) -> Result<Rc<Form>> {
    match datum {
        Datum::Atom(s) if !s.is_empty() => Ok(Rc::new(match self_eval_atom(s) {
            Some(value) => Form::SelfEval(value),
            None => Form::Variable(s.clone()),
        })),
        Datum::List(items) if !items.is_empty() => analyze_composite(items),
        _ => Err(SchemeError::UnknownExpression(datum.to_string())),
    }
}

fn analyze_composite(items: &[Datum]) -> Result<Rc<Form>> {
    if let Datum::Atom(head) = &items[0] {
        if SPECIAL_FORMS.contains(head.as_str()) {
            return analyze_special(head, items);
        }
    }
    let operator = analyze(&items[0])?;
    let operands = items[1..].iter().map(analyze).collect::<Result<Vec<_>>>()?;
    Ok(Rc::new(Form::Application { operator, operands }))
}

fn analyze_special(head: &str, items: &[Datum]) -> Result<Rc<Form>> {
    let form = match head {
        "if" => {
            if !(3..=4).contains(&items.len()) {
                return Err(SchemeError::Malformed("if"));
            }
            Form::If {
                predicate: analyze(&items[1])?,
                consequent: analyze(&items[2])?,
                alternative: match items.get(3) {
                    Some(alt) => analyze(alt)?,
                    None => Rc::new(Form::SelfEval(Value::Bool(false))),
                },
            }
        }
        "define" => match items.get(1) {
            Some(Datum::Atom(name)) => {
                if items.len() != 3 {
                    return Err(SchemeError::Malformed("define"));
                }
                Form::Definition {
                    name: name.clone(),
                    value: analyze(&items[2])?,
                }
            }
            // (define (name p...) body...) is sugar for a lambda definition
            Some(Datum::List(signature)) => {
                let (name, parameters) = match signature.split_first() {
                    Some((Datum::Atom(name), rest)) => (name.clone(), rest),
                    _ => return Err(SchemeError::Malformed("define")),
                };
                if items.len() < 3 {
                    return Err(SchemeError::Malformed("define"));
                }
                Form::Definition {
                    name,
                    value: analyze_lambda(parameters, &items[2..])?,
                }
            }
            None => return Err(SchemeError::Malformed("define")),
        },
        "set!" => match (items.len(), items.get(1)) {
            (3, Some(Datum::Atom(name))) => Form::Assignment {
                name: name.clone(),
                value: analyze(&items[2])?,
            },
            _ => return Err(SchemeError::Malformed("assignment")),
        },
        "begin" => {
            if items.len() < 2 {
                return Err(SchemeError::Malformed("begin"));
            }
            Form::Begin {
                body: items[1..].iter().map(analyze).collect::<Result<Vec<_>>>()?,
            }
        }
        "cond" => Form::Cond {
            body: analyze(&expand_cond_clauses(&items[1..])?)?,
        },
        "let" => Form::Let {
            app: analyze(&let_to_application(items)?)?,
        },
        "lambda" => match items.get(1) {
            Some(Datum::List(parameters)) if items.len() >= 3 => {
                return analyze_lambda(parameters, &items[2..]);
            }
            _ => return Err(SchemeError::Malformed("lambda")),
        },
        "quote" => {
            if items.len() != 2 {
                return Err(SchemeError::Malformed("quote"));
            }
            Form::Quote(quote_datum(&items[1]))
        }
        "and" => Form::And {
            seq: items[1..].iter().map(analyze).collect::<Result<Vec<_>>>()?,
        },
        "or" => Form::Or {
            seq: items[1..].iter().map(analyze).collect::<Result<Vec<_>>>()?,
        },
        "call/cc" | "call-with-current-continuation" => {
            if items.len() != 2 {
                return Err(SchemeError::Eval(
                    "call/cc take exactly one argument".to_string(),
                ));
            }
            Form::CallCc {
                arg: analyze(&items[1])?,
            }
        }
        _ => unreachable!("head checked against the keyword table"),
    };
    Ok(Rc::new(form))
}

fn analyze_lambda(parameters: &[Datum], body: &[Datum]) -> Result<Rc<Form>> {
    let parameters = parameters
        .iter()
        .map(|p| match p {
            Datum::Atom(name) => Ok(name.clone()),
            Datum::List(_) => Err(SchemeError::Malformed("lambda")),
        })
        .collect::<Result<Vec<_>>>()?;
    let body = body.iter().map(analyze).collect::<Result<Vec<_>>>()?;
    Ok(Rc::new(Form::Lambda {
        parameters: Rc::new(parameters),
        body: Rc::new(body),
    }))
}

// Converts cond clauses into a right-associated chain of ifs, still at the
// datum level. The chain is analyzed afterwards like any handwritten if.
fn expand_cond_clauses(clauses: &[Datum]) -> Result<Datum> {
    fn seq_to_datum(seq: &[Datum]) -> Datum {
        match seq {
            [] => Datum::Atom("#t".to_string()),
            [single] => single.clone(),
            _ => {
                let mut body = vec![Datum::Atom("begin".to_string())];
                body.extend(seq.iter().cloned());
                Datum::List(body)
            }
        }
    }

    let (first, rest) = match clauses.split_first() {
        Some(split) => split,
        None => return Ok(Datum::Atom("#f".to_string())),
    };
    let clause = match first {
        Datum::List(clause) => clause,
        Datum::Atom(_) => return Err(SchemeError::Malformed("cond")),
    };
    let (predicate, actions) = clause
        .split_first()
        .ok_or(SchemeError::Malformed("cond"))?;

    if matches!(predicate, Datum::Atom(a) if a == "else") {
        if !rest.is_empty() {
            return Err(SchemeError::Eval(
                "ELSE clause is not last -- COND->IF".to_string(),
            ));
        }
        return Ok(seq_to_datum(actions));
    }

    Ok(Datum::List(vec![
        Datum::Atom("if".to_string()),
        predicate.clone(),
        seq_to_datum(actions),
        expand_cond_clauses(rest)?,
    ]))
}

// (let ((name value)...) body...) => ((lambda (name...) body...) value...)
fn let_to_application(items: &[Datum]) -> Result<Datum> {
    if items.len() < 3 {
        return Err(SchemeError::Malformed("let"));
    }
    let bindings = match &items[1] {
        Datum::List(bindings) => bindings,
        Datum::Atom(_) => return Err(SchemeError::Malformed("let")),
    };
    let mut names = Vec::with_capacity(bindings.len());
    let mut values = Vec::with_capacity(bindings.len());
    for binding in bindings {
        match binding {
            Datum::List(pair) if pair.len() == 2 => {
                names.push(pair[0].clone());
                values.push(pair[1].clone());
            }
            _ => return Err(SchemeError::Malformed("let")),
        }
    }
    let mut lambda = vec![Datum::Atom("lambda".to_string()), Datum::List(names)];
    lambda.extend(items[2..].iter().cloned());
    let mut application = vec![Datum::List(lambda)];
    application.extend(values);
    Ok(Datum::List(application))
}

// Builds the request for element `idx` of an and/or chain. The last element
// runs in tail position; earlier ones come back through resume so the chain
// can short-circuit.
fn short_circuit_request(
    seq: &[Rc<Form>],
    idx: usize,
    env: &Rc<RefCell<Environment>>,
) -> EvalRequest {
    let mut request = EvalRequest::single(&seq[idx], env);
    request.as_value = idx + 1 == seq.len();
    request.aux = Some(idx);
    request
}

impl Form {
    // First evaluation step. Either produces the value outright or returns a
    // request for the sub-expressions this form needs evaluated.
    pub(crate) fn step(
        &self,
        env: &Rc<RefCell<Environment>>,
        _evaluator: &mut Evaluator,
    ) -> std::result::Result<Outcome, Unwind> {
        match self {
            Form::SelfEval(value) | Form::Quote(value) => Ok(Outcome::Value(value.clone())),
            Form::Variable(name) => {
                let value = env
                    .borrow()
                    .lookup(name)
                    .ok_or_else(|| SchemeError::UnboundVariable(name.clone()))?;
                Ok(Outcome::Value(value))
            }
            Form::If { predicate, .. } => Ok(Outcome::Request(EvalRequest::single(predicate, env))),
            Form::Lambda { parameters, body } => {
                Ok(Outcome::Value(Value::Compound(Rc::new(CompoundProc {
                    parameters: Rc::clone(parameters),
                    body: Rc::clone(body),
                    env: Rc::clone(env),
                    name: RefCell::new(None),
                }))))
            }
            Form::Begin { body } => Ok(Outcome::Request(EvalRequest::new(body, env, true))),
            Form::Assignment { value, .. } | Form::Definition { value, .. } => {
                Ok(Outcome::Request(EvalRequest::single(value, env)))
            }
            Form::And { seq } => match seq.first() {
                None => Ok(Outcome::Value(Value::Bool(true))),
                Some(_) => Ok(Outcome::Request(short_circuit_request(seq, 0, env))),
            },
            Form::Or { seq } => match seq.first() {
                None => Ok(Outcome::Value(Value::Bool(false))),
                Some(_) => Ok(Outcome::Request(short_circuit_request(seq, 0, env))),
            },
            Form::Cond { body } => Ok(Outcome::Request(EvalRequest::tail(body, env))),
            Form::Let { app } => Ok(Outcome::Request(EvalRequest::tail(app, env))),
            Form::CallCc { arg } => Ok(Outcome::Request(EvalRequest::single(arg, env))),
            Form::Application { operator, operands } => {
                let mut forms = Vec::with_capacity(operands.len() + 1);
                forms.push(Rc::clone(operator));
                forms.extend(operands.iter().cloned());
                Ok(Outcome::Request(EvalRequest::new(&forms, env, false)))
            }
        }
    }

    // Continuation step: the trampoline hands back the finished request.
    pub(crate) fn resume(
        &self,
        request: EvalRequest,
        evaluator: &mut Evaluator,
    ) -> std::result::Result<Outcome, Unwind> {
        let env = Rc::clone(&request.env);
        match self {
            Form::If {
                consequent,
                alternative,
                ..
            } => {
                let chosen = if request.into_value()?.is_true() {
                    consequent
                } else {
                    alternative
                };
                Ok(Outcome::Request(EvalRequest::tail(chosen, &env)))
            }
            Form::Assignment { name, .. } => {
                let value = request.into_value()?;
                env.borrow_mut().set(name, value)?;
                Ok(Outcome::Value(Value::Nil))
            }
            Form::Definition { name, .. } => {
                let value = request.into_value()?;
                if let Value::Compound(proc) = &value {
                    let mut slot = proc.name.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(name.clone());
                    }
                }
                env.borrow_mut().define(name.clone(), value);
                Ok(Outcome::Value(Value::Nil))
            }
            Form::And { seq } => {
                let idx = request.aux.unwrap_or(0);
                let value = request.into_value()?;
                if value.is_false() || idx + 1 >= seq.len() {
                    Ok(Outcome::Value(value))
                } else {
                    Ok(Outcome::Request(short_circuit_request(seq, idx + 1, &env)))
                }
            }
            Form::Or { seq } => {
                let idx = request.aux.unwrap_or(0);
                let value = request.into_value()?;
                if value.is_true() || idx + 1 >= seq.len() {
                    Ok(Outcome::Value(value))
                } else {
                    Ok(Outcome::Request(short_circuit_request(seq, idx + 1, &env)))
                }
            }
            Form::CallCc { .. } => {
                let proc = request.into_value()?;
                if !proc.is_procedure() {
                    return Err(SchemeError::Eval(
                        "call/cc should take a procedure".to_string(),
                    )
                    .into());
                }
                let snapshot = evaluator.take_snapshot();
                let k = Value::Continuation(Rc::new(Continuation::new(snapshot)));
                apply_procedure(proc, vec![k], &env, evaluator)
            }
            Form::Application { .. } => {
                let mut values = request.into_values()?;
                let proc = values.remove(0);
                apply_procedure(proc, values, &env, evaluator)
            }
            _ => Err(SchemeError::Eval(
                "expression resumed without a pending request".to_string(),
            )
            .into()),
        }
    }
}
