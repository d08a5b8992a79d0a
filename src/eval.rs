use crate::builtins;
use crate::env::Environment;
use crate::error::{Result, SchemeError};
use crate::ext::Extension;
use crate::form::{analyze, Form};
use crate::parser;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

const STDLIB: &str = include_str!("stdlib.scm");

// What a single evaluation step produced: either a finished value, or a
// request for sub-expressions that the trampoline should evaluate first.
pub enum Outcome {
    Value(Value),
    Request(EvalRequest),
}

// Non-local exits threaded through the trampoline. Continuation invocation
// rides the same channel as errors but is caught by the evaluator loop and
// never surfaces to callers.
pub enum Unwind {
    Error(SchemeError),
    ContinuationInvoked(Rc<Continuation>, Value),
}

impl From<SchemeError> for Unwind {
    fn from(e: SchemeError) -> Self {
        Unwind::Error(e)
    }
}

#[derive(Clone)]
pub(crate) enum Slot {
    Pending(Rc<Form>),
    Done(Value),
}

// One in-progress frame of the work stack: a sequence of sub-expressions
// being evaluated left to right for some caller form. Cloning a request
// duplicates its slot vector but shares forms and environments, which is
// exactly the copy depth continuation snapshots need.
#[derive(Clone)]
pub struct EvalRequest {
    pub(crate) seq: Vec<Slot>,
    pub(crate) env: Rc<RefCell<Environment>>,
    // index of the most recently completed slot
    idx: Option<usize>,
    caller: Option<Rc<Form>>,
    // when set, the last sub-form is stepped in place of this frame (TCO)
    pub(crate) as_value: bool,
    // short-circuit position for and/or
    pub(crate) aux: Option<usize>,
}

impl EvalRequest {
    pub fn new(forms: &[Rc<Form>], env: &Rc<RefCell<Environment>>, as_value: bool) -> Self {
        EvalRequest {
            seq: forms.iter().map(|f| Slot::Pending(Rc::clone(f))).collect(),
            env: Rc::clone(env),
            idx: None,
            caller: None,
            as_value,
            aux: None,
        }
    }

    pub fn single(form: &Rc<Form>, env: &Rc<RefCell<Environment>>) -> Self {
        Self::new(std::slice::from_ref(form), env, false)
    }

    // A request whose single form sits in tail position.
    pub fn tail(form: &Rc<Form>, env: &Rc<RefCell<Environment>>) -> Self {
        Self::new(std::slice::from_ref(form), env, true)
    }

    fn pending(&self, idx: usize) -> Result<Rc<Form>> {
        match &self.seq[idx] {
            Slot::Pending(form) => Ok(Rc::clone(form)),
            Slot::Done(_) => Err(SchemeError::Eval("evaluator stack corrupted".to_string())),
        }
    }

    pub(crate) fn into_values(self) -> Result<Vec<Value>> {
        self.seq
            .into_iter()
            .map(|slot| match slot {
                Slot::Done(value) => Ok(value),
                Slot::Pending(_) => {
                    Err(SchemeError::Eval("evaluator stack corrupted".to_string()))
                }
            })
            .collect()
    }

    pub(crate) fn into_value(self) -> Result<Value> {
        self.into_values()?
            .pop()
            .ok_or_else(|| SchemeError::Eval("evaluator stack corrupted".to_string()))
    }
}

#[derive(Clone)]
pub(crate) enum WorkItem {
    Form(Rc<Form>),
    Request(EvalRequest),
}

// A reified copy of the work stack, taken when call/cc captures the current
// continuation. Environments are shared on purpose: a resumed continuation
// observes assignments made since the capture.
pub struct Continuation {
    snapshot: Vec<WorkItem>,
}

impl Continuation {
    pub(crate) fn new(snapshot: Vec<WorkItem>) -> Self {
        Continuation { snapshot }
    }

    // Every restore hands out a fresh copy so the continuation stays
    // invokable any number of times.
    fn replay(&self) -> Vec<WorkItem> {
        self.snapshot.clone()
    }
}

pub struct Evaluator {
    stack: Vec<WorkItem>,
    global_env: Rc<RefCell<Environment>>,
    extensions: HashMap<String, Box<dyn Extension>>,
}

impl Evaluator {
    pub fn new() -> Self {
        let mut evaluator = Evaluator {
            stack: Vec::new(),
            global_env: Rc::new(RefCell::new(Environment::new())),
            extensions: HashMap::new(),
        };
        evaluator.setup_global_env();
        evaluator
    }

    fn setup_global_env(&mut self) {
        {
            let mut env = self.global_env.borrow_mut();
            builtins::populate_environment(&mut env);
            env.extend([
                ("true".to_string(), Value::Bool(true)),
                ("false".to_string(), Value::Bool(false)),
                ("#t".to_string(), Value::Bool(true)),
                ("#f".to_string(), Value::Bool(false)),
                ("nil".to_string(), Value::Nil),
            ]);
        }
        // the embedded prelude only uses primitives, so this cannot fail
        self.eval(STDLIB)
            .expect("standard library should evaluate cleanly");
        tracing::debug!("global environment ready");
    }

    pub fn global_env(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.global_env)
    }

    // Evaluates one or more expressions, each starting from the global
    // environment; the value of the last one is returned.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let mut result = Value::Nil;
        for datum in parser::parse_all(source)? {
            result = self.run(analyze(&datum)?)?;
        }
        Ok(result)
    }

    // Evaluates a single already-parsed expression; the REPL reads one datum
    // per interaction and feeds it through here.
    pub fn eval_datum(&mut self, datum: &parser::Datum) -> Result<Value> {
        self.run(analyze(datum)?)
    }

    // Executes a script in the global environment.
    pub fn load_file(&mut self, path: &str) -> Result<Value> {
        tracing::debug!(%path, "loading script");
        let source = read_script(path)?;
        self.eval(&source)
    }

    pub fn register_extension(&mut self, name: impl Into<String>, extension: Box<dyn Extension>) {
        let name = name.into();
        tracing::debug!(%name, "extension registered");
        self.extensions.insert(name, extension);
    }

    pub(crate) fn load_extension(&self, name: &str) -> Result<()> {
        let extension = self
            .extensions
            .get(name)
            .ok_or_else(|| SchemeError::Eval("Wrong extension name".to_string()))?;
        extension.setup(&self.global_env)
    }

    // Throws away all evaluation state and rebuilds the global environment.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.global_env = Rc::new(RefCell::new(Environment::new()));
        self.setup_global_env();
    }

    // Runs one top-level form to completion, restarting the trampoline
    // whenever a continuation is invoked.
    fn run(&mut self, form: Rc<Form>) -> Result<Value> {
        self.stack.clear();
        self.stack.push(WorkItem::Form(form));
        let mut resumed = None;
        loop {
            match self.trampoline(resumed.take()) {
                Ok(value) => return Ok(value),
                Err(Unwind::Error(e)) => {
                    self.stack.clear();
                    return Err(e);
                }
                Err(Unwind::ContinuationInvoked(k, value)) => {
                    tracing::trace!("restoring continuation snapshot");
                    self.stack = k.replay();
                    resumed = Some(value);
                }
            }
        }
    }

    // The iterative driver. Forms are stepped, requests collect the results
    // of their sub-forms, and tail positions replace their frame instead of
    // growing the stack.
    fn trampoline(&mut self, resumed: Option<Value>) -> std::result::Result<Value, Unwind> {
        let mut env = Rc::clone(&self.global_env);
        let mut ret = resumed;

        while let Some(item) = self.stack.pop() {
            match item {
                WorkItem::Form(form) => {
                    let outcome = form.step(&env, self)?;
                    self.dispatch(outcome, form, &mut env, &mut ret);
                }
                WorkItem::Request(mut request) => {
                    if let Some(done) = request.idx {
                        // retrieve the sub-result produced by the last step
                        let value = ret.take().ok_or_else(stack_corrupted)?;
                        request.seq[done] = Slot::Done(value);
                    }
                    let next = request.idx.map_or(0, |i| i + 1);
                    let is_tail = request.as_value && next + 1 == request.seq.len();

                    if next < request.seq.len() && !is_tail {
                        request.idx = Some(next);
                        let form = request.pending(next)?;
                        env = Rc::clone(&request.env);
                        self.stack.push(WorkItem::Request(request));
                        self.stack.push(WorkItem::Form(form));
                    } else if is_tail {
                        // Skip evaluating the last expression inside this
                        // frame; it becomes the value of the caller. This is
                        // what keeps tail calls from growing the stack.
                        let form = request.pending(next)?;
                        let tail_env = Rc::clone(&request.env);
                        let outcome = form.step(&tail_env, self)?;
                        self.dispatch(outcome, form, &mut env, &mut ret);
                    } else {
                        // request finished; hand the results to the caller
                        let caller = request.caller.clone().ok_or_else(stack_corrupted)?;
                        let outcome = caller.resume(request, self)?;
                        self.dispatch(outcome, caller, &mut env, &mut ret);
                    }
                }
            }
        }
        ret.ok_or_else(|| stack_corrupted().into())
    }

    fn dispatch(
        &mut self,
        outcome: Outcome,
        caller: Rc<Form>,
        env: &mut Rc<RefCell<Environment>>,
        ret: &mut Option<Value>,
    ) {
        match outcome {
            Outcome::Value(value) => *ret = Some(value),
            Outcome::Request(mut request) => {
                request.caller = Some(caller);
                *env = Rc::clone(&request.env);
                self.stack.push(WorkItem::Request(request));
            }
        }
    }

    pub(crate) fn take_snapshot(&self) -> Vec<WorkItem> {
        self.stack.clone()
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn stack_corrupted() -> SchemeError {
    SchemeError::Eval("evaluator stack corrupted".to_string())
}

// Applies any kind of procedure to already-evaluated arguments. Compound
// procedures come back as a body request in tail position, so calls replace
// the current frame rather than nest.
pub(crate) fn apply_procedure(
    proc: Value,
    args: Vec<Value>,
    env: &Rc<RefCell<Environment>>,
    evaluator: &mut Evaluator,
) -> std::result::Result<Outcome, Unwind> {
    match proc {
        Value::Primitive(p) => (p.imp)(&args, env, evaluator).map_err(|unwind| match unwind {
            Unwind::Error(e) if p.err_msg_name => {
                Unwind::Error(SchemeError::Eval(format!("{} -- {}", e, p.name)))
            }
            other => other,
        }),
        Value::Compound(p) => {
            if p.parameters.len() != args.len() {
                let shown = Value::Compound(Rc::clone(&p)).to_string();
                return Err(SchemeError::WrongNumberOfArgs(shown).into());
            }
            let mut frame = Environment::new_child(Rc::clone(&p.env));
            for (parameter, arg) in p.parameters.iter().zip(args) {
                frame.define(parameter.clone(), arg);
            }
            let frame = Rc::new(RefCell::new(frame));
            Ok(Outcome::Request(EvalRequest::new(&p.body, &frame, true)))
        }
        Value::Continuation(k) => {
            if args.len() > 1 {
                return Err(
                    SchemeError::Eval("Too many argument for continuation".to_string()).into(),
                );
            }
            let value = args.into_iter().next().unwrap_or(Value::Nil);
            Err(Unwind::ContinuationInvoked(k, value))
        }
        other => Err(SchemeError::UnknownProcedure(other.to_string()).into()),
    }
}

// Reads a script from disk, appending the conventional extension when it is
// missing. The file is fully consumed before anything gets evaluated.
pub(crate) fn read_script(path: &str) -> Result<String> {
    let path = if path.ends_with(".scm") {
        path.to_string()
    } else {
        format!("{}.scm", path)
    };
    fs::read_to_string(&path)
        .map_err(|e| SchemeError::Eval(format!("cannot load {}: {}", path, e)))
}
