use crate::env::Environment;
use crate::eval::{Continuation, Evaluator, Outcome, Unwind};
use crate::form::Form;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// Type alias for primitive implementations. Every primitive receives the
// evaluated arguments, the environment of the call site and the evaluator
// itself, so that primitives like `apply` and `load` can hand work back to
// the trampoline.
pub type PrimitiveFn =
    fn(&[Value], &Rc<RefCell<Environment>>, &mut Evaluator) -> PrimitiveResult;

pub type PrimitiveResult = std::result::Result<Outcome, Unwind>;

#[derive(Clone)]
pub enum Value {
    Integer(BigInt),
    Real(f64),
    Str(Rc<str>),
    Bool(bool),
    Symbol(Rc<str>),
    Nil,
    Pair(Rc<RefCell<Pair>>), // Rc for sharing, RefCell for set-car!/set-cdr!
    Primitive(Rc<Primitive>),
    Compound(Rc<CompoundProc>),
    Continuation(Rc<Continuation>),
}

// A mutable cons cell. The cdr chain need not be nil-terminated, and cells
// may form cycles once set-cdr! gets involved.
#[derive(Clone)]
pub struct Pair {
    pub car: Value,
    pub cdr: Value,
}

pub struct Primitive {
    pub name: &'static str,
    pub imp: PrimitiveFn,
    // When set, errors raised by the implementation get " -- name" appended.
    pub err_msg_name: bool,
}

pub struct CompoundProc {
    pub parameters: Rc<Vec<String>>,
    pub body: Rc<Vec<Rc<Form>>>, // already analyzed
    pub env: Rc<RefCell<Environment>>,
    pub name: RefCell<Option<String>>, // assigned once by the define form
}

impl Value {
    pub fn symbol(name: &str) -> Self {
        Value::Symbol(name.into())
    }

    pub fn string(contents: &str) -> Self {
        Value::Str(contents.into())
    }

    pub fn cons(car: Value, cdr: Value) -> Self {
        Value::Pair(Rc::new(RefCell::new(Pair { car, cdr })))
    }

    // Builds a proper list: a right-nested pair chain terminated by Nil.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: DoubleEndedIterator,
    {
        items
            .into_iter()
            .rev()
            .fold(Value::Nil, |tail, item| Value::cons(item, tail))
    }

    pub fn primitive(name: &'static str, imp: PrimitiveFn) -> Self {
        Value::Primitive(Rc::new(Primitive {
            name,
            imp,
            err_msg_name: true,
        }))
    }

    // Only the false singleton is false; everything else is truthy.
    pub fn is_true(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_procedure(&self) -> bool {
        matches!(
            self,
            Value::Primitive(_) | Value::Compound(_) | Value::Continuation(_)
        )
    }

    // Flattens a proper list into a vector; None for anything improper.
    pub fn list_to_vec(&self) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut current = self.clone();
        loop {
            match current {
                Value::Nil => return Some(items),
                Value::Pair(cell) => {
                    let (car, cdr) = {
                        let pair = cell.borrow();
                        (pair.car.clone(), pair.cdr.clone())
                    };
                    items.push(car);
                    current = cdr;
                }
                _ => return None,
            }
        }
    }
}

// Structural equality: numbers by value (across integer/real), strings by
// contents, symbols by name, pairs recursively, procedures and continuations
// by identity. A pair of cells already under comparison is treated as equal,
// which keeps cyclic structures from hanging the walk.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut seen = Vec::new();
        structural_eq(self, other, &mut seen)
    }
}

fn structural_eq(a: &Value, b: &Value, seen: &mut Vec<(*const Pair, *const Pair)>) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Real(x), Value::Real(y)) => x == y,
        (Value::Integer(x), Value::Real(y)) | (Value::Real(y), Value::Integer(x)) => {
            x.to_f64().is_some_and(|v| v == *y)
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        (Value::Nil, Value::Nil) => true,
        (Value::Pair(x), Value::Pair(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let key = (Rc::as_ptr(x) as *const Pair, Rc::as_ptr(y) as *const Pair);
            if seen.contains(&key) {
                return true;
            }
            seen.push(key);
            let (xa, xd) = {
                let pair = x.borrow();
                (pair.car.clone(), pair.cdr.clone())
            };
            let (ya, yd) = {
                let pair = y.borrow();
                (pair.car.clone(), pair.cdr.clone())
            };
            structural_eq(&xa, &ya, seen) && structural_eq(&xd, &yd, seen)
        }
        (Value::Primitive(x), Value::Primitive(y)) => Rc::ptr_eq(x, y),
        (Value::Compound(x), Value::Compound(y)) => Rc::ptr_eq(x, y),
        (Value::Continuation(x), Value::Continuation(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = Vec::new();
        write_value(self, f, &mut path)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// `path` holds the pair cells currently being printed; re-entering one of
// them means the structure is cyclic and prints as "...".
fn write_value(
    value: &Value,
    f: &mut fmt::Formatter<'_>,
    path: &mut Vec<*const Pair>,
) -> fmt::Result {
    match value {
        Value::Integer(n) => write!(f, "{}", n),
        Value::Real(x) => {
            // keep a decimal point so reals stay distinguishable from integers
            if x.is_finite() && x.fract() == 0.0 {
                write!(f, "{:.1}", x)
            } else {
                write!(f, "{}", x)
            }
        }
        Value::Str(s) => write!(f, "{}", s),
        Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
        Value::Symbol(s) => write!(f, "{}", s),
        Value::Nil => write!(f, "()"),
        Value::Pair(cell) => write_pair(cell, f, path),
        Value::Primitive(p) => write!(f, "<primitive-procedure {}>", p.name),
        Value::Compound(p) => {
            let name = p.name.borrow();
            let name = name.as_deref().map(|n| format!("{} ", n)).unwrap_or_default();
            if p.parameters.is_empty() {
                write!(f, "<compound-procedure {}(no-param)>", name)
            } else {
                write!(f, "<compound-procedure {}(param: {})>", name, p.parameters.join(","))
            }
        }
        Value::Continuation(_) => write!(f, "<continuation>"),
    }
}

fn write_pair(
    cell: &Rc<RefCell<Pair>>,
    f: &mut fmt::Formatter<'_>,
    path: &mut Vec<*const Pair>,
) -> fmt::Result {
    write!(f, "(")?;
    let depth = path.len();
    let mut current = Rc::clone(cell);
    loop {
        let ptr = current.as_ptr() as *const Pair;
        if path.contains(&ptr) {
            write!(f, "...")?;
            break;
        }
        path.push(ptr);
        let (car, cdr) = {
            let pair = current.borrow();
            (pair.car.clone(), pair.cdr.clone())
        };
        write_value(&car, f, path)?;
        match cdr {
            Value::Nil => break,
            Value::Pair(next) => {
                write!(f, " ")?;
                current = next;
            }
            other => {
                // pair or not well-formed list
                write!(f, " . ")?;
                write_value(&other, f, path)?;
                break;
            }
        }
    }
    path.truncate(depth);
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_printing() {
        let improper = Value::cons(
            Value::Integer(BigInt::from(1)),
            Value::cons(Value::Integer(BigInt::from(2)), Value::Integer(BigInt::from(3))),
        );
        assert_eq!(improper.to_string(), "(1 2 . 3)");
        let proper = Value::list([
            Value::Integer(BigInt::from(1)),
            Value::Integer(BigInt::from(2)),
            Value::Integer(BigInt::from(3)),
        ]);
        assert_eq!(proper.to_string(), "(1 2 3)");
        assert_eq!(Value::Nil.to_string(), "()");
    }

    #[test]
    fn real_printing_keeps_decimal_point() {
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::Real(2.5).to_string(), "2.5");
        assert_eq!(Value::Integer(BigInt::from(2)).to_string(), "2");
    }

    #[test]
    fn cyclic_pair_printing_terminates() {
        let cell = Rc::new(RefCell::new(Pair {
            car: Value::Integer(BigInt::from(1)),
            cdr: Value::Nil,
        }));
        cell.borrow_mut().cdr = Value::Pair(Rc::clone(&cell));
        assert_eq!(Value::Pair(Rc::clone(&cell)).to_string(), "(1 ...)");
    }

    #[test]
    fn structural_equality() {
        let a = Value::list([Value::Integer(BigInt::from(1)), Value::string("x")]);
        let b = Value::list([Value::Integer(BigInt::from(1)), Value::string("x")]);
        assert_eq!(a, b);
        assert_eq!(Value::Integer(BigInt::from(1)), Value::Real(1.0));
        assert_ne!(Value::symbol("a"), Value::string("a"));
    }

    #[test]
    fn cyclic_equality_terminates() {
        let make_cycle = || {
            let cell = Rc::new(RefCell::new(Pair {
                car: Value::Integer(BigInt::from(1)),
                cdr: Value::Nil,
            }));
            cell.borrow_mut().cdr = Value::Pair(Rc::clone(&cell));
            Value::Pair(cell)
        };
        assert_eq!(make_cycle(), make_cycle());
    }
}
