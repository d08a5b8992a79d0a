//! A tree-walking interpreter for a small Scheme dialect.
//!
//! Source text is parsed into a nested atom tree, analyzed once into
//! syntax-checked forms, and then executed by a trampolined evaluator that
//! eliminates tail calls and supports `call/cc` by reifying its own work
//! stack.

pub mod builtins;
pub mod env;
pub mod error;
pub mod eval;
pub mod ext;
pub mod form;
pub mod parser;
pub mod value;

pub use error::{Result, SchemeError};
pub use eval::{EvalRequest, Evaluator, Outcome, Unwind};
pub use ext::Extension;
pub use value::{PrimitiveFn, PrimitiveResult, Value};
