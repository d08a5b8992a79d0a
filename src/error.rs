use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SchemeError {
    #[error("{0}")]
    Parser(String),
    // Input ran out inside a list or string; the REPL reacts by reading more lines.
    #[error("Too few right parentheses")]
    IncompleteInput,
    #[error("Malformed {0}")]
    Malformed(&'static str),
    #[error("Unknown expression type -- ANALYZE ({0})")]
    UnknownExpression(String),
    #[error("Unbound variable ({0})")]
    UnboundVariable(String),
    #[error("Setting unbound variable ({0})")]
    SettingUnbound(String),
    #[error("Wrong number of args -- APPLY ({0})")]
    WrongNumberOfArgs(String),
    #[error("Unknown procedure type -- APPLY ({0})")]
    UnknownProcedure(String),
    #[error("{0}")]
    Eval(String),
}

pub type Result<T> = std::result::Result<T, SchemeError>;
