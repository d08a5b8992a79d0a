use crate::error::{Result, SchemeError};
use std::fmt;
use std::iter::Peekable;

// Raw expression tree handed to the analyzer. Atoms are uninterpreted token
// strings (string literals keep their surrounding quotes).
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Atom(String),
    List(Vec<Datum>),
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Atom(s) => write!(f, "{}", s),
            Datum::List(items) => {
                let strs: Vec<String> = items.iter().map(|d| d.to_string()).collect();
                write!(f, "({})", strs.join(" "))
            }
        }
    }
}

enum Token {
    LParen,
    RParen,
    Quote,        // '
    Atom(String), // everything else, quoted strings included
}

// Very basic tokenizer
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '\'' => {
                tokens.push(Token::Quote);
                chars.next();
            }
            '"' => {
                // string literal; the quotes stay part of the atom and are
                // stripped during analysis
                chars.next();
                let mut s = String::from('"');
                loop {
                    match chars.next() {
                        Some('"') => {
                            s.push('"');
                            break;
                        }
                        Some(other) => s.push(other),
                        // the REPL treats this as "keep typing"
                        None => return Err(SchemeError::IncompleteInput),
                    }
                }
                tokens.push(Token::Atom(s));
            }
            ';' => {
                // comment: skip till end of line
                for next_c in chars.by_ref() {
                    if next_c == '\n' {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut atom = String::new();
                while let Some(&next_c) = chars.peek() {
                    if next_c.is_whitespace() || "()'\";".contains(next_c) {
                        break;
                    }
                    atom.push(next_c);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }
    Ok(tokens)
}

fn read_datum<I>(tokens: &mut Peekable<I>) -> Result<Datum>
where
    I: Iterator<Item = Token>,
{
    let token = tokens.next().ok_or(SchemeError::IncompleteInput)?;

    match token {
        Token::LParen => {
            let mut items = Vec::new();
            loop {
                match tokens.peek() {
                    Some(Token::RParen) => {
                        tokens.next();
                        return Ok(Datum::List(items));
                    }
                    Some(_) => items.push(read_datum(tokens)?),
                    None => return Err(SchemeError::IncompleteInput),
                }
            }
        }
        Token::RParen => Err(SchemeError::Parser("Parenthesis doesn't match".to_string())),
        // 'x reads as (quote x)
        Token::Quote => Ok(Datum::List(vec![
            Datum::Atom("quote".to_string()),
            read_datum(tokens)?,
        ])),
        Token::Atom(s) => Ok(Datum::Atom(s)),
    }
}

// Reads exactly one expression.
pub fn parse(input: &str) -> Result<Datum> {
    let mut tokens = tokenize(input)?.into_iter().peekable();
    let datum = read_datum(&mut tokens)?;
    if tokens.peek().is_some() {
        return Err(SchemeError::Parser(
            "Too many right parentheses or more than one expression".to_string(),
        ));
    }
    Ok(datum)
}

// Reads a whole script: any number of expressions until input runs out.
pub fn parse_all(input: &str) -> Result<Vec<Datum>> {
    let mut tokens = tokenize(input)?.into_iter().peekable();
    let mut data = Vec::new();
    while tokens.peek().is_some() {
        data.push(read_datum(&mut tokens)?);
    }
    Ok(data)
}
