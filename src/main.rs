use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::{env, process};
use toyscheme::{parser, Evaluator, SchemeError, Value};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut evaluator = Evaluator::new();
    match env::args().nth(1) {
        Some(path) => {
            if let Err(e) = evaluator.load_file(&path) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        None => repl(&mut evaluator),
    }
}

fn repl(evaluator: &mut Evaluator) {
    println!(
        "Toy Scheme Interpreter v{}  (EOF to exit)",
        env!("CARGO_PKG_VERSION")
    );

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("cannot initialize line editor: {}", e);
            process::exit(1);
        }
    };

    // lines accumulate here until they form a complete expression
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { ">> " } else { ".. " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_empty() && line.trim().is_empty() {
                    continue;
                }
                pending.push_str(&line);
                pending.push('\n');

                // one expression per interaction, joined across lines
                let datum = match parser::parse(&pending) {
                    Err(SchemeError::IncompleteInput) => continue,
                    other => other,
                };
                let _ = rl.add_history_entry(pending.trim());
                pending.clear();

                match datum.and_then(|d| evaluator.eval_datum(&d)) {
                    Ok(value) => {
                        if !matches!(value, Value::Nil) {
                            println!("{}", value);
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // drop whatever was being typed and prompt again
                pending.clear();
                println!();
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {:?}", e);
                break;
            }
        }
    }
}
