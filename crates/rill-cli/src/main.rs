//! rill command-line entry point.
//!
//! With a path argument, runs the script file; without one, enters an
//! interactive line-oriented session against a persistent interpreter state,
//! printing each line's value. Both modes load the bundled std preamble.

use std::{env, fs, process::ExitCode};

use rill::{Config, Interpreter, StdConsole};
use rustyline::{DefaultEditor, error::ReadlineError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1) {
        Some(path) => run_file(path),
        None => repl(),
    }
}

fn run_file(path: &str) -> ExitCode {
    let code = match fs::read_to_string(path) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut interpreter = match Interpreter::new(&code, Config::new().use_std(true)) {
        Ok(interpreter) => interpreter,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    match interpreter.execute(&mut StdConsole) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn repl() -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut interpreter = Interpreter::session(Config::new().use_std(true));

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(&line);
                match interpreter.evaluate(&line, &mut StdConsole) {
                    Ok(value) => println!("{value}"),
                    Err(err) => eprintln!("{err}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        }
    }
}
