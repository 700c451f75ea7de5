//! CLI wrapper for the clove script engine.
//!
//! Usage:
//!   clove <file.js>              # Run a script file
//!   clove -e "code"              # Evaluate code and print the result
//!   clove                        # Start REPL (interactive mode)
//!
//! Logging goes to stderr and is filtered by `RUST_LOG`.

use clove::runner::api::{Vm, VmError};
use clove::runner::ds::value::JsValue;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();

    match args.len() {
        1 => run_repl(),
        2 => {
            let arg = &args[1];
            if arg == "-h" || arg == "--help" {
                print_usage();
                process::exit(0);
            }
            run_file(arg);
        }
        3 if args[1] == "-e" || args[1] == "--eval" => eval_code(&args[2]),
        _ => {
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("clove - script engine");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  clove <file.js>              Run a script file");
    eprintln!("  clove -e \"code\"              Evaluate code and print the result");
    eprintln!("  clove --eval \"code\"          Evaluate code and print the result");
    eprintln!("  clove                        Start REPL (interactive mode)");
}

fn report(e: &VmError) {
    match e {
        VmError::Syntax(_) | VmError::Thrown { .. } => eprintln!("{}", e),
        VmError::StackOverflow(_) | VmError::StepsExceeded => eprintln!("Uncaught {}", e),
    }
}

fn run_file(filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            process::exit(1);
        }
    };
    let mut vm = Vm::new();
    if let Err(e) = vm.evaluate_program(&source, filename) {
        report(&e);
        process::exit(1);
    }
}

fn eval_code(code: &str) {
    let mut vm = Vm::new();
    match vm.evaluate_program(code, "<eval>") {
        Ok(JsValue::Undefined) => {}
        Ok(v) => println!("{}", vm.display(&v)),
        Err(e) => {
            report(&e);
            process::exit(1);
        }
    }
}

fn run_repl() {
    println!("clove v{}", env!("CARGO_PKG_VERSION"));
    println!("Type code and press Enter. Type .exit to quit.");
    println!();

    let mut vm = Vm::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }

        let input = input.trim();
        if input == ".exit" || input == ".quit" {
            break;
        }
        if input.is_empty() {
            continue;
        }

        match vm.evaluate_program(input, "<repl>") {
            Ok(JsValue::Undefined) => {}
            Ok(v) => println!("{}", vm.display(&v)),
            Err(e) => report(&e),
        }
    }
}
