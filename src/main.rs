//! gitledger - Git-like repository history on a key-value ledger
//!
//! This is the main entry point for the gitledger command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use gitledger::node::{print_response, Node, NodeConfig, Repl};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut path = PathBuf::from(".gitledger.json");
    let mut verbose = false;
    let mut user: Option<String> = None;
    let mut key: Option<String> = None;
    let mut execute: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-l" | "--ledger" => {
                i += 1;
                if i < args.len() {
                    path = PathBuf::from(&args[i]);
                }
            }
            "-u" | "--user" => {
                i += 1;
                user = args.get(i).cloned();
            }
            "-k" | "--key" => {
                i += 1;
                key = args.get(i).cloned();
            }
            "-e" | "--execute" => {
                i += 1;
                execute = args.get(i).cloned();
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("gitledger v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                // Treat as ledger path if no flag.
                if !arg.starts_with('-') {
                    path = PathBuf::from(arg);
                } else {
                    eprintln!("Unknown option: {}", arg);
                    return ExitCode::FAILURE;
                }
            }
        }
        i += 1;
    }

    let config = NodeConfig::new(&path).create_if_missing(true).verbose(verbose);
    init_logging(&config);

    let mut node = match Node::open_with_config(config) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("Error opening ledger: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match (user, key) {
        (Some(user), Some(key)) => {
            if let Err(e) = node.login(&user, &key) {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        (None, None) => {}
        _ => {
            eprintln!("--user and --key must be given together");
            return ExitCode::FAILURE;
        }
    }

    // Execute single call or run REPL.
    let result = match execute {
        Some(line) => execute_line(&mut node, &line),
        None => run_repl(node),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over the verbosity flag.
fn init_logging(config: &NodeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_help() {
    println!("gitledger - Git-like repository history on a key-value ledger");
    println!();
    println!("Usage: gitledger [OPTIONS] [LEDGER]");
    println!();
    println!("Options:");
    println!("  -l, --ledger PATH      Path to ledger snapshot (default: .gitledger.json)");
    println!("  -u, --user NAME        Log in as NAME");
    println!("  -k, --key PUBLIC_KEY   Public key for --user");
    println!("  -e, --execute CALL     Run \"function arg...\" and exit");
    println!("  -v, --verbose          Enable verbose output");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  gitledger                                        Start shell on default ledger");
    println!("  gitledger -e 'registerNewUser alice a@x.io pk1'  Register a user and exit");
    println!("  gitledger -u alice -k pk1 -e 'clone alice proj'  Clone a repository as alice");
}

fn execute_line(node: &mut Node, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    let response = node.execute(line, Utc::now())?;
    print_response(&response);
    Ok(())
}

fn run_repl(node: Node) -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = Repl::new(node);
    repl.run()?;
    Ok(())
}
