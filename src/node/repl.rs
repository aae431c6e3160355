//! Interactive shell for a gitledger node.

use std::io::{self, BufRead, Write};

use chrono::Utc;

use super::api::{Node, NodeResult};
use crate::contract::Response;

/// REPL configuration.
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Prompt string.
    pub prompt: String,
    /// Show timing information.
    pub timing: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "gitledger> ".into(),
            timing: false,
        }
    }
}

/// The interactive REPL.
pub struct Repl {
    node: Node,
    config: ReplConfig,
    history: Vec<String>,
}

impl Repl {
    /// Create a new REPL over the given node.
    pub fn new(node: Node) -> Self {
        Self::with_config(node, ReplConfig::default())
    }

    /// Create a REPL with custom configuration.
    pub fn with_config(node: Node, config: ReplConfig) -> Self {
        Self {
            node,
            config,
            history: Vec::new(),
        }
    }

    /// Run the REPL until `:quit` or end of input.
    pub fn run(&mut self) -> NodeResult<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            let prompt = match self.node.whoami() {
                Some(user) => format!("{}@{}", user.name, self.config.prompt),
                None => self.config.prompt.clone(),
            };
            print!("{}", prompt);
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!("\nGoodbye!");
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.history.push(line.to_string());

            if self.is_command(line) {
                match self.handle_command(line) {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(e) => eprintln!("Error: {}", e),
                }
                continue;
            }

            let start = std::time::Instant::now();
            match self.node.execute(line, Utc::now()) {
                Ok(response) => {
                    print_response(&response);
                    if self.config.timing {
                        println!("Time: {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Ok(())
    }

    fn print_banner(&self) {
        println!("gitledger {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for commands, or call a contract function: function arg...");
        println!();
    }

    fn is_command(&self, input: &str) -> bool {
        input.starts_with(':')
    }

    /// Returns `true` when the shell should exit.
    fn handle_command(&mut self, input: &str) -> NodeResult<bool> {
        let parts: Vec<&str> = input.trim_start_matches(':').split_whitespace().collect();
        let command = parts.first().map(|s| s.to_lowercase());

        match command.as_deref() {
            Some("help") | Some("h") | Some("?") => self.print_help(),
            Some("quit") | Some("exit") | Some("q") => return Ok(true),
            Some("login") => match (parts.get(1), parts.get(2)) {
                (Some(name), Some(key)) => {
                    let user = self.node.login(name, key)?;
                    println!("Logged in as {}", user);
                }
                _ => eprintln!("Usage: :login <name> <public_key>"),
            },
            Some("logout") => match self.node.logout() {
                Some(user) => println!("Logged out {}", user.name),
                None => println!("No user is logged in"),
            },
            Some("whoami") => match self.node.whoami() {
                Some(user) => println!("{}", user),
                None => println!("No user is logged in"),
            },
            Some("save") => {
                self.node.save()?;
                println!("Saved to {}", self.node.config().path.display());
            }
            Some("history") => {
                for (i, entry) in self.history.iter().enumerate() {
                    println!("{:4}  {}", i + 1, entry);
                }
            }
            Some("timing") => {
                self.config.timing = !self.config.timing;
                println!("Timing: {}", if self.config.timing { "on" } else { "off" });
            }
            Some(other) => {
                eprintln!("Unknown command: :{}", other);
                eprintln!("Type :help for available commands");
            }
            None => {}
        }

        Ok(false)
    }

    fn print_help(&self) {
        println!("Commands:");
        println!("  :help, :h, :?             Show this help message");
        println!("  :quit, :exit, :q          Exit the shell");
        println!("  :login <name> <key>       Log in with a registered public key");
        println!("  :logout                   Log out");
        println!("  :whoami                   Show the logged-in user");
        println!("  :save                     Write the ledger snapshot");
        println!("  :history                  Show input history");
        println!("  :timing                   Toggle timing display");
        println!();
        println!("Contract functions (JSON arguments in single quotes):");
        println!("  registerNewUser <name> <email> <publicKey>");
        println!("  changePublicKey <publicKey>");
        println!("  addNewRepo '<repo json>'");
        println!("  renameRepo | deleteRepo | queryRepo | clone <author> <repo> [newName]");
        println!("  addNewBranch <author> <repo> '<branch json>'");
        println!("  renameBranch <author> <repo> <branch> <newBranch>");
        println!("  deleteBranch | queryBranch | checkoutLast <author> <repo> <branch>");
        println!("  queryBranches <author> <repo>");
        println!("  push <author> <repo> <branch> '<commit json>'");
        println!("  pushMultiple <author> <repo> <branch> '<commit list json>'");
        println!("  pull <author> <repo> <branch> [sinceHash]");
        println!("  queryUser <name> | queryUsers '<name list json>'");
        println!("  updateRepoUserAccess <author> <repo> <user> <read|readwrite|owner|none>");
        println!("  queryRepoUserAccess <author> <repo>");
        println!();
    }
}

/// Print a response the way the CLI shows it.
pub fn print_response(response: &Response) {
    match response {
        Response::Message(message) => println!("{}", message),
        Response::Data(serde_json::Value::Null) => println!("(none)"),
        Response::Data(_) => println!("{}", response),
    }
}
