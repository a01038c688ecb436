//! Declarative command language, executor and analyzers for Linux
//! network configuration, built on the `netlink` crate's wire codec,
//! transactor and object operations.

pub mod analyzers;
pub mod error;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use error::{CfgError, Result};
pub use executor::{Executor, Outcome, Snapshot};
pub use parser::Command;

/// Parses and validates a full config source, returning the commands
/// and any non-fatal warnings collected along the way.
pub fn load(source: &str) -> std::result::Result<Vec<Command>, CfgError> {
    let lines = lexer::tokenize(source);
    let commands = parser::parse(&lines);
    for cmd in &commands {
        validator::validate(cmd)?;
    }
    Ok(commands)
}
