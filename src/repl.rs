//! Line-oriented command shell.
//!
//! Each input line is either a meta-command starting with `.` or a
//! statement. The prompt `db > ` is written before every line is read, so
//! each response appears prefixed with it.

use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::statement::Statement;
use crate::Table;

/// Prompt written before each input line.
pub const PROMPT: &str = "db > ";

/// Commands that start with `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    /// Flush, close and leave the shell.
    Exit,
    /// Print the tree structure.
    BTree,
    /// Print the layout constants.
    Constants,
    /// Anything else.
    Unrecognized(String),
}

impl From<&str> for MetaCommand {
    fn from(s: &str) -> Self {
        match s {
            ".exit" => MetaCommand::Exit,
            ".btree" => MetaCommand::BTree,
            ".constants" => MetaCommand::Constants,
            other => MetaCommand::Unrecognized(other.to_string()),
        }
    }
}

/// Whether the shell keeps reading after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// The shell, reading commands from `input` and writing responses to `output`.
pub struct Repl<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Repl<R, W> {
    /// Creates a shell over the given streams.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Runs commands against `table` until `.exit` or end of input.
    ///
    /// Statement errors are printed and the loop continues. An insert that
    /// would need an internal node split prints its message and returns
    /// [`Error::InternalSplitNotImplemented`]; I/O and corruption errors are
    /// returned as-is. The caller owns closing the table.
    pub fn run(&mut self, table: &mut Table) -> Result<()> {
        let mut line = String::new();
        loop {
            write!(self.output, "{}", PROMPT)?;
            self.output.flush()?;

            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                self.output.flush()?;
                return Ok(());
            }

            if self.execute_line(table, line.trim())? == Flow::Exit {
                self.output.flush()?;
                return Ok(());
            }
        }
    }

    fn execute_line(&mut self, table: &mut Table, line: &str) -> Result<Flow> {
        if line.starts_with('.') {
            return self.execute_meta(table, MetaCommand::from(line));
        }

        match line.parse::<Statement>() {
            Ok(statement) => self.execute_statement(table, statement)?,
            Err(e) => writeln!(self.output, "{}", e)?,
        }
        Ok(Flow::Continue)
    }

    fn execute_meta(&mut self, table: &mut Table, command: MetaCommand) -> Result<Flow> {
        match command {
            MetaCommand::Exit => return Ok(Flow::Exit),
            MetaCommand::BTree => {
                writeln!(self.output, "SimpleDB Tree:")?;
                for line in table.print_tree()? {
                    writeln!(self.output, "{}", line)?;
                }
            }
            MetaCommand::Constants => {
                writeln!(self.output, "Constants:")?;
                for (name, value) in Table::constants() {
                    writeln!(self.output, "{}: {}", name, value)?;
                }
            }
            MetaCommand::Unrecognized(text) => {
                writeln!(self.output, "Unrecognized command '{}'", text)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn execute_statement(&mut self, table: &mut Table, statement: Statement) -> Result<()> {
        match statement {
            Statement::Insert(row) => match table.insert(&row) {
                Ok(()) => writeln!(self.output, "Executed.")?,
                Err(Error::DuplicateKey(_)) => writeln!(self.output, "Error: Key already exists.")?,
                Err(Error::TableFull { .. }) => writeln!(self.output, "Error: Table full.")?,
                Err(Error::InternalSplitNotImplemented) => {
                    writeln!(self.output, "{}", Error::InternalSplitNotImplemented)?;
                    self.output.flush()?;
                    return Err(Error::InternalSplitNotImplemented);
                }
                Err(e) => return Err(e),
            },
            Statement::Select => {
                for row in table.scan()? {
                    writeln!(self.output, "{}", row?)?;
                }
                writeln!(self.output, "Executed.")?;
            }
        }
        Ok(())
    }
}
