//! Statement parsing.
//!
//! Two statements are understood:
//!
//! ```text
//! insert <id> <username> <email>
//! select
//! ```

use std::str::FromStr;

use crate::error::Error;
use crate::row::Row;

/// A parsed statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Insert a single row.
    Insert(Row),
    /// Print every row in key order.
    Select,
}

/// Reasons a line could not be turned into a [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PrepareError {
    /// The statement keyword was recognized but its arguments were not.
    #[error("Syntax error. Could not parse statement.")]
    Syntax,

    /// The line does not start with a known keyword.
    #[error("Unrecognized keyword at start of '{0}'.")]
    UnrecognizedKeyword(String),

    /// The id was negative.
    #[error("ID cannot be negative.")]
    NegativeId,

    /// The username or email exceeded its column size.
    #[error("Maximum string length exceeded.")]
    StringTooLong,
}

impl FromStr for Statement {
    type Err = PrepareError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut tokens = input.split_whitespace();
        match tokens.next() {
            Some("insert") => prepare_insert(tokens),
            Some("select") => match tokens.next() {
                None => Ok(Statement::Select),
                Some(_) => Err(PrepareError::Syntax),
            },
            _ => Err(PrepareError::UnrecognizedKeyword(input.to_string())),
        }
    }
}

fn prepare_insert<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<Statement, PrepareError> {
    let (id, username, email) = match (args.next(), args.next(), args.next(), args.next()) {
        (Some(id), Some(username), Some(email), None) => (id, username, email),
        _ => return Err(PrepareError::Syntax),
    };

    let id: i64 = id.parse().map_err(|_| PrepareError::Syntax)?;
    if id < 0 {
        return Err(PrepareError::NegativeId);
    }
    let id = i32::try_from(id).map_err(|_| PrepareError::Syntax)? as u32;

    match Row::new(id, username, email) {
        Ok(row) => Ok(Statement::Insert(row)),
        Err(Error::StringTooLong { .. }) => Err(PrepareError::StringTooLong),
        Err(_) => Err(PrepareError::Syntax),
    }
}
