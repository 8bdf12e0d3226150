//! Trace format parser using nom
//!
//! One command per line:
//! ```text
//! # comment
//! put <key> <value...>
//! get <key>
//! del <key>
//! ```
//!
//! Keywords are case-insensitive. A key is a run of non-whitespace
//! characters; a value is the rest of the line and may contain spaces.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till1},
    character::complete::space1,
    combinator::{all_consuming, map, rest, verify},
    sequence::{preceded, separated_pair, terminated},
    IResult,
};

/// A single trace command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Del { key: String },
}

/// Malformed trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ParseError {}

fn key(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(word), space1)
}

fn put(input: &str) -> IResult<&str, Command> {
    map(
        preceded(
            keyword("put"),
            separated_pair(key, space1, verify(rest, |v: &str| !v.trim().is_empty())),
        ),
        |(key, value): (&str, &str)| Command::Put {
            key: key.to_string(),
            value: value.trim().to_string(),
        },
    )(input)
}

fn get(input: &str) -> IResult<&str, Command> {
    map(preceded(keyword("get"), key), |key: &str| Command::Get {
        key: key.to_string(),
    })(input)
}

fn del(input: &str) -> IResult<&str, Command> {
    map(preceded(keyword("del"), key), |key: &str| Command::Del {
        key: key.to_string(),
    })(input)
}

/// Parse one trace line
///
/// # Returns
/// * `Ok(None)` - blank line or comment
/// * `Ok(Some(command))` - a command
/// * `Err(ParseError)` - anything else
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    match all_consuming(alt((put, get, del)))(line) {
        Ok((_, command)) => Ok(Some(command)),
        Err(_) => Err(ParseError {
            line: line_no,
            message: format!(
                "expected `put <key> <value>`, `get <key>` or `del <key>`, found {:?}",
                line
            ),
        }),
    }
}
