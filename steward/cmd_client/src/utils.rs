use std::io;
use std::io::Write;

use clap::Parser;

use crate::cmd_parser::CmdParser;

/// Returns `None` once stdin is closed.
pub fn read_command_line() -> Result<Option<CmdParser>, anyhow::Error> {
    write_line_begining()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let argv =
        shlex::split(line.trim().as_ref()).ok_or(io::Error::other("Can't split readed line!"))?;
    let cmd = CmdParser::try_parse_from(argv.iter())?;
    Ok(Some(cmd))
}

fn write_line_begining() -> Result<(), anyhow::Error> {
    write!(std::io::stdout(), "$ ")?;
    Ok(std::io::stdout().flush()?)
}

/// Parses `KEY=VALUE`, the value may contain further `=`.
pub fn parse_field(field: &str) -> Result<(String, String), String> {
    match field.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Expected KEY=VALUE, got: {field}")),
    }
}
