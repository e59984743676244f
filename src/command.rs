//! Target command protocol.
//!
//! One command per line:
//!
//! ```text
//! +PATH:SYMBOL [DELAY_NS] [pid=PID]   add
//! -PATH:SYMBOL                        remove one
//! -*                                  remove all
//! =PATH:SYMBOL DELAY_NS [pid=PID]     update
//! ```
//!
//! Fields are validated in a fixed order so clients can rely on the error
//! they get back: separator, path length, absolute path, symbol length,
//! `pid=`, delay, delay range, symbol start character.

use core::fmt;
use core::num::IntErrorKind;

use crate::config::Config;
use crate::error::Error;
use crate::target::TargetKey;

const PID_TOKEN: &str = "pid=";

/// Add or update request before defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub key: TargetKey,
    /// `None` = use the registry's default delay.
    pub delay_ns: Option<u64>,
    /// `None` = no filter (`pid=0` parses as `None` too).
    pub pid_filter: Option<u32>,
}

/// A parsed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(TargetSpec),
    Remove(TargetKey),
    RemoveAll,
    Update(TargetSpec),
}

impl Command {
    /// Parse one line written to the `targets` endpoint.
    pub fn parse_line(line: &str, config: &Config) -> Result<Self, Error> {
        if line.is_empty() || line.len() > config.max_line_len {
            return Err(Error::InvalidArgument);
        }

        // Operators are ASCII, so `[1..]` stays on a char boundary.
        match line.as_bytes()[0] {
            b'+' => parse_target_spec(&line[1..], config).map(Self::Add),
            b'-' => parse_remove(&line[1..], config),
            b'=' => parse_target_spec(&line[1..], config).map(Self::Update),
            _ => Err(Error::InvalidArgument),
        }
    }
}

impl fmt::Display for Command {
    /// Canonical wire form, without a trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(spec) => write!(f, "+{}", spec),
            Self::Remove(key) => write!(f, "-{}", key),
            Self::RemoveAll => f.write_str("-*"),
            Self::Update(spec) => write!(f, "={}", spec),
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(delay_ns) = self.delay_ns {
            write!(f, " {}", delay_ns)?;
        }
        if let Some(pid) = self.pid_filter {
            write!(f, " {}{}", PID_TOKEN, pid)?;
        }
        Ok(())
    }
}

/// `PATH:SYMBOL [DELAY_NS] [pid=PID]`
pub fn parse_target_spec(spec: &str, config: &Config) -> Result<TargetSpec, Error> {
    let (path, rest) = spec.split_once(':').ok_or(Error::InvalidArgument)?;
    check_path(path, config)?;
    if !path.starts_with('/') {
        return Err(Error::InvalidArgument);
    }

    let (symbol, delay_ns, pid_filter) = match rest.split_once(' ') {
        Some((symbol, fields)) => {
            check_symbol_len(symbol, config)?;
            let (delay_ns, pid_filter) = parse_fields(fields, config)?;
            (symbol, delay_ns, pid_filter)
        }
        None => {
            let symbol = strip_line_end(rest);
            check_symbol_len(symbol, config)?;
            (symbol, None, None)
        }
    };

    if !symbol
        .chars()
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
    {
        return Err(Error::InvalidArgument);
    }

    Ok(TargetSpec {
        key: TargetKey::new(path, symbol),
        delay_ns,
        pid_filter,
    })
}

fn parse_remove(spec: &str, config: &Config) -> Result<Command, Error> {
    // Only a bare `*` or one ended by a newline; anything else is a key.
    if spec == "*" || spec.starts_with("*\n") {
        return Ok(Command::RemoveAll);
    }

    let (path, rest) = spec.split_once(':').ok_or(Error::InvalidArgument)?;
    check_path(path, config)?;
    let symbol = strip_line_end(rest);
    check_symbol_len(symbol, config)?;

    Ok(Command::Remove(TargetKey::new(path, symbol)))
}

/// Everything after the first space following the symbol.
fn parse_fields(fields: &str, config: &Config) -> Result<(Option<u64>, Option<u32>), Error> {
    let Some(pos) = fields.find(PID_TOKEN) else {
        let delay_ns = parse_delay(strip_line_end(fields), config)?;
        return Ok((Some(delay_ns), None));
    };

    let pid_filter = parse_pid(&fields[pos + PID_TOKEN.len()..])?;
    let delay_text = fields[..pos].trim_end_matches([' ', '\t']);
    let delay_ns = if delay_text.is_empty() {
        None
    } else {
        Some(parse_delay(delay_text, config)?)
    };

    Ok((delay_ns, pid_filter))
}

fn parse_pid(text: &str) -> Result<Option<u32>, Error> {
    let pid: i32 = strip_line_end(text).parse().map_err(int_error)?;
    match pid {
        0 => Ok(None),
        pid if pid < 0 => Err(Error::InvalidArgument),
        pid => Ok(Some(pid as u32)),
    }
}

/// Decimal nanoseconds, bounded by `config.max_delay_ns`.
pub fn parse_delay(text: &str, config: &Config) -> Result<u64, Error> {
    let delay_ns: u64 = text.parse().map_err(int_error)?;
    if delay_ns > config.max_delay_ns {
        return Err(Error::OutOfRange);
    }
    Ok(delay_ns)
}

fn int_error(err: core::num::ParseIntError) -> Error {
    match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => Error::OutOfRange,
        _ => Error::InvalidArgument,
    }
}

fn check_path(path: &str, config: &Config) -> Result<(), Error> {
    if path.is_empty() || path.len() >= config.max_path_len {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

fn check_symbol_len(symbol: &str, config: &Config) -> Result<(), Error> {
    if symbol.is_empty() || symbol.len() >= config.max_symbol_len {
        return Err(Error::NameTooLong);
    }
    Ok(())
}

/// Drop trailing CR/LF.
pub fn strip_line_end(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}
